use std::collections::BTreeMap;

use serde::Deserialize;

use super::RoomId;
use crate::challenge::Challenge;

/// How a room gets its primary sandbox when it becomes current.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxPolicy {
    /// Allocate a new, empty directory.
    #[default]
    Fresh,
    /// Keep the previous room's primary directory.
    Reuse,
}

/// A node in the room graph. Loaded once, then only read.
#[derive(Clone, Debug)]
pub struct Room {
    id: RoomId,
    name: String,
    description: String,
    challenge: Option<Challenge>,
    exits: BTreeMap<String, RoomId>,
    is_start: bool,
    is_end: bool,
    sandbox: SandboxPolicy,
    auxiliary_sandboxes: Vec<String>,
}

impl Room {
    pub fn new(id: impl Into<RoomId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            challenge: None,
            exits: BTreeMap::new(),
            is_start: false,
            is_end: false,
            sandbox: SandboxPolicy::Fresh,
            auxiliary_sandboxes: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_challenge(mut self, challenge: Challenge) -> Self {
        self.challenge = Some(challenge);
        self
    }

    /// Exit names are matched case-insensitively, so they are stored lowercased.
    pub fn with_exit(mut self, direction: &str, target: impl Into<RoomId>) -> Self {
        self.exits
            .insert(direction.trim().to_lowercase(), target.into());
        self
    }

    pub fn start(mut self) -> Self {
        self.is_start = true;
        self
    }

    pub fn end(mut self) -> Self {
        self.is_end = true;
        self
    }

    pub fn with_sandbox_policy(mut self, policy: SandboxPolicy) -> Self {
        self.sandbox = policy;
        self
    }

    pub fn with_auxiliary_sandbox(mut self, name: impl Into<String>) -> Self {
        self.auxiliary_sandboxes.push(name.into());
        self
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn challenge(&self) -> Option<&Challenge> {
        self.challenge.as_ref()
    }

    pub(crate) fn challenge_mut(&mut self) -> Option<&mut Challenge> {
        self.challenge.as_mut()
    }

    pub fn exits(&self) -> &BTreeMap<String, RoomId> {
        &self.exits
    }

    pub fn exit(&self, direction: &str) -> Option<&RoomId> {
        self.exits.get(&direction.trim().to_lowercase())
    }

    pub fn has_exit(&self, direction: &str) -> bool {
        self.exit(direction).is_some()
    }

    pub fn is_start(&self) -> bool {
        self.is_start
    }

    pub fn is_end(&self) -> bool {
        self.is_end
    }

    pub fn sandbox_policy(&self) -> SandboxPolicy {
        self.sandbox
    }

    pub fn auxiliary_sandboxes(&self) -> &[String] {
        &self.auxiliary_sandboxes
    }
}
