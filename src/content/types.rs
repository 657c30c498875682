use std::collections::BTreeMap;

use serde::Deserialize;

use crate::challenge::{RuleSpec, SetupStep};
use crate::domain::SandboxPolicy;

/// One `room_*.toml` file.
#[derive(Debug, Deserialize)]
pub struct RoomFile {
    pub room: RoomMeta,
    #[serde(default)]
    pub exits: BTreeMap<String, String>,
    #[serde(default)]
    pub challenge: Option<ChallengeDef>,
}

#[derive(Debug, Deserialize)]
pub struct RoomMeta {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub start: bool,
    #[serde(default)]
    pub end: bool,
    #[serde(default)]
    pub sandbox: SandboxPolicy,
    #[serde(default)]
    pub auxiliary_sandboxes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChallengeDef {
    Quiz(QuizDef),
    Scenario(RepositoryDef),
    Repository(RepositoryDef),
}

#[derive(Debug, Deserialize)]
pub struct QuizDef {
    pub id: String,
    pub description: String,
    pub question: String,
    pub options: Vec<String>,
    /// 0-based index into `options`.
    pub correct: usize,
    #[serde(default)]
    pub hint: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RepositoryDef {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    #[serde(default)]
    pub setup: Vec<SetupStep>,
    /// Name of a bespoke setup/validate pair in the registry.
    #[serde(default)]
    pub custom: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub success: Option<String>,
}
