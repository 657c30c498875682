//! The player's progress ledger.
//!
//! Both completed sets only ever grow. Mutation goes through [`Game`], which
//! the engine drives; nothing else holds a `&mut Player`.
//!
//! [`Game`]: super::Game

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::{ChallengeId, RoomId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Player {
    name: String,
    completed_rooms: BTreeSet<RoomId>,
    completed_challenges: BTreeSet<ChallengeId>,
    move_count: u32,
    game_started: DateTime<Utc>,
}

impl Player {
    pub fn new(name: impl Into<String>, game_started: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            completed_rooms: BTreeSet::new(),
            completed_challenges: BTreeSet::new(),
            move_count: 0,
            game_started,
        }
    }

    /// Rebuild a ledger from persisted fields.
    pub(crate) fn restore(
        name: String,
        completed_rooms: BTreeSet<RoomId>,
        completed_challenges: BTreeSet<ChallengeId>,
        move_count: u32,
        game_started: DateTime<Utc>,
    ) -> Self {
        Self {
            name,
            completed_rooms,
            completed_challenges,
            move_count,
            game_started,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn completed_rooms(&self) -> &BTreeSet<RoomId> {
        &self.completed_rooms
    }

    pub fn completed_challenges(&self) -> &BTreeSet<ChallengeId> {
        &self.completed_challenges
    }

    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    pub fn game_started(&self) -> DateTime<Utc> {
        self.game_started
    }

    pub fn has_completed_room(&self, id: &RoomId) -> bool {
        self.completed_rooms.contains(id)
    }

    pub fn has_completed_challenge(&self, id: &ChallengeId) -> bool {
        self.completed_challenges.contains(id)
    }

    pub(crate) fn complete_room(&mut self, id: RoomId) {
        self.completed_rooms.insert(id);
    }

    /// Returns `true` if the challenge was not already recorded.
    pub(crate) fn complete_challenge(&mut self, id: ChallengeId) -> bool {
        self.completed_challenges.insert(id)
    }

    pub(crate) fn record_move(&mut self) {
        self.move_count = self.move_count.saturating_add(1);
    }
}
