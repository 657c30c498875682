//! The flat record a session is saved as.
//!
//! Together with the room graph this is everything needed to resume; see
//! [`Game::from_snapshot`](super::Game::from_snapshot).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ChallengeId, RoomId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub player_name: String,
    pub current_room_id: RoomId,
    pub completed_room_ids: Vec<RoomId>,
    pub completed_challenge_ids: Vec<ChallengeId>,
    pub move_count: u32,
    pub saved_at: DateTime<Utc>,
    pub game_started: DateTime<Utc>,
}
