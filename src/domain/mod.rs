//! Progression model: rooms, the player ledger and the navigation state machine.

pub mod game;
pub mod ids;
pub mod player;
pub mod room;
pub mod snapshot;

pub use game::Game;
pub use ids::{ChallengeId, RoomId};
pub use player::Player;
pub use room::{Room, SandboxPolicy};
pub use snapshot::SessionSnapshot;
