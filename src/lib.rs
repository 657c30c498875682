//! A dungeon crawler that teaches git.
//!
//! Each room holds a challenge that gates its exits. Quizzes are answered in
//! the game; repository challenges are solved by running real git commands in
//! a sandbox directory that belongs to the room. The crate is split the same
//! way:
//!
//! - **[`domain`]**: rooms, the player ledger and the navigation state machine.
//!   No I/O.
//! - **[`challenge`]**: challenge variants, declarative rules and checklists.
//! - **[`exec`]**: process execution, git probes and sandbox directories.
//! - **[`engine`]**: parses player input and turns it into [`CommandResult`]s.
//! - **[`content`]**: loads room files from disk.

pub mod challenge;
pub mod config;
pub mod content;
pub mod domain;
pub mod engine;
pub mod error;
pub mod exec;
pub mod logging;
pub mod save;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::EngineConfig;
pub use domain::{Game, Player, Room, SessionSnapshot};
pub use engine::{CommandResult, GameEngine, ResultType, SessionState};
