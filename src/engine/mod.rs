//! The command dispatcher and session lifecycle.

pub mod command;
#[allow(clippy::module_inception)]
pub mod engine;
pub mod result;

pub use command::{parse_command, Command, CommandClass};
pub use engine::{GameEngine, SessionState};
pub use result::{CommandResult, ResultType};
