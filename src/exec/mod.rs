//! Everything that touches processes and the filesystem on the player's behalf.

pub mod executor;
pub mod git;
pub mod process;
pub mod sandbox;

pub use executor::{
    quote_arg, split_command_line, CommandExecutor, CommandOutcome, OutcomeKind, SystemExecutor,
};
pub use git::{GitProbe, StatusEntry};
pub use sandbox::{
    CleanupFailure, SandboxAllocator, SandboxLease, SandboxPaths, TempSandboxAllocator,
};
