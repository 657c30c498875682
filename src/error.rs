//! Error taxonomy for the raid.
//!
//! Only [`ConfigurationError`] may abort program start. Everything else is
//! caught where it happens and folded into a result the engine hands back.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{ChallengeId, RoomId};

/// Malformed room graph or room content. Fatal at load time.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("no room is marked as the start room")]
    NoStartRoom,

    #[error("more than one start room: {0:?}")]
    MultipleStartRooms(Vec<RoomId>),

    #[error("no room is marked as an end room")]
    NoEndRoom,

    #[error("duplicate room id: {0}")]
    DuplicateRoom(RoomId),

    #[error("duplicate challenge id: {0}")]
    DuplicateChallenge(ChallengeId),

    #[error("room {room} has exit '{direction}' to unknown room {target}")]
    DanglingExit {
        room: RoomId,
        direction: String,
        target: RoomId,
    },

    #[error("end room {0} must not have exits")]
    EndRoomHasExits(RoomId),

    #[error("room {0} is not reachable from the start room")]
    UnreachableRoom(RoomId),

    #[error("no end room is reachable from the start room")]
    EndRoomUnreachable,

    #[error("quiz {challenge} has correct index {index} but only {options} options")]
    QuizIndexOutOfRange {
        challenge: ChallengeId,
        index: usize,
        options: usize,
    },

    #[error("challenge {0} has neither rules nor a custom validator")]
    EmptyChallenge(ChallengeId),

    #[error("room {room} refers to unknown custom challenge '{name}'")]
    UnknownCustom { room: RoomId, name: String },

    #[error("no rooms found in {0}")]
    NoRooms(PathBuf),

    #[error("read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// A rejected movement request. No state is mutated when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("the challenge in {room} is not complete yet")]
    ChallengeIncomplete { room: RoomId, challenge: ChallengeId },

    #[error("there is no exit '{direction}' from {room}")]
    NoSuchExit { room: RoomId, direction: String },
}

/// External process or filesystem failure during setup, validation or a
/// pass-through command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvironmentError {
    #[error("could not run `{command}`: {detail}")]
    Spawn { command: String, detail: String },

    #[error("`{command}` timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },

    #[error("`{command}` failed: {detail}")]
    CommandFailed { command: String, detail: String },

    #[error("sandbox error: {0}")]
    Sandbox(String),

    #[error("filesystem error at {path}: {detail}")]
    Filesystem { path: PathBuf, detail: String },

    #[error("missing auxiliary sandbox '{0}'")]
    MissingAuxiliary(String),

    #[error("challenge code panicked: {0}")]
    Panicked(String),
}

/// A snapshot that cannot be resumed against the current room graph.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot refers to unknown room {0}")]
    UnknownRoom(RoomId),

    #[error("snapshot refers to unknown challenge {0}")]
    UnknownChallenge(ChallengeId),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}
