use std::path::Path;

use tracing::{debug, info, instrument};

use super::bespoke;
use super::types::{ChallengeDef, RepositoryDef, RoomFile};
use crate::challenge::{Challenge, QuizChallenge, RepositoryChallenge};
use crate::domain::{Game, Player, Room};
use crate::error::ConfigurationError;

pub fn load_room_file(path: &Path) -> Result<RoomFile, ConfigurationError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigurationError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load every `room_*.toml` in `dir`, in filename order.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn load_rooms(dir: &Path) -> Result<Vec<Room>, ConfigurationError> {
    let io_err = |source| ConfigurationError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .map_err(io_err)?
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy();
            name.starts_with("room_") && name.ends_with(".toml")
        })
        .collect();

    // room_01, room_02, ... in filename order
    entries.sort_by_key(|e| e.file_name());

    let mut rooms = Vec::with_capacity(entries.len());
    for entry in entries {
        let path = entry.path();
        debug!(path = %path.display(), "loading room");
        rooms.push(into_room(load_room_file(&path)?)?);
    }
    if rooms.is_empty() {
        return Err(ConfigurationError::NoRooms(dir.to_path_buf()));
    }
    info!(count = rooms.len(), "rooms loaded");
    Ok(rooms)
}

/// Load the rooms in `dir` and start a new game for `player`.
pub fn load_game(dir: &Path, player: Player) -> Result<Game, ConfigurationError> {
    Game::new(player, load_rooms(dir)?)
}

/// Convert a parsed room file into a domain room.
pub fn into_room(file: RoomFile) -> Result<Room, ConfigurationError> {
    let meta = file.room;
    let mut room = Room::new(meta.id.as_str(), meta.name)
        .with_description(meta.description)
        .with_sandbox_policy(meta.sandbox);
    if meta.start {
        room = room.start();
    }
    if meta.end {
        room = room.end();
    }
    for name in meta.auxiliary_sandboxes {
        room = room.with_auxiliary_sandbox(name);
    }
    for (direction, target) in &file.exits {
        room = room.with_exit(direction, target.as_str());
    }

    let challenge = match file.challenge {
        None => return Ok(room),
        Some(ChallengeDef::Quiz(def)) => {
            let mut quiz = QuizChallenge::new(def.question, def.options, def.correct);
            if let Some(hint) = def.hint {
                quiz = quiz.with_hint(hint);
            }
            Challenge::quiz(def.id.as_str(), def.description, quiz)
        }
        Some(ChallengeDef::Scenario(def)) => {
            let (id, description) = (def.id.clone(), def.description.clone());
            Challenge::scenario(id.as_str(), description, repository(&meta.id, def)?)
        }
        Some(ChallengeDef::Repository(def)) => {
            let (id, description) = (def.id.clone(), def.description.clone());
            Challenge::repository(id.as_str(), description, repository(&meta.id, def)?)
        }
    };
    Ok(room.with_challenge(challenge))
}

fn repository(
    room_id: &str,
    def: RepositoryDef,
) -> Result<RepositoryChallenge, ConfigurationError> {
    let mut repo = RepositoryChallenge::new()
        .with_rules(def.rules)
        .with_setup_steps(def.setup);
    if let Some(hint) = def.hint {
        repo = repo.with_hint(hint);
    }
    if let Some(success) = def.success {
        repo = repo.with_success_message(success);
    }
    if let Some(name) = def.custom {
        let Some(custom) = bespoke::lookup(&name) else {
            return Err(ConfigurationError::UnknownCustom {
                room: room_id.into(),
                name,
            });
        };
        repo = repo.with_callbacks(custom.setup, custom.validate);
    }
    if !repo.has_criteria() {
        return Err(ConfigurationError::EmptyChallenge(def.id.as_str().into()));
    }
    Ok(repo)
}
