//! Session snapshots on disk, as pretty JSON.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::domain::SessionSnapshot;

pub fn save_snapshot(path: &Path, snapshot: &SessionSnapshot) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(snapshot).context("serialize snapshot")?;
    buf.push('\n');
    write_atomic(path, &buf)?;
    info!(path = %path.display(), room = %snapshot.current_room_id, "session saved");
    Ok(())
}

/// Load a snapshot; `Ok(None)` if there is no save file.
pub fn load_snapshot(path: &Path) -> Result<Option<SessionSnapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let snapshot =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(snapshot))
}

/// Remove the save file, if any. Used once a game is won.
pub fn clear_snapshot(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("remove {}", path.display()))?;
    }
    Ok(())
}

pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file for {}", path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::domain::{ChallengeId, RoomId};

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            player_name: "ada".into(),
            current_room_id: RoomId::from("vault"),
            completed_room_ids: vec![RoomId::from("hall")],
            completed_challenge_ids: vec![ChallengeId::from("init")],
            move_count: 1,
            saved_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).single().expect("time"),
            game_started: Utc.with_ymd_and_hms(2026, 1, 2, 3, 0, 0).single().expect("time"),
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested/save.json");
        save_snapshot(&path, &snapshot()).expect("save");
        assert_eq!(load_snapshot(&path).expect("load"), Some(snapshot()));
    }

    #[test]
    fn missing_save_is_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert_eq!(load_snapshot(&temp.path().join("none.json")).expect("load"), None);
    }

    #[test]
    fn clear_removes_file_and_tolerates_absence() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("save.json");
        save_snapshot(&path, &snapshot()).expect("save");
        clear_snapshot(&path).expect("clear");
        assert!(!path.exists());
        clear_snapshot(&path).expect("clear again");
    }

    #[test]
    fn corrupt_save_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("save.json");
        fs::write(&path, "{ not json").expect("write");
        assert!(load_snapshot(&path).is_err());
    }
}
