//! Engine configuration, read from a TOML file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Engine configuration (TOML). Missing fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Wall-clock limit for any single external command.
    pub command_timeout_secs: u64,

    /// Bytes of stdout and of stderr kept per command.
    pub output_limit_bytes: usize,

    /// Prefix for sandbox directory names.
    pub sandbox_prefix: String,

    /// Programs whose command lines are forwarded to the sandbox.
    pub passthrough_programs: Vec<String>,

    pub git_author_name: String,
    pub git_author_email: String,

    /// Directory holding `room_*.toml` files.
    pub rooms_dir: PathBuf,

    pub save_path: PathBuf,

    /// Where tracing output goes. Nothing is logged when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 30,
            output_limit_bytes: 64 * 1024,
            sandbox_prefix: "git-raid-".to_string(),
            passthrough_programs: vec!["git".to_string()],
            git_author_name: "Raider".to_string(),
            git_author_email: "raider@git-raid.invalid".to_string(),
            rooms_dir: PathBuf::from("rooms"),
            save_path: PathBuf::from(".git-raid/save.json"),
            log_path: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.sandbox_prefix.trim().is_empty() {
            return Err(anyhow!("sandbox_prefix must not be empty"));
        }
        if self.passthrough_programs.is_empty()
            || self.passthrough_programs.iter().any(|p| p.trim().is_empty())
        {
            return Err(anyhow!("passthrough_programs must list at least one program"));
        }
        Ok(())
    }
}

/// Load config from a TOML file, or the defaults if the file is missing.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Write config atomically (temp file + rename).
pub fn write_config(path: &Path, cfg: &EngineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    crate::save::write_atomic(path, &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = EngineConfig {
            command_timeout_secs: 5,
            passthrough_programs: vec!["git".into(), "ls".into()],
            log_path: Some(PathBuf::from("raid.log")),
            ..EngineConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        assert_eq!(load_config(&path).expect("load"), cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "command_timeout_secs = 3\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.command_timeout_secs, 3);
        assert_eq!(cfg.sandbox_prefix, "git-raid-");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "command_timeout_secs = 0\n").expect("write");
        assert!(load_config(&path).is_err());
    }
}
