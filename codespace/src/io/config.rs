//! Workspace configuration stored as TOML (e.g. `codespace.toml`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Attempts allowed for each stage of the retry loop unless configured otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Workspace configuration (TOML).
///
/// Missing fields fall back to [`WorkspaceConfig::default`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Snapshot location. `None` keeps the workspace in memory only.
    pub storage_path: Option<PathBuf>,

    /// Validation calls allowed before `input` gives up.
    pub max_validation_attempts: u32,

    /// Executions allowed before `input` gives up.
    pub max_execution_attempts: u32,

    /// Engine operation budget per snippet (0 = unlimited).
    pub max_operations: u64,

    /// Wall-clock budget per snippet in milliseconds (0 = unlimited).
    pub execution_timeout_ms: u64,

    /// Truncate captured snippet output beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Snippet executed once when a workspace starts without a snapshot.
    pub init_code: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            storage_path: None,
            max_validation_attempts: DEFAULT_MAX_ATTEMPTS,
            max_execution_attempts: DEFAULT_MAX_ATTEMPTS,
            max_operations: 1_000_000,
            execution_timeout_ms: 30_000,
            output_limit_bytes: 100_000,
            init_code: String::new(),
        }
    }
}

impl WorkspaceConfig {
    /// Default configuration persisting to `path`.
    pub fn with_storage(path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_validation_attempts == 0 {
            return Err(anyhow!("max_validation_attempts must be > 0"));
        }
        if self.max_execution_attempts == 0 {
            return Err(anyhow!("max_execution_attempts must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self
            .storage_path
            .as_ref()
            .is_some_and(|path| path.as_os_str().is_empty())
        {
            return Err(anyhow!("storage_path must not be empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `WorkspaceConfig::default()`.
pub fn load_config(path: &Path) -> Result<WorkspaceConfig> {
    if !path.exists() {
        let cfg = WorkspaceConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: WorkspaceConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &WorkspaceConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, WorkspaceConfig::default());
        assert_eq!(cfg.max_validation_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(cfg.max_execution_attempts, DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("codespace.toml");
        let cfg = WorkspaceConfig {
            init_code: "let ready = true;".to_string(),
            ..WorkspaceConfig::with_storage(temp.path().join("workspace.json"))
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("codespace.toml");
        fs::write(&path, "max_execution_attempts = 5\n").expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_execution_attempts, 5);
        assert_eq!(cfg.max_validation_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(cfg.storage_path.is_none());
    }

    #[test]
    fn zero_attempts_are_rejected() {
        let cfg = WorkspaceConfig {
            max_validation_attempts: 0,
            ..WorkspaceConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("max_validation_attempts"));
    }
}
