//! Versioned on-disk snapshot of a workspace (`environment` + `history`).
//!
//! The file is a pretty-printed JSON document checked against an embedded JSON
//! Schema on load. Writes go to a sibling temp file which is then renamed over
//! the target, so a crash mid-write leaves the previous snapshot intact.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::validator_for;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::types::{Environment, Record};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

const SNAPSHOT_SCHEMA: &str = include_str!("../../schemas/snapshot.v1.schema.json");

/// Owned snapshot as read back from disk.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub environment: Environment,
    pub history: Vec<Record>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    environment: &'a Environment,
    history: &'a [Record],
}

/// Load a snapshot from disk.
///
/// Returns `Ok(None)` when no file exists yet. Any other failure (unreadable
/// file, malformed JSON, unknown version, schema violation) is an error.
pub fn load_snapshot(path: &Path) -> Result<Option<Snapshot>> {
    if !path.exists() {
        debug!(path = %path.display(), "no snapshot on disk");
        return Ok(None);
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read snapshot {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse snapshot {}", path.display()))?;
    check_version(&value).with_context(|| format!("snapshot {}", path.display()))?;
    validate_schema(&value).with_context(|| format!("snapshot {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_value(value)
        .with_context(|| format!("deserialize snapshot {}", path.display()))?;
    debug!(
        path = %path.display(),
        variables = snapshot.environment.len(),
        records = snapshot.history.len(),
        "snapshot loaded"
    );
    Ok(Some(snapshot))
}

/// Atomically write a snapshot to disk (temp file + rename).
pub fn write_snapshot(path: &Path, environment: &Environment, history: &[Record]) -> Result<()> {
    debug!(
        path = %path.display(),
        variables = environment.len(),
        records = history.len(),
        "writing snapshot"
    );
    let snapshot = SnapshotRef {
        version: SNAPSHOT_VERSION,
        environment,
        history,
    };
    let mut buf = serde_json::to_string_pretty(&snapshot).context("serialize snapshot")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn check_version(value: &Value) -> Result<()> {
    match value.get("version").and_then(Value::as_u64) {
        Some(version) if version == u64::from(SNAPSHOT_VERSION) => Ok(()),
        Some(version) => bail!("unsupported snapshot version {version}"),
        None => bail!("missing snapshot version"),
    }
}

fn validate_schema(value: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(SNAPSHOT_SCHEMA).context("parse snapshot schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(value) {
        let messages = compiled
            .iter_errors(value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "snapshot schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("snapshot path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = temp_path(path);
    let mut file = File::create(&tmp_path)
        .with_context(|| format!("create temp snapshot {}", tmp_path.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("write temp snapshot {}", tmp_path.display()))?;
    file.sync_all()
        .with_context(|| format!("sync temp snapshot {}", tmp_path.display()))?;
    drop(file);
    fs::rename(&tmp_path, path).with_context(|| format!("replace snapshot {}", path.display()))?;
    Ok(())
}
