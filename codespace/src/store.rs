//! Variable store: the live environment, its execution log, and their persistence.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::types::{Environment, Record};
use crate::io::snapshot::{load_snapshot, write_snapshot};

/// Whether store mutations currently reach stable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// Every mutation is written to the snapshot file.
    Durable,
    /// No storage path configured.
    MemoryOnly,
    /// A storage path is configured but the last write failed.
    Degraded,
}

/// Captured copy of the environment, used to roll back a failed execution.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentToken(Environment);

/// Environment + history, made durable after every mutation when a path is set.
#[derive(Debug)]
pub struct VariableStore {
    environment: Environment,
    history: Vec<Record>,
    storage_path: Option<PathBuf>,
    persistence: Persistence,
}

impl VariableStore {
    pub fn new(storage_path: Option<PathBuf>) -> Self {
        let persistence = match &storage_path {
            Some(_) => Persistence::Durable,
            None => {
                warn!("no storage path configured; workspace state will not be persisted");
                Persistence::MemoryOnly
            }
        };
        Self {
            environment: Environment::new(),
            history: Vec::new(),
            storage_path,
            persistence,
        }
    }

    /// Replace in-memory state with the snapshot at the storage path.
    ///
    /// Returns `Ok(false)` when there is no path or no snapshot yet. A snapshot
    /// that exists but cannot be read is an error.
    pub fn load(&mut self) -> Result<bool> {
        let Some(path) = &self.storage_path else {
            return Ok(false);
        };
        let Some(snapshot) = load_snapshot(path)? else {
            return Ok(false);
        };
        self.environment = snapshot.environment;
        self.history = snapshot.history;
        info!(
            path = %path.display(),
            variables = self.environment.len(),
            records = self.history.len(),
            "workspace restored from snapshot"
        );
        Ok(true)
    }

    /// Persist the current state. No-op without a storage path.
    ///
    /// Write failures leave the previous snapshot in place and degrade the store
    /// to in-memory operation; the first failure is logged as a warning.
    pub fn save(&mut self) {
        let Some(path) = &self.storage_path else {
            return;
        };
        match write_snapshot(path, &self.environment, &self.history) {
            Ok(()) => {
                if self.persistence == Persistence::Degraded {
                    info!(path = %path.display(), "snapshot writes recovered");
                }
                self.persistence = Persistence::Durable;
            }
            Err(err) => {
                if self.persistence != Persistence::Degraded {
                    warn!(
                        path = %path.display(),
                        error = %format!("{err:#}"),
                        "snapshot write failed; continuing in memory only"
                    );
                } else {
                    debug!(error = %format!("{err:#}"), "snapshot write still failing");
                }
                self.persistence = Persistence::Degraded;
            }
        }
    }

    /// Capture the environment so it can be restored exactly.
    pub fn snapshot(&self) -> EnvironmentToken {
        EnvironmentToken(self.environment.clone())
    }

    /// Replace the environment with a previously captured copy.
    pub fn restore(&mut self, token: EnvironmentToken) {
        self.environment = token.0;
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn history(&self) -> &[Record] {
        &self.history
    }

    pub fn storage_path(&self) -> Option<&Path> {
        self.storage_path.as_deref()
    }

    pub fn persistence(&self) -> Persistence {
        self.persistence
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.environment.get(name)
    }

    pub(crate) fn insert(&mut self, name: String, value: Value) {
        self.environment.insert(name, value);
    }

    pub(crate) fn append(&mut self, record: Record) {
        debug!(kind = record.kind(), index = self.history.len(), "appending record");
        self.history.push(record);
    }
}
