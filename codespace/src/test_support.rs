//! Test-only helpers: scripted collaborators and scratch workspaces.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::collab::{Repairer, Synthesizer, Validator};
use crate::io::config::WorkspaceConfig;
use crate::workspace::Workspace;

/// Synthesizer that returns fixed code (or a fixed error) and records commands.
pub struct ScriptedSynthesizer {
    result: std::result::Result<String, String>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedSynthesizer {
    pub fn new(code: &str) -> Self {
        Self {
            result: Ok(code.to_string()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl Synthesizer for ScriptedSynthesizer {
    fn synthesize(&self, command: &str) -> Result<String> {
        self.calls.borrow_mut().push(command.to_string());
        self.result.clone().map_err(|message| anyhow!(message))
    }
}

/// Validator that replays a fixed sequence of verdicts.
pub struct ScriptedValidator {
    verdicts: RefCell<VecDeque<bool>>,
    calls: Cell<u32>,
    seen_code: RefCell<Vec<String>>,
}

impl ScriptedValidator {
    pub fn new(verdicts: Vec<bool>) -> Self {
        Self {
            verdicts: RefCell::new(verdicts.into()),
            calls: Cell::new(0),
            seen_code: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.get()
    }

    pub fn seen_code(&self) -> Vec<String> {
        self.seen_code.borrow().clone()
    }
}

impl Validator for ScriptedValidator {
    fn validate(&self, _command: &str, code: &str) -> Result<bool> {
        self.calls.set(self.calls.get() + 1);
        self.seen_code.borrow_mut().push(code.to_string());
        self.verdicts
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted validator has no verdicts left"))
    }
}

/// Repairer that replays a fixed sequence of fixes and records the errors it was given.
pub struct ScriptedRepairer {
    fixes: RefCell<VecDeque<String>>,
    errors_seen: RefCell<Vec<Option<String>>>,
}

impl ScriptedRepairer {
    pub fn new(fixes: Vec<&str>) -> Self {
        Self {
            fixes: RefCell::new(fixes.into_iter().map(str::to_string).collect()),
            errors_seen: RefCell::new(Vec::new()),
        }
    }

    pub fn errors_seen(&self) -> Vec<Option<String>> {
        self.errors_seen.borrow().clone()
    }
}

impl Repairer for ScriptedRepairer {
    fn repair(&self, _code: &str, _command: &str, error: Option<&str>) -> Result<String> {
        self.errors_seen.borrow_mut().push(error.map(str::to_string));
        self.fixes
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted repairer has no fixes left"))
    }
}

/// Scratch directory holding a workspace snapshot path.
pub struct TestStorage {
    temp: TempDir,
    snapshot_path: PathBuf,
}

impl TestStorage {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let snapshot_path = temp.path().join("state").join("workspace.json");
        Ok(Self {
            temp,
            snapshot_path,
        })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn config(&self) -> WorkspaceConfig {
        WorkspaceConfig::with_storage(&self.snapshot_path)
    }

    /// Open (or reopen) a workspace persisted in this directory.
    pub fn open(&self) -> Result<Workspace> {
        Workspace::open(self.config())
    }
}
