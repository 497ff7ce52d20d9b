//! The workspace facade: execution, variable access, and the audit transcript.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::collab::Collaborators;
use crate::core::transcript::render_history;
use crate::core::types::{Environment, Record, RunOutcome};
use crate::engine::ScriptEngine;
use crate::input::{InputOutcome, run_input};
use crate::io::config::WorkspaceConfig;
use crate::store::{Persistence, VariableStore};

/// A persistent, checkpointed environment that code snippets run against.
///
/// All mutating operations take `&mut self`, so runs, reads, and writes are
/// serialized by the borrow checker; wrap the workspace in a `Mutex` to share it
/// across threads.
pub struct Workspace {
    config: WorkspaceConfig,
    store: VariableStore,
    engine: ScriptEngine,
}

impl Workspace {
    /// Open a workspace, restoring the snapshot at `config.storage_path` if one
    /// exists, or seeding a fresh environment with `config.init_code`.
    ///
    /// Fails if the config is invalid, the snapshot is corrupt, or the
    /// initialization snippet faults.
    pub fn open(config: WorkspaceConfig) -> Result<Self> {
        config.validate()?;
        let mut store = VariableStore::new(config.storage_path.clone());
        let mut engine = ScriptEngine::new(&config);

        if store.load().context("load workspace snapshot")? {
            engine.learn_functions(&config.init_code);
            for record in store.history() {
                if let Record::Command { code, .. } = record {
                    engine.learn_functions(code);
                }
            }
            debug!(functions = engine.function_names().len(), "function library rebuilt");
        } else {
            let outcome = engine.execute(&mut store, &config.init_code);
            if let Some(fault) = outcome.fault {
                bail!("initialization snippet failed: {fault}");
            }
            store.save();
            info!(variables = store.environment().len(), "workspace initialized");
        }

        Ok(Self {
            config,
            store,
            engine,
        })
    }

    /// Open a memory-only workspace with default settings.
    pub fn in_memory() -> Result<Self> {
        Self::open(WorkspaceConfig::default())
    }

    /// Run `code` for `command` with all-or-nothing semantics.
    ///
    /// A successful run appends a `Command` record and persists the workspace.
    /// A fault leaves both the environment and the history unchanged.
    #[instrument(skip_all, fields(command = command))]
    pub fn run(&mut self, command: &str, code: &str) -> RunOutcome {
        let outcome = self.engine.execute(&mut self.store, code);
        if outcome.succeeded() {
            self.store.append(Record::Command {
                command: command.to_string(),
                code: code.to_string(),
                log: outcome.output.clone(),
            });
            self.store.save();
            info!(records = self.store.history().len(), "command committed");
        }
        outcome
    }

    /// Turn `command` into code via the collaborators and run it, with bounded retries.
    pub fn input(
        &mut self,
        collaborators: &Collaborators<'_>,
        command: &str,
    ) -> Result<InputOutcome> {
        run_input(self, collaborators, command)
    }

    /// Read a variable.
    ///
    /// A hit appends a `Get` record and persists the workspace. A miss returns
    /// `None` and leaves the history unchanged; a stored `null` is `Some(Value::Null)`.
    pub fn get(&mut self, name: &str) -> Option<Value> {
        let Some(value) = self.store.lookup(name).cloned() else {
            warn!(name, "variable not found");
            return None;
        };
        self.store.append(Record::Get {
            name: name.to_string(),
        });
        self.store.save();
        Some(value)
    }

    /// Write a variable unconditionally, append a `Set` record, and persist.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.store.insert(name.clone(), value.clone());
        self.store.append(Record::Set { name, value });
        self.store.save();
    }

    /// Human-readable transcript of the history.
    pub fn render_history(&self) -> String {
        render_history(self.store.history())
    }

    pub fn environment(&self) -> &Environment {
        self.store.environment()
    }

    pub fn history(&self) -> &[Record] {
        self.store.history()
    }

    pub fn persistence(&self) -> Persistence {
        self.store.persistence()
    }

    pub fn storage_path(&self) -> Option<&Path> {
        self.store.storage_path()
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// Script functions available to snippets.
    pub fn functions(&self) -> Vec<String> {
        self.engine.function_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_then_get_appends_two_records() {
        let mut ws = Workspace::in_memory().expect("workspace");
        ws.set("x", json!(10));

        assert_eq!(ws.get("x"), Some(json!(10)));
        assert_eq!(
            ws.history(),
            &[
                Record::Set {
                    name: "x".to_string(),
                    value: json!(10),
                },
                Record::Get {
                    name: "x".to_string(),
                },
            ]
        );
    }

    #[test]
    fn missing_variable_is_distinct_from_null() {
        let mut ws = Workspace::in_memory().expect("workspace");
        ws.set("empty", Value::Null);
        let before = ws.history().len();

        assert_eq!(ws.get("absent"), None);
        assert_eq!(ws.history().len(), before);
        assert_eq!(ws.get("empty"), Some(Value::Null));
        assert_eq!(ws.history().len(), before + 1);
    }

    #[test]
    fn failed_run_leaves_environment_and_history_untouched() {
        let mut ws = Workspace::in_memory().expect("workspace");
        ws.set("x", json!(10));
        let env_before = ws.environment().clone();
        let history_before = ws.history().to_vec();

        let outcome = ws.run("cmd", "x = 1/0;");

        assert!(!outcome.succeeded());
        assert_eq!(outcome.output, "");
        assert_eq!(ws.environment(), &env_before);
        assert_eq!(ws.history(), history_before.as_slice());
    }

    #[test]
    fn successful_run_appends_command_record() {
        let mut ws = Workspace::in_memory().expect("workspace");

        let outcome = ws.run("cmd", "let y = 2 + 2;");

        assert!(outcome.succeeded());
        assert_eq!(outcome.output, "");
        assert_eq!(ws.environment().get("y"), Some(&json!(4)));
        assert_eq!(
            ws.history(),
            &[Record::Command {
                command: "cmd".to_string(),
                code: "let y = 2 + 2;".to_string(),
                log: String::new(),
            }]
        );
    }

    #[test]
    fn init_code_seeds_fresh_workspace_without_a_record() {
        let config = WorkspaceConfig {
            init_code: "let greeting = \"hello\"; fn shout(s) { s.to_upper() }".to_string(),
            ..WorkspaceConfig::default()
        };
        let ws = Workspace::open(config).expect("workspace");

        assert_eq!(ws.environment().get("greeting"), Some(&json!("hello")));
        assert!(ws.history().is_empty());
        assert_eq!(ws.functions(), vec!["shout".to_string()]);
    }

    #[test]
    fn faulting_init_code_aborts_open() {
        let config = WorkspaceConfig {
            init_code: "throw \"broken\";".to_string(),
            ..WorkspaceConfig::default()
        };
        let err = Workspace::open(config).err().expect("open should fail");
        assert!(err.to_string().contains("initialization snippet failed"));
    }

    #[test]
    fn unrelated_run_preserves_wide_integers() {
        let mut ws = Workspace::in_memory().expect("workspace");
        ws.set("big", json!(u64::MAX));

        let outcome = ws.run("cmd", "let y = 1;");

        assert!(outcome.succeeded(), "{:?}", outcome.fault);
        assert_eq!(ws.environment().get("big"), Some(&json!(u64::MAX)));
        assert_eq!(ws.environment().get("y"), Some(&json!(1)));
    }

    #[test]
    fn render_history_lists_operations_in_order() {
        let mut ws = Workspace::in_memory().expect("workspace");
        ws.set("x", json!(1));
        ws.run("bump", "x += 1;");
        ws.get("x");

        assert_eq!(
            ws.render_history(),
            "# set:\nx=1\n\n# command: bump\nx += 1;\n\n# get: x"
        );
    }
}
