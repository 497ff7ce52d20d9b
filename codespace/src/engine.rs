//! Script execution against the variable store.
//!
//! Snippets are Rhai scripts. Each run gets a fresh scope seeded from the store's
//! environment; top-level variables are written back only when the snippet
//! completes and every value converts back to JSON. Any fault restores the
//! environment captured before the run.
//!
//! Only new or changed variables are written back, so values the snippet never
//! touches keep their exact stored JSON even when Rhai cannot represent them
//! (integers above `i64::MAX` load as floats). The environment is plain JSON:
//! `const` bindings are committed as ordinary variables and can be reassigned
//! by later runs, and Rhai characters are stored as one-character strings.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use rhai::serde::{from_dynamic, to_dynamic};
use rhai::{AST, Dynamic, Engine, EvalAltResult, Scope};
use serde_json::Value;
use tracing::{debug, warn};

use crate::capture::OutputSink;
use crate::core::budget::{deadline_after, remaining_budget};
use crate::core::types::{Environment, ExecutionFault, RunOutcome};
use crate::io::config::WorkspaceConfig;
use crate::store::VariableStore;

/// How often (in engine operations) the wall-clock deadline is checked.
const DEADLINE_CHECK_INTERVAL: u64 = 1024;

type SharedDeadline = Arc<Mutex<Option<Instant>>>;

/// Rhai engine plus the state that outlives a single run.
pub struct ScriptEngine {
    engine: Engine,
    /// Script functions defined by committed snippets.
    functions: AST,
    sink: OutputSink,
    deadline: SharedDeadline,
    timeout_ms: u64,
    output_limit_bytes: usize,
}

impl ScriptEngine {
    pub fn new(config: &WorkspaceConfig) -> Self {
        let sink = OutputSink::default();
        let deadline: SharedDeadline = Arc::new(Mutex::new(None));
        let mut engine = Engine::new();
        engine.set_max_operations(config.max_operations);

        let print_sink = sink.clone();
        engine.on_print(move |text| print_sink.write_line(text));
        let debug_sink = sink.clone();
        engine.on_debug(move |text, _source, pos| {
            if pos.is_none() {
                debug_sink.write_line(&format!("[debug] {text}"));
            } else {
                debug_sink.write_line(&format!("[debug] {pos}: {text}"));
            }
        });

        let progress_deadline = Arc::clone(&deadline);
        engine.on_progress(move |ops| {
            if ops % DEADLINE_CHECK_INTERVAL != 0 {
                return None;
            }
            let deadline = *progress_deadline
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match deadline {
                Some(at) if remaining_budget(at).is_err() => Some(Dynamic::from("timeout")),
                _ => None,
            }
        });

        register_base_facilities(&mut engine);

        Self {
            engine,
            functions: AST::default(),
            sink,
            deadline,
            timeout_ms: config.execution_timeout_ms,
            output_limit_bytes: config.output_limit_bytes,
        }
    }

    /// Run `code` against the store's environment with all-or-nothing semantics.
    ///
    /// On success every top-level variable of the run is committed to the store.
    /// On fault the store's environment is restored to its pre-run value. The
    /// store's history is never touched here.
    pub fn execute(&mut self, store: &mut VariableStore, code: &str) -> RunOutcome {
        let token = store.snapshot();
        let capture = self.sink.capture(self.output_limit_bytes);

        let result = self.evaluate(store.environment(), code);
        let result = result.and_then(|(ast, scope)| {
            commit_scope(store, &scope)?;
            Ok(ast)
        });

        let output = capture.finish();
        match result {
            Ok(ast) => {
                self.functions = self.functions.merge(&ast.clone_functions_only());
                debug!(
                    variables = store.environment().len(),
                    output_bytes = output.len(),
                    "snippet committed"
                );
                RunOutcome {
                    output,
                    fault: None,
                }
            }
            Err(fault) => {
                store.restore(token);
                warn!(fault = %fault, "snippet faulted; environment rolled back");
                RunOutcome {
                    output,
                    fault: Some(fault),
                }
            }
        }
    }

    /// Make script functions defined in `code` callable without running it.
    ///
    /// Used to rebuild the function library from a restored history; code that
    /// no longer compiles is skipped.
    pub fn learn_functions(&mut self, code: &str) {
        match self.engine.compile(code) {
            Ok(ast) => self.functions = self.functions.merge(&ast.clone_functions_only()),
            Err(err) => debug!(error = %err, "skipping uncompilable code while rebuilding functions"),
        }
    }

    /// Names of the script functions currently defined.
    pub fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .functions
            .iter_functions()
            .map(|func| func.name.to_string())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn evaluate(
        &self,
        environment: &Environment,
        code: &str,
    ) -> Result<(AST, Scope<'static>), ExecutionFault> {
        let ast = self
            .engine
            .compile(code)
            .map_err(|err| fault_from(&EvalAltResult::from(err)))?;
        let program = self.functions.merge(&ast);
        let mut scope = scope_from(environment)?;

        self.set_deadline(deadline_after(self.timeout_ms));
        let result = self.engine.run_ast_with_scope(&mut scope, &program);
        self.set_deadline(None);

        result.map_err(|err| fault_from(&err))?;
        Ok((ast, scope))
    }

    fn set_deadline(&self, deadline: Option<Instant>) {
        *self.deadline.lock().unwrap_or_else(PoisonError::into_inner) = deadline;
    }
}

fn register_base_facilities(engine: &mut Engine) {
    engine.register_fn("env_var", |name: &str| -> Dynamic {
        std::env::var(name).map(Dynamic::from).unwrap_or(Dynamic::UNIT)
    });
    engine.register_fn("cwd", || -> String {
        std::env::current_dir()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default()
    });
}

fn scope_from(environment: &Environment) -> Result<Scope<'static>, ExecutionFault> {
    let mut scope = Scope::new();
    for (name, value) in environment {
        let dynamic = to_dynamic(value).map_err(|err| {
            ExecutionFault::new(format!("variable `{name}` cannot be loaded: {err}"))
        })?;
        scope.push_dynamic(name.clone(), dynamic);
    }
    Ok(scope)
}

/// Write new or changed top-level scope variables into the store. Later
/// bindings of the same name (shadowing) win.
fn commit_scope(store: &mut VariableStore, scope: &Scope<'_>) -> Result<(), ExecutionFault> {
    let mut bindings: BTreeMap<String, Value> = BTreeMap::new();
    for (name, _is_constant, dynamic) in scope.iter() {
        let value: Value = from_dynamic(&dynamic).map_err(|err| {
            ExecutionFault::new(format!(
                "variable `{name}` holds a {} that cannot be persisted: {err}",
                dynamic.type_name()
            ))
        })?;
        bindings.insert(name.to_string(), value);
    }

    for (name, value) in bindings {
        if let Some(stored) = store.lookup(&name) {
            if unchanged(stored, &value) {
                continue;
            }
        }
        store.insert(name, value);
    }
    Ok(())
}

/// Whether `value` is what `stored` becomes after a trip through the engine.
fn unchanged(stored: &Value, value: &Value) -> bool {
    if stored == value {
        return true;
    }
    to_dynamic(stored)
        .and_then(|dynamic| from_dynamic::<Value>(&dynamic))
        .is_ok_and(|reloaded| &reloaded == value)
}

fn fault_from(err: &EvalAltResult) -> ExecutionFault {
    let pos = err.position();
    let message = match err {
        EvalAltResult::ErrorTerminated(..) => "execution timed out".to_string(),
        _ => {
            let full = err.to_string();
            let suffix = format!(" ({pos})");
            full.strip_suffix(&suffix).unwrap_or(&full).to_string()
        }
    };
    ExecutionFault {
        message,
        line: pos.line(),
        position: pos.position(),
    }
}
