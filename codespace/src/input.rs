//! Generate → validate → execute loop with bounded repair attempts.

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::collab::Collaborators;
use crate::core::types::ExecutionFault;
use crate::workspace::Workspace;

/// How an `input` call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    /// The code ran and was committed.
    Executed {
        code: String,
        output: String,
        validation_attempts: u32,
        execution_attempts: u32,
    },
    /// The validator never accepted the code; nothing was executed.
    ValidationRejected { code: String, attempts: u32 },
    /// Every execution attempt faulted; the environment is unchanged.
    ExecutionFailed {
        code: String,
        attempts: u32,
        output: String,
        fault: ExecutionFault,
    },
}

impl InputOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, InputOutcome::Executed { .. })
    }

    /// The last code considered, whether or not it ran.
    pub fn code(&self) -> &str {
        match self {
            InputOutcome::Executed { code, .. }
            | InputOutcome::ValidationRejected { code, .. }
            | InputOutcome::ExecutionFailed { code, .. } => code,
        }
    }
}

/// Synthesize code for `command`, validate it, and run it against the workspace.
///
/// Validation is attempted up to `max_validation_attempts` times, repairing the
/// code between attempts without an error. Execution is attempted up to
/// `max_execution_attempts` times, repairing with the failed run's diagnostic.
/// Collaborator errors abort the loop and are returned as `Err`.
#[instrument(skip_all, fields(command = command))]
pub fn run_input(
    workspace: &mut Workspace,
    collaborators: &Collaborators<'_>,
    command: &str,
) -> Result<InputOutcome> {
    let max_validation = workspace.config().max_validation_attempts;
    let max_execution = workspace.config().max_execution_attempts;

    let mut code = collaborators
        .synthesizer
        .synthesize(command)
        .context("synthesize code")?;
    debug!(code_bytes = code.len(), "code synthesized");

    let mut validation_attempts = 0u32;
    loop {
        validation_attempts += 1;
        let accepted = collaborators
            .validator
            .validate(command, &code)
            .context("validate code")?;
        if accepted {
            debug!(attempt = validation_attempts, "code accepted");
            break;
        }
        if validation_attempts >= max_validation {
            warn!(attempts = validation_attempts, "validation rejected code");
            return Ok(InputOutcome::ValidationRejected {
                code,
                attempts: validation_attempts,
            });
        }
        debug!(attempt = validation_attempts, "code rejected; requesting repair");
        code = collaborators
            .repairer
            .repair(&code, command, None)
            .context("repair rejected code")?;
    }

    let mut execution_attempts = 0u32;
    loop {
        execution_attempts += 1;
        let outcome = workspace.run(command, &code);
        let Some(fault) = outcome.fault.clone() else {
            info!(validation_attempts, execution_attempts, "command executed");
            return Ok(InputOutcome::Executed {
                code,
                output: outcome.output,
                validation_attempts,
                execution_attempts,
            });
        };
        if execution_attempts >= max_execution {
            warn!(attempts = execution_attempts, fault = %fault, "execution attempts exhausted");
            return Ok(InputOutcome::ExecutionFailed {
                code,
                attempts: execution_attempts,
                output: outcome.output,
                fault,
            });
        }
        debug!(attempt = execution_attempts, fault = %fault, "run faulted; requesting repair");
        let diagnostic = outcome.diagnostic();
        code = collaborators
            .repairer
            .repair(&code, command, Some(&diagnostic))
            .context("repair faulted code")?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{AcceptAll, CommandIsCode, KeepCode};
    use crate::test_support::{ScriptedRepairer, ScriptedSynthesizer, ScriptedValidator};
    use serde_json::json;

    #[test]
    fn accepted_code_runs_once() {
        let mut ws = Workspace::in_memory().expect("workspace");
        let synth = ScriptedSynthesizer::new("let y = 2 + 2; print(y);");
        let collab = Collaborators::synthesis_only(&synth);

        let outcome = ws.input(&collab, "add two and two").expect("input");

        assert!(outcome.succeeded());
        assert_eq!(
            outcome,
            InputOutcome::Executed {
                code: "let y = 2 + 2; print(y);".to_string(),
                output: "4\n".to_string(),
                validation_attempts: 1,
                execution_attempts: 1,
            }
        );
        assert_eq!(ws.environment().get("y"), Some(&json!(4)));
        assert_eq!(ws.history().len(), 1);
        assert_eq!(synth.calls(), vec!["add two and two".to_string()]);
    }

    #[test]
    fn validation_gives_up_after_three_rejections_without_running() {
        let mut ws = Workspace::in_memory().expect("workspace");
        let synth = ScriptedSynthesizer::new("let y = 1;");
        let validator = ScriptedValidator::new(vec![false, false, false, true]);
        let repairer = ScriptedRepairer::new(vec!["let y = 2;", "let y = 3;"]);
        let collab = Collaborators {
            synthesizer: &synth,
            validator: &validator,
            repairer: &repairer,
        };

        let outcome = ws.input(&collab, "cmd").expect("input");

        assert_eq!(
            outcome,
            InputOutcome::ValidationRejected {
                code: "let y = 3;".to_string(),
                attempts: 3,
            }
        );
        assert_eq!(validator.calls(), 3);
        assert_eq!(repairer.errors_seen(), vec![None, None]);
        assert!(ws.history().is_empty());
        assert!(ws.environment().is_empty());
    }

    #[test]
    fn repaired_code_is_validated_again() {
        let mut ws = Workspace::in_memory().expect("workspace");
        let synth = ScriptedSynthesizer::new("bad");
        let validator = ScriptedValidator::new(vec![false, true]);
        let repairer = ScriptedRepairer::new(vec!["let fixed = true;"]);
        let collab = Collaborators {
            synthesizer: &synth,
            validator: &validator,
            repairer: &repairer,
        };

        let outcome = ws.input(&collab, "cmd").expect("input");

        assert!(outcome.succeeded());
        assert_eq!(outcome.code(), "let fixed = true;");
        assert_eq!(
            validator.seen_code(),
            vec!["bad".to_string(), "let fixed = true;".to_string()]
        );
        assert_eq!(ws.environment().get("fixed"), Some(&json!(true)));
    }

    #[test]
    fn execution_faults_are_repaired_with_diagnostic() {
        let mut ws = Workspace::in_memory().expect("workspace");
        ws.set("x", json!(10));
        let synth = ScriptedSynthesizer::new("print(\"trying\"); x = x / 0;");
        let repairer = ScriptedRepairer::new(vec!["x = x / 2;"]);
        let collab = Collaborators {
            synthesizer: &synth,
            validator: &AcceptAll,
            repairer: &repairer,
        };

        let outcome = ws.input(&collab, "halve x").expect("input");

        assert!(outcome.succeeded());
        assert_eq!(ws.environment().get("x"), Some(&json!(5)));
        let errors = repairer.errors_seen();
        assert_eq!(errors.len(), 1);
        let error = errors[0].as_deref().expect("error text");
        assert!(error.starts_with("trying\nerror: "), "{error}");
        // Set + one committed command; the faulted attempt left no record.
        assert_eq!(ws.history().len(), 2);
    }

    #[test]
    fn execution_gives_up_after_three_faults() {
        let mut ws = Workspace::in_memory().expect("workspace");
        ws.set("x", json!(10));
        let history_before = ws.history().len();
        let collab = Collaborators {
            synthesizer: &CommandIsCode,
            validator: &AcceptAll,
            repairer: &KeepCode,
        };

        let outcome = ws.input(&collab, "x = 1/0;").expect("input");

        match outcome {
            InputOutcome::ExecutionFailed {
                attempts, output, ..
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(output, "");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(ws.environment().get("x"), Some(&json!(10)));
        assert_eq!(ws.history().len(), history_before);
    }

    #[test]
    fn collaborator_errors_propagate() {
        let mut ws = Workspace::in_memory().expect("workspace");
        let synth = ScriptedSynthesizer::failing("model unavailable");
        let collab = Collaborators::synthesis_only(&synth);

        let err = ws.input(&collab, "cmd").unwrap_err();

        assert!(format!("{err:#}").contains("model unavailable"));
        assert!(ws.history().is_empty());
    }

    #[test]
    fn attempt_caps_follow_config() {
        let config = crate::io::config::WorkspaceConfig {
            max_validation_attempts: 1,
            ..crate::io::config::WorkspaceConfig::default()
        };
        let mut ws = Workspace::open(config).expect("workspace");
        let synth = ScriptedSynthesizer::new("let a = 1;");
        let validator = ScriptedValidator::new(vec![false]);
        let collab = Collaborators {
            synthesizer: &synth,
            validator: &validator,
            repairer: &KeepCode,
        };

        let outcome = ws.input(&collab, "cmd").expect("input");

        assert!(!outcome.succeeded());
        assert_eq!(validator.calls(), 1);
    }
}
