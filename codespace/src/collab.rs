//! Collaborator abstractions for turning a command into runnable code.
//!
//! The workspace never builds prompts or talks to a model itself. Callers plug
//! in implementations of these traits (usually backed by an LLM); tests use
//! scripted collaborators from `test_support`.

use anyhow::Result;

/// Produces code for a command.
pub trait Synthesizer {
    fn synthesize(&self, command: &str) -> Result<String>;
}

/// Decides whether code is acceptable to run for a command.
pub trait Validator {
    fn validate(&self, command: &str, code: &str) -> Result<bool>;
}

/// Produces revised code, optionally given the error text from a failed run.
pub trait Repairer {
    fn repair(&self, code: &str, command: &str, error: Option<&str>) -> Result<String>;
}

/// The three collaborators used by [`crate::workspace::Workspace::input`].
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub synthesizer: &'a dyn Synthesizer,
    pub validator: &'a dyn Validator,
    pub repairer: &'a dyn Repairer,
}

impl<'a> Collaborators<'a> {
    /// Use `synthesizer` with [`AcceptAll`] validation and [`KeepCode`] repair.
    pub fn synthesis_only(synthesizer: &'a dyn Synthesizer) -> Self {
        Self {
            synthesizer,
            validator: &AcceptAll,
            repairer: &KeepCode,
        }
    }
}

/// Validator that accepts any code.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn validate(&self, _command: &str, _code: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Repairer that returns the code unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepCode;

impl Repairer for KeepCode {
    fn repair(&self, code: &str, _command: &str, _error: Option<&str>) -> Result<String> {
        Ok(code.to_string())
    }
}

/// Synthesizer that treats the command itself as code.
///
/// Useful when the caller already has a script and only wants the retry loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandIsCode;

impl Synthesizer for CommandIsCode {
    fn synthesize(&self, command: &str) -> Result<String> {
        Ok(command.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_code_through() {
        let collab = Collaborators::synthesis_only(&CommandIsCode);
        let code = collab.synthesizer.synthesize("let a = 1;").expect("synthesize");
        assert_eq!(code, "let a = 1;");
        assert!(collab.validator.validate("cmd", &code).expect("validate"));
        let repaired = collab
            .repairer
            .repair(&code, "cmd", Some("error: boom"))
            .expect("repair");
        assert_eq!(repaired, code);
    }
}
