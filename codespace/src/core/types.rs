//! Shared types for the workspace core.
//!
//! These types define the contract between the store, the engine, and the
//! persisted snapshot. They hold no I/O handles and compare by value.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Live variable scope that snippets execute against.
pub type Environment = BTreeMap<String, Value>;

/// One entry in the execution log.
///
/// Records are never edited after they are appended; the history order is the
/// order in which operations completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Record {
    /// Synthesized code that ran to completion.
    Command {
        command: String,
        code: String,
        log: String,
    },
    /// A variable was read through the access API.
    Get { name: String },
    /// A variable was written through the access API.
    Set { name: String, value: Value },
}

impl Record {
    pub fn kind(&self) -> &'static str {
        match self {
            Record::Command { .. } => "command",
            Record::Get { .. } => "get",
            Record::Set { .. } => "set",
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Set { name, value } => write!(f, "# set:\n{name}={value}"),
            Record::Get { name } => write!(f, "# get: {name}"),
            Record::Command { command, code, .. } => {
                write!(f, "# command: {command}\n{}", code.trim_end())
            }
        }
    }
}

/// A runtime fault raised by a snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionFault {
    pub message: String,
    /// 1-based source line, when the engine reported one.
    pub line: Option<usize>,
    /// 1-based column, when the engine reported one.
    pub position: Option<usize>,
}

impl ExecutionFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            position: None,
        }
    }
}

impl fmt::Display for ExecutionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.position) {
            (Some(line), Some(pos)) => write!(f, "{} (line {line}, position {pos})", self.message),
            (Some(line), None) => write!(f, "{} (line {line})", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// Result of running one snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Everything the snippet printed before it finished or faulted.
    pub output: String,
    /// `Some` when the snippet faulted and the environment was rolled back.
    pub fault: Option<ExecutionFault>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.fault.is_none()
    }

    /// Error text suitable for a repair request: captured output, then the fault.
    pub fn diagnostic(&self) -> String {
        let mut buf = self.output.clone();
        if let Some(fault) = &self.fault {
            if !buf.is_empty() && !buf.ends_with('\n') {
                buf.push('\n');
            }
            buf.push_str(&format!("error: {fault}"));
        }
        buf
    }
}
