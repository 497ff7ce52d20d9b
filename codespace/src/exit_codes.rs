//! Stable exit codes for the `codespace` CLI.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid arguments, config, or snapshot, or any other error.
pub const INVALID: i32 = 1;
/// `codespace exec` ran code that faulted; the workspace is unchanged.
pub const FAULT: i32 = 2;
/// `codespace get` named a variable that does not exist.
pub const NOT_FOUND: i32 = 3;
