//! Persistent, checkpointed code-execution workspace.
//!
//! A [`workspace::Workspace`] holds a variable environment that short Rhai
//! snippets run against, plus an append-only log of every operation performed on
//! it. Every committed mutation is written to a versioned JSON snapshot so the
//! workspace can be reopened after a crash or restart.
//!
//! - **[`core`]**: Pure, deterministic types and rendering. No I/O.
//! - **[`io`]**: Snapshot and config files.
//! - **[`store`]** / **[`engine`]**: The environment and the fault-isolated
//!   executor that mutates it.
//! - **[`workspace`]** / **[`input`]**: The public facade and the
//!   synthesize → validate → execute retry loop driven by [`collab`] traits.

pub mod capture;
pub mod collab;
pub mod core;
pub mod engine;
pub mod exit_codes;
pub mod input;
pub mod io;
pub mod logging;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod workspace;
