//! Deterministic, pure logic shared by the workspace.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod budget;
pub mod transcript;
pub mod types;
