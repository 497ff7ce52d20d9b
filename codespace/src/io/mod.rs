//! I/O helpers for workspace persistence and configuration.

pub mod config;
pub mod snapshot;
