//! I/O helpers for the runner.

pub mod config;
pub mod executor;
pub mod input;
pub mod instructions;
pub mod mailbox;
pub mod output;
pub mod process;
