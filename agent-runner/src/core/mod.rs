//! Deterministic, pure logic shared by the runner.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod events;
pub mod invocation;
pub mod prompt;
pub mod turn_parser;
pub mod types;
