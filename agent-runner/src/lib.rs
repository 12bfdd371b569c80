//! Codex agent runner.
//!
//! Drives repeated turns of `codex exec --json` for one conversation. The
//! first prompt comes from an input document on stdin; follow-ups arrive
//! through a polled filesystem mailbox. Each turn's result is written to
//! stdout between output markers. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (event parsing, argument and prompt
//!   construction, wire types). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (process execution, mailbox,
//!   output records, config and input files).
//!
//! [`session`] coordinates the two to implement the run loop.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
