//! Stable exit codes for the runner CLI.

/// The host closed the session after every turn succeeded.
pub const OK: i32 = 0;
/// Invalid input or config, or a turn failed. An error record was emitted when possible.
pub const FAILED: i32 = 1;
