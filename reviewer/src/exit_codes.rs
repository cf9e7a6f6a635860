//! Stable exit codes for reviewer CLI commands.

/// The run completed, or the command succeeded.
pub const OK: i32 = 0;
/// The run halted with a recorded error.
pub const FAILED: i32 = 1;
/// Invalid usage, configuration or state file.
pub const INVALID: i32 = 2;
/// The run was cancelled between steps.
pub const CANCELLED: i32 = 3;
/// The run is suspended until corrected input is supplied (`reviewer resume`).
pub const AWAITING_INPUT: i32 = 4;
