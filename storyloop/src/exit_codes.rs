//! Stable exit codes for the storyloop CLI.

/// Every epic finished, or the operator declined to continue.
pub const OK: i32 = 0;
/// Pre-flight failure, fatal agent failure, abort, or any other error.
pub const FAILURE: i32 = 1;
