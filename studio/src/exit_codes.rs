//! Stable exit codes for studio CLI commands.

/// Command succeeded; for `studio run`, the loop completed.
pub const OK: i32 = 0;
/// Invalid input, config, or project layout, or any other failure.
pub const INVALID: i32 = 1;
/// `studio run` was interrupted (Ctrl-C).
pub const CANCELLED: i32 = 2;
/// `studio run` hit the iteration limit.
pub const ITERATION_LIMIT: i32 = 3;
/// `studio run` stopped on a backend error.
pub const BACKEND_ERROR: i32 = 4;
