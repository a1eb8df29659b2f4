// src/constants.rs

/// First character of a token that splits a line into a two-stage pipeline.
pub const PIPE_OPERATOR: char = '|';

/// First character of a token that sends standard output to a file.
pub const REDIRECT_OPERATOR: char = '>';

/// First character of a token that runs the command without waiting for it.
pub const BACKGROUND_OPERATOR: char = '&';

/// Permission bits requested when `>` creates its target (the umask still applies).
pub const REDIRECT_FILE_MODE: u32 = 0o777;

/// Status a child exits with when its program image could not be replaced.
pub const EXEC_FAILURE_STATUS: i32 = 1;
