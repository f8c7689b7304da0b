//! Crate-wide error taxonomy above the wire protocol layer.

use crate::protocol::FrameError;
use thiserror::Error;

/// Errors a command handler can fail with. These map 1:1 onto `-` error
/// frames on the wire; `QUIT`/`SHUTDOWN` are not errors and are represented
/// separately as [`crate::dispatch::Outcome`] variants.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error("WRONGTYPE key holds the wrong kind of value")]
    WrongType,

    #[error("key must not be empty")]
    EmptyKey,

    #[error("index out of range")]
    IndexOutOfRange,

    #[error("incompatible data types")]
    IncompatibleTypes,

    #[error("timestamp must be formatted as Y-m-d H:M:S[.ffffff]")]
    BadTimestamp,

    #[error("unrecognized command: {0}")]
    UnknownCommand(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("wrong number of arguments")]
    WrongArity,

    #[error("not an integer or out of range")]
    NotAnInteger,

    #[error("io error: {0}")]
    Io(String),
}

impl From<FrameError> for CommandError {
    fn from(e: FrameError) -> Self {
        CommandError::BadRequest(e.to_string())
    }
}

impl From<std::io::Error> for CommandError {
    fn from(e: std::io::Error) -> Self {
        CommandError::Io(e.to_string())
    }
}
