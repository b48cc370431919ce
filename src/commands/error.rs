//! Command errors.
//!
//! Every rejected command yields exactly one [`CommandError`]. Errors are
//! raised before any state is mutated and are never retried internally.

use crate::storage::StorageError;
use thiserror::Error;

/// Coarse error category, used by adapters to pick a failure signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Wrong argument count or shape
    ArityError,
    /// The key holds a value of an incompatible kind
    TypeMismatch,
    /// Unrecognized verb
    UnknownCommand,
    /// Malformed argument or option
    InvalidArgument,
}

/// A command rejected by the engine.
///
/// The `Display` output is the client-facing message, prefixed the way
/// Redis clients expect (`ERR`, `WRONGTYPE`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("ERR wrong number of arguments for '{command}' command")]
    Arity { command: String },

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR unknown command '{name}'")]
    UnknownCommand { name: String },

    #[error("ERR {0}")]
    InvalidArgument(String),
}

impl CommandError {
    pub fn arity(command: &str) -> Self {
        CommandError::Arity {
            command: command.to_ascii_lowercase(),
        }
    }

    pub fn unknown(name: &str) -> Self {
        CommandError::UnknownCommand {
            name: name.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        CommandError::InvalidArgument(message.into())
    }

    pub fn syntax() -> Self {
        Self::invalid("syntax error")
    }

    pub fn not_an_integer() -> Self {
        Self::invalid("value is not an integer or out of range")
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::Arity { .. } => ErrorKind::ArityError,
            CommandError::WrongType => ErrorKind::TypeMismatch,
            CommandError::UnknownCommand { .. } => ErrorKind::UnknownCommand,
            CommandError::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }
}

impl From<StorageError> for CommandError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::WrongType => CommandError::WrongType,
            StorageError::NotAnInteger => CommandError::not_an_integer(),
            StorageError::Overflow => CommandError::invalid(err.to_string()),
        }
    }
}
