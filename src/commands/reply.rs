//! The canonical result of a command.

use crate::commands::error::CommandError;
use bytes::Bytes;
use std::fmt;

/// A typed reply, rendered by each front-end into its own wire format.
///
/// `Nil` ("no such value") and `Error` ("command rejected") are distinct and
/// must stay distinct on every wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Status(String),
    Integer(i64),
    Bulk(Bytes),
    Array(Vec<Reply>),
    Nil,
    Error(CommandError),
}

impl Reply {
    pub fn ok() -> Self {
        Reply::Status("OK".to_string())
    }

    pub fn status(s: impl Into<String>) -> Self {
        Reply::Status(s.into())
    }

    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Reply::Bulk(data.into())
    }

    /// An array of bulk strings.
    pub fn bulks<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Bytes>,
    {
        Reply::Array(items.into_iter().map(Reply::Bulk).collect())
    }

    /// A bulk string, or `Nil` when there is no value.
    pub fn optional(value: Option<Bytes>) -> Self {
        value.map_or(Reply::Nil, Reply::Bulk)
    }
}

impl From<CommandError> for Reply {
    fn from(err: CommandError) -> Self {
        Reply::Error(err)
    }
}

impl From<i64> for Reply {
    fn from(n: i64) -> Self {
        Reply::Integer(n)
    }
}

impl From<u64> for Reply {
    fn from(n: u64) -> Self {
        Reply::Integer(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<bool> for Reply {
    fn from(b: bool) -> Self {
        Reply::Integer(i64::from(b))
    }
}

/// redis-cli style rendering, used in logs.
impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Status(s) => write!(f, "{}", s),
            Reply::Integer(n) => write!(f, "(integer) {}", n),
            Reply::Bulk(data) => write!(f, "\"{}\"", String::from_utf8_lossy(data)),
            Reply::Nil => write!(f, "(nil)"),
            Reply::Error(e) => write!(f, "(error) {}", e),
            Reply::Array(items) if items.is_empty() => write!(f, "(empty array)"),
            Reply::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {}", i + 1, item)?;
                }
                Ok(())
            }
        }
    }
}
