//! Incremental RESP Parser
//!
//! The parser reads from a buffer and returns either:
//! - `Ok(Some((frame, consumed)))` - a complete frame, `consumed` bytes were used
//! - `Ok(None)` - the frame is incomplete, wait for more data
//! - `Err(ParseError)` - the bytes can never become a valid frame
//!
//! This lets the caller:
//! 1. Append incoming network data to a buffer
//! 2. Call [`parse_frame`]
//! 3. On success, advance the buffer by `consumed` bytes
//! 4. If incomplete, read more and retry
//! 5. On error, report it and drop the client
//!
//! Lines that don't start with a type prefix are inline commands
//! (`HKEYS user\r\n`), as typed into telnet. They may end in a bare `\n`.

use crate::protocol::types::{prefix, Frame, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Errors that can occur during RESP parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A nested frame with no valid type prefix
    #[error("unknown type prefix: {0:#04x}")]
    UnknownPrefix(u8),

    /// Invalid integer format in a length or integer frame
    #[error("invalid integer: {0:?}")]
    InvalidInteger(String),

    /// Invalid UTF-8 in a simple string, error or inline command
    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    /// Negative length other than -1
    #[error("invalid length: {0}")]
    InvalidLength(i64),

    /// Bulk string data not followed by CRLF
    #[error("bulk string missing trailing CRLF")]
    MissingCrlf,

    /// Arrays nested deeper than [`MAX_NESTING_DEPTH`]
    #[error("maximum nesting depth exceeded: {0}")]
    TooDeep(usize),

    /// A bulk string or array longer than allowed
    #[error("message too large: {size} (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// An inline command with an unbalanced quote
    #[error("unbalanced quotes in inline command")]
    UnbalancedQuotes,
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single bulk string (512 MiB)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum number of elements announced by an array header
pub const MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Maximum array nesting depth
pub const MAX_NESTING_DEPTH: usize = 32;

/// Parses one frame from the start of `buf`.
pub fn parse_frame(buf: &[u8]) -> ParseResult<Option<(Frame, usize)>> {
    let mut cursor = Cursor { buf, pos: 0 };
    match cursor.frame(0)? {
        Some(frame) => Ok(Some((frame, cursor.pos))),
        None => Ok(None),
    }
}

/// Read position over a buffer that may hold a partial frame.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn frame(&mut self, depth: usize) -> ParseResult<Option<Frame>> {
        let Some(&first) = self.buf.get(self.pos) else {
            return Ok(None);
        };

        match first {
            prefix::SIMPLE_STRING => {
                self.pos += 1;
                Ok(self.text_line("simple string")?.map(Frame::Simple))
            }
            prefix::ERROR => {
                self.pos += 1;
                Ok(self.text_line("error")?.map(Frame::Error))
            }
            prefix::INTEGER => {
                self.pos += 1;
                Ok(self.integer()?.map(Frame::Integer))
            }
            prefix::BULK_STRING => {
                self.pos += 1;
                self.bulk()
            }
            prefix::ARRAY => {
                self.pos += 1;
                self.array(depth)
            }
            _ if depth == 0 => self.inline(),
            other => Err(ParseError::UnknownPrefix(other)),
        }
    }

    /// The bytes up to the next CRLF, consuming the CRLF.
    fn line(&mut self) -> Option<&'a [u8]> {
        let buf = self.buf;
        let rest = &buf[self.pos..];
        let end = rest.windows(2).position(|w| w == CRLF)?;
        self.pos += end + 2;
        Some(&rest[..end])
    }

    fn text_line(&mut self, what: &'static str) -> ParseResult<Option<String>> {
        match self.line() {
            Some(line) => std::str::from_utf8(line)
                .map(|s| Some(s.to_string()))
                .map_err(|_| ParseError::InvalidUtf8(what)),
            None => Ok(None),
        }
    }

    fn integer(&mut self) -> ParseResult<Option<i64>> {
        let Some(line) = self.line() else {
            return Ok(None);
        };
        std::str::from_utf8(line)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Some)
            .ok_or_else(|| ParseError::InvalidInteger(String::from_utf8_lossy(line).into_owned()))
    }

    /// A length header: `None` inside means the null marker `-1`.
    fn length(&mut self, max: usize) -> ParseResult<Option<Option<usize>>> {
        let Some(n) = self.integer()? else {
            return Ok(None);
        };
        match n {
            -1 => Ok(Some(None)),
            n if n < 0 => Err(ParseError::InvalidLength(n)),
            n => {
                let len = usize::try_from(n).map_err(|_| ParseError::InvalidLength(n))?;
                if len > max {
                    return Err(ParseError::MessageTooLarge { size: len, max });
                }
                Ok(Some(Some(len)))
            }
        }
    }

    fn bulk(&mut self) -> ParseResult<Option<Frame>> {
        let len = match self.length(MAX_BULK_SIZE)? {
            None => return Ok(None),
            Some(None) => return Ok(Some(Frame::Null)),
            Some(Some(len)) => len,
        };

        let start = self.pos;
        let end = start + len;
        if self.buf.len() < end + 2 {
            return Ok(None);
        }
        if &self.buf[end..end + 2] != CRLF {
            return Err(ParseError::MissingCrlf);
        }

        self.pos = end + 2;
        Ok(Some(Frame::Bulk(Bytes::copy_from_slice(&self.buf[start..end]))))
    }

    fn array(&mut self, depth: usize) -> ParseResult<Option<Frame>> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::TooDeep(MAX_NESTING_DEPTH));
        }
        let len = match self.length(MAX_ARRAY_LEN)? {
            None => return Ok(None),
            Some(None) => return Ok(Some(Frame::Null)),
            Some(Some(len)) => len,
        };

        // The header may announce more elements than ever arrive.
        let mut items = Vec::with_capacity(len.min(64));
        for _ in 0..len {
            match self.frame(depth + 1)? {
                Some(item) => items.push(item),
                None => return Ok(None),
            }
        }
        Ok(Some(Frame::Array(items)))
    }

    /// `HSET user name "Ada Lovelace"\r\n` as an array of bulk strings.
    fn inline(&mut self) -> ParseResult<Option<Frame>> {
        let buf = self.buf;
        let rest = &buf[self.pos..];
        let Some(end) = rest.iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };
        self.pos += end + 1;

        let line = rest[..end].strip_suffix(b"\r").unwrap_or(&rest[..end]);
        let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidUtf8("inline command"))?;

        let tokens = split_command_line(line)?;
        Ok(Some(Frame::Array(
            tokens
                .into_iter()
                .map(|t| Frame::Bulk(Bytes::from(t)))
                .collect(),
        )))
    }
}

/// Splits a command line on whitespace; double quotes group a token.
pub fn split_command_line(line: &str) -> ParseResult<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                in_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_quotes {
        return Err(ParseError::UnbalancedQuotes);
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}
