//! RESP (Redis Serialization Protocol) Frames
//!
//! This module defines [`Frame`], one RESP value as it travels on the wire.
//!
//! ## Protocol Format
//!
//! Each frame starts with a type prefix byte:
//! - `+` Simple String
//! - `-` Error
//! - `:` Integer
//! - `$` Bulk String
//! - `*` Array
//!
//! All frames are terminated with CRLF (`\r\n`).
//!
//! ## Examples
//!
//! Simple String: `+OK\r\n`
//! Error: `-ERR unknown command\r\n`
//! Integer: `:1000\r\n`
//! Bulk String: `$5\r\nhello\r\n`
//! Array: `*2\r\n$5\r\nHKEYS\r\n$4\r\nuser\r\n`
//! Null Bulk String: `$-1\r\n`

use bytes::{BufMut, Bytes, BytesMut};

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A single RESP value.
///
/// Used both for requests read from a client and for replies written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `+<string>\r\n`, never contains CR or LF
    Simple(String),

    /// `-<message>\r\n`
    Error(String),

    /// `:<integer>\r\n`
    Integer(i64),

    /// `$<length>\r\n<data>\r\n`, binary safe
    Bulk(Bytes),

    /// Null bulk string (`$-1\r\n`) or null array (`*-1\r\n`)
    Null,

    /// `*<count>\r\n<frame>...`
    Array(Vec<Frame>),
}

impl Frame {
    /// Appends the wire encoding of this frame to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(s) => {
                dst.put_u8(prefix::SIMPLE_STRING);
                put_line(dst, s.as_bytes());
            }
            Frame::Error(msg) => {
                dst.put_u8(prefix::ERROR);
                put_line(dst, msg.as_bytes());
            }
            Frame::Integer(n) => {
                dst.put_u8(prefix::INTEGER);
                put_line(dst, n.to_string().as_bytes());
            }
            Frame::Bulk(data) => {
                dst.put_u8(prefix::BULK_STRING);
                put_line(dst, data.len().to_string().as_bytes());
                put_line(dst, data);
            }
            Frame::Null => {
                dst.put_u8(prefix::BULK_STRING);
                put_line(dst, b"-1");
            }
            Frame::Array(items) => {
                dst.put_u8(prefix::ARRAY);
                put_line(dst, items.len().to_string().as_bytes());
                for item in items {
                    item.encode(dst);
                }
            }
        }
    }

    /// Encodes this frame into a fresh buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// The payload of a string-like frame (bulk or simple).
    pub fn as_bytes(&self) -> Option<Bytes> {
        match self {
            Frame::Bulk(b) => Some(b.clone()),
            Frame::Simple(s) => Some(Bytes::from(s.clone())),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Frame::Error(_))
    }
}

/// Writes `data` followed by CRLF, replacing line breaks so that simple
/// strings and errors stay single-line.
fn put_line(dst: &mut BytesMut, data: &[u8]) {
    dst.reserve(data.len() + 2);
    if data.contains(&b'\r') || data.contains(&b'\n') {
        dst.extend(
            data.iter()
                .map(|&b| if b == b'\r' || b == b'\n' { b' ' } else { b }),
        );
    } else {
        dst.put_slice(data);
    }
    dst.put_slice(CRLF);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_frames() {
        assert_eq!(&Frame::Simple("OK".into()).to_bytes()[..], b"+OK\r\n");
        assert_eq!(
            &Frame::Error("ERR unknown command".into()).to_bytes()[..],
            b"-ERR unknown command\r\n"
        );
        assert_eq!(&Frame::Integer(-42).to_bytes()[..], b":-42\r\n");
        assert_eq!(&Frame::Null.to_bytes()[..], b"$-1\r\n");
    }

    #[test]
    fn test_bulk_is_binary_safe() {
        let frame = Frame::Bulk(Bytes::from(&b"a\r\nb"[..]));
        assert_eq!(&frame.to_bytes()[..], b"$4\r\na\r\nb\r\n");
    }

    #[test]
    fn test_nested_array() {
        let frame = Frame::Array(vec![
            Frame::Integer(1),
            Frame::Array(vec![Frame::Bulk(Bytes::from("x")), Frame::Null]),
        ]);
        assert_eq!(&frame.to_bytes()[..], b"*2\r\n:1\r\n*2\r\n$1\r\nx\r\n$-1\r\n");
        assert_eq!(&Frame::Array(vec![]).to_bytes()[..], b"*0\r\n");
    }

    #[test]
    fn test_error_stays_single_line() {
        let frame = Frame::Error("ERR bad\r\ninput".into());
        assert_eq!(&frame.to_bytes()[..], b"-ERR bad  input\r\n");
    }
}
