//! RESP Protocol Implementation
//!
//! The binary wire protocol served on the RESP port.
//!
//! ## Modules
//!
//! - `types`: The [`Frame`] enum and its encoding
//! - `parser`: Incremental parser for incoming frames
//! - `codec`: Frame <-> command/reply translation
//!
//! ## Example
//!
//! ```
//! use polykv::protocol::{decode_command, encode_reply, parse_frame};
//! use polykv::commands::Reply;
//!
//! let data = b"*2\r\n$5\r\nHKEYS\r\n$4\r\nuser\r\n";
//! let (frame, consumed) = parse_frame(data).unwrap().unwrap();
//! assert_eq!(consumed, data.len());
//!
//! let command = decode_command(frame).unwrap().unwrap();
//! assert_eq!(command.name(), "HKEYS");
//!
//! let wire = encode_reply(Reply::Array(vec![])).to_bytes();
//! assert_eq!(&wire[..], b"*0\r\n");
//! ```

pub mod codec;
pub mod parser;
pub mod types;

pub use codec::{decode_command, encode_reply};
pub use parser::{parse_frame, split_command_line, ParseError, ParseResult};
pub use types::Frame;
