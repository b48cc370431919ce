//! Translation between RESP frames and the canonical command layer.

use crate::commands::{Command, CommandError, Reply};
use crate::protocol::types::Frame;

/// Turns a request frame into a [`Command`].
///
/// Returns `Ok(None)` for an empty array (a blank inline line), which clients
/// expect to be ignored without a reply.
pub fn decode_command(frame: Frame) -> Result<Option<Command>, CommandError> {
    let Frame::Array(items) = frame else {
        return Err(CommandError::invalid("invalid command format"));
    };
    if items.is_empty() {
        return Ok(None);
    }

    let tokens = items
        .iter()
        .map(Frame::as_bytes)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| CommandError::invalid("invalid command format"))?;

    Command::from_tokens(tokens).map(Some)
}

/// Renders a reply as a RESP frame.
pub fn encode_reply(reply: Reply) -> Frame {
    match reply {
        Reply::Status(s) => Frame::Simple(s),
        Reply::Integer(n) => Frame::Integer(n),
        Reply::Bulk(data) => Frame::Bulk(data),
        Reply::Nil => Frame::Null,
        Reply::Array(items) => Frame::Array(items.into_iter().map(encode_reply).collect()),
        Reply::Error(err) => Frame::Error(err.to_string()),
    }
}
