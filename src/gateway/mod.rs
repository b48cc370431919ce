//! HTTP and WebSocket front-ends.
//!
//! Both gateways translate their requests into [`Command`]s, run them on a
//! shared [`CommandHandler`] and render the [`Reply`] as JSON. Neither keeps
//! any state between requests.
//!
//! [`Command`]: crate::commands::Command
//! [`CommandHandler`]: crate::commands::CommandHandler
//! [`Reply`]: crate::commands::Reply

pub mod http;
pub mod json;
pub mod websocket;

pub use http::GatewayError;
pub use json::{command_from_body, reply_to_json, ApiResponse};
