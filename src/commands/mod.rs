//! Command Module
//!
//! The protocol-agnostic command layer. Front-ends translate their wire input
//! into a [`Command`], the [`CommandHandler`] validates it into a typed
//! [`Request`] and runs it, and the resulting [`Reply`] is translated back.
//!
//! ## Architecture
//!
//! ```text
//!   RESP / HTTP / WebSocket
//!            │
//!            ▼
//!   ┌─────────────────┐
//!   │     Command     │  name + args + named options
//!   └────────┬────────┘
//!            │  Request::parse
//!            ▼
//!   ┌─────────────────┐
//!   │ CommandHandler  │──────> StorageEngine
//!   └────────┬────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐
//!   │      Reply      │  or Reply::Error(CommandError)
//!   └─────────────────┘
//! ```

pub mod command;
pub mod error;
pub mod handler;
pub mod reply;
pub mod request;

pub use command::Command;
pub use error::{CommandError, ErrorKind};
pub use handler::CommandHandler;
pub use reply::Reply;
pub use request::Request;
