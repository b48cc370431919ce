//! Connection Handler Module
//!
//! This module serves the RESP port. Each client connection is handled by its
//! own async task.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     accept_loop                             │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ spawn task per client
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read bytes  │───>│ parse_frame │───>│ decode_cmd  │     │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Flush       │<───│ encode_reply│<───│ execute     │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The handler is generic over the byte stream, so tests drive it with
//! in-memory mocks as well as real sockets.

pub mod handler;

pub use handler::{
    accept_loop, handle_connection, ConnectionError, ConnectionHandler, ConnectionStats,
};
