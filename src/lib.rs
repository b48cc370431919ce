//! # polykv - An In-Memory Key-Value Store with Many Front-Ends
//!
//! polykv keeps scalars and hashes in memory, with per-key expiry, and serves
//! the same keyspace over three protocols at once:
//!
//! - **RESP**: the Redis wire protocol, so `redis-cli` and Redis clients work
//! - **HTTP**: `POST /{command}` with a JSON body
//! - **WebSocket**: one command line per message, JSON replies
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              polykv                                     │
//! │                                                                         │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐                      │
//! │  │ RESP        │  │ HTTP        │  │ WebSocket   │   front-ends         │
//! │  │ connection  │  │ gateway     │  │ gateway     │                      │
//! │  └──────┬──────┘  └──────┬──────┘  └──────┬──────┘                      │
//! │         │   Command      │                │                             │
//! │         └────────────────┼────────────────┘                             │
//! │                          ▼                                              │
//! │                 ┌─────────────────┐                                     │
//! │                 │ CommandHandler  │  Request::parse + run               │
//! │                 └────────┬────────┘                                     │
//! │                          ▼                                              │
//! │  ┌──────────────────────────────────────────────┐                       │
//! │  │              StorageEngine                   │                       │
//! │  │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │                       │
//! │  │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │ │                       │
//! │  │  │RwLock  │ │RwLock  │ │RwLock  │ │shards  │ │                       │
//! │  │  └────────┘ └────────┘ └────────┘ └────────┘ │                       │
//! │  └──────────────────────────────────────────────┘                       │
//! │                          ▲                                              │
//! │                 ┌────────┴────────┐                                     │
//! │                 │  ExpirySweeper  │  (Background Tokio Task)            │
//! │                 └─────────────────┘                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use polykv::commands::{Command, CommandHandler, Reply};
//! use polykv::storage::StorageEngine;
//! use std::sync::Arc;
//!
//! let handler = CommandHandler::new(Arc::new(StorageEngine::new()));
//!
//! let reply = handler.execute(Command::new("HSET").with_args(["user:1", "name", "ada"]));
//! assert_eq!(reply, Reply::Integer(1));
//!
//! let reply = handler.execute(Command::new("EXISTS").with_args(["user:1", "user:2"]));
//! assert_eq!(reply, Reply::Integer(1));
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: Sharded keyspace, value types and expiry
//! - [`commands`]: Canonical commands, validation and execution
//! - [`protocol`]: RESP frames, parser and codec
//! - [`connection`]: RESP client connections
//! - [`gateway`]: HTTP and WebSocket front-ends
//! - [`config`]: Command-line and environment configuration
//!
//! ## Lazy + Active Expiry
//!
//! Keys with a TTL are expired in two ways:
//! 1. **Lazy**: a read that finds an expired entry removes it
//! 2. **Active**: a background task periodically sweeps every shard
//!
//! Both use the same predicate, so a key is never visible to one and gone
//! for the other.

pub mod commands;
pub mod config;
pub mod connection;
pub mod gateway;
pub mod protocol;
pub mod storage;

pub use commands::{Command, CommandError, CommandHandler, ErrorKind, Reply};
pub use config::{Cli, ServerConfig};
pub use connection::{accept_loop, handle_connection, ConnectionStats};
pub use storage::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper, StorageEngine};

/// Default port of the RESP listener
pub const DEFAULT_RESP_PORT: u16 = 7379;

/// Default port of the HTTP gateway
pub const DEFAULT_HTTP_PORT: u16 = 8082;

/// Default port of the WebSocket gateway
pub const DEFAULT_WS_PORT: u16 = 8379;

/// The default host every listener binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of polykv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
