//! Storage Engine Module
//!
//! The keyspace and its expiry policy. Everything a command reads or writes
//! goes through [`StorageEngine`]; no caller ever receives a reference into
//! the stored data, only copies.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │  sweep_shard(i), one shard at a time
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use polykv::storage::{StorageEngine, Value};
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! let engine = StorageEngine::new();
//!
//! engine.set(Bytes::from("name"), Bytes::from("polykv"));
//! assert_eq!(engine.get(b"name"), Some(Value::Scalar(Bytes::from("polykv"))));
//!
//! engine.set_with_ttl(
//!     Bytes::from("session"),
//!     Bytes::from("token123"),
//!     Duration::from_secs(3600)
//! );
//! assert!(engine.ttl(b"session") > 0);
//! ```

pub mod engine;
pub mod expiry;
pub mod glob;
pub mod value;

pub use engine::{SetCondition, StorageEngine, StorageError, StorageStats};
pub use expiry::{is_expired, start_expiry_sweeper, sweep_once, ExpiryConfig, ExpirySweeper};
pub use value::{Entry, HashFields, Value};
