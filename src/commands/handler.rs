//! Command Handler Module
//!
//! The command engine: every front-end hands it a [`Command`] and renders the
//! [`Reply`] it gets back. It owns no state of its own beyond a handle to the
//! shared keyspace, so one handler can be cloned into every connection.
//!
//! ## Supported Commands
//!
//! ### Keys and Scalars
//! - `SET key value [EX seconds | PX milliseconds] [NX | XX]`
//! - `GET key`, `DEL key [key ...]`, `EXISTS key [key ...]`
//! - `INCR`, `DECR`, `INCRBY`, `DECRBY`
//! - `EXPIRE`, `PEXPIRE`, `TTL`, `PTTL`, `PERSIST`, `TYPE`, `KEYS pattern`
//!
//! ### Hashes
//! - `HSET key field value [field value ...]`
//! - `HGET`, `HDEL`, `HKEYS`, `HVALS`, `HGETALL`, `HLEN`, `HEXISTS`
//!
//! ### Server
//! - `PING [message]`, `ECHO message`, `DBSIZE`, `FLUSHDB`, `FLUSHALL`, `INFO`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌──────────────────┐    ┌─────────────┐                    │
//! │  │ Request::parse() │───>│    run()    │                    │
//! │  └──────────────────┘    └─────────────┘                    │
//! │                                 │                           │
//! │                                 ▼                           │
//! │                          StorageEngine                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A command is fully validated by `Request::parse` before it touches the
//! keyspace, so a rejected command never leaves a partial write behind.

use crate::commands::command::Command;
use crate::commands::error::CommandError;
use crate::commands::reply::Reply;
use crate::commands::request::Request;
use crate::storage::{Entry, StorageEngine, Value};
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

/// Executes commands against a shared keyspace.
#[derive(Clone)]
pub struct CommandHandler {
    /// The storage engine
    storage: Arc<StorageEngine>,
    /// Server start time for INFO command
    start_time: Instant,
    /// Validated commands run by this handler and its clones
    commands_processed: Arc<AtomicU64>,
}

impl CommandHandler {
    /// Creates a new command handler with the given storage engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self {
            storage,
            start_time: Instant::now(),
            commands_processed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The keyspace this handler operates on.
    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    /// Executes a command and returns its reply.
    ///
    /// Failures are returned as [`Reply::Error`]; this never panics on client
    /// input.
    pub fn execute(&self, command: Command) -> Reply {
        let result = Request::parse(&command).and_then(|request| {
            trace!(command = command.name(), write = request.is_write(), "executing");
            self.run(request)
        });

        match result {
            Ok(reply) => reply,
            Err(err) => {
                debug!(command = command.name(), error = %err, "command rejected");
                Reply::Error(err)
            }
        }
    }

    /// Executes an already validated request.
    pub fn execute_request(&self, request: Request) -> Reply {
        self.run(request).unwrap_or_else(Reply::Error)
    }

    /// Number of validated commands executed so far.
    pub fn commands_processed(&self) -> u64 {
        self.commands_processed.load(Ordering::Relaxed)
    }

    fn run(&self, request: Request) -> Result<Reply, CommandError> {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
        let storage = &self.storage;

        let reply: Reply = match request {
            Request::Set {
                key,
                value,
                ttl,
                condition,
            } => {
                let entry = match ttl {
                    Some(ttl) => Entry::with_ttl(Value::Scalar(value), ttl),
                    None => Entry::new(Value::Scalar(value)),
                };
                if storage.set_if(key, entry, condition) {
                    Reply::ok()
                } else {
                    Reply::Nil
                }
            }
            Request::Get { key } => Reply::optional(storage.get_scalar(&key)?),
            Request::Del { keys } => storage.delete_many(&keys).into(),
            Request::Exists { keys } => storage.exists_many(&keys).into(),
            Request::IncrBy { key, delta } => storage.incr_by(&key, delta)?.into(),
            Request::Expire { key, ttl } => storage.expire(&key, ttl).into(),
            Request::Ttl { key } => storage.ttl(&key).into(),
            Request::PTtl { key } => storage.pttl(&key).into(),
            Request::Persist { key } => storage.persist(&key).into(),
            Request::Type { key } => Reply::status(storage.key_type(&key)),
            Request::Keys { pattern } => Reply::bulks(storage.keys(&pattern)),

            Request::HSet { key, pairs } => storage.hset(key, pairs).into(),
            Request::HGet { key, field } => Reply::optional(storage.hget(&key, &field)?),
            Request::HDel { key, fields } => storage.hdel(&key, &fields)?.into(),
            Request::HKeys { key } => Reply::bulks(storage.hkeys(&key)?),
            Request::HVals { key } => Reply::bulks(storage.hvals(&key)?),
            Request::HGetAll { key } => Reply::bulks(
                storage
                    .hgetall(&key)?
                    .into_iter()
                    .flat_map(|(field, value)| [field, value]),
            ),
            Request::HLen { key } => storage.hlen(&key)?.into(),
            Request::HExists { key, field } => storage.hexists(&key, &field)?.into(),

            Request::Ping { message: None } => Reply::status("PONG"),
            Request::Ping {
                message: Some(message),
            } => Reply::Bulk(message),
            Request::Echo { message } => Reply::Bulk(message),
            Request::DbSize => storage.len().into(),
            Request::FlushDb => {
                storage.flush();
                Reply::ok()
            }
            Request::Info => Reply::Bulk(self.info()),
        };

        Ok(reply)
    }

    fn info(&self) -> Bytes {
        let stats = self.storage.stats();
        let used_memory = self.storage.memory_usage();

        let info = format!(
            "# Server\r\n\
             polykv_version:{}\r\n\
             os:{}\r\n\
             uptime_in_seconds:{}\r\n\
             \r\n\
             # Stats\r\n\
             total_commands_processed:{}\r\n\
             \r\n\
             # Keyspace\r\n\
             db0:keys={}\r\n\
             \r\n\
             # Memory\r\n\
             used_memory:{}\r\n\
             used_memory_human:{}KB\r\n\
             \r\n\
             # Operations\r\n\
             read_ops:{}\r\n\
             write_ops:{}\r\n\
             del_ops:{}\r\n\
             expired_keys:{}\r\n",
            crate::VERSION,
            std::env::consts::OS,
            self.start_time.elapsed().as_secs(),
            self.commands_processed(),
            stats.keys,
            used_memory,
            used_memory / 1024,
            stats.read_ops,
            stats.write_ops,
            stats.del_ops,
            stats.expired,
        );

        Bytes::from(info)
    }
}
