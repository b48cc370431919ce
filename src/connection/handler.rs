//! Connection Handler Module
//!
//! Each RESP client gets its own handler task that runs in a loop, reading
//! frames and writing replies.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Parse buffered frames   │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Execute, queue replies  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Flush replies           │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read bytes from socket  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects, sends QUIT, or breaks the protocol
//! ```
//!
//! ## Buffer Management
//!
//! TCP is a stream protocol: one read may hold half a command or several
//! pipelined ones. Incoming bytes accumulate in a `BytesMut` until a whole
//! frame is available. Replies to every frame of one read are written
//! together with a single flush.

use crate::commands::{CommandHandler, Reply};
use crate::protocol::parser::MAX_BULK_SIZE;
use crate::protocol::{decode_command, encode_reply, parse_frame, Frame, ParseError};
use bytes::{Buf, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace, warn};

/// Maximum size of an unterminated inline command (64 KB)
const MAX_INLINE_SIZE: usize = 64 * 1024;

/// Maximum size of a pending RESP frame: one full bulk plus headers
const MAX_REQUEST_SIZE: usize = MAX_BULK_SIZE + MAX_INLINE_SIZE;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// What the loop should do after handling one frame.
enum Flow {
    Continue,
    Close,
}

/// Drives one RESP client over any byte stream.
pub struct ConnectionHandler<S> {
    stream: S,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Bytes received but not yet parsed
    buffer: BytesMut,

    /// Encoded replies waiting for the next flush
    out: BytesMut,

    /// The command handler (shared across connections)
    command_handler: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream,
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            out: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            stats,
        }
    }

    /// Runs the connection until the client leaves or an error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected"),
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(frame) = self.next_frame().await? {
                if let Flow::Close = self.process(frame) {
                    self.flush().await?;
                    return Ok(());
                }
            }

            self.flush().await?;

            if !self.read_more_data().await? {
                return Ok(());
            }
        }
    }

    /// Parses the next complete frame out of the buffer.
    ///
    /// A malformed frame is answered with a protocol error before the
    /// connection is dropped, since the stream can't be resynchronized.
    async fn next_frame(&mut self) -> Result<Option<Frame>, ConnectionError> {
        match parse_frame(&self.buffer) {
            Ok(Some((frame, consumed))) => {
                self.buffer.advance(consumed);
                trace!(
                    client = %self.addr,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Parsed frame"
                );
                Ok(Some(frame))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(client = %self.addr, error = %e, "Parse error");
                Frame::Error(format!("ERR Protocol error: {}", e)).encode(&mut self.out);
                self.flush().await?;
                Err(ConnectionError::Parse(e))
            }
        }
    }

    /// Executes one request frame and queues its reply.
    fn process(&mut self, frame: Frame) -> Flow {
        let reply = match decode_command(frame) {
            Ok(Some(command)) if command.name() == "QUIT" => {
                encode_reply(Reply::ok()).encode(&mut self.out);
                return Flow::Close;
            }
            Ok(Some(command)) => {
                self.stats.command_processed();
                self.command_handler.execute(command)
            }
            Ok(None) => return Flow::Continue,
            Err(err) => Reply::Error(err),
        };

        encode_reply(reply).encode(&mut self.out);
        Flow::Continue
    }

    /// Reads more data into the buffer. Returns `false` on a clean EOF.
    async fn read_more_data(&mut self) -> Result<bool, ConnectionError> {
        let limit = self.buffer_limit();
        if self.buffer.len() >= limit {
            error!(
                client = %self.addr,
                size = self.buffer.len(),
                limit = limit,
                "Buffer size limit exceeded"
            );
            let message = if limit == MAX_INLINE_SIZE {
                "ERR Protocol error: too big inline request"
            } else {
                "ERR Protocol error: too big request"
            };
            Frame::Error(message.to_string()).encode(&mut self.out);
            self.flush().await?;
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.read_buf(&mut self.buffer).await?;

        if n == 0 {
            return if self.buffer.is_empty() {
                Ok(false)
            } else {
                Err(ConnectionError::UnexpectedEof)
            };
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(true)
    }

    /// How many unparsed bytes the pending frame may occupy.
    ///
    /// Only RESP arrays and bulks can legitimately grow up to a full bulk;
    /// anything else is an inline command still waiting for its newline.
    fn buffer_limit(&self) -> usize {
        match self.buffer.first() {
            Some(b'*') | Some(b'$') => MAX_REQUEST_SIZE,
            _ => MAX_INLINE_SIZE,
        }
    }

    /// Writes every queued reply.
    async fn flush(&mut self) -> Result<(), ConnectionError> {
        if self.out.is_empty() {
            return Ok(());
        }

        let len = self.out.len();
        self.stream.write_all_buf(&mut self.out).await?;
        self.stream.flush().await?;
        self.out.clear();

        self.stats.bytes_written(len);
        trace!(client = %self.addr, bytes = len, "Sent replies");
        Ok(())
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// RESP parse error
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Stream ended in the middle of a frame
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// Buffer size limit exceeded
    #[error("buffer size limit exceeded")]
    BufferFull,
}

/// Runs a [`ConnectionHandler`] to completion.
///
/// Errors are already logged by the handler, so they are dropped here.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats);
    let _ = handler.run().await;
}

/// Accepts RESP clients forever, one task per connection.
pub async fn accept_loop(
    listener: TcpListener,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(client = %addr, error = %e, "Failed to set TCP_NODELAY");
                }
                tokio::spawn(handle_connection(
                    stream,
                    addr,
                    command_handler.clone(),
                    Arc::clone(&stats),
                ));
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
            }
        }
    }
}
