//! Server configuration.
//!
//! [`Cli`] is what the binary parses from flags and environment variables;
//! [`ServerConfig`] is the plain settings struct the rest of the server
//! uses, so tests and embedders can build one without going through clap.

use crate::{DEFAULT_HOST, DEFAULT_HTTP_PORT, DEFAULT_RESP_PORT, DEFAULT_WS_PORT};
use clap::Parser;
use std::time::Duration;

/// polykv - in-memory key-value store over RESP, HTTP and WebSocket.
#[derive(Parser, Debug)]
#[command(name = "polykv")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Host to bind every listener to.
    #[arg(long, env = "POLYKV_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port of the RESP (binary protocol) listener.
    #[arg(short = 'p', long, env = "POLYKV_RESP_PORT", default_value_t = DEFAULT_RESP_PORT)]
    pub resp_port: u16,

    /// Port of the HTTP gateway.
    #[arg(long, env = "POLYKV_HTTP_PORT", default_value_t = DEFAULT_HTTP_PORT)]
    pub http_port: u16,

    /// Port of the WebSocket gateway.
    #[arg(long, env = "POLYKV_WS_PORT", default_value_t = DEFAULT_WS_PORT)]
    pub ws_port: u16,

    /// Base interval of the background expiry sweep, in milliseconds.
    #[arg(long, env = "POLYKV_SWEEP_INTERVAL_MS", default_value_t = 100)]
    pub sweep_interval_ms: u64,

    /// Log level (trace, debug, info, warn, error). Overrides RUST_LOG.
    #[arg(long, env = "POLYKV_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Don't start the HTTP gateway.
    #[arg(long)]
    pub no_http: bool,

    /// Don't start the WebSocket gateway.
    #[arg(long)]
    pub no_websocket: bool,
}

/// Resolved server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub resp_port: u16,
    /// `None` disables the HTTP gateway
    pub http_port: Option<u16>,
    /// `None` disables the WebSocket gateway
    pub ws_port: Option<u16>,
    pub sweep_interval: Duration,
    pub log_level: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            resp_port: DEFAULT_RESP_PORT,
            http_port: Some(DEFAULT_HTTP_PORT),
            ws_port: Some(DEFAULT_WS_PORT),
            sweep_interval: Duration::from_millis(100),
            log_level: None,
        }
    }
}

impl ServerConfig {
    pub fn resp_address(&self) -> String {
        format!("{}:{}", self.host, self.resp_port)
    }

    pub fn http_address(&self) -> Option<String> {
        self.http_port.map(|port| format!("{}:{}", self.host, port))
    }

    pub fn ws_address(&self) -> Option<String> {
        self.ws_port.map(|port| format!("{}:{}", self.host, port))
    }
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            host: cli.host,
            resp_port: cli.resp_port,
            http_port: (!cli.no_http).then_some(cli.http_port),
            ws_port: (!cli.no_websocket).then_some(cli.ws_port),
            sweep_interval: Duration::from_millis(cli.sweep_interval_ms.max(1)),
            log_level: cli.log_level,
        }
    }
}
