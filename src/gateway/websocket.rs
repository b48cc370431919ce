//! WebSocket gateway.
//!
//! Clients upgrade on `GET /` and then send one command line per message,
//! e.g. `HSET user:1 name "Ada Lovelace"`. Each message gets exactly one
//! text reply holding the JSON rendering of the result.
//!
//! Replies are always JSON, so an empty HKEYS comes back as `[]` rather than
//! the RESP-style `*0` a Redis-minded client might expect. Nil is `null`.

use crate::commands::{Command, CommandError, CommandHandler, Reply};
use crate::gateway::json::reply_to_json;
use crate::protocol::split_command_line;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Builds the WebSocket router around a command handler.
pub fn router(handler: CommandHandler) -> Router {
    Router::new()
        .route("/", get(upgrade))
        .layer(TraceLayer::new_for_http())
        .with_state(handler)
}

/// Serves the WebSocket gateway on an already bound listener.
pub async fn serve(listener: TcpListener, handler: CommandHandler) -> std::io::Result<()> {
    axum::serve(listener, router(handler)).await
}

async fn upgrade(ws: WebSocketUpgrade, State(handler): State<CommandHandler>) -> Response {
    ws.on_upgrade(move |socket| session(socket, handler))
}

async fn session(mut socket: WebSocket, handler: CommandHandler) {
    info!("WebSocket session opened");

    while let Some(message) = socket.recv().await {
        let line = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(data)) => String::from_utf8_lossy(&data).into_owned(),
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => break,
            Err(e) => {
                debug!(error = %e, "WebSocket receive failed");
                break;
            }
        };

        let reply = handle_text(&handler, &line);
        if let Err(e) = socket.send(Message::Text(reply)).await {
            debug!(error = %e, "WebSocket send failed");
            break;
        }
    }

    info!("WebSocket session closed");
}

/// Runs one command line and returns the JSON text to send back.
pub fn handle_text(handler: &CommandHandler, line: &str) -> String {
    let reply = match parse_line(line) {
        Ok(command) => handler.execute(command),
        Err(err) => Reply::Error(err),
    };
    reply_to_json(&reply).to_string()
}

fn parse_line(line: &str) -> Result<Command, CommandError> {
    let tokens = split_command_line(line).map_err(|e| CommandError::invalid(e.to_string()))?;
    Command::from_tokens(tokens.into_iter().map(Bytes::from).collect())
}
