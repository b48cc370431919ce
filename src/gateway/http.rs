//! HTTP gateway: `POST /{command}` with a JSON body.
//!
//! ```text
//! POST /hset   {"key": "user:1", "field": "name", "value": "ada"}
//! 200          {"status": "success", "data": 1}
//!
//! POST /hkeys  {"key": "greeting"}
//! 400          {"status": "error", "data": "WRONGTYPE Operation against ..."}
//! ```

use crate::commands::{CommandHandler, ErrorKind, Reply};
use crate::gateway::json::{command_from_body, reply_to_json, ApiResponse};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// A request body that could not be turned into a command.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("request body must be a JSON object")]
    NotAnObject,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(self.to_string())),
        )
            .into_response()
    }
}

/// Builds the HTTP router around a command handler.
pub fn router(handler: CommandHandler) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/:command", post(run_command))
        .layer(TraceLayer::new_for_http())
        .with_state(handler)
}

/// Serves the HTTP gateway on an already bound listener.
pub async fn serve(listener: TcpListener, handler: CommandHandler) -> std::io::Result<()> {
    axum::serve(listener, router(handler)).await
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn run_command(
    State(handler): State<CommandHandler>,
    Path(command): Path<String>,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let body = parse_body(&body)?;

    let reply = match command_from_body(&command, &body) {
        Ok(cmd) => handler.execute(cmd),
        Err(err) => Reply::Error(err),
    };

    Ok(render(reply))
}

/// An empty body is an empty object.
fn parse_body(raw: &[u8]) -> Result<Map<String, Value>, GatewayError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice(raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(GatewayError::NotAnObject),
    }
}

fn render(reply: Reply) -> Response {
    match reply {
        Reply::Error(err) => {
            let status = match err.kind() {
                ErrorKind::UnknownCommand => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            };
            debug!(status = %status, error = %err, "command failed");
            (status, Json(ApiResponse::error(err.to_string()))).into_response()
        }
        reply => Json(ApiResponse::success(reply_to_json(&reply))).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageEngine;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        router(CommandHandler::new(Arc::new(StorageEngine::new())))
    }

    async fn post_json(app: &Router, path: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], br#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_set_and_exists() {
        let app = app();

        let (status, body) = post_json(&app, "/set", r#"{"key":"k","value":"v"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success", "data": "OK"}));

        let (_, body) = post_json(&app, "/exists", r#"{"keys":["k","nope","k"]}"#).await;
        assert_eq!(body["data"], json!(2));
    }

    #[tokio::test]
    async fn test_hash_flow() {
        let app = app();

        let (_, body) = post_json(
            &app,
            "/HSET",
            r#"{"key":"user:1","field":"name","value":"ada"}"#,
        )
        .await;
        assert_eq!(body["data"], json!(1));

        let (_, body) = post_json(&app, "/hkeys", r#"{"key":"user:1"}"#).await;
        assert_eq!(body["data"], json!(["name"]));

        let (_, body) = post_json(&app, "/hget", r#"{"key":"user:1","field":"age"}"#).await;
        assert_eq!(body, json!({"status": "success", "data": null}));

        let (_, body) = post_json(&app, "/hkeys", r#"{"key":"missing"}"#).await;
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn test_set_with_ex_option() {
        let app = app();

        let (status, _) =
            post_json(&app, "/set", r#"{"key":"k","value":"v","ex":100}"#).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = post_json(&app, "/ttl", r#"{"key":"k"}"#).await;
        assert_eq!(body["data"], json!(100));

        let (status, body) =
            post_json(&app, "/set", r#"{"key":"k","value":"v","ex":-1}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], json!("error"));
    }

    #[tokio::test]
    async fn test_error_status_codes() {
        let app = app();

        let (status, body) = post_json(&app, "/lpush", r#"{"key":"l"}"#).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body,
            json!({"status": "error", "data": "ERR unknown command 'LPUSH'"})
        );

        let (status, _) = post_json(&app, "/frob", r#"{"key":"k","ex":1}"#).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        post_json(&app, "/set", r#"{"key":"s","value":"v"}"#).await;
        let (status, body) = post_json(&app, "/hkeys", r#"{"key":"s"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["data"].as_str().unwrap().starts_with("WRONGTYPE"));

        let (status, _) = post_json(&app, "/get", "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let app = app();

        let (status, body) = post_json(&app, "/get", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], json!("error"));

        let (status, _) = post_json(&app, "/get", "[1, 2]").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_empty_body() {
        let (status, body) = post_json(&app(), "/ping", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!("PONG"));
    }
}
