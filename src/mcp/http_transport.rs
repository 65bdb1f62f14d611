//! MCP Streamable-HTTP Transport
//!
//! Serves JSON-RPC messages posted to `/mcp`. Each POST carries one message
//! and receives one JSON response; notifications are acknowledged with
//! `202 Accepted` and no body.
//!
//! Responses are never streamed. An `initialize` call is answered with a
//! fresh `Mcp-Session-Id` header, and later requests may echo it back; the
//! server keeps no session state, so the id is informational only.

use crate::mcp::protocol::McpRequest;
use crate::mcp::server::McpServer;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

/// Session header defined by the streamable-HTTP transport
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Build the HTTP application
pub fn router(server: Arc<McpServer>) -> Router {
    Router::new()
        .route("/mcp", post(mcp_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

/// Serve until the listener fails
pub async fn serve(server: Arc<McpServer>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Serving MCP over streamable-http on http://{}/mcp", addr);

    axum::serve(listener, router(server))
        .await
        .context("HTTP transport error")?;

    Ok(())
}

async fn mcp_handler(State(server): State<Arc<McpServer>>, headers: HeaderMap, body: String) -> Response {
    let is_initialize = serde_json::from_str::<McpRequest>(&body)
        .map(|request| request.method == "initialize")
        .unwrap_or(false);

    let Some(reply) = server.handle_text(&body).await else {
        return StatusCode::ACCEPTED.into_response();
    };

    let session = if is_initialize {
        HeaderValue::from_str(&Uuid::new_v4().to_string()).ok()
    } else {
        headers.get(SESSION_HEADER).cloned()
    };

    let mut response = Json(reply).into_response();
    if let Some(session) = session {
        response.headers_mut().insert(SESSION_HEADER, session);
    }
    response
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::registry::RegistryOptions;
    use crate::policy::{CommandFamily, PolicyConfig};
    use crate::tools::{ExecutorConfig, Gateway};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        let config = ExecutorConfig::default().binary(CommandFamily::Kubectl, "echo");
        let gateway = Arc::new(Gateway::new(Arc::new(PolicyConfig::default()), config));
        router(Arc::new(McpServer::new(gateway, RegistryOptions::default())))
    }

    fn post_json(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_initialize_assigns_session() {
        let response = app()
            .oneshot(post_json(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let session = response.headers().get(SESSION_HEADER).unwrap().to_str().unwrap().to_string();
        assert!(Uuid::parse_str(&session).is_ok());

        let body = body_json(response).await;
        assert_eq!(body["result"]["serverInfo"]["name"], "mcp-kubernetes");
    }

    #[tokio::test]
    async fn test_session_header_echoed() {
        let mut request = post_json(json!({"jsonrpc": "2.0", "id": 2, "method": "ping"}));
        request
            .headers_mut()
            .insert(SESSION_HEADER, HeaderValue::from_static("abc"));
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.headers().get(SESSION_HEADER).unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_notification_accepted() {
        let response = app()
            .oneshot(post_json(json!({"jsonrpc": "2.0", "method": "notifications/initialized"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_tool_call_over_http() {
        let response = app()
            .oneshot(post_json(json!({
                "jsonrpc": "2.0", "id": 3, "method": "tools/call",
                "params": {"name": "call_kubectl", "arguments": {"args": "get ns"}}
            })))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["result"]["content"][0]["text"], "get ns\n");
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .body(Body::from("{oops"))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32700);
    }
}
