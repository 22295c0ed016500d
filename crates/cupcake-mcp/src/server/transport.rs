//! HTTP transport: OAuth endpoints plus the MCP streamable-HTTP and legacy
//! SSE transports.
//!
//! `/sse` is hard-gated by the gatekeeper middleware. `/message` and `/mcp`
//! check the bearer token themselves before touching the request body.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::oauth::{OAuthBroker, handlers, middleware as gate};
use super::rpc::{self, JsonRpcRequest, JsonRpcResponse};
use super::session::{Session, SessionEvent, SessionManager};
use crate::config::{Config, oauth};
use crate::tools::{McpTool, ToolContext};

/// Query parameters for the message endpoint.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// Shared state for HTTP handlers.
pub struct HttpState {
    pub tools: Vec<Box<dyn McpTool>>,
    pub ctx: ToolContext,
    pub sessions: Arc<SessionManager>,
    pub config: Config,
    pub oauth: Arc<OAuthBroker>,
}

impl std::fmt::Debug for HttpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpState")
            .field("tools", &self.tools.len())
            .field("issuer_url", &self.config.issuer_url)
            .finish_non_exhaustive()
    }
}

/// Create the HTTP router.
pub fn create_router(tools: Vec<Box<dyn McpTool>>, ctx: ToolContext, oauth: Arc<OAuthBroker>) -> Router {
    let sessions = Arc::new(SessionManager::new());
    Arc::clone(&sessions).start_cleanup_task();

    let state = Arc::new(HttpState { tools, ctx, sessions, config: oauth.config().clone(), oauth });
    router_with_state(state)
}

/// Build the router around an existing state.
pub fn router_with_state(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        // OAuth discovery and broker endpoints
        .route(oauth::PROTECTED_RESOURCE_PATH, get(handlers::handle_protected_resource))
        .route(oauth::AUTH_SERVER_METADATA_PATH, get(handlers::handle_auth_server_metadata))
        .route(oauth::MANIFEST_PATH, get(handlers::handle_manifest))
        .route("/register", post(handlers::handle_register))
        .route("/authorize", get(handlers::handle_authorize))
        .route("/token", post(handlers::handle_token))
        .route("/revoke", post(handlers::handle_revoke))
        .route(oauth::CALLBACK_PATH, get(handlers::handle_callback))
        // Streamable HTTP transport
        .route("/mcp", post(handle_mcp_post))
        // Legacy SSE transport
        .route("/sse", get(handle_sse))
        .route("/message", post(handle_message_post))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), gate::gatekeeper))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "cupcake-mcp",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn parse_request(body: &[u8]) -> Result<JsonRpcRequest, Response> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "Rejecting malformed JSON-RPC body");
        let error = JsonRpcResponse::error(None, rpc::PARSE_ERROR, format!("Parse error: {e}"));
        (StatusCode::BAD_REQUEST, Json(error)).into_response()
    })
}

/// `POST /mcp`: one JSON-RPC exchange, response in the body.
async fn handle_mcp_post(State(state): State<Arc<HttpState>>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(response) = gate::require_bearer(&state, "/mcp", &headers).await {
        return response;
    }
    let req = match parse_request(&body) {
        Ok(req) => req,
        Err(response) => return response,
    };

    match rpc::handle_request(req, &state.tools, &state.ctx).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// `POST /message?sessionId=`: accept a request and answer on the session's
/// SSE stream.
async fn handle_message_post(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<MessageQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(response) = gate::require_bearer(&state, "/message", &headers).await {
        return response;
    }

    let Some(session_id) = query.session_id else {
        return (StatusCode::BAD_REQUEST, "Missing sessionId").into_response();
    };
    let Some(session) = state.sessions.get_session(&session_id).await else {
        tracing::debug!(session_id = %session_id, "Message for unknown session");
        return (StatusCode::NOT_FOUND, "Unknown session").into_response();
    };

    let req = match parse_request(&body) {
        Ok(req) => req,
        Err(response) => return response,
    };

    tokio::spawn(async move {
        let Some(response) = rpc::handle_request(req, &state.tools, &state.ctx).await else {
            session.touch().await;
            return;
        };
        match serde_json::to_string(&response) {
            Ok(data) => {
                session.push_event("message", data).await;
            }
            Err(e) => tracing::error!(session_id = %session.id, error = %e, "Failed to encode response"),
        }
    });

    StatusCode::ACCEPTED.into_response()
}

/// `GET /sse`: open a session and announce its message endpoint.
async fn handle_sse(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let session = state.sessions.create_session().await;
    tracing::info!(session_id = %session.id, "New SSE connection");

    let stream = session_stream(session, Arc::clone(&state.sessions));

    (
        [("X-Accel-Buffering", "no"), ("Cache-Control", "no-cache, no-store, must-revalidate")],
        Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping")),
    )
}

/// Removes the session once its stream is dropped.
struct SessionGuard {
    sessions: Arc<SessionManager>,
    id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let sessions = Arc::clone(&self.sessions);
        let id = std::mem::take(&mut self.id);
        runtime.spawn(async move {
            sessions.remove_session(&id).await;
        });
    }
}

/// The endpoint event followed by every event pushed to the session.
fn session_stream(
    session: Arc<Session>,
    sessions: Arc<SessionManager>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let endpoint = session.next_event("endpoint", format!("/message?sessionId={}", session.id));
    let receiver = session.subscribe();
    let guard = SessionGuard { sessions, id: session.id.clone() };

    let live = BroadcastStream::new(receiver).filter_map(|result: Result<SessionEvent, _>| async move {
        match result {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::debug!(error = %e, "SSE subscriber lagged");
                None
            }
        }
    });

    stream::iter([endpoint]).chain(live).map(move |event| {
        let _ = &guard;
        Ok(event.to_sse_event())
    })
}
