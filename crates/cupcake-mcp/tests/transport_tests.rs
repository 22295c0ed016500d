//! Gatekeeper and MCP transport tests through the full router.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use futures::StreamExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use cupcake_mcp::config::Config;
use cupcake_mcp::models::Record;
use cupcake_mcp::server::McpServer;
use cupcake_mcp::server::oauth::clock::ManualClock;
use cupcake_mcp::server::oauth::types::AccessToken;
use cupcake_mcp::{JsonRecordStore, OAuthBroker};

const ISSUER: &str = "https://cupcake.test";
const TOKEN: &str = "mcp_0123456789abcdef0123456789abcdef";

fn build_app() -> (axum::Router, OAuthBroker, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let broker = OAuthBroker::with_clock(Config::for_testing(ISSUER), clock.clone());
    let records = JsonRecordStore::from_records(vec![
        Record {
            id: "1".into(),
            title: "Red Velvet Dozen".into(),
            text: "Twelve red velvet cupcakes".into(),
            ..Record::default()
        },
        Record {
            id: "2".into(),
            title: "Lemon Box".into(),
            text: "Six lemon cupcakes".into(),
            ..Record::default()
        },
    ]);
    let router = McpServer::with_broker(Arc::new(records), broker.clone()).into_router();
    (router, broker, clock)
}

async fn grant_token(broker: &OAuthBroker, lifetime: i64) {
    let expires_at = broker.store().now() + lifetime;
    broker
        .store()
        .insert_access_token(AccessToken::new(TOKEN.to_string(), "c1", vec!["mcp".into()], expires_at))
        .await;
}

fn sse_request(authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::get("/sse");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

fn rpc_request(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn sse_field<'a>(frame: &'a str, field: &str) -> Option<&'a str> {
    let prefix = format!("{field}: ");
    frame.lines().find_map(|line| line.strip_prefix(prefix.as_str()))
}

#[tokio::test]
async fn test_sse_without_credentials() {
    let (app, _, _) = build_app();
    let response = app.oneshot(sse_request(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[header::WWW_AUTHENTICATE],
        format!(r#"Bearer resource_metadata="{ISSUER}/.well-known/oauth-protected-resource""#).as_str()
    );
    assert_eq!(body_string(response).await, "Unauthorized: OAuth token required");
}

#[tokio::test]
async fn test_sse_with_malformed_credentials() {
    let (app, _, _) = build_app();
    for value in ["Bearer", "Bearer ", "Basic dXNlcjpwYXNz", "bearer mcp_abc"] {
        let response = app.clone().oneshot(sse_request(Some(value))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "header {value:?}");
        assert_eq!(body_string(response).await, "Unauthorized: Invalid token format");
    }
}

#[tokio::test]
async fn test_sse_with_unknown_token() {
    let (app, _, _) = build_app();
    let response = app.oneshot(sse_request(Some("Bearer mcp_forged"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response.headers()[header::WWW_AUTHENTICATE].to_str().unwrap().to_string();
    assert!(challenge.starts_with(r#"Bearer error="invalid_token""#));
    assert!(challenge.contains("resource_metadata="));
    assert_eq!(body_string(response).await, "Unauthorized: Invalid token");
}

#[tokio::test]
async fn test_sse_with_expired_token() {
    let (app, broker, clock) = build_app();
    grant_token(&broker, 60).await;
    clock.advance(61);

    let response = app.oneshot(sse_request(Some(&format!("Bearer {TOKEN}")))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(broker.store().access_token_count().await, 0);
}

#[tokio::test]
async fn test_public_paths_ignore_credentials() {
    let (app, _, _) = build_app();
    let paths = [
        ("/.well-known/oauth-protected-resource", StatusCode::OK),
        ("/.well-known/oauth-authorization-server", StatusCode::OK),
        ("/.well-known/mcp/manifest.json", StatusCode::OK),
        // Passes the gate, then fails on its missing parameters.
        ("/oauth/callback", StatusCode::BAD_REQUEST),
        ("/health", StatusCode::OK),
        ("/", StatusCode::OK),
    ];

    for (uri, expected) in paths {
        for authorization in [None, Some("Basic x"), Some("Bearer mcp_bogus")] {
            let mut builder = Request::get(uri);
            if let Some(value) = authorization {
                builder = builder.header(header::AUTHORIZATION, value);
            }
            let response = app.clone().oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
            assert_eq!(response.status(), expected, "{uri} with {authorization:?}");
            assert!(
                !response.headers().contains_key(header::WWW_AUTHENTICATE),
                "{uri} with {authorization:?}"
            );
        }
    }
}

#[tokio::test]
async fn test_mcp_and_message_require_token() {
    let (app, _, _) = build_app();
    let ping = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});

    let response = app.clone().oneshot(rpc_request("/mcp", None, &ping)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

    let response = app.clone().oneshot(rpc_request("/message?sessionId=abc", None, &ping)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.oneshot(rpc_request("/mcp", Some("mcp_forged"), &ping)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_mcp_tools_flow() {
    let (app, broker, _) = build_app();
    grant_token(&broker, 3600).await;

    let init = json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {"protocolVersion": "2024-11-05"}});
    let response = app.clone().oneshot(rpc_request("/mcp", Some(TOKEN), &init)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["result"]["serverInfo"]["name"], "cupcake-mcp");

    let initialized = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    let response = app.clone().oneshot(rpc_request("/mcp", Some(TOKEN), &initialized)).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let list = json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"});
    let response = app.clone().oneshot(rpc_request("/mcp", Some(TOKEN), &list)).await.unwrap();
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    let names: Vec<&str> = body["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["search", "fetch"]);

    let search = json!({
        "jsonrpc": "2.0", "id": 3, "method": "tools/call",
        "params": {"name": "search", "arguments": {"query": "Velvet"}}
    });
    let response = app.clone().oneshot(rpc_request("/mcp", Some(TOKEN), &search)).await.unwrap();
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    let page: Value = serde_json::from_str(body["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(page["results"].as_array().unwrap().len(), 1);
    assert_eq!(page["results"][0]["id"], "1");

    let unknown = json!({"jsonrpc": "2.0", "id": 4, "method": "resources/list"});
    let response = app.oneshot(rpc_request("/mcp", Some(TOKEN), &unknown)).await.unwrap();
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"]["code"], -32601);
}

#[tokio::test]
async fn test_mcp_rejects_malformed_json() {
    let (app, broker, _) = build_app();
    grant_token(&broker, 3600).await;

    let request = Request::post("/mcp")
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"]["code"], -32700);
}

#[tokio::test]
async fn test_message_unknown_session() {
    let (app, broker, _) = build_app();
    grant_token(&broker, 3600).await;

    let ping = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});
    let response = app.clone().oneshot(rpc_request("/message?sessionId=nope", Some(TOKEN), &ping)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(rpc_request("/message", Some(TOKEN), &ping)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sse_session_round_trip() {
    let (app, broker, _) = build_app();
    grant_token(&broker, 3600).await;

    let response = app.clone().oneshot(sse_request(Some(&format!("Bearer {TOKEN}")))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let mut frames = response.into_body().into_data_stream();
    let first = tokio::time::timeout(Duration::from_secs(5), frames.next()).await.unwrap().unwrap().unwrap();
    let first = String::from_utf8(first.to_vec()).unwrap();
    assert_eq!(sse_field(&first, "event"), Some("endpoint"));
    let endpoint = sse_field(&first, "data").unwrap().to_string();
    assert!(endpoint.starts_with("/message?sessionId="));

    let fetch = json!({
        "jsonrpc": "2.0", "id": 7, "method": "tools/call",
        "params": {"name": "fetch", "arguments": {"id": "2"}}
    });
    let response = app.oneshot(rpc_request(&endpoint, Some(TOKEN), &fetch)).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let next = tokio::time::timeout(Duration::from_secs(5), frames.next()).await.unwrap().unwrap().unwrap();
    let next = String::from_utf8(next.to_vec()).unwrap();
    assert_eq!(sse_field(&next, "event"), Some("message"));
    let message: Value = serde_json::from_str(sse_field(&next, "data").unwrap()).unwrap();
    assert_eq!(message["id"], 7);
    let record: Value = serde_json::from_str(message["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(record["title"], "Lemon Box");
}
