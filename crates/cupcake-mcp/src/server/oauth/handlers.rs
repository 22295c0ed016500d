//! OAuth 2.0 endpoint handlers.
//!
//! Implements:
//! - RFC 9728: OAuth Protected Resource Metadata
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 7591: Dynamic Client Registration
//! - RFC 7636: PKCE (S256)
//! - RFC 6749: Authorization Code Grant
//! - RFC 7009: Token Revocation
//!
//! plus the callback that bridges the external authorization server back
//! into this server's own code namespace.

use std::sync::Arc;

use axum::{
    Form, Json,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::pkce;
use super::provider::OAuthProvider;
use super::store::OAuthStore;
use super::types::{AuthorizationParams, ClientDescriptor, RefreshToken, TokenResponse};
use crate::error::{OAuthError, OAuthResult};
use crate::server::transport::HttpState;

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidClient(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        (
            status,
            Json(serde_json::json!({
                "error": self.error_code(),
                "error_description": self.description()
            })),
        )
            .into_response()
    }
}

// ─── RFC 9728: Protected Resource Metadata ───────────────────────────────────

/// `GET /.well-known/oauth-protected-resource`
///
/// Tells clients where to find the authorization server for this resource.
pub async fn handle_protected_resource(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let issuer = &state.config.issuer_url;
    Json(serde_json::json!({
        "resource": issuer,
        "authorization_servers": [issuer],
        "bearer_methods_supported": ["header"],
        "scopes_supported": [state.config.scope]
    }))
}

// ─── RFC 8414: Authorization Server Metadata ─────────────────────────────────

/// `GET /.well-known/oauth-authorization-server`
///
/// This server is the issuer; the external server is an implementation detail.
pub async fn handle_auth_server_metadata(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let config = &state.config;
    Json(serde_json::json!({
        "issuer": config.issuer_url,
        "authorization_endpoint": config.issuer_endpoint("/authorize"),
        "token_endpoint": config.issuer_endpoint("/token"),
        "registration_endpoint": config.issuer_endpoint("/register"),
        "revocation_endpoint": config.issuer_endpoint("/revoke"),
        "jwks_uri": config.issuer_endpoint("/jwks.json"),
        "scopes_supported": [config.scope],
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code"],
        "token_endpoint_auth_methods_supported": ["client_secret_post", "none"],
        "code_challenge_methods_supported": ["S256"]
    }))
}

/// `GET /.well-known/mcp/manifest.json`
pub async fn handle_manifest(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let config = &state.config;
    Json(serde_json::json!({
        "schemaVersion": "2024-11-05",
        "nameForHuman": "Cupcake MCP",
        "nameForModel": "cupcake_mcp",
        "descriptionForHuman": "Search and retrieve cupcake orders with OAuth authentication",
        "descriptionForModel": "Search and retrieve cupcake orders. Requires OAuth authentication.",
        "auth": {
            "type": "oauth",
            "authorization_server": config.issuer_url,
            "client_registration": config.issuer_endpoint("/register")
        },
        "api": {
            "type": "openapi",
            "url": config.issuer_endpoint("/openapi.json")
        },
        "endpoints": ["/sse"]
    }))
}

// ─── RFC 7591: Dynamic Client Registration ───────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub client_name: Option<String>,
    pub redirect_uris: Option<Vec<String>>,
    pub scope: Option<String>,
    #[serde(default)]
    pub grant_types: Vec<String>,
    #[serde(default)]
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: Option<String>,
}

/// `POST /register`
///
/// Register a new OAuth client dynamically.
pub async fn handle_register(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<RegisterRequest>,
) -> Response {
    match register(&state, req).await {
        Ok(client) => {
            tracing::info!(client_id = %client.client_id, "Registered OAuth client");
            (
                StatusCode::CREATED,
                Json(serde_json::json!({
                    "client_id": client.client_id,
                    "client_secret": client.client_secret,
                    "client_id_issued_at": client.client_id_issued_at,
                    "client_name": client.client_name,
                    "redirect_uris": client.redirect_uris,
                    "scope": client.scopes.join(" "),
                    "grant_types": ["authorization_code"],
                    "response_types": ["code"],
                    "token_endpoint_auth_method": client.token_endpoint_auth_method
                })),
            )
                .into_response()
        }
        Err(err) => {
            tracing::warn!(error = %err, "Rejected client registration");
            err.into_response()
        }
    }
}

async fn register(state: &HttpState, req: RegisterRequest) -> OAuthResult<ClientDescriptor> {
    let metadata_error = |msg: &str| OAuthError::InvalidClientMetadata(msg.to_string());

    let redirect_uris = req.redirect_uris.unwrap_or_default();
    if redirect_uris.is_empty() {
        return Err(metadata_error("redirect_uris is required"));
    }
    if redirect_uris.iter().any(|u| url::Url::parse(u).is_err()) {
        return Err(metadata_error("redirect_uris must be absolute URLs"));
    }

    let scopes = match req.scope.as_deref() {
        Some(scope) => split_scope(scope),
        None => vec![state.config.scope.clone()],
    };
    if let Some(bad) = scopes.iter().find(|s| **s != state.config.scope) {
        return Err(OAuthError::InvalidClientMetadata(format!("scope {bad:?} is not supported")));
    }
    if req.grant_types.iter().any(|g| g != "authorization_code" && g != "refresh_token") {
        return Err(metadata_error("grant_types must be authorization_code"));
    }
    if req.response_types.iter().any(|r| r != "code") {
        return Err(metadata_error("response_types must be code"));
    }

    let mut client =
        ClientDescriptor::new(uuid::Uuid::new_v4().simple().to_string(), redirect_uris, scopes);
    client.client_id_issued_at = state.oauth.store().now();
    if let Some(name) = req.client_name {
        client = client.with_name(name);
    }
    client = match req.token_endpoint_auth_method.as_deref() {
        None | Some("client_secret_post") => client.with_secret(OAuthStore::generate_state()),
        Some("none") => client,
        Some(other) => {
            return Err(OAuthError::InvalidClientMetadata(format!(
                "token_endpoint_auth_method {other:?} is not supported"
            )));
        }
    };

    state.oauth.register_client(client.clone()).await?;
    Ok(client)
}

// ─── Authorization Endpoint ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub response_type: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub scope: Option<String>,
}

/// `GET /authorize`
///
/// Validates the request against the registered client and forwards the
/// user to the external authorization server.
pub async fn handle_authorize(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<AuthorizeQuery>,
) -> Response {
    match authorize(&state, query).await {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "Rejected authorization request");
            err.into_response()
        }
    }
}

async fn authorize(state: &HttpState, query: AuthorizeQuery) -> OAuthResult<String> {
    let client_id = query
        .client_id
        .ok_or_else(|| OAuthError::invalid_request("Missing client_id"))?;
    let client = state
        .oauth
        .get_client(&client_id)
        .await
        .ok_or_else(|| OAuthError::invalid_request("Unknown client_id"))?;

    // Never redirect anywhere before the redirect URI is known to be registered.
    let (redirect_uri, explicit) = match query.redirect_uri {
        Some(uri) if client.has_redirect_uri(&uri) => (uri, true),
        Some(_) => return Err(OAuthError::invalid_request("redirect_uri not registered for this client")),
        None if client.redirect_uris.len() == 1 => (client.redirect_uris[0].clone(), false),
        None => return Err(OAuthError::invalid_request("redirect_uri is required")),
    };

    if query.response_type.as_deref() != Some("code") {
        return Err(OAuthError::invalid_request("response_type must be 'code'"));
    }
    // Empty values count as absent.
    let oauth_state = query.state.filter(|s| !s.is_empty());
    let code_challenge = query.code_challenge.filter(|c| !c.is_empty());
    if code_challenge.is_some() && query.code_challenge_method.as_deref().unwrap_or("S256") != "S256" {
        return Err(OAuthError::invalid_request("code_challenge_method must be 'S256'"));
    }

    let scopes = query.scope.as_deref().map(split_scope).unwrap_or_default();
    if let Some(bad) = client.unregistered_scope(&scopes) {
        return Err(OAuthError::InvalidScope(format!("scope {bad:?} not registered for this client")));
    }

    let params = AuthorizationParams {
        state: oauth_state,
        scopes,
        code_challenge,
        redirect_uri,
        redirect_uri_provided_explicitly: explicit,
    };
    state.oauth.authorize(&client, params).await
}

// ─── External Authorization Server Callback ──────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// `GET /oauth/callback`
///
/// Resolves the state, mints a local code and redirects to the client.
pub async fn handle_callback(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let (Some(code), Some(oauth_state)) = (query.code.as_deref(), query.state.as_deref()) else {
        return (StatusCode::BAD_REQUEST, "Missing code or state parameter").into_response();
    };

    match state.oauth.handle_callback(code, oauth_state).await {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(OAuthError::InvalidState) => {
            tracing::warn!("OAuth callback with unknown state");
            (StatusCode::BAD_REQUEST, "Invalid state parameter").into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "OAuth callback error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "server_error",
                    "error_description": "Unexpected error during OAuth callback"
                })),
            )
                .into_response()
        }
    }
}

// ─── Token Endpoint ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

/// `POST /token`
///
/// Exchange an authorization code for an access token.
pub async fn handle_token(State(state): State<Arc<HttpState>>, Form(form): Form<TokenRequest>) -> Response {
    let result = match form.grant_type.as_str() {
        "authorization_code" => authorization_code_grant(&state, &form).await,
        "refresh_token" => refresh_token_grant(&state, &form).await,
        other => Err(OAuthError::UnsupportedGrantType(format!("grant_type {other:?} is not supported"))),
    };

    match result {
        Ok(token) => token_success(&token),
        Err(err) => {
            tracing::warn!(grant_type = %form.grant_type, error = %err, "Token request rejected");
            err.into_response()
        }
    }
}

async fn authenticate_client(state: &HttpState, form: &TokenRequest) -> OAuthResult<ClientDescriptor> {
    let client_id = form
        .client_id
        .as_deref()
        .ok_or_else(|| OAuthError::invalid_request("Missing client_id"))?;
    let client = state
        .oauth
        .get_client(client_id)
        .await
        .ok_or_else(|| OAuthError::invalid_client("Unknown client"))?;

    if !client_secret_matches(&client, form.client_secret.as_deref()) {
        return Err(OAuthError::invalid_client("Invalid client credentials"));
    }
    Ok(client)
}

/// Public clients have no secret to check.
fn client_secret_matches(client: &ClientDescriptor, presented: Option<&str>) -> bool {
    match (client.client_secret.as_deref(), presented) {
        (None, _) => true,
        (Some(expected), Some(presented)) => pkce::digests_match(presented, expected),
        (Some(_), None) => false,
    }
}

async fn authorization_code_grant(state: &HttpState, form: &TokenRequest) -> OAuthResult<TokenResponse> {
    let code = form
        .code
        .as_deref()
        .ok_or_else(|| OAuthError::invalid_request("Missing code"))?;
    let client = authenticate_client(state, form).await?;

    let auth_code = state
        .oauth
        .load_authorization_code(&client, code)
        .await
        .ok_or_else(|| OAuthError::invalid_grant("Invalid or expired authorization code"))?;

    if auth_code.redirect_uri_provided_explicitly
        && form.redirect_uri.as_deref() != Some(auth_code.redirect_uri.as_str())
    {
        return Err(OAuthError::invalid_request("redirect_uri did not match the authorization request"));
    }

    if let Some(ref challenge) = auth_code.code_challenge {
        let verifier = form
            .code_verifier
            .as_deref()
            .ok_or_else(|| OAuthError::invalid_request("Missing code_verifier"))?;
        if !pkce::verify_s256(verifier, challenge) {
            return Err(OAuthError::invalid_grant("PKCE verification failed"));
        }
    }

    state.oauth.exchange_authorization_code(&client, &auth_code).await
}

async fn refresh_token_grant(state: &HttpState, form: &TokenRequest) -> OAuthResult<TokenResponse> {
    let refresh = form
        .refresh_token
        .as_deref()
        .ok_or_else(|| OAuthError::invalid_request("Missing refresh_token"))?;
    let client = authenticate_client(state, form).await?;

    // No refresh tokens are ever issued, so the presented one goes straight to
    // the exchange, which refuses the grant.
    let token = match state.oauth.load_refresh_token(&client, refresh).await {
        Some(token) => token,
        None => RefreshToken { token: refresh.to_string(), client_id: client.client_id.clone(), scopes: Vec::new() },
    };
    let scopes = form.scope.as_deref().map(split_scope).unwrap_or_default();
    state.oauth.exchange_refresh_token(&client, &token, &scopes).await
}

/// Build a token response with required OAuth 2.0 cache headers (RFC 6749 §5.1).
fn token_success(token: &TokenResponse) -> Response {
    let mut response = Json(token).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

// ─── RFC 7009: Token Revocation ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    pub token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// `POST /revoke`
///
/// The caller must authenticate as a registered client. Tokens that are
/// unknown or belong to another client are left alone but still answered
/// with 200, as RFC 7009 requires.
pub async fn handle_revoke(State(state): State<Arc<HttpState>>, Form(form): Form<RevokeRequest>) -> Response {
    let Some(token) = form.token.as_deref() else {
        return OAuthError::invalid_request("Missing token").into_response();
    };

    let client = match form.client_id.as_deref() {
        Some(client_id) => state.oauth.get_client(client_id).await,
        None => None,
    };
    let Some(client) = client.filter(|c| client_secret_matches(c, form.client_secret.as_deref())) else {
        return OAuthError::invalid_client("Invalid client credentials").into_response();
    };

    match state.oauth.load_access_token(token).await {
        Some(access) if access.client_id == client.client_id => state.oauth.revoke_token(token).await,
        Some(_) => tracing::warn!(client_id = %client.client_id, "Refused to revoke another client's token"),
        None => {}
    }
    Json(serde_json::json!({})).into_response()
}

fn split_scope(scope: &str) -> Vec<String> {
    scope.split_whitespace().map(str::to_string).collect()
}
