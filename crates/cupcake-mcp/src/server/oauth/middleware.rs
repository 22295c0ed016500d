//! Bearer-token gatekeeper for protected paths.
//!
//! Every request is classified once, before it reaches a handler:
//! public discovery paths pass straight through, `/sse` requires a valid
//! bearer token, and anything else is left to its own handler.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::provider::OAuthProvider;
use super::types::AccessToken;
use crate::config::oauth;
use crate::error::{OAuthError, UnauthorizedReason};
use crate::server::transport::HttpState;

/// Paths reachable without any credential.
pub const PUBLIC_PATHS: &[&str] = &[
    oauth::PROTECTED_RESOURCE_PATH,
    oauth::AUTH_SERVER_METADATA_PATH,
    oauth::MANIFEST_PATH,
    oauth::CALLBACK_PATH,
];

/// Paths the gatekeeper itself hard-gates.
pub const PROTECTED_PATHS: &[&str] = &["/sse"];

/// How the gatekeeper treats a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    Public,
    Protected,
    Other,
}

#[must_use]
pub fn classify(path: &str) -> PathClass {
    if PUBLIC_PATHS.contains(&path) {
        PathClass::Public
    } else if PROTECTED_PATHS.contains(&path) {
        PathClass::Protected
    } else {
        PathClass::Other
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, UnauthorizedReason> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(UnauthorizedReason::MissingCredential)?;
    let value = value.to_str().map_err(|_| UnauthorizedReason::MalformedCredential)?;
    match value.strip_prefix("Bearer ").map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(UnauthorizedReason::MalformedCredential),
    }
}

/// Require a valid bearer token in `headers`.
pub async fn authenticate<P>(provider: &P, headers: &HeaderMap) -> Result<AccessToken, OAuthError>
where
    P: OAuthProvider + ?Sized,
{
    let token = bearer_token(headers).map_err(OAuthError::Unauthorized)?;
    provider
        .load_access_token(token)
        .await
        .ok_or(OAuthError::Unauthorized(UnauthorizedReason::InvalidToken))
}

/// 401 response carrying an RFC 9728 `WWW-Authenticate` challenge.
#[must_use]
pub fn challenge_response(resource_metadata_url: &str, reason: UnauthorizedReason) -> Response {
    let challenge = match reason {
        UnauthorizedReason::InvalidToken => {
            format!(r#"Bearer error="invalid_token", resource_metadata="{resource_metadata_url}""#)
        }
        UnauthorizedReason::MissingCredential | UnauthorizedReason::MalformedCredential => {
            format!(r#"Bearer resource_metadata="{resource_metadata_url}""#)
        }
    };

    let mut response = (StatusCode::UNAUTHORIZED, reason.message()).into_response();
    if let Ok(value) = HeaderValue::from_str(&challenge) {
        response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
    }
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

/// Authenticate `headers`, or build the response to send instead.
pub async fn require_bearer(state: &HttpState, path: &str, headers: &HeaderMap) -> Result<AccessToken, Response> {
    match authenticate(state.oauth.as_ref(), headers).await {
        Ok(token) => Ok(token),
        Err(OAuthError::Unauthorized(reason)) => {
            log_rejection(path, reason, headers);
            Err(challenge_response(&state.config.resource_metadata_url(), reason))
        }
        Err(other) => {
            tracing::error!(error = %other, "Unexpected authentication failure");
            Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

/// Axum middleware enforcing bearer authentication on protected paths.
pub async fn gatekeeper(State(state): State<Arc<HttpState>>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    tracing::debug!(method = %request.method(), path = %path, "Request");

    match classify(&path) {
        PathClass::Public => {
            tracing::debug!(path = %path, "Public endpoint accessed");
            next.run(request).await
        }
        PathClass::Protected => {
            let outcome = require_bearer(&state, &path, request.headers()).await;
            match outcome {
                Ok(token) => {
                    tracing::info!(
                        path = %path,
                        client_id = %token.client_id,
                        token = %token_prefix(&token.token),
                        "Protected endpoint accessed with valid token"
                    );
                    next.run(request).await
                }
                Err(response) => response,
            }
        }
        PathClass::Other => next.run(request).await,
    }
}

fn log_rejection(path: &str, reason: UnauthorizedReason, headers: &HeaderMap) {
    match reason {
        UnauthorizedReason::MissingCredential => {
            tracing::warn!(path = %path, "Protected endpoint accessed without authentication");
        }
        UnauthorizedReason::MalformedCredential => {
            let scheme = headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split_whitespace().next())
                .unwrap_or("");
            tracing::warn!(path = %path, scheme = %scheme, "Invalid Authorization header format");
        }
        UnauthorizedReason::InvalidToken => {
            let token = bearer_token(headers).unwrap_or("");
            tracing::warn!(path = %path, token = %token_prefix(token), "Invalid token provided");
        }
    }
}

/// First ten characters of a token, for logs.
pub(crate) fn token_prefix(token: &str) -> String {
    format!("{}...", token.chars().take(10).collect::<String>())
}
