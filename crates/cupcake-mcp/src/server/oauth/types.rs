//! OAuth 2.0 records held by the broker.

use serde::Serialize;

/// A dynamically registered OAuth client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDescriptor {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub client_name: Option<String>,
    pub redirect_uris: Vec<String>,
    pub scopes: Vec<String>,
    pub token_endpoint_auth_method: String,
    pub client_id_issued_at: i64,
}

impl ClientDescriptor {
    /// A public client (`token_endpoint_auth_method = none`) allowed the given scopes.
    #[must_use]
    pub fn new(client_id: impl Into<String>, redirect_uris: Vec<String>, scopes: Vec<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            client_name: None,
            redirect_uris,
            scopes,
            token_endpoint_auth_method: "none".to_string(),
            client_id_issued_at: 0,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    /// Require `client_secret_post` authentication with this secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self.token_endpoint_auth_method = "client_secret_post".to_string();
        self
    }

    #[must_use]
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == uri)
    }

    /// Returns the first requested scope this client was not registered for.
    #[must_use]
    pub fn unregistered_scope<'a>(&self, requested: &'a [String]) -> Option<&'a str> {
        requested
            .iter()
            .find(|s| !self.scopes.iter().any(|r| r == *s))
            .map(String::as_str)
    }
}

/// Parameters of an incoming authorization request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationParams {
    pub state: Option<String>,
    pub scopes: Vec<String>,
    pub code_challenge: Option<String>,
    pub redirect_uri: String,
    pub redirect_uri_provided_explicitly: bool,
}

impl AuthorizationParams {
    /// Parameters with an explicitly supplied redirect URI and nothing else.
    #[must_use]
    pub fn new(redirect_uri: impl Into<String>) -> Self {
        Self {
            redirect_uri: redirect_uri.into(),
            redirect_uri_provided_explicitly: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    #[must_use]
    pub fn with_code_challenge(mut self, challenge: impl Into<String>) -> Self {
        self.code_challenge = Some(challenge.into());
        self
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }
}

/// An authorization request waiting for the external server's callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    pub client_id: String,
    pub code_challenge: Option<String>,
    pub redirect_uri: String,
    pub redirect_uri_provided_explicitly: bool,
    pub created_at: i64,
}

impl PendingAuthorization {
    #[must_use]
    pub fn new(client_id: impl Into<String>, params: &AuthorizationParams, created_at: i64) -> Self {
        Self {
            client_id: client_id.into(),
            code_challenge: params.code_challenge.clone(),
            redirect_uri: params.redirect_uri.clone(),
            redirect_uri_provided_explicitly: params.redirect_uri_provided_explicitly,
            created_at,
        }
    }

    #[must_use]
    pub const fn is_stale(&self, now: i64, max_age: u64) -> bool {
        now - self.created_at > max_age as i64
    }
}

/// A single-use authorization code minted by the callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub redirect_uri_provided_explicitly: bool,
    pub scopes: Vec<String>,
    pub code_challenge: Option<String>,
    pub expires_at: i64,
}

impl AuthorizationCode {
    /// Mint a code for a resolved pending authorization.
    #[must_use]
    pub fn issue(
        code: String,
        pending: PendingAuthorization,
        scopes: Vec<String>,
        expires_at: i64,
    ) -> Self {
        Self {
            code,
            client_id: pending.client_id,
            redirect_uri: pending.redirect_uri,
            redirect_uri_provided_explicitly: pending.redirect_uri_provided_explicitly,
            scopes,
            code_challenge: pending.code_challenge,
            expires_at,
        }
    }

    /// Still valid at exactly `expires_at`.
    #[must_use]
    pub const fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

/// An opaque bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub expires_at: i64,
}

impl AccessToken {
    #[must_use]
    pub fn new(token: String, client_id: impl Into<String>, scopes: Vec<String>, expires_at: i64) -> Self {
        Self { token, client_id: client_id.into(), scopes, expires_at }
    }

    /// Still valid at exactly `expires_at`.
    #[must_use]
    pub const fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

/// Refresh token shape for the provider contract. None are ever issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub token: String,
    pub client_id: String,
    pub scopes: Vec<String>,
}

/// Successful token endpoint response. There is deliberately no refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub scope: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> PendingAuthorization {
        let params = AuthorizationParams::new("https://client.example/cb").with_code_challenge("chal");
        PendingAuthorization::new("c1", &params, 100)
    }

    #[test]
    fn test_code_expiry_boundary() {
        let code = AuthorizationCode::issue("mcp_x".into(), pending(), vec!["mcp".into()], 400);
        assert!(!code.is_expired(399));
        assert!(!code.is_expired(400));
        assert!(code.is_expired(401));
    }

    #[test]
    fn test_code_copies_pending_binding() {
        let code = AuthorizationCode::issue("mcp_x".into(), pending(), vec!["mcp".into()], 400);
        assert_eq!(code.client_id, "c1");
        assert_eq!(code.code_challenge.as_deref(), Some("chal"));
        assert!(code.redirect_uri_provided_explicitly);
    }

    #[test]
    fn test_pending_staleness() {
        let p = pending();
        assert!(!p.is_stale(700, 600));
        assert!(p.is_stale(701, 600));
    }

    #[test]
    fn test_unregistered_scope() {
        let client = ClientDescriptor::new("c1", vec![], vec!["mcp".into()]);
        assert_eq!(client.unregistered_scope(&["mcp".into()]), None);
        assert_eq!(client.unregistered_scope(&["mcp".into(), "admin".into()]), Some("admin"));
    }

    #[test]
    fn test_with_secret_switches_auth_method() {
        let client = ClientDescriptor::new("c1", vec![], vec![]).with_secret("s3cret");
        assert_eq!(client.token_endpoint_auth_method, "client_secret_post");
        assert_eq!(client.client_secret.as_deref(), Some("s3cret"));
    }
}
