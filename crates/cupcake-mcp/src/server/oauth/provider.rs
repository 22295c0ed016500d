//! The OAuth provider contract and the broker that implements it.
//!
//! The broker never shows the user a login page. `authorize` forwards the user
//! to the external authorization server with this server's own callback as the
//! redirect target; `handle_callback` then mints a local code and sends the user
//! back to the client's original redirect URI. The external server's code is
//! never exposed to the client.

use std::sync::Arc;

use url::Url;

use super::clock::Clock;
use super::store::OAuthStore;
use super::types::{
    AccessToken, AuthorizationCode, AuthorizationParams, ClientDescriptor, PendingAuthorization,
    RefreshToken, TokenResponse,
};
use crate::config::Config;
use crate::error::{OAuthError, OAuthResult};

/// Operations an OAuth authorization server backend must provide.
#[async_trait::async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Look up a registered client.
    async fn get_client(&self, client_id: &str) -> Option<ClientDescriptor>;

    /// Store a newly registered client.
    async fn register_client(&self, client: ClientDescriptor) -> OAuthResult<()>;

    /// Start an authorization request; returns the URL to redirect the user to.
    async fn authorize(
        &self,
        client: &ClientDescriptor,
        params: AuthorizationParams,
    ) -> OAuthResult<String>;

    /// Load a code issued to `client`, without consuming it.
    async fn load_authorization_code(
        &self,
        client: &ClientDescriptor,
        authorization_code: &str,
    ) -> Option<AuthorizationCode>;

    /// Redeem a code for an access token. The code is consumed.
    async fn exchange_authorization_code(
        &self,
        client: &ClientDescriptor,
        authorization_code: &AuthorizationCode,
    ) -> OAuthResult<TokenResponse>;

    /// Validate a bearer token.
    async fn load_access_token(&self, token: &str) -> Option<AccessToken>;

    /// Revoke a token. Unknown tokens are ignored.
    async fn revoke_token(&self, token: &str);

    async fn load_refresh_token(
        &self,
        client: &ClientDescriptor,
        refresh_token: &str,
    ) -> Option<RefreshToken>;

    async fn exchange_refresh_token(
        &self,
        client: &ClientDescriptor,
        refresh_token: &RefreshToken,
        scopes: &[String],
    ) -> OAuthResult<TokenResponse>;
}

/// Authorization-code broker in front of an external authorization server.
#[derive(Debug, Clone)]
pub struct OAuthBroker {
    config: Config,
    store: OAuthStore,
}

impl OAuthBroker {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config, store: OAuthStore::new() }
    }

    /// Broker whose expiry decisions use the given clock.
    #[must_use]
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Self {
        Self { config, store: OAuthStore::with_clock(clock) }
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn store(&self) -> &OAuthStore {
        &self.store
    }

    /// Resolve the external server's callback into a redirect to the client.
    ///
    /// The external `code` is discarded; a fresh local code bound to the
    /// pending request's client, redirect URI and PKCE challenge replaces it.
    pub async fn handle_callback(&self, external_code: &str, state: &str) -> OAuthResult<String> {
        let pending = self
            .store
            .take_state(state, self.config.pending_state_lifetime)
            .await
            .ok_or(OAuthError::InvalidState)?;

        let mut redirect = Url::parse(&pending.redirect_uri).map_err(|e| {
            OAuthError::internal(format!("stored redirect_uri {:?}: {e}", pending.redirect_uri))
        })?;

        let code = OAuthStore::generate_code();
        let expires_at = self.store.now() + self.config.auth_code_lifetime as i64;
        let client_id = pending.client_id.clone();
        let auth_code =
            AuthorizationCode::issue(code.clone(), pending, vec![self.config.scope.clone()], expires_at);
        self.store.insert_auth_code(auth_code).await;

        redirect.query_pairs_mut().append_pair("code", &code).append_pair("state", state);

        tracing::info!(
            client_id = %client_id,
            external_code_len = external_code.len(),
            "Minted authorization code from external callback"
        );

        Ok(redirect.into())
    }

    /// Load and redeem `code` in one step.
    pub async fn exchange(&self, client: &ClientDescriptor, code: &str) -> OAuthResult<TokenResponse> {
        let auth_code = self
            .load_authorization_code(client, code)
            .await
            .ok_or_else(|| OAuthError::invalid_grant("Invalid authorization code"))?;
        self.exchange_authorization_code(client, &auth_code).await
    }

    /// Validate a bearer token.
    pub async fn validate(&self, token: &str) -> Option<AccessToken> {
        self.store.validate_access_token(token).await
    }
}

#[async_trait::async_trait]
impl OAuthProvider for OAuthBroker {
    async fn get_client(&self, client_id: &str) -> Option<ClientDescriptor> {
        self.store.get_client(client_id).await
    }

    async fn register_client(&self, client: ClientDescriptor) -> OAuthResult<()> {
        tracing::info!(client_id = %client.client_id, "Registering OAuth client");
        self.store.register_client(client).await;
        Ok(())
    }

    async fn authorize(
        &self,
        client: &ClientDescriptor,
        params: AuthorizationParams,
    ) -> OAuthResult<String> {
        let state = params.state.clone().unwrap_or_else(OAuthStore::generate_state);
        let scope = if params.scopes.is_empty() {
            self.config.scope.clone()
        } else {
            params.scopes.join(" ")
        };

        let mut url = Url::parse(&self.config.external_authorize_url())
            .map_err(|e| OAuthError::internal(format!("authorization server URL: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &client.client_id)
                .append_pair("redirect_uri", &self.config.callback_url())
                .append_pair("response_type", "code")
                .append_pair("state", &state)
                .append_pair("scope", &scope);
            if let Some(challenge) = params.code_challenge.as_deref() {
                query
                    .append_pair("code_challenge", challenge)
                    .append_pair("code_challenge_method", "S256");
            }
        }

        let pending = PendingAuthorization::new(client.client_id.clone(), &params, self.store.now());
        if !self.store.bind_state(state, pending).await {
            tracing::warn!(client_id = %client.client_id, "Rejected authorization reusing a pending state");
            return Err(OAuthError::invalid_request("state is already in use"));
        }

        tracing::info!(client_id = %client.client_id, "Forwarding authorization to external server");
        Ok(url.into())
    }

    async fn load_authorization_code(
        &self,
        client: &ClientDescriptor,
        authorization_code: &str,
    ) -> Option<AuthorizationCode> {
        self.store.load_auth_code(authorization_code, &client.client_id).await
    }

    async fn exchange_authorization_code(
        &self,
        client: &ClientDescriptor,
        authorization_code: &AuthorizationCode,
    ) -> OAuthResult<TokenResponse> {
        let consumed = self
            .store
            .consume_auth_code(&authorization_code.code, &client.client_id)
            .await
            .ok_or_else(|| OAuthError::invalid_grant("Invalid authorization code"))?;

        let token = OAuthStore::generate_access_token();
        let expires_in = self.config.access_token_lifetime;
        let scope = consumed.scopes.join(" ");
        self.store
            .insert_access_token(AccessToken::new(
                token.clone(),
                client.client_id.clone(),
                consumed.scopes,
                self.store.now() + expires_in as i64,
            ))
            .await;

        tracing::info!(client_id = %client.client_id, "Issued access token");

        Ok(TokenResponse { access_token: token, token_type: "bearer", expires_in, scope })
    }

    async fn load_access_token(&self, token: &str) -> Option<AccessToken> {
        self.validate(token).await
    }

    async fn revoke_token(&self, token: &str) {
        if self.store.revoke_access_token(token).await {
            tracing::info!("Revoked access token");
        }
    }

    async fn load_refresh_token(
        &self,
        _client: &ClientDescriptor,
        _refresh_token: &str,
    ) -> Option<RefreshToken> {
        None
    }

    async fn exchange_refresh_token(
        &self,
        _client: &ClientDescriptor,
        _refresh_token: &RefreshToken,
        _scopes: &[String],
    ) -> OAuthResult<TokenResponse> {
        Err(OAuthError::NotImplemented("refresh tokens are not issued by this server".into()))
    }
}
