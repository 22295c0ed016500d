//! Configuration for the Cupcake MCP server.

use std::path::PathBuf;
use std::time::Duration;

/// OAuth broker constants.
pub mod oauth {
    use std::time::Duration;

    /// The single scope this server issues and accepts.
    pub const SCOPE: &str = "mcp";

    /// Public URL of this server, used as issuer and protected resource.
    pub const ISSUER_URL: &str = "https://cupcake.onemainarmy.com";

    /// External authorization server that performs the user-facing login.
    pub const AUTH_SERVER_URL: &str = "https://oauth.onemainarmy.com";

    /// Authorization code lifetime (5 minutes).
    pub const AUTH_CODE_LIFETIME: u64 = 300;

    /// Access token lifetime (24 hours).
    pub const ACCESS_TOKEN_LIFETIME: u64 = 86_400;

    /// How long an unanswered authorization request may wait for its callback.
    pub const PENDING_STATE_LIFETIME: u64 = 600;

    /// Interval between sweeps of expired codes, tokens and pending states.
    pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

    /// Local callback the external authorization server redirects back to.
    pub const CALLBACK_PATH: &str = "/oauth/callback";

    /// RFC 9728 protected resource metadata document.
    pub const PROTECTED_RESOURCE_PATH: &str = "/.well-known/oauth-protected-resource";

    /// RFC 8414 authorization server metadata document.
    pub const AUTH_SERVER_METADATA_PATH: &str = "/.well-known/oauth-authorization-server";

    /// MCP manifest document.
    pub const MANIFEST_PATH: &str = "/.well-known/mcp/manifest.json";
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Public base URL of this server (no trailing slash).
    pub issuer_url: String,

    /// Base URL of the external authorization server (no trailing slash).
    pub auth_server_url: String,

    /// JSON file holding the searchable records.
    pub records_path: PathBuf,

    /// Scope granted to every issued code and token.
    pub scope: String,

    /// Authorization code lifetime in seconds.
    pub auth_code_lifetime: u64,

    /// Access token lifetime in seconds.
    pub access_token_lifetime: u64,

    /// Pending authorization (state) lifetime in seconds.
    pub pending_state_lifetime: u64,

    /// Sweep interval for expired broker entries.
    pub cleanup_interval: Duration,
}

impl Config {
    /// Create a configuration, falling back to the built-in URLs.
    #[must_use]
    pub fn new(issuer_url: Option<String>, auth_server_url: Option<String>) -> Self {
        Self {
            issuer_url: trim_base(issuer_url.as_deref().unwrap_or(oauth::ISSUER_URL)),
            auth_server_url: trim_base(auth_server_url.as_deref().unwrap_or(oauth::AUTH_SERVER_URL)),
            records_path: PathBuf::from("records.json"),
            scope: oauth::SCOPE.to_string(),
            auth_code_lifetime: oauth::AUTH_CODE_LIFETIME,
            access_token_lifetime: oauth::ACCESS_TOKEN_LIFETIME,
            pending_state_lifetime: oauth::PENDING_STATE_LIFETIME,
            cleanup_interval: oauth::CLEANUP_INTERVAL,
        }
    }

    /// Create a test configuration rooted at the given issuer URL.
    #[must_use]
    pub fn for_testing(issuer_url: &str) -> Self {
        Self::new(Some(issuer_url.to_string()), Some("https://auth.example.test".to_string()))
    }

    /// Create configuration from environment variables.
    ///
    /// Reads `MCP_ISSUER_URL`, `AUTH_SERVER_URL` and `RECORDS_PATH`.
    pub fn from_env() -> anyhow::Result<Self> {
        let issuer_url = std::env::var("MCP_ISSUER_URL").ok();
        let auth_server_url = std::env::var("AUTH_SERVER_URL").ok();
        let mut config = Self::new(issuer_url, auth_server_url);
        if let Ok(path) = std::env::var("RECORDS_PATH") {
            config.records_path = PathBuf::from(path);
        }
        config.validate()?;
        Ok(config)
    }

    /// Check that both base URLs parse as absolute URLs.
    pub fn validate(&self) -> anyhow::Result<()> {
        url::Url::parse(&self.issuer_url)
            .map_err(|e| anyhow::anyhow!("invalid issuer URL {:?}: {e}", self.issuer_url))?;
        url::Url::parse(&self.auth_server_url).map_err(|e| {
            anyhow::anyhow!("invalid authorization server URL {:?}: {e}", self.auth_server_url)
        })?;
        Ok(())
    }

    /// Absolute URL of a path served by this server.
    #[must_use]
    pub fn issuer_endpoint(&self, path: &str) -> String {
        format!("{}{}", self.issuer_url, path)
    }

    /// The fixed callback handed to the external authorization server.
    #[must_use]
    pub fn callback_url(&self) -> String {
        self.issuer_endpoint(oauth::CALLBACK_PATH)
    }

    /// URL advertised in `WWW-Authenticate` challenges.
    #[must_use]
    pub fn resource_metadata_url(&self) -> String {
        self.issuer_endpoint(oauth::PROTECTED_RESOURCE_PATH)
    }

    /// The external authorization endpoint users are sent to.
    #[must_use]
    pub fn external_authorize_url(&self) -> String {
        format!("{}/authorize", self.auth_server_url)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(None, None)
    }
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
