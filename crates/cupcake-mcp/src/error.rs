//! Error types for the Cupcake MCP server.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.

use std::path::PathBuf;

/// Why a bearer credential was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedReason {
    /// No `Authorization` header at all.
    MissingCredential,
    /// Header present but not of the form `Bearer <token>`.
    MalformedCredential,
    /// Well-formed bearer token that is unknown, revoked or expired.
    InvalidToken,
}

impl UnauthorizedReason {
    /// Plain-text body sent with the 401.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MissingCredential => "Unauthorized: OAuth token required",
            Self::MalformedCredential => "Unauthorized: Invalid token format",
            Self::InvalidToken => "Unauthorized: Invalid token",
        }
    }
}

/// Errors from the OAuth broker and its HTTP surface.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OAuthError {
    /// State parameter unknown, replayed, expired or forged.
    #[error("Invalid state parameter")]
    InvalidState,

    /// Authorization code unknown, consumed, expired or bound to another client.
    #[error("Invalid grant: {0}")]
    InvalidGrant(String),

    /// Client lookup or authentication failed.
    #[error("Invalid client: {0}")]
    InvalidClient(String),

    /// Missing, malformed or invalid bearer credential.
    #[error("{}", .0.message())]
    Unauthorized(UnauthorizedReason),

    /// Refresh-token paths; refresh tokens are never issued.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Malformed or incomplete request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Requested scope outside the client's registered scopes.
    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    /// Rejected dynamic client registration metadata.
    #[error("Invalid client metadata: {0}")]
    InvalidClientMetadata(String),

    /// Grant type this server does not handle.
    #[error("Unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    /// Unexpected internal failure; details are logged, never returned.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OAuthError {
    /// Create an invalid grant error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant(message.into())
    }

    /// Create an invalid client error.
    #[must_use]
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient(message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// OAuth 2.0 `error` code for response bodies (RFC 6749 §5.2).
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidState | Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::InvalidClient(_) => "invalid_client",
            Self::Unauthorized(_) => "invalid_token",
            Self::NotImplemented(_) | Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::InvalidScope(_) => "invalid_scope",
            Self::InvalidClientMetadata(_) => "invalid_client_metadata",
            Self::Internal(_) => "server_error",
        }
    }

    /// Human-readable `error_description`. Internal details are withheld.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::Internal(_) => "Unexpected server error".to_string(),
            Self::InvalidGrant(msg)
            | Self::InvalidClient(msg)
            | Self::NotImplemented(msg)
            | Self::InvalidRequest(msg)
            | Self::InvalidScope(msg)
            | Self::InvalidClientMetadata(msg)
            | Self::UnsupportedGrantType(msg) => msg.clone(),
            Self::InvalidState | Self::Unauthorized(_) => self.to_string(),
        }
    }
}

/// Errors from loading or querying the record store.
#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    /// Records file could not be read.
    #[error("Failed to read records from {path}: {source}")]
    Io {
        /// File that failed to load
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Records file is not a JSON array of records.
    #[error("Failed to parse records: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors from MCP tool execution.
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    /// Input validation failed
    #[error("Validation error: {message}")]
    Validation {
        /// Field that failed validation
        field: String,
        /// Validation error message
        message: String,
    },

    /// Requested record does not exist
    #[error("unknown id: {0}")]
    NotFound(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToolError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    /// Convert to a user-friendly error message for MCP response.
    #[must_use]
    pub fn to_user_message(&self) -> String {
        match self {
            Self::NotFound(id) => format!("Not found: {id}. Please check the ID is correct."),
            Self::Validation { field, message } => {
                format!("Invalid input for '{field}': {message}")
            }
            _ => self.to_string(),
        }
    }
}

/// Result type alias for broker operations.
pub type OAuthResult<T> = Result<T, OAuthError>;

/// Result type alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;
