//! OAuth 2.0 authorization-code broker for MCP authentication.
//!
//! This server acts as the OAuth issuer for MCP clients but delegates the
//! actual user login to an external authorization server. Clients only ever
//! see codes and tokens minted here.
//!
//! ## Supported Standards
//! - RFC 9728: OAuth Protected Resource Metadata
//! - RFC 8414: OAuth Authorization Server Metadata
//! - RFC 7591: Dynamic Client Registration
//! - RFC 7636: PKCE (S256)
//! - RFC 6749: Authorization Code Grant
//! - RFC 7009: Token Revocation

pub mod clock;
pub mod handlers;
pub mod middleware;
pub mod pkce;
pub mod provider;
pub mod store;
pub mod types;

pub use provider::{OAuthBroker, OAuthProvider};
pub use store::OAuthStore;
