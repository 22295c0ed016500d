//! Cupcake MCP Server
//!
//! A Model Context Protocol (MCP) server exposing `search` and `fetch` over a
//! set of cupcake order records, fronted by an embedded OAuth 2.0
//! authorization-code broker.
//!
//! The broker is the issuer MCP clients talk to. User login is delegated to an
//! external authorization server; on its callback the broker mints its own
//! short-lived code, and exchanging that code (with PKCE) yields an opaque
//! bearer token accepted by the MCP transports.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cupcake_mcp::{Config, JsonRecordStore, server::McpServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let records = JsonRecordStore::from_path(&config.records_path)?;
//!     let server = McpServer::new(config, Arc::new(records));
//!     server.run_http("0.0.0.0", 8090).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod records;
pub mod server;
pub mod tools;

pub use config::Config;
pub use error::{OAuthError, RecordError, ToolError};
pub use records::{JsonRecordStore, RecordStore};
pub use server::oauth::{OAuthBroker, OAuthProvider, OAuthStore};
