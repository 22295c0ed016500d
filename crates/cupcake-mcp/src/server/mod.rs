//! MCP server implementation.
//!
//! One axum app serves the OAuth broker endpoints, the streamable HTTP
//! transport on `/mcp` and the legacy SSE transport on `/sse` + `/message`.

pub mod oauth;
pub mod rpc;
pub mod session;
pub mod transport;

use std::sync::Arc;

use crate::config::Config;
use crate::records::RecordStore;
use crate::tools::{self, McpTool, ToolContext};
use oauth::OAuthBroker;

/// MCP server for cupcake order search.
pub struct McpServer {
    ctx: ToolContext,
    tools: Vec<Box<dyn McpTool>>,
    oauth: Arc<OAuthBroker>,
}

impl McpServer {
    #[must_use]
    pub fn new(config: Config, records: Arc<dyn RecordStore>) -> Self {
        Self::with_broker(records, OAuthBroker::new(config))
    }

    /// Server around an already-built broker.
    #[must_use]
    pub fn with_broker(records: Arc<dyn RecordStore>, broker: OAuthBroker) -> Self {
        Self { ctx: ToolContext::new(records), tools: tools::register_all_tools(), oauth: Arc::new(broker) }
    }

    /// Build the HTTP router without binding a socket.
    pub fn into_router(self) -> axum::Router {
        transport::create_router(self.tools, self.ctx, self.oauth)
    }

    /// Run the server in HTTP mode.
    ///
    /// # Errors
    ///
    /// Returns error if the address cannot be bound or the server fails.
    pub async fn run_http(self, host: &str, port: u16) -> anyhow::Result<()> {
        let config = self.oauth.config().clone();

        tracing::info!(
            issuer = %config.issuer_url,
            auth_server = %config.auth_server_url,
            tools = self.tools.len(),
            "Starting MCP server in HTTP mode"
        );

        let sweeper = self
            .oauth
            .store()
            .start_cleanup_task(config.cleanup_interval, config.pending_state_lifetime);

        let router = self.into_router();
        let listener = tokio::net::TcpListener::bind((host, port)).await?;
        tracing::info!("HTTP server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        sweeper.abort();
        tracing::info!("HTTP server shut down");
        Ok(())
    }

    #[must_use]
    pub fn get_tool(&self, name: &str) -> Option<&dyn McpTool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    #[must_use]
    pub fn list_tools(&self) -> Vec<(&str, &str)> {
        self.tools.iter().map(|t| (t.name(), t.description())).collect()
    }

    #[must_use]
    pub const fn context(&self) -> &ToolContext {
        &self.ctx
    }

    #[must_use]
    pub fn broker(&self) -> &OAuthBroker {
        &self.oauth
    }
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer").field("tools", &self.tools.len()).finish_non_exhaustive()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
