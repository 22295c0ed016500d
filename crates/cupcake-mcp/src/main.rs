//! Cupcake MCP Server - Entry Point

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cupcake_mcp::{Config, JsonRecordStore, server::McpServer};

#[derive(Parser, Debug)]
#[command(name = "cupcake-mcp")]
#[command(about = "MCP server for cupcake order search with an embedded OAuth broker")]
#[command(version)]
struct Cli {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// HTTP server port
    #[arg(long, default_value = "8090", env = "PORT")]
    port: u16,

    /// Public base URL of this server (e.g., https://cupcake.onemainarmy.com)
    #[arg(long, env = "MCP_ISSUER_URL")]
    issuer_url: Option<String>,

    /// Base URL of the external authorization server
    #[arg(long, env = "AUTH_SERVER_URL")]
    auth_server_url: Option<String>,

    /// JSON file with the searchable records
    #[arg(long, default_value = "records.json", env = "RECORDS_PATH")]
    records: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Cupcake MCP server");

    let mut config = Config::new(cli.issuer_url, cli.auth_server_url);
    config.records_path = cli.records;
    config.validate()?;

    let records = JsonRecordStore::from_path(&config.records_path)
        .with_context(|| format!("loading records from {}", config.records_path.display()))?;

    let server = McpServer::new(config, Arc::new(records));
    server.run_http(&cli.host, cli.port).await
}
