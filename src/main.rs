//! Tool Server Entry Point
//!
//! Initializes logging, loads configuration, opens the database and serves
//! the SQL tools over the configured transport.

use anyhow::Result;
use tracing::info;

use sql_mcp_agent::core::{Config, McpServer, TransportService, init_logging};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from environment
    let config = Config::from_env();

    init_logging(&config.logging);

    info!("Starting {} v{}", config.server.name, config.server.version);
    info!(
        path = %config.database.path.display(),
        read_only = config.database.read_only,
        "Opening database"
    );

    let server = McpServer::open(config.clone())?;

    info!("Server initialized");

    // Create and run the transport service
    let transport = TransportService::new(config.transport);
    transport.run(server).await?;

    info!("Server shutting down");

    Ok(())
}
