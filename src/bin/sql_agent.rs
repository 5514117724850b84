//! Console Entry Point
//!
//! Starts the tool server (or dials it), connects the reasoning engine and
//! runs the interactive question loop until Ctrl-C or end of input.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tracing::{info, warn};

use sql_mcp_agent::core::{Config, McpClient, init_logging};
use sql_mcp_agent::domains::agent::console::{self, ConsoleObserver, ExitReason};
use sql_mcp_agent::domains::agent::{OpenAiEngine, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::console_from_env();
    init_logging(&config.logging);
    config.validate_agent()?;

    let engine = OpenAiEngine::from_config(&config.llm).context("OpenAI API key missing")?;
    info!(model = engine.model(), "Reasoning engine configured");

    let client = Arc::new(
        McpClient::connect(&config.endpoint(), config.client.call_timeout)
            .await
            .context("failed to start the tool server session")?,
    );

    let outcome = match Orchestrator::start(Arc::new(engine), client.clone(), config.agent.clone())
        .await
    {
        Ok(orchestrator) => {
            let mut orchestrator = orchestrator.with_observer(Arc::new(ConsoleObserver));
            let interrupt = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Cannot listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            };
            console::run(
                &mut orchestrator,
                BufReader::new(tokio::io::stdin()),
                &mut std::io::stdout(),
                interrupt,
            )
            .await
            .map_err(anyhow::Error::from)
        }
        Err(e) => Err(anyhow::Error::from(e).context("tool discovery failed")),
    };

    if let Err(e) = client.shutdown().await {
        warn!("Tool server shutdown failed: {}", e);
    }
    println!("\nBye!");

    match outcome? {
        ExitReason::Fatal(e) => Err(e.into()),
        ExitReason::EndOfInput | ExitReason::Interrupted => Ok(()),
    }
}
