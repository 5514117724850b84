//! SQL assistant library.
//!
//! A natural-language front end to a SQL database. A reasoning engine
//! decides which database tools to call; a tool server runs them against
//! one connection and answers over newline-delimited JSON-RPC.
//!
//! # Architecture
//!
//! - **core**: configuration, errors, logging, transport, and the server
//!   and client protocol endpoints
//! - **domains**: business logic organized by bounded contexts
//!   - **database**: the SQLite backend behind the tools
//!   - **tools**: `list_tables`, `describe_table`, `execute_sql`
//!   - **agent**: conversation history, reasoning engine, orchestrator and console
//!
//! # Example
//!
//! ```rust,no_run
//! use sql_mcp_agent::core::{Config, McpServer, TransportService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     let server = McpServer::open(config.clone())?;
//!     TransportService::new(config.transport).run(server).await?;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod domains;

// Re-export commonly used types for convenience
pub use core::{Config, Error, McpClient, McpServer, Result};
