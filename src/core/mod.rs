//! Core module containing shared infrastructure components.
//!
//! Configuration, error handling, logging, the JSON-RPC transport, and the
//! two protocol endpoints built on it: the tool server and the client
//! proxy the console uses to reach it.

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod transport;

pub use client::McpClient;
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use server::McpServer;
pub use transport::{TransportConfig, TransportService};
