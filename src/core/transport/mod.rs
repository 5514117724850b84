//! Transport layer.
//!
//! Moves JSON-RPC messages between the console process and the tool
//! server process:
//! - **framing**: newline-delimited JSON frames ([`FrameReader`], [`FrameWriter`])
//! - **message**: JSON-RPC 2.0 message and method payload types
//! - **connection**: client-side endpoint establishment (spawn or dial)
//! - **stdio** / **tcp**: server-side listeners
//!
//! # Feature Flags
//!
//! - `stdio` (default): spawn the server and talk over its pipes
//! - `tcp`: listen on / dial a TCP socket - adds tokio/net

mod config;
pub mod connection;
mod error;
pub mod framing;
pub mod message;
mod service;

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "stdio")]
pub mod stdio;

pub use config::TransportConfig;
pub use connection::{Connection, Endpoint};
pub use error::{TransportError, TransportResult};
pub use framing::{FrameReader, FrameWriter};
pub use message::JsonRpcMessage;
pub use service::TransportService;

#[cfg(feature = "tcp")]
pub use config::TcpConfig;
