//! Error types and handling.
//!
//! This module defines a unified error type that can represent errors from
//! all domains and external dependencies, providing consistent error handling
//! across the library.

use thiserror::Error;

/// A specialized Result type for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type.
///
/// This enum captures all possible error conditions that can occur during
/// server or console operation, including domain-specific errors and
/// external failures.
#[derive(Debug, Error)]
pub enum Error {
    /// The tool table could not be built.
    #[error("Registry error: {0}")]
    Registry(#[from] crate::domains::tools::RegistryError),

    /// Error originating from the database.
    #[error("Database error: {0}")]
    Database(#[from] crate::domains::database::DatabaseError),

    /// Error originating from the transport layer.
    #[error("Transport error: {0}")]
    Transport(#[from] crate::core::transport::TransportError),

    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

}

impl Error {
    /// Create a new configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
