//! Database error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Errors reported by a [`DatabaseBackend`](super::DatabaseBackend).
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The database file could not be opened.
    #[error("Failed to open database {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// The statement text was empty or whitespace only.
    #[error("Empty SQL statement")]
    EmptyStatement,

    /// The text held more than one statement; none of it was run.
    #[error("Only one SQL statement can be executed per call")]
    MultipleStatements,

    /// Any error raised by the SQLite driver (syntax, constraint, I/O...).
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),
}
