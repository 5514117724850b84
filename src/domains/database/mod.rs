//! Database domain module.
//!
//! The tool server talks to the database only through [`DatabaseBackend`].
//! A backend is a single, synchronous connection; it is owned by the tool
//! executor, which serializes every call on it.
//!
//! - `sqlite.rs` - rusqlite implementation
//! - `error.rs` - database error types

mod error;
mod sqlite;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use error::{DatabaseError, DatabaseResult};
pub use sqlite::SqliteBackend;

// ============================================================================
// Backend contract
// ============================================================================

/// Synchronous access to one database connection.
///
/// Implementations are moved onto blocking threads by the executor, hence
/// `Send`; they are never shared between threads at the same time.
pub trait DatabaseBackend: Send {
    /// List user tables, sorted by schema then name.
    fn list_tables(&mut self) -> DatabaseResult<Vec<TableRef>>;

    /// Describe the columns of a table. An unknown table has no columns.
    fn describe_table(&mut self, table_name: &str) -> DatabaseResult<TableDescription>;

    /// Execute one SQL statement of any kind.
    fn execute_sql(&mut self, query: &str) -> DatabaseResult<SqlOutcome>;

    /// Bring the connection back to a clean state after a failed call.
    fn recover(&mut self) -> DatabaseResult<()>;
}

// ============================================================================
// Result shapes
// ============================================================================

/// A table as reported by `list_tables`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// One column as reported by `describe_table`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    /// 1-based ordinal position.
    pub position: i64,
    pub primary_key: bool,
}

/// Result of `describe_table`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescription {
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
}

/// Result of `execute_sql`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlOutcome {
    /// The statement produced a result set.
    Rows {
        #[serde(rename = "type")]
        kind: String,
        columns: Vec<String>,
        rows: Vec<serde_json::Map<String, Value>>,
        row_count: usize,
        truncated: bool,
    },

    /// The statement changed data or schema.
    Affected {
        #[serde(rename = "type")]
        kind: String,
        rows_affected: usize,
        message: String,
    },
}

impl SqlOutcome {
    /// Statement kind as reported to the caller ("select", "insert", ...).
    pub fn kind(&self) -> &str {
        match self {
            Self::Rows { kind, .. } | Self::Affected { kind, .. } => kind,
        }
    }
}
