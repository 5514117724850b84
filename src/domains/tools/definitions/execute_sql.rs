//! Execute SQL tool definition.
//!
//! Runs any statement the engine asks for. There is no statement-class
//! filtering here; operators who need a guard open the database read-only.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::domains::database::DatabaseBackend;
use crate::domains::tools::handlers::{ToolHandler, parse_arguments, to_payload};
use crate::domains::tools::{ToolError, ToolSpec};

// ============================================================================
// Tool Parameters
// ============================================================================

/// Parameters for the execute SQL tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ExecuteSqlParams {
    /// A single SQL statement.
    pub query: String,
}

// ============================================================================
// Tool Definition
// ============================================================================

/// Execute SQL tool - runs one statement and returns rows or a change count.
pub struct ExecuteSqlTool;

impl ExecuteSqlTool {
    /// Tool name as registered in the manifest.
    pub const NAME: &'static str = "execute_sql";

    /// Tool description shown to the reasoning engine.
    pub const DESCRIPTION: &'static str = "Execute one SQL statement of any kind (SELECT, INSERT, UPDATE, DELETE, etc.). SELECT returns columns and rows; other statements return the number of rows affected.";

    #[instrument(skip_all)]
    pub fn execute(
        params: &ExecuteSqlParams,
        db: &mut dyn DatabaseBackend,
    ) -> Result<Value, ToolError> {
        info!("Executing SQL query: {}", params.query);
        let outcome = db.execute_sql(&params.query)?;
        info!("Statement '{}' completed", outcome.kind());
        to_payload(&outcome)
    }
}

impl ToolHandler for ExecuteSqlTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::for_params::<ExecuteSqlParams>(Self::NAME, Self::DESCRIPTION)
    }

    fn call(&self, arguments: Value, db: &mut dyn DatabaseBackend) -> Result<Value, ToolError> {
        let params: ExecuteSqlParams = parse_arguments(arguments)?;
        Self::execute(&params, db)
    }
}
