//! List tables tool definition.

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

/// Parameters for the list tables tool (none).
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ListTablesParams {}

// ============================================================================
// Tool Definition
// ============================================================================

/// List tables tool - enumerates the user tables of the database.
pub struct ListTablesTool;

impl ListTablesTool {
    /// Tool name as registered in the manifest.
    pub const NAME: &'static str = "list_tables";

    /// Tool description shown to the reasoning engine.
    pub const DESCRIPTION: &'static str =
        "List all tables in the database. Returns schema, table name and type for each table.";

    #[instrument(skip_all)]
    pub fn execute(
        _params: &ListTablesParams,
        db: &mut dyn DatabaseBackend,
    ) -> Result<Value, ToolError> {
        let tables = db.list_tables()?;
        info!("Listed {} tables", tables.len());
        to_payload(&tables)
    }
}

impl ToolHandler for ListTablesTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::for_params::<ListTablesParams>(Self::NAME, Self::DESCRIPTION)
    }

    fn call(&self, arguments: Value, db: &mut dyn DatabaseBackend) -> Result<Value, ToolError> {
        let params: ListTablesParams = parse_arguments(arguments)?;
        Self::execute(&params, db)
    }
}
