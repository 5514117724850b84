//! Describe table tool definition.

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

/// Parameters for the describe table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DescribeTableParams {
    /// Name of the table to describe, optionally prefixed by its schema.
    pub table_name: String,
}

// ============================================================================
// Tool Definition
// ============================================================================

/// Describe table tool - reports the columns of one table.
pub struct DescribeTableTool;

impl DescribeTableTool {
    /// Tool name as registered in the manifest.
    pub const NAME: &'static str = "describe_table";

    /// Tool description shown to the reasoning engine.
    pub const DESCRIPTION: &'static str = "Get the schema of a specific table including columns, types, nullability, defaults and primary key membership.";

    #[instrument(skip_all, fields(table = %params.table_name))]
    pub fn execute(
        params: &DescribeTableParams,
        db: &mut dyn DatabaseBackend,
    ) -> Result<Value, ToolError> {
        let description = db.describe_table(&params.table_name)?;
        info!(
            "Described table {} ({} columns)",
            params.table_name,
            description.columns.len()
        );
        to_payload(&description)
    }
}

impl ToolHandler for DescribeTableTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::for_params::<DescribeTableParams>(Self::NAME, Self::DESCRIPTION)
    }

    fn call(&self, arguments: Value, db: &mut dyn DatabaseBackend) -> Result<Value, ToolError> {
        let params: DescribeTableParams = parse_arguments(arguments)?;
        Self::execute(&params, db)
    }
}
