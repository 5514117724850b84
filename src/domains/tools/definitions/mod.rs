//! Tool definitions module.
//!
//! One file per tool. Each file defines the parameter struct, the
//! `execute()` logic and the [`ToolHandler`](super::ToolHandler) impl.

mod describe_table;
mod execute_sql;
mod list_tables;

pub use describe_table::{DescribeTableParams, DescribeTableTool};
pub use execute_sql::{ExecuteSqlParams, ExecuteSqlTool};
pub use list_tables::{ListTablesParams, ListTablesTool};
