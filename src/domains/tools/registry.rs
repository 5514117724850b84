//! Tool Registry - the fixed table of tools a server exposes.
//!
//! The table is built once at startup. Names are checked for uniqueness and
//! the capability manifest is computed once, so `list_tools()` is a cheap
//! `Arc` clone that always returns the same manifest.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::definitions::{DescribeTableTool, ExecuteSqlTool, ListTablesTool};
use super::error::RegistryError;
use super::handlers::ToolHandler;
use super::model::CapabilityManifest;

// ============================================================================
// Tool Registry
// ============================================================================

/// Tool registry - maps tool names to handlers.
pub struct ToolRegistry {
    handlers: HashMap<&'static str, Arc<dyn ToolHandler>>,
    manifest: Arc<CapabilityManifest>,
}

impl ToolRegistry {
    /// Build a registry from an explicit handler table.
    ///
    /// Manifest order follows the order of `handlers`.
    pub fn new(handlers: Vec<Arc<dyn ToolHandler>>) -> Result<Self, RegistryError> {
        let mut table = HashMap::with_capacity(handlers.len());
        let mut specs = Vec::with_capacity(handlers.len());

        for handler in handlers {
            let name = handler.name();
            if table.contains_key(name) {
                return Err(RegistryError::DuplicateName(name.to_string()));
            }
            debug!("Registering tool: {}", name);
            specs.push(handler.spec());
            table.insert(name, handler);
        }

        Ok(Self {
            handlers: table,
            manifest: Arc::new(CapabilityManifest::new(specs)),
        })
    }

    /// Registry with the three SQL tools.
    pub fn with_builtin_tools() -> Result<Self, RegistryError> {
        Self::new(vec![
            Arc::new(ListTablesTool),
            Arc::new(DescribeTableTool),
            Arc::new(ExecuteSqlTool),
        ])
    }

    /// The capability manifest.
    pub fn list_tools(&self) -> Arc<CapabilityManifest> {
        Arc::clone(&self.manifest)
    }

    /// Look up a handler by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Get all tool names, in manifest order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.manifest.names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_tool_names() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        assert_eq!(
            registry.tool_names(),
            vec!["list_tables", "describe_table", "execute_sql"]
        );
        assert!(registry.get("execute_sql").is_some());
        assert!(registry.get("drop_table").is_none());
    }

    #[test]
    fn test_list_tools_is_stable() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let first = registry.list_tools();
        let second = registry.list_tools();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            serde_json::to_string(&*first).unwrap(),
            serde_json::to_string(&*second).unwrap()
        );
    }

    #[test]
    fn test_describe_table_schema_requires_table_name() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let manifest = registry.list_tools();
        let spec = manifest.get("describe_table").unwrap();
        assert_eq!(spec.input_schema["required"], serde_json::json!(["table_name"]));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = ToolRegistry::new(vec![Arc::new(ListTablesTool), Arc::new(ListTablesTool)]);
        match result {
            Err(RegistryError::DuplicateName(name)) => assert_eq!(name, "list_tables"),
            Ok(_) => panic!("duplicate registration accepted"),
        }
    }
}
