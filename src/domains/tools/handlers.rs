//! Tool handler contract.
//!
//! Every tool is a [`ToolHandler`] registered once in the
//! [`ToolRegistry`](super::ToolRegistry). Handlers are synchronous: the
//! executor calls them on a blocking thread while it holds the database
//! connection, so a handler never has to think about concurrency.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ToolError;
use super::model::ToolSpec;
use crate::domains::database::DatabaseBackend;

/// Trait implemented by every tool.
pub trait ToolHandler: Send + Sync {
    /// Get the name of this tool.
    fn name(&self) -> &'static str;

    /// Manifest entry for this tool.
    fn spec(&self) -> ToolSpec;

    /// Validate `arguments` and run the tool against `db`.
    fn call(&self, arguments: Value, db: &mut dyn DatabaseBackend) -> Result<Value, ToolError>;
}

impl ToolSpec {
    /// Build a spec whose input schema is derived from the parameter type.
    pub fn for_params<P: JsonSchema>(name: &str, description: &str) -> Self {
        let mut input_schema = schemars::schema_for!(P).to_value();
        if let Some(obj) = input_schema.as_object_mut() {
            obj.remove("$schema");
            obj.remove("title");
        }

        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

/// Strictly deserialize tool arguments into their parameter type.
///
/// A missing arguments value counts as an empty object; anything other than
/// an object is rejected.
pub fn parse_arguments<P: DeserializeOwned>(arguments: Value) -> Result<P, ToolError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Default::default()),
        obj @ Value::Object(_) => obj,
        other => {
            return Err(ToolError::invalid_arguments(format!(
                "arguments must be a JSON object, got {other}"
            )));
        }
    };

    serde_json::from_value(arguments).map_err(|e| ToolError::invalid_arguments(e.to_string()))
}

/// Serialize a handler result into a JSON payload.
pub fn to_payload<T: serde::Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::internal(e.to_string()))
}
