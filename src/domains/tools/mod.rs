//! Tools domain module.
//!
//! Tools are the named operations the server exposes to the reasoning
//! engine. Each tool runs against the database connection owned by the
//! [`ToolExecutor`].
//!
//! ## Architecture
//!
//! - `definitions/` - Individual tool implementations (one file per tool)
//! - `model.rs` - Manifest, call request/result types shared with the client
//! - `handlers.rs` - The `ToolHandler` trait and argument validation
//! - `registry.rs` - Fixed name -> handler table and the capability manifest
//! - `executor.rs` - Serialized execution on the database connection
//! - `error.rs` - Tool-specific error types
//!
//! ## Adding a New Tool
//!
//! 1. Create a new file in `definitions/` (e.g., `my_tool.rs`)
//! 2. Define the params struct, `execute()` and the `ToolHandler` impl
//! 3. Export in `definitions/mod.rs`
//! 4. Add it to `ToolRegistry::with_builtin_tools()`

pub mod definitions;
mod error;
mod executor;
pub mod handlers;
mod model;
mod registry;

pub use error::{RegistryError, ToolError};
pub use executor::ToolExecutor;
pub use handlers::ToolHandler;
pub use model::{
    CapabilityManifest, ToolCallRequest, ToolCallResult, ToolErrorKind, ToolOutcome, ToolSpec,
};
pub use registry::ToolRegistry;
