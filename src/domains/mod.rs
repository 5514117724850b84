//! Domains module containing business logic organized by bounded contexts.
//!
//! - **database**: the connection the tool server queries
//! - **tools**: tool definitions, registry and serialized executor
//! - **agent**: conversation history, reasoning engine and console

pub mod agent;
pub mod database;
pub mod tools;
