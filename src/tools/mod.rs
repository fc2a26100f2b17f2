//! Tools module - the capabilities exposed to the LLM
//!
//! This module provides the infrastructure for defining, loading, and
//! executing the tools the agent loop can invoke through the action grammar.
//!
//! # Overview
//!
//! - `Tool` trait: the canonical interface all native tools implement
//! - `LegacyTool` trait + `ToolImpl::Adapted`: the load-time adapter for
//!   first-generation tools on the old text contract
//! - `ToolTable` + `loader::load`: static factory table resolved at startup
//! - `ToolRegistry`: a session's active tool set with timeout-bounded
//!   execution and error-shaped results
//!
//! # Example
//!
//! ```
//! use rankmate::tools::{EchoTool, ToolImpl, ToolRegistry};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let mut registry = ToolRegistry::new();
//! registry.insert(ToolImpl::Native(Box::new(EchoTool)));
//!
//! let result = registry.execute("echo", json!({"message": "Hello!"})).await;
//! assert_eq!(result.value, serde_json::Value::String("Hello!".into()));
//! # });
//! ```

pub mod http_request;
pub mod keyword_density;
pub mod loader;
mod registry;
mod types;

pub use loader::{builtin_table, load, ToolFactory, ToolTable};
pub use registry::{RegisteredTool, ToolRegistry, DEFAULT_TOOL_TIMEOUT};
pub use types::{LegacyTool, ParamSpec, Tool, ToolImpl, ToolResult};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// A simple echo tool for diagnostics and tests.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes back the provided message"
    }

    fn input_schema(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "message",
            "string",
            "The message to echo",
        )]
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let message = args
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("(no message)");
        Ok(Value::String(message.to_string()))
    }
}
