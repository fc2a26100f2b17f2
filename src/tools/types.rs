//! Tool types for RankMate
//!
//! This module defines the core types for tool execution: the `Tool` trait
//! every native tool implements, the `LegacyTool` trait for tools built
//! against the older text-in/text-out contract, and the `ToolImpl` variant
//! that unifies both behind one canonical shape at load time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;

/// One named, typed, described parameter of a tool's input schema.
///
/// The loader renders these into the human-readable parameter list appended
/// to the tool description; the LLM prompt relies on that text alone to learn
/// how to call the tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParamSpec {
    /// Parameter name as it appears in the action input object
    pub name: String,
    /// JSON type name: "string", "integer", "number", "boolean", "object", "array"
    pub kind: String,
    /// What the parameter means, phrased for the model
    pub description: String,
    /// Whether the parameter must be present
    pub required: bool,
}

impl ParamSpec {
    /// Create a required parameter.
    ///
    /// # Example
    /// ```
    /// use rankmate::tools::ParamSpec;
    ///
    /// let p = ParamSpec::required("url", "string", "Full URL including scheme");
    /// assert!(p.required);
    /// ```
    pub fn required(name: &str, kind: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            description: description.to_string(),
            required: true,
        }
    }

    /// Create an optional parameter.
    pub fn optional(name: &str, kind: &str, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }
}

/// Trait that all native tools implement.
///
/// Tools are executable capabilities the LLM can invoke through the action
/// grammar. Execution is uniformly asynchronous; tools that do their work
/// synchronously simply return without awaiting and run inline.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use rankmate::tools::{ParamSpec, Tool};
/// use rankmate::error::Result;
///
/// struct PingTool;
///
/// #[async_trait]
/// impl Tool for PingTool {
///     fn name(&self) -> &str { "ping" }
///     fn description(&self) -> &str { "Reports that the runtime is alive" }
///     fn input_schema(&self) -> Vec<ParamSpec> { vec![] }
///     async fn execute(&self, _args: Value) -> Result<Value> {
///         Ok(Value::String("pong".into()))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name; must be unique within a session's active set.
    fn name(&self) -> &str;

    /// Base description sent verbatim to the LLM (the loader appends the
    /// rendered parameter list).
    fn description(&self) -> &str;

    /// Ordered input schema. An empty schema means the tool takes free-form
    /// input.
    fn input_schema(&self) -> Vec<ParamSpec>;

    /// Execute the tool with the parsed action input.
    async fn execute(&self, args: Value) -> Result<Value>;
}

/// The older tool contract: untyped text in, text out, separate naming
/// methods. Still used by a handful of first-generation wrappers.
///
/// Legacy tools are wrapped at load time into [`ToolImpl::Adapted`]; nothing
/// downstream ever sees this interface.
#[async_trait]
pub trait LegacyTool: Send + Sync {
    fn tool_name(&self) -> &str;
    fn summary(&self) -> &str;
    async fn call(&self, args_text: &str) -> Result<String>;
}

/// A loaded tool implementation: either native or adapted from the legacy
/// contract. The variant is selected once at load time, so the execution hot
/// path is a plain match, not a runtime type test.
pub enum ToolImpl {
    Native(Box<dyn Tool>),
    Adapted(Box<dyn LegacyTool>),
}

impl ToolImpl {
    /// The tool's unique name.
    pub fn name(&self) -> &str {
        match self {
            ToolImpl::Native(t) => t.name(),
            ToolImpl::Adapted(t) => t.tool_name(),
        }
    }

    /// The base description, before parameter-list synthesis.
    pub fn base_description(&self) -> &str {
        match self {
            ToolImpl::Native(t) => t.description(),
            ToolImpl::Adapted(t) => t.summary(),
        }
    }

    /// The input schema. Legacy tools carry none; their summary text is
    /// expected to explain the input format.
    pub fn input_schema(&self) -> Vec<ParamSpec> {
        match self {
            ToolImpl::Native(t) => t.input_schema(),
            ToolImpl::Adapted(_) => Vec::new(),
        }
    }

    /// Run the tool. For adapted tools the action input is forwarded as its
    /// JSON text and the string result is lifted back into a value.
    pub async fn run(&self, args: Value) -> Result<Value> {
        match self {
            ToolImpl::Native(t) => t.execute(args).await,
            ToolImpl::Adapted(t) => {
                let args_text = match args {
                    Value::Null => String::new(),
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                t.call(&args_text).await.map(Value::String)
            }
        }
    }
}

/// The raw outcome of one tool call: the returned value plus a status flag.
///
/// Transient; immediately normalized and appended to history as a tool-result
/// message.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub value: Value,
    pub is_error: bool,
}

impl ToolResult {
    /// A successful result.
    pub fn ok(value: Value) -> Self {
        Self {
            value,
            is_error: false,
        }
    }

    /// An error result in the canonical error shape fed back to the model.
    pub fn error(tool: &str, message: &str) -> Self {
        Self {
            value: json!({"type": "error", "message": message, "tool": tool}),
            is_error: true,
        }
    }

    /// The error message, when this is an error result.
    pub fn error_message(&self) -> Option<&str> {
        if !self.is_error {
            return None;
        }
        self.value.get("message").and_then(Value::as_str)
    }
}
