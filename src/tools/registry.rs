//! Tool registry for RankMate
//!
//! The registry holds a session's active tool set: loaded implementations
//! with their synthesized descriptions, looked up by exact name and executed
//! with a centrally enforced timeout. Execution failures never propagate as
//! errors; they become error-shaped [`ToolResult`]s the model consumes.

use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{error, info};

use super::{ParamSpec, ToolImpl, ToolResult};

/// Default per-tool-call timeout.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// One registered tool: the implementation plus its synthesized description.
pub struct RegisteredTool {
    name: String,
    description: String,
    imp: ToolImpl,
}

impl RegisteredTool {
    /// The tool's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description with the rendered parameter list appended.
    pub fn description(&self) -> &str {
        &self.description
    }
}

/// A session's active set of tools.
///
/// Insertion order is preserved so the rendered catalog (and therefore the
/// system prompt) is stable across identical loads.
///
/// # Example
///
/// ```
/// use rankmate::tools::{EchoTool, ToolImpl, ToolRegistry};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let mut registry = ToolRegistry::new();
/// registry.insert(ToolImpl::Native(Box::new(EchoTool)));
///
/// assert!(registry.has("echo"));
///
/// let result = registry.execute("echo", json!({"message": "hello"})).await;
/// assert!(!result.is_error);
/// # });
/// ```
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    timeout: Duration,
}

impl ToolRegistry {
    /// Create an empty registry with the default tool timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TOOL_TIMEOUT)
    }

    /// Create an empty registry with a custom per-call timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            tools: Vec::new(),
            timeout,
        }
    }

    /// Register a tool, synthesizing its catalog description from the input
    /// schema. A tool with the same name replaces the previous registration.
    pub fn insert(&mut self, imp: ToolImpl) {
        let name = imp.name().to_string();
        let description = synthesize_description(&imp);
        info!(tool = %name, "Registering tool");
        let entry = RegisteredTool {
            name: name.clone(),
            description,
            imp,
        };
        match self.tools.iter_mut().find(|t| t.name == name) {
            Some(existing) => *existing = entry,
            None => self.tools.push(entry),
        }
    }

    /// Look up a tool by exact, case-sensitive name.
    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Check if a tool is registered.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names of all registered tools, in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Render the tool catalog for the system prompt: one section per tool
    /// with its synthesized description.
    pub fn catalog(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("### {}\n{}", t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Execute a tool by name.
    ///
    /// Never returns an error: unknown names, tool failures, and timeouts all
    /// come back as error-shaped [`ToolResult`]s so the loop can feed them to
    /// the model for self-correction.
    pub async fn execute(&self, name: &str, args: Value) -> ToolResult {
        let tool = match self.get(name) {
            Some(t) => t,
            None => {
                error!(tool = %name, "Tool not found");
                return ToolResult::error(name, &format!("tool not found: {}", name));
            }
        };

        let start = Instant::now();
        match tokio::time::timeout(self.timeout, tool.imp.run(args)).await {
            Ok(Ok(value)) => {
                info!(
                    tool = %name,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool executed successfully"
                );
                ToolResult::ok(value)
            }
            Ok(Err(e)) => {
                error!(
                    tool = %name,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool execution failed"
                );
                ToolResult::error(name, &e.to_string())
            }
            Err(_) => {
                error!(
                    tool = %name,
                    timeout_secs = self.timeout.as_secs(),
                    "Tool execution timed out"
                );
                ToolResult::error(
                    name,
                    &format!("timed out after {} seconds", self.timeout.as_secs()),
                )
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Append the rendered parameter list to the tool's base description. The
/// system prompt is the only channel through which the model learns a tool's
/// calling convention.
fn synthesize_description(imp: &ToolImpl) -> String {
    let base = imp.base_description().trim().to_string();
    let schema = imp.input_schema();
    if schema.is_empty() {
        return base;
    }
    let params = schema
        .iter()
        .map(|p: &ParamSpec| {
            format!(
                "- {} ({}, {}): {}",
                p.name,
                p.kind,
                if p.required { "required" } else { "optional" },
                p.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\nParameters:\n{}", base, params)
}
