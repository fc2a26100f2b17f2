//! System prompt construction
//!
//! The system prompt is the only channel through which the model learns the
//! response grammar and the available tools: a fixed instruction template,
//! the caller-supplied persona/goal text, and the rendered tool catalog.

use crate::tools::ToolRegistry;

/// Fixed instruction template. Explains the two legal response shapes and
/// forbids any other output format.
const INSTRUCTION_TEMPLATE: &str = r#"Respond with a single JSON object and nothing else: no prose before or after it, no markdown fences, exactly one action per response.

There are exactly two legal response shapes.

To call a tool:
{"action": <tool name>, "action_input": <arguments object>}

To answer the user:
{"action": "Final Answer", "action_input": <your answer as a string>}

Tool results will be sent back to you as messages. Any other output format is an error and will be rejected."#;

/// Builder for the session's system prompt.
///
/// # Example
/// ```
/// use rankmate::agent::PromptBuilder;
/// use rankmate::tools::ToolRegistry;
///
/// let builder = PromptBuilder::new().with_persona("You are an SEO assistant.");
/// let prompt = builder.build(&ToolRegistry::new());
/// assert!(prompt.starts_with("You are an SEO assistant."));
/// assert!(prompt.contains("Final Answer"));
/// ```
pub struct PromptBuilder {
    persona: Option<String>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self { persona: None }
    }

    /// Set the caller-supplied persona/goal text, prepended so it takes
    /// priority in the model's context.
    pub fn with_persona(mut self, persona: &str) -> Self {
        if !persona.trim().is_empty() {
            self.persona = Some(persona.trim().to_string());
        }
        self
    }

    pub fn has_persona(&self) -> bool {
        self.persona.is_some()
    }

    /// Render the full system prompt: persona, instruction template, and the
    /// tool catalog for every loaded tool.
    pub fn build(&self, registry: &ToolRegistry) -> String {
        let mut sections: Vec<String> = Vec::new();
        if let Some(persona) = &self.persona {
            sections.push(persona.clone());
        }
        sections.push(INSTRUCTION_TEMPLATE.to_string());
        if registry.is_empty() {
            sections.push(
                "## Tools\n\nNo tools are available. Answer with \"Final Answer\" directly."
                    .to_string(),
            );
        } else {
            sections.push(format!("## Tools\n\n{}", registry.catalog()));
        }
        sections.join("\n\n")
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}
