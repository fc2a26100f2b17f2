//! Session types for RankMate
//!
//! This module defines the core types for conversation state: the
//! `SessionKey` identity value, message roles, and messages themselves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity of a conversation thread.
///
/// A session is keyed by the agent identity plus an optional client/tenant
/// identity. The key is an explicit value constructed by the caller and passed
/// through every call; nothing derives it ambiently. A missing client identity
/// degrades to an agent-only key rather than failing.
///
/// # Example
/// ```
/// use rankmate::session::SessionKey;
///
/// let key = SessionKey::new("seo-bot", Some("acme"));
/// assert_eq!(key.storage_key(), "seo-bot:acme");
///
/// let solo = SessionKey::for_agent("seo-bot");
/// assert_eq!(solo.storage_key(), "seo-bot");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    agent_id: String,
    client_id: Option<String>,
}

impl SessionKey {
    /// Create a session key for an agent and an optional client.
    ///
    /// An empty client id is treated the same as no client id, so repeated
    /// requests from the same logical actor always map to the same key.
    pub fn new(agent_id: &str, client_id: Option<&str>) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            client_id: client_id.filter(|c| !c.is_empty()).map(String::from),
        }
    }

    /// Create an agent-only session key.
    pub fn for_agent(agent_id: &str) -> Self {
        Self::new(agent_id, None)
    }

    /// The agent identity component.
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// The client/tenant identity component, if present.
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Render the key as a cache/storage key string.
    pub fn storage_key(&self) -> String {
        match &self.client_id {
            Some(client) => format!("{}:{}", self.agent_id, client),
            None => self.agent_id.clone(),
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

/// The role of a message in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// The rendered instructions + tool catalog; exactly one per session.
    System,
    /// Messages from the user
    Human,
    /// Messages from the model
    Ai,
    /// Normalized results of tool executions
    ToolResult,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::Human => write!(f, "human"),
            Role::Ai => write!(f, "ai"),
            Role::ToolResult => write!(f, "tool-result"),
        }
    }
}

/// A single message in a conversation.
///
/// Messages are immutable once appended; edits are modeled as truncation of
/// history, never mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender
    pub role: Role,
    /// The text content of the message
    pub content: String,
    /// Name of the tool, when this message is an action or a tool result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Arguments of the action, when this message represents a tool call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<Value>,
    /// Marks intermediate steps (actions and tool results) within a turn
    #[serde(default)]
    pub intermediate: bool,
    /// When the message was appended
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn base(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            tool_name: None,
            tool_input: None,
            intermediate: false,
            timestamp: Utc::now(),
        }
    }

    /// Create the system message (rendered instructions + tool catalog).
    pub fn system(content: &str) -> Self {
        Self::base(Role::System, content)
    }

    /// Create a user message.
    pub fn human(content: &str) -> Self {
        Self::base(Role::Human, content)
    }

    /// Create a model message (a final answer).
    pub fn ai(content: &str) -> Self {
        Self::base(Role::Ai, content)
    }

    /// Create a model message representing a tool-call action.
    ///
    /// `content` is the model's raw output; `tool_name` and `tool_input` are
    /// the parsed action. Marked as an intermediate step.
    pub fn action(content: &str, tool_name: &str, tool_input: Value) -> Self {
        Self {
            tool_name: Some(tool_name.to_string()),
            tool_input: Some(tool_input),
            intermediate: true,
            ..Self::base(Role::Ai, content)
        }
    }

    /// Create a tool-result message holding the normalized tool output.
    pub fn tool_result(tool_name: &str, content: &str) -> Self {
        Self {
            tool_name: Some(tool_name.to_string()),
            intermediate: true,
            ..Self::base(Role::ToolResult, content)
        }
    }

    /// Check if this message represents a tool-call action.
    pub fn is_action(&self) -> bool {
        self.role == Role::Ai && self.tool_input.is_some()
    }

    /// Check if this is a tool result message.
    pub fn is_tool_result(&self) -> bool {
        self.role == Role::ToolResult
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_key_with_client() {
        let key = SessionKey::new("seo-bot", Some("acme"));
        assert_eq!(key.agent_id(), "seo-bot");
        assert_eq!(key.client_id(), Some("acme"));
        assert_eq!(key.storage_key(), "seo-bot:acme");
        assert_eq!(key.to_string(), "seo-bot:acme");
    }

    #[test]
    fn test_session_key_agent_only() {
        let key = SessionKey::for_agent("seo-bot");
        assert_eq!(key.client_id(), None);
        assert_eq!(key.storage_key(), "seo-bot");
    }

    #[test]
    fn test_session_key_empty_client_degrades() {
        let key = SessionKey::new("seo-bot", Some(""));
        assert_eq!(key, SessionKey::for_agent("seo-bot"));
        assert_eq!(key.storage_key(), "seo-bot");
    }

    #[test]
    fn test_session_key_equality_and_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(SessionKey::new("a", Some("c")));
        set.insert(SessionKey::new("a", Some("c")));
        set.insert(SessionKey::for_agent("a"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_role_serialize() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), r#""system""#);
        assert_eq!(serde_json::to_string(&Role::Human).unwrap(), r#""human""#);
        assert_eq!(serde_json::to_string(&Role::Ai).unwrap(), r#""ai""#);
        assert_eq!(
            serde_json::to_string(&Role::ToolResult).unwrap(),
            r#""tool-result""#
        );
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::ToolResult.to_string(), "tool-result");
        assert_eq!(Role::Human.to_string(), "human");
    }

    #[test]
    fn test_message_constructors() {
        let system = Message::system("instructions");
        assert_eq!(system.role, Role::System);
        assert!(!system.intermediate);

        let human = Message::human("hello");
        assert_eq!(human.role, Role::Human);
        assert_eq!(human.content, "hello");

        let ai = Message::ai("answer");
        assert_eq!(ai.role, Role::Ai);
        assert!(!ai.is_action());
    }

    #[test]
    fn test_message_action() {
        let msg = Message::action(
            r#"{"action":"echo","action_input":{"message":"hi"}}"#,
            "echo",
            json!({"message": "hi"}),
        );
        assert!(msg.is_action());
        assert!(msg.intermediate);
        assert_eq!(msg.tool_name.as_deref(), Some("echo"));
    }

    #[test]
    fn test_message_tool_result() {
        let msg = Message::tool_result("echo", "hi");
        assert!(msg.is_tool_result());
        assert!(msg.intermediate);
        assert_eq!(msg.tool_name.as_deref(), Some("echo"));
        assert!(msg.tool_input.is_none());
    }

    #[test]
    fn test_message_serialization_skips_none() {
        let msg = Message::human("hello");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("tool_name"));
        assert!(!json.contains("tool_input"));
    }

    #[test]
    fn test_message_roundtrip() {
        let msg = Message::action("raw", "search_volume", json!({"keyword": "crm"}));
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_action());
        assert_eq!(parsed.tool_name.as_deref(), Some("search_volume"));
    }
}
