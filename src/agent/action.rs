//! Action grammar parsing
//!
//! Model output must be a single JSON object in one of exactly two shapes:
//!
//! ```text
//! {"action": <tool_name>, "action_input": <object>}
//! {"action": "Final Answer", "action_input": <string>}
//! ```
//!
//! Real models occasionally wrap the object in conversational text or code
//! fences, so parsing extracts the first balanced JSON object before
//! enforcing the grammar. Failures are recoverable: the loop feeds them back
//! to the model rather than aborting the turn.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{RankError, Result};

/// The action name that terminates a turn.
pub const FINAL_ANSWER: &str = "Final Answer";

/// One parsed unit of model output. Transient; lives for one loop iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Invoke the named tool with the given input.
    ToolCall { name: String, input: Value },
    /// Terminate the turn with this answer.
    FinalAnswer(String),
}

#[derive(Deserialize)]
struct ActionEnvelope {
    action: String,
    action_input: Value,
}

/// Parse model output into an [`Action`].
///
/// # Errors
/// Returns [`RankError::Action`] when no balanced JSON object is found, the
/// object doesn't deserialize into the envelope, or the tool name is empty.
///
/// # Example
/// ```
/// use rankmate::agent::{parse_action, Action};
///
/// let action = parse_action(r#"{"action":"Final Answer","action_input":"Done"}"#).unwrap();
/// assert_eq!(action, Action::FinalAnswer("Done".into()));
/// ```
pub fn parse_action(raw: &str) -> Result<Action> {
    let candidate = extract_object(raw)
        .ok_or_else(|| RankError::Action("no JSON object found in model output".into()))?;
    let envelope: ActionEnvelope = serde_json::from_str(candidate)
        .map_err(|e| RankError::Action(format!("invalid action JSON: {e}")))?;

    if envelope.action == FINAL_ANSWER {
        let content = match envelope.action_input {
            Value::String(s) => s,
            other => serde_json::to_string(&other)
                .map_err(|e| RankError::Action(format!("unrenderable final answer: {e}")))?,
        };
        Ok(Action::FinalAnswer(content))
    } else if envelope.action.trim().is_empty() {
        Err(RankError::Action("empty tool name in action".into()))
    } else {
        Ok(Action::ToolCall {
            name: envelope.action,
            input: envelope.action_input,
        })
    }
}

/// Extract the first balanced JSON object from text, tolerating surrounding
/// prose and markdown fences. String contents and escapes are respected so
/// braces inside values don't confuse the balance count.
pub fn extract_object(text: &str) -> Option<&str> {
    let mut start = None;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if start.is_none() {
            if c == '{' {
                start = Some(i);
                depth = 1;
            }
            continue;
        }
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start?..i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Incremental detector for a structurally complete JSON object.
///
/// The loop feeds streamed deltas into a scanner and stops forwarding tokens
/// once the single action object is complete; trailing wrapper text is not
/// part of the action.
#[derive(Debug, Default)]
pub struct JsonScanner {
    started: bool,
    complete: bool,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl JsonScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns `true` once a complete object has been observed.
    pub fn push(&mut self, chunk: &str) -> bool {
        for c in chunk.chars() {
            if self.complete {
                break;
            }
            if !self.started {
                if c == '{' {
                    self.started = true;
                    self.depth = 1;
                }
                continue;
            }
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if c == '\\' {
                    self.escaped = true;
                } else if c == '"' {
                    self.in_string = false;
                }
                continue;
            }
            match c {
                '"' => self.in_string = true,
                '{' => self.depth += 1,
                '}' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        self.complete = true;
                    }
                }
                _ => {}
            }
        }
        self.complete
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_final_answer() {
        let action = parse_action(r#"{"action": "Final Answer", "action_input": "Done"}"#).unwrap();
        assert_eq!(action, Action::FinalAnswer("Done".into()));
    }

    #[test]
    fn test_parse_tool_call() {
        let action =
            parse_action(r#"{"action": "http_request", "action_input": {"url": "https://x.dev", "method": "GET"}}"#)
                .unwrap();
        match action {
            Action::ToolCall { name, input } => {
                assert_eq!(name, "http_request");
                assert_eq!(input["method"], "GET");
            }
            other => panic!("expected tool call, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_tolerates_wrapper_text() {
        let raw = "Sure! Here is my action:\n{\"action\":\"echo\",\"action_input\":{\"message\":\"hi\"}}\nHope that helps.";
        let action = parse_action(raw).unwrap();
        assert!(matches!(action, Action::ToolCall { name, .. } if name == "echo"));
    }

    #[test]
    fn test_parse_tolerates_code_fences() {
        let raw = "```json\n{\"action\":\"Final Answer\",\"action_input\":\"ok\"}\n```";
        assert_eq!(parse_action(raw).unwrap(), Action::FinalAnswer("ok".into()));
    }

    #[test]
    fn test_parse_structured_final_answer_serialized() {
        let raw = r#"{"action":"Final Answer","action_input":{"summary":"done"}}"#;
        let action = parse_action(raw).unwrap();
        assert_eq!(
            action,
            Action::FinalAnswer(r#"{"summary":"done"}"#.into())
        );
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(matches!(
            parse_action("I think I should look this up first."),
            Err(RankError::Action(_))
        ));
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        assert!(parse_action(r#"{"tool": "echo"}"#).is_err());
        assert!(parse_action(r#"{"action": "", "action_input": {}}"#).is_err());
    }

    #[test]
    fn test_extract_object_respects_strings() {
        let text = r#"note: {"action":"echo","action_input":{"message":"} tricky {"}} trailing"#;
        let extracted = extract_object(text).unwrap();
        let parsed: Value = serde_json::from_str(extracted).unwrap();
        assert_eq!(parsed["action_input"]["message"], "} tricky {");
    }

    #[test]
    fn test_extract_object_none_on_unbalanced() {
        assert!(extract_object(r#"{"action": "echo""#).is_none());
        assert!(extract_object("no braces at all").is_none());
    }

    #[test]
    fn test_extract_object_nested() {
        let text = r#"{"a": {"b": {"c": 1}}}"#;
        assert_eq!(extract_object(text).unwrap(), text);
    }

    #[test]
    fn test_scanner_completes_across_chunks() {
        let mut scanner = JsonScanner::new();
        assert!(!scanner.push("prefix {\"action\":\"echo\","));
        assert!(!scanner.push("\"action_input\":{\"m\""));
        assert!(scanner.push(":\"x\"}}"));
        assert!(scanner.is_complete());
        // Further input doesn't un-complete it
        assert!(scanner.push(" trailing {"));
    }

    #[test]
    fn test_scanner_ignores_braces_in_strings() {
        let mut scanner = JsonScanner::new();
        assert!(scanner.push(r#"{"m": "has a } brace"}"#));
    }

    #[test]
    fn test_scanner_incomplete_without_closing() {
        let mut scanner = JsonScanner::new();
        assert!(!scanner.push(r#"{"m": {"n": 1}"#));
        assert!(!scanner.is_complete());
    }

    #[test]
    fn test_action_equality() {
        let a = Action::ToolCall {
            name: "echo".into(),
            input: json!({"m": 1}),
        };
        let b = Action::ToolCall {
            name: "echo".into(),
            input: json!({"m": 1}),
        };
        assert_eq!(a, b);
    }
}
