//! Claude (Anthropic) provider implementation
//!
//! Implements the `ChatProvider` trait against Anthropic's Messages API with
//! SSE streaming. Tool calling happens entirely through the action grammar in
//! message text, so only text deltas are consumed from the stream.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{RankError, Result};
use crate::session::{Message, Role};

use super::{ChatOptions, ChatProvider, StreamEvent, Usage};

/// The Claude API endpoint URL.
const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// The default Claude model to use.
/// Can be overridden at compile time with `RANKMATE_CLAUDE_DEFAULT_MODEL`.
const DEFAULT_MODEL: &str = match option_env!("RANKMATE_CLAUDE_DEFAULT_MODEL") {
    Some(v) => v,
    None => "claude-sonnet-4-5-20250929",
};

/// The Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Overall bound on one streamed completion, including body read.
const STREAM_TIMEOUT_SECS: u64 = 120;

/// Claude/Anthropic streaming provider.
pub struct ClaudeProvider {
    api_key: String,
    client: Client,
}

impl ClaudeProvider {
    /// Create a new Claude provider with the given API key.
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(STREAM_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Create a provider with a custom HTTP client (testing, proxies).
    pub fn with_client(api_key: &str, client: Client) -> Self {
        Self {
            api_key: api_key.to_string(),
            client,
        }
    }
}

#[async_trait]
impl ChatProvider for ClaudeProvider {
    async fn stream_chat(
        &self,
        messages: Vec<Message>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let model = model.unwrap_or(DEFAULT_MODEL);
        let (system, wire_messages) = convert_messages(messages);

        let request = ClaudeRequest {
            model: model.to_string(),
            max_tokens: options.max_tokens.unwrap_or(8192),
            messages: wire_messages,
            system,
            temperature: options.temperature,
            top_p: options.top_p,
            stop_sequences: options.stop,
            stream: true,
        };

        let response = self
            .client
            .post(CLAUDE_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            let body = if let Ok(err) = serde_json::from_str::<ClaudeErrorResponse>(&error_text) {
                format!("{} - {}", err.error.r#type, err.error.message)
            } else {
                error_text
            };
            return Err(RankError::Provider(format!(
                "Claude API error ({}): {}",
                status, body
            )));
        }

        let (tx, rx) = mpsc::channel::<StreamEvent>(32);
        let byte_stream = response.bytes_stream();

        tokio::spawn(async move {
            let mut assembled = String::new();
            let mut input_tokens: u32 = 0;
            let mut output_tokens: u32 = 0;
            let mut line_buffer = String::new();

            tokio::pin!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx
                            .send(StreamEvent::Error(format!("Stream read error: {}", e)))
                            .await;
                        return;
                    }
                };

                line_buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(newline_pos) = line_buffer.find('\n') {
                    let line = line_buffer[..newline_pos].trim().to_string();
                    line_buffer = line_buffer[newline_pos + 1..].to_string();

                    if line.is_empty() || line.starts_with("event:") {
                        continue;
                    }
                    let data = match line.strip_prefix("data:") {
                        Some(stripped) => stripped.trim_start(),
                        None => continue,
                    };
                    if data == "[DONE]" {
                        break;
                    }

                    let sse: SseEvent = match serde_json::from_str(data) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };

                    match sse.event_type.as_str() {
                        "message_start" => {
                            if let Some(usage) = sse.message.and_then(|m| m.usage) {
                                input_tokens = usage.input_tokens.unwrap_or(0);
                            }
                        }
                        "content_block_delta" => {
                            if let Some(delta) = &sse.delta {
                                if delta.delta_type.as_deref() == Some("text_delta") {
                                    if let Some(text) = &delta.text {
                                        assembled.push_str(text);
                                        if tx
                                            .send(StreamEvent::Delta(text.clone()))
                                            .await
                                            .is_err()
                                        {
                                            return;
                                        }
                                    }
                                }
                            }
                        }
                        "message_delta" => {
                            if let Some(usage) = &sse.usage {
                                output_tokens = usage.output_tokens.unwrap_or(0);
                            }
                        }
                        "message_stop" => {
                            let _ = tx
                                .send(StreamEvent::Done {
                                    content: assembled,
                                    usage: Some(Usage::new(input_tokens, output_tokens)),
                                })
                                .await;
                            return;
                        }
                        _ => {}
                    }
                }
            }

            let _ = tx
                .send(StreamEvent::Done {
                    content: assembled,
                    usage: Some(Usage::new(input_tokens, output_tokens)),
                })
                .await;
        });

        Ok(rx)
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    fn name(&self) -> &str {
        "claude"
    }
}

/// Convert runtime messages into the Claude wire format, extracting system
/// content into the dedicated `system` field. Tool results are carried as
/// user-role messages since the action grammar is plain text. Consecutive
/// same-role messages are merged; the API requires alternation.
fn convert_messages(messages: Vec<Message>) -> (Option<String>, Vec<WireMessage>) {
    let mut system_parts: Vec<String> = Vec::new();
    let mut wire: Vec<WireMessage> = Vec::new();

    for msg in messages {
        let role = match msg.role {
            Role::System => {
                system_parts.push(msg.content);
                continue;
            }
            Role::Human | Role::ToolResult => "user",
            Role::Ai => "assistant",
        };
        match wire.last_mut() {
            Some(last) if last.role == role => {
                last.content.push_str("\n\n");
                last.content.push_str(&msg.content);
            }
            _ => wire.push(WireMessage {
                role: role.to_string(),
                content: msg.content,
            }),
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    (system, wire)
}

// ============================================================================
// Claude API wire types
// ============================================================================

#[derive(Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
    stream: bool,
}

#[derive(Serialize, Debug, PartialEq)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ClaudeErrorResponse {
    error: ClaudeErrorDetail,
}

#[derive(Deserialize)]
struct ClaudeErrorDetail {
    r#type: String,
    message: String,
}

#[derive(Deserialize)]
struct SseEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    message: Option<SseMessage>,
    #[serde(default)]
    delta: Option<SseDelta>,
    #[serde(default)]
    usage: Option<SseUsage>,
}

#[derive(Deserialize)]
struct SseMessage {
    #[serde(default)]
    usage: Option<SseUsage>,
}

#[derive(Deserialize)]
struct SseDelta {
    #[serde(rename = "type", default)]
    delta_type: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct SseUsage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}
