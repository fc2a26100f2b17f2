//! Provider types for RankMate
//!
//! This module defines the narrow contract the runtime consumes from LLM
//! providers: a streaming chat call plus the option and usage types that
//! travel with it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::session::Message;

/// Token usage reported by the provider per completed call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// One event on a provider's token stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// An increment of model output, delivered as soon as it arrives.
    Delta(String),
    /// The stream finished; `content` is the full assembled output.
    Done {
        content: String,
        usage: Option<Usage>,
    },
    /// The stream failed mid-flight. Turn-fatal.
    Error(String),
}

/// Options for chat completion requests.
///
/// # Example
/// ```
/// use rankmate::providers::ChatOptions;
///
/// let options = ChatOptions::new().with_max_tokens(1024).with_temperature(0.4);
/// assert_eq!(options.max_tokens, Some(1024));
/// assert_eq!(options.temperature, Some(0.4));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Maximum number of tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature for sampling (0.0 = deterministic)
    pub temperature: Option<f32>,
    /// Nucleus sampling parameter
    pub top_p: Option<f32>,
    /// Stop sequences that halt generation
    pub stop: Option<Vec<String>>,
}

impl ChatOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }
}

/// Trait for streaming LLM providers.
///
/// The runtime drives providers exclusively through `stream_chat`; there is
/// no separate structured function-calling channel — the tool catalog lives
/// in the system message and actions come back as text in the action grammar.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Start a streaming chat completion.
    ///
    /// `messages` is the full conversation including the leading system
    /// message; providers translate roles into their own wire format.
    ///
    /// The returned receiver yields `Delta` increments as they arrive,
    /// terminated by exactly one `Done` (or an `Error` on transport failure).
    ///
    /// # Errors
    /// Returns an error when the request cannot be started (connection or
    /// authentication failure). Mid-stream failures arrive as
    /// [`StreamEvent::Error`].
    async fn stream_chat(
        &self,
        messages: Vec<Message>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<mpsc::Receiver<StreamEvent>>;

    /// The default model for this provider.
    fn default_model(&self) -> &str;

    /// The provider name (e.g., "claude").
    fn name(&self) -> &str;
}
