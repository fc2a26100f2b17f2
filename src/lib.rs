//! RankMate - agent runtime for a marketing assistant platform
//!
//! The runtime turns a natural-language user request into a bounded sequence
//! of tool invocations against an LLM: it manages conversation memory with
//! TTL expiry, streams incremental output to a delivery sink, and normalizes
//! heterogeneous tool results into a consistent presentation format.

pub mod agent;
pub mod config;
pub mod error;
pub mod events;
pub mod normalize;
pub mod providers;
pub mod session;
pub mod tools;
pub mod utils;

pub use agent::{Action, AgentConfig, AgentRuntime, PromptBuilder};
pub use config::{AgentDefaults, Config};
pub use error::{RankError, Result};
pub use events::{AgentEvent, ChannelSink, CollectingSink, EventSink, NullSink};
pub use providers::{ChatOptions, ChatProvider, ClaudeProvider, StreamEvent, Usage};
pub use session::{Message, Role, SessionKey, SessionStore};
pub use tools::{Tool, ToolImpl, ToolRegistry, ToolResult, ToolTable};
