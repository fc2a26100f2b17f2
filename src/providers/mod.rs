//! Providers module - LLM provider implementations
//!
//! This module defines the `ChatProvider` trait the runtime consumes and the
//! concrete Claude implementation. Providers deliver output incrementally
//! through an event channel and report usage metadata per completed call.

pub mod claude;
mod types;

pub use claude::ClaudeProvider;
pub use types::{ChatOptions, ChatProvider, StreamEvent, Usage};
