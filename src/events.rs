//! Delivery events and sinks
//!
//! The agent loop reports progress through an [`EventSink`]: token increments
//! as the model streams, tool-execution notifications as distinct
//! message-typed events (never interleaved into answer text), the normalized
//! final answer, and turn-fatal errors. Sends are fire-and-forget from the
//! loop's perspective; a slow or closed sink never fails a turn.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

/// One event delivered to the client transport.
///
/// Serializes as `{"type": ..., "payload": ...}` so transports can route on
/// the tag without understanding payloads.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum AgentEvent {
    /// One streamed increment of model output.
    Token(String),
    /// A tool is about to run. `notice` carries the UI-ready envelope.
    ToolStarted { tool: String, notice: String },
    /// A tool call failed (recoverable; the turn continues).
    ToolFailed { tool: String, notice: String },
    /// The normalized final answer of a turn.
    Final(String),
    /// A turn-fatal error; the turn is aborted, history is left as-is.
    Error(String),
}

/// Sink for agent events.
///
/// Implementations wrap whatever transport delivers events to the client
/// (websocket, channel, terminal). `send` must not block the turn on client
/// backpressure and must not propagate failures.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, event: AgentEvent);
}

/// Sink backed by a bounded tokio channel.
///
/// # Example
///
/// ```
/// use rankmate::events::{AgentEvent, ChannelSink, EventSink};
///
/// #[tokio::main]
/// async fn main() {
///     let (sink, mut rx) = ChannelSink::new(16);
///     sink.send(AgentEvent::Token("hi".into())).await;
///     assert_eq!(rx.recv().await, Some(AgentEvent::Token("hi".into())));
/// }
/// ```
pub struct ChannelSink {
    tx: mpsc::Sender<AgentEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver its events arrive on.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<AgentEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn send(&self, event: AgentEvent) {
        // Fire-and-forget: a dropped receiver must not fail the turn.
        let _ = self.tx.send(event).await;
    }
}

/// Sink that discards all events. Useful for headless runs and tests.
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn send(&self, _event: AgentEvent) {}
}

/// Sink that records every event in memory.
///
/// Clones share the same buffer, so tests can hand one clone to the runtime
/// and inspect the other after the turn.
#[derive(Clone, Default)]
pub struct CollectingSink {
    events: Arc<Mutex<Vec<AgentEvent>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events received so far.
    pub fn events(&self) -> Vec<AgentEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EventSink for CollectingSink {
    async fn send(&self, event: AgentEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
