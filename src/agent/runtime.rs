//! Agent runtime - the turn-based orchestration loop
//!
//! One `AgentRuntime` drives one session: it alternates between asking the
//! model for the next action and executing that action, within a bounded
//! number of iterations per user turn. Model-level failures (bad grammar,
//! unknown tools, tool errors) are fed back to the model as tool results;
//! only transport failures abort a turn.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::AgentDefaults;
use crate::error::Result;
use crate::events::{AgentEvent, EventSink};
use crate::normalize::{self, Notice};
use crate::providers::{ChatOptions, ChatProvider, StreamEvent};
use crate::session::{Message, Role, SessionKey, SessionStore};
use crate::tools::{loader, ToolTable};

use super::action::{parse_action, Action, JsonScanner};
use super::prompt::PromptBuilder;

/// Caller-supplied agent definition: persona/goal text, the tool ids to load,
/// and an optional model override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Persona/goal text prepended to the system prompt
    pub persona: String,
    /// Tool identifiers to resolve from the tool table
    #[serde(default)]
    pub tools: Vec<String>,
    /// Model override; falls back to the configured default
    #[serde(default)]
    pub model: Option<String>,
}

impl AgentConfig {
    pub fn new(persona: &str) -> Self {
        Self {
            persona: persona.to_string(),
            tools: Vec::new(),
            model: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }
}

/// The per-session orchestration loop.
///
/// States flow `Idle → Initializing → Thinking → (ExecutingTool → Thinking)*
/// → Emitting → Idle`; a turn in any state can fall into `Erroring` on a
/// transport failure. Progress is observed through the [`EventSink`];
/// `process_message` itself only reports turn-fatal failures.
pub struct AgentRuntime {
    defaults: AgentDefaults,
    provider: Arc<dyn ChatProvider>,
    registry: crate::tools::ToolRegistry,
    store: SessionStore,
    sink: Arc<dyn EventSink>,
    session_key: SessionKey,
    system_prompt: String,
    model: String,
}

impl AgentRuntime {
    /// Initialize a runtime with the built-in tool table.
    ///
    /// Loads the agent's tools, renders the system prompt, and seeds the
    /// session history with the system message.
    ///
    /// # Errors
    /// Fails with [`crate::error::RankError::Registry`] when tools were
    /// requested and none resolved.
    pub async fn initialize(
        agent: AgentConfig,
        session_key: SessionKey,
        provider: Arc<dyn ChatProvider>,
        store: SessionStore,
        sink: Arc<dyn EventSink>,
        defaults: AgentDefaults,
    ) -> Result<Self> {
        let table = loader::builtin_table();
        Self::initialize_with_table(agent, session_key, provider, store, sink, defaults, &table)
            .await
    }

    /// Initialize a runtime resolving tools from a caller-provided table.
    #[allow(clippy::too_many_arguments)]
    pub async fn initialize_with_table(
        agent: AgentConfig,
        session_key: SessionKey,
        provider: Arc<dyn ChatProvider>,
        store: SessionStore,
        sink: Arc<dyn EventSink>,
        defaults: AgentDefaults,
        table: &ToolTable,
    ) -> Result<Self> {
        let registry = loader::load(
            table,
            &agent.tools,
            Duration::from_secs(defaults.tool_timeout_secs),
        )?;
        let system_prompt = PromptBuilder::new().with_persona(&agent.persona).build(&registry);
        let model = agent
            .model
            .clone()
            .unwrap_or_else(|| defaults.model.clone());

        let runtime = Self {
            defaults,
            provider,
            registry,
            store,
            sink,
            session_key,
            system_prompt,
            model,
        };
        runtime.seed_system_message().await;
        info!(
            session = %runtime.session_key,
            tools = runtime.registry.len(),
            model = %runtime.model,
            "Agent session initialized"
        );
        Ok(runtime)
    }

    /// The session this runtime drives.
    pub fn session_key(&self) -> &SessionKey {
        &self.session_key
    }

    /// Names of the loaded tools.
    pub fn tool_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    /// Ensure the history begins with exactly one system message. Expired
    /// sessions are re-seeded transparently.
    async fn seed_system_message(&self) {
        if self.store.history(&self.session_key).await.is_empty() {
            self.store
                .append(&self.session_key, Message::system(&self.system_prompt))
                .await;
        }
    }

    /// Process one user turn.
    ///
    /// Streams progress through the sink; the final answer arrives as an
    /// [`AgentEvent::Final`]. When `is_edit` is set, history is truncated
    /// back to (and excluding) the previous user message before the turn
    /// runs, so the resubmitted message sees a history consistent with the
    /// edit having always been there.
    ///
    /// # Errors
    /// - [`crate::error::RankError::TurnInProgress`] when a turn is already
    ///   in flight for this session (rejected, not queued)
    /// - [`crate::error::RankError::Provider`] on LLM transport failure; the
    ///   history is left as-is so the next turn can retry against it
    pub async fn process_message(&self, text: &str, is_edit: bool) -> Result<()> {
        let _guard = self.store.begin_turn(&self.session_key)?;
        let request_id = Uuid::new_v4();
        let span = info_span!(
            "turn",
            request_id = %request_id,
            session = %self.session_key,
            is_edit = is_edit,
        );
        self.run_turn(text, is_edit).instrument(span).await
    }

    async fn run_turn(&self, text: &str, is_edit: bool) -> Result<()> {
        self.seed_system_message().await;

        if is_edit {
            let history = self.store.history(&self.session_key).await;
            if let Some(k) = history.iter().rposition(|m| m.role == Role::Human) {
                info!(kept = k, dropped = history.len() - k, "Edit: truncating history");
                self.store.truncate(&self.session_key, k).await;
            }
        }
        self.store
            .append(&self.session_key, Message::human(text))
            .await;

        let max_iterations = self.defaults.max_iterations;
        let mut gathered: Vec<String> = Vec::new();

        for iteration in 1..=max_iterations {
            debug!(iteration, max_iterations, "Thinking");
            let content = self.think().await?;

            match parse_action(&content) {
                Ok(Action::FinalAnswer(answer)) => {
                    let rendered = normalize::present_text(&answer);
                    self.store
                        .append(&self.session_key, Message::ai(&answer))
                        .await;
                    self.sink.send(AgentEvent::Final(rendered)).await;
                    info!(iterations = iteration, "Turn complete");
                    return Ok(());
                }
                Ok(Action::ToolCall { name, input }) => {
                    self.store
                        .append(
                            &self.session_key,
                            Message::action(&content, &name, input.clone()),
                        )
                        .await;
                    let notice = normalize::notice_envelope(
                        Notice::ToolStarted,
                        &format!("Using tool: {}", name),
                    );
                    self.sink
                        .send(AgentEvent::ToolStarted {
                            tool: name.clone(),
                            notice,
                        })
                        .await;

                    info!(tool = %name, "Executing tool");
                    let result = self.registry.execute(&name, input).await;
                    if result.is_error {
                        let message = result.error_message().unwrap_or("tool failed");
                        let notice = normalize::notice_envelope(
                            Notice::ToolFailed,
                            &format!("Tool {} failed: {}", name, message),
                        );
                        self.sink
                            .send(AgentEvent::ToolFailed {
                                tool: name.clone(),
                                notice,
                            })
                            .await;
                    }
                    let rendered = normalize::present(&result.value);
                    if !result.is_error {
                        gathered.push(rendered.clone());
                    }
                    self.store
                        .append(&self.session_key, Message::tool_result(&name, &rendered))
                        .await;
                }
                Err(e) => {
                    warn!(error = %e, "Model output failed to parse; feeding back");
                    self.store
                        .append(&self.session_key, Message::ai(&content))
                        .await;
                    let failure = crate::tools::ToolResult::error(
                        "action_parser",
                        &format!(
                            "{}. Respond with exactly one JSON action object and nothing else.",
                            e
                        ),
                    );
                    let rendered = normalize::present(&failure.value);
                    self.store
                        .append(
                            &self.session_key,
                            Message::tool_result("action_parser", &rendered),
                        )
                        .await;
                }
            }
        }

        // Iteration cap reached: force-terminate with a best-effort answer
        // assembled from whatever the tools produced this turn.
        info!(
            iterations = max_iterations,
            "Iteration cap reached; emitting best-effort answer"
        );
        let answer = best_effort_answer(&gathered);
        self.store
            .append(&self.session_key, Message::ai(&answer))
            .await;
        self.sink.send(AgentEvent::Final(answer)).await;
        Ok(())
    }

    /// One Thinking step: stream the model over the full history, forwarding
    /// each increment to the sink until the action object is structurally
    /// complete, and return the full response text.
    async fn think(&self) -> Result<String> {
        let history = self.store.history(&self.session_key).await;
        let options = ChatOptions::new()
            .with_max_tokens(self.defaults.max_tokens)
            .with_temperature(self.defaults.temperature);

        let mut rx = match self
            .provider
            .stream_chat(history, Some(self.model.as_str()), options)
            .await
        {
            Ok(rx) => rx,
            Err(e) => {
                self.sink.send(AgentEvent::Error(e.to_string())).await;
                return Err(e);
            }
        };

        let mut scanner = JsonScanner::new();
        let mut accumulated = String::new();
        let mut done_content: Option<String> = None;

        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::Delta(delta) => {
                    let was_complete = scanner.is_complete();
                    scanner.push(&delta);
                    accumulated.push_str(&delta);
                    if !was_complete {
                        self.sink.send(AgentEvent::Token(delta)).await;
                    }
                }
                StreamEvent::Done { content, usage } => {
                    if let Some(u) = usage {
                        debug!(
                            prompt_tokens = u.prompt_tokens,
                            completion_tokens = u.completion_tokens,
                            "LLM call complete"
                        );
                    }
                    done_content = Some(content);
                }
                StreamEvent::Error(message) => {
                    let err = crate::error::RankError::Provider(message);
                    self.sink.send(AgentEvent::Error(err.to_string())).await;
                    return Err(err);
                }
            }
        }

        Ok(done_content.unwrap_or(accumulated))
    }
}

/// Best-effort answer when the iteration cap is exhausted: surface what the
/// tools returned instead of failing the turn.
fn best_effort_answer(gathered: &[String]) -> String {
    if gathered.is_empty() {
        "I could not complete the request within the allowed number of steps.".to_string()
    } else {
        format!(
            "I ran out of steps before reaching a final answer. Here is what the tools returned so far:\n\n{}",
            gathered.join("\n\n")
        )
    }
}
