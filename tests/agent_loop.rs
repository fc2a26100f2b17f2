//! End-to-end tests for the agent turn loop: iteration bounds, edit
//! truncation, error feedback, and concurrent-turn rejection, driven by a
//! scripted provider.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use rankmate::agent::{AgentConfig, AgentRuntime};
use rankmate::config::AgentDefaults;
use rankmate::error::{RankError, Result};
use rankmate::events::{AgentEvent, CollectingSink};
use rankmate::providers::{ChatOptions, ChatProvider, StreamEvent, Usage};
use rankmate::session::{Message, Role, SessionKey, SessionStore};

/// Provider that replays scripted responses. Each call pops the next script;
/// the last script repeats forever. Responses stream in small chunks so the
/// completeness scanner is exercised.
struct ScriptedProvider {
    scripts: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    fn new(scripts: &[&str]) -> Self {
        Self {
            scripts: Mutex::new(scripts.iter().map(|s| s.to_string()).collect()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_script(&self) -> String {
        let mut scripts = self.scripts.lock().unwrap();
        if scripts.len() > 1 {
            scripts.pop_front().unwrap()
        } else {
            scripts.front().cloned().unwrap_or_default()
        }
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn stream_chat(
        &self,
        _messages: Vec<Message>,
        _model: Option<&str>,
        _options: ChatOptions,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self.next_script();
        let delay = self.delay;
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let chars: Vec<char> = script.chars().collect();
            for chunk in chars.chunks(7) {
                let delta: String = chunk.iter().collect();
                if tx.send(StreamEvent::Delta(delta)).await.is_err() {
                    return;
                }
            }
            let _ = tx
                .send(StreamEvent::Done {
                    content: script,
                    usage: Some(Usage::new(10, 5)),
                })
                .await;
        });
        Ok(rx)
    }

    fn default_model(&self) -> &str {
        "scripted"
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Provider whose stream fails immediately with a transport error.
struct BrokenProvider;

#[async_trait]
impl ChatProvider for BrokenProvider {
    async fn stream_chat(
        &self,
        _messages: Vec<Message>,
        _model: Option<&str>,
        _options: ChatOptions,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            let _ = tx
                .send(StreamEvent::Error("connection reset".into()))
                .await;
        });
        Ok(rx)
    }

    fn default_model(&self) -> &str {
        "broken"
    }

    fn name(&self) -> &str {
        "broken"
    }
}

const FINAL_DONE: &str = r#"{"action": "Final Answer", "action_input": "Done"}"#;
const ECHO_ACTION: &str = r#"{"action": "echo", "action_input": {"message": "ping"}}"#;

async fn build_runtime(
    provider: Arc<dyn ChatProvider>,
    store: SessionStore,
    sink: CollectingSink,
) -> AgentRuntime {
    AgentRuntime::initialize(
        AgentConfig::new("You are a test assistant.").with_tools(vec!["echo".into()]),
        SessionKey::new("test-bot", Some("tenant-1")),
        provider,
        store,
        Arc::new(sink),
        AgentDefaults::default(),
    )
    .await
    .expect("runtime initialization failed")
}

fn final_events(sink: &CollectingSink) -> Vec<String> {
    sink.events()
        .into_iter()
        .filter_map(|e| match e {
            AgentEvent::Final(answer) => Some(answer),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn final_answer_on_first_response_takes_one_iteration() {
    let provider = Arc::new(ScriptedProvider::new(&[FINAL_DONE]));
    let store = SessionStore::with_default_ttl();
    let sink = CollectingSink::new();
    let runtime = build_runtime(provider.clone(), store.clone(), sink.clone()).await;

    runtime.process_message("hello", false).await.unwrap();

    assert_eq!(provider.calls(), 1);
    assert_eq!(final_events(&sink), vec!["Done".to_string()]);

    let history = store.history(runtime.session_key()).await;
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].role, Role::System);
    assert_eq!(history[1].role, Role::Human);
    assert_eq!(history[2].role, Role::Ai);
    assert_eq!(history[2].content, "Done");
}

#[tokio::test]
async fn tokens_stream_before_the_final_answer() {
    let provider = Arc::new(ScriptedProvider::new(&[FINAL_DONE]));
    let sink = CollectingSink::new();
    let runtime =
        build_runtime(provider, SessionStore::with_default_ttl(), sink.clone()).await;

    runtime.process_message("hello", false).await.unwrap();

    let events = sink.events();
    let tokens: String = events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::Token(t) => Some(t.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(tokens, FINAL_DONE);
    // Tokens arrive before the final event
    let first_token = events
        .iter()
        .position(|e| matches!(e, AgentEvent::Token(_)))
        .unwrap();
    let final_pos = events
        .iter()
        .position(|e| matches!(e, AgentEvent::Final(_)))
        .unwrap();
    assert!(first_token < final_pos);
}

#[tokio::test]
async fn iteration_cap_forces_best_effort_answer() {
    // The model never emits a final answer; the loop must terminate in
    // exactly max_iterations LLM calls with a non-empty answer.
    let provider = Arc::new(ScriptedProvider::new(&[ECHO_ACTION]));
    let store = SessionStore::with_default_ttl();
    let sink = CollectingSink::new();
    let runtime = build_runtime(provider.clone(), store.clone(), sink.clone()).await;

    runtime.process_message("loop forever", false).await.unwrap();

    let defaults = AgentDefaults::default();
    assert_eq!(provider.calls(), defaults.max_iterations as usize);

    let finals = final_events(&sink);
    assert_eq!(finals.len(), 1);
    assert!(!finals[0].is_empty());
    assert!(finals[0].contains("ping"));

    // system + human + (action + tool-result) per iteration + forced answer
    let history = store.history(runtime.session_key()).await;
    assert_eq!(
        history.len(),
        2 + 2 * defaults.max_iterations as usize + 1
    );
    assert_eq!(history.last().unwrap().role, Role::Ai);
}

#[tokio::test]
async fn unknown_tool_is_fed_back_and_loop_continues() {
    let unknown = r#"{"action": "dataforseo_serp", "action_input": {"q": "crm"}}"#;
    let provider = Arc::new(ScriptedProvider::new(&[unknown, FINAL_DONE]));
    let store = SessionStore::with_default_ttl();
    let sink = CollectingSink::new();
    let runtime = build_runtime(provider.clone(), store.clone(), sink.clone()).await;

    runtime.process_message("rank check", false).await.unwrap();

    assert_eq!(provider.calls(), 2);
    assert_eq!(final_events(&sink), vec!["Done".to_string()]);

    let events = sink.events();
    assert!(events.iter().any(|e| matches!(
        e,
        AgentEvent::ToolFailed { tool, .. } if tool == "dataforseo_serp"
    )));

    let history = store.history(runtime.session_key()).await;
    let tool_result = history
        .iter()
        .find(|m| m.is_tool_result())
        .expect("tool result message missing");
    assert_eq!(tool_result.tool_name.as_deref(), Some("dataforseo_serp"));
    assert!(tool_result.content.contains("tool not found"));
    assert!(tool_result.content.contains("\"error\""));
}

#[tokio::test]
async fn malformed_output_is_recovered() {
    let provider = Arc::new(ScriptedProvider::new(&[
        "I should probably think about this first.",
        FINAL_DONE,
    ]));
    let store = SessionStore::with_default_ttl();
    let sink = CollectingSink::new();
    let runtime = build_runtime(provider.clone(), store.clone(), sink.clone()).await;

    runtime.process_message("hello", false).await.unwrap();

    assert_eq!(provider.calls(), 2);
    assert_eq!(final_events(&sink), vec!["Done".to_string()]);

    let history = store.history(runtime.session_key()).await;
    let parser_feedback = history
        .iter()
        .find(|m| m.tool_name.as_deref() == Some("action_parser"))
        .expect("parser feedback missing");
    assert!(parser_feedback.is_tool_result());
}

#[tokio::test]
async fn wrapper_text_around_the_action_is_tolerated() {
    let wrapped = format!("Sure, here you go:\n{}\nHope that helps!", FINAL_DONE);
    let provider = Arc::new(ScriptedProvider::new(&[wrapped.as_str()]));
    let sink = CollectingSink::new();
    let runtime =
        build_runtime(provider.clone(), SessionStore::with_default_ttl(), sink.clone()).await;

    runtime.process_message("hello", false).await.unwrap();

    assert_eq!(provider.calls(), 1);
    assert_eq!(final_events(&sink), vec!["Done".to_string()]);
}

#[tokio::test]
async fn edit_truncates_history_back_to_the_edited_message() {
    let provider = Arc::new(ScriptedProvider::new(&[
        r#"{"action": "Final Answer", "action_input": "first answer"}"#,
        r#"{"action": "Final Answer", "action_input": "second answer"}"#,
        r#"{"action": "Final Answer", "action_input": "edited answer"}"#,
    ]));
    let store = SessionStore::with_default_ttl();
    let sink = CollectingSink::new();
    let runtime = build_runtime(provider, store.clone(), sink.clone()).await;

    runtime.process_message("first message", false).await.unwrap();
    runtime.process_message("second message", false).await.unwrap();

    let before = store.history(runtime.session_key()).await;
    assert_eq!(before.len(), 5); // system, human, ai, human, ai

    runtime.process_message("edited message", true).await.unwrap();

    let after = store.history(runtime.session_key()).await;
    assert_eq!(after.len(), 5);
    // Prefix [0, k) survives exactly
    for (a, b) in after.iter().take(3).zip(before.iter().take(3)) {
        assert_eq!(a.role, b.role);
        assert_eq!(a.content, b.content);
    }
    // Nothing from the edited continuation survives
    assert!(!after.iter().any(|m| m.content.contains("second message")));
    assert!(!after.iter().any(|m| m.content.contains("second answer")));
    assert_eq!(after[3].content, "edited message");
    assert_eq!(after[4].content, "edited answer");
}

#[tokio::test]
async fn concurrent_turn_on_same_session_is_rejected() {
    let provider = Arc::new(
        ScriptedProvider::new(&[FINAL_DONE]).with_delay(Duration::from_millis(150)),
    );
    let store = SessionStore::with_default_ttl();
    let sink = CollectingSink::new();
    let runtime = Arc::new(build_runtime(provider, store.clone(), sink.clone()).await);

    let first = {
        let runtime = Arc::clone(&runtime);
        tokio::spawn(async move { runtime.process_message("slow turn", false).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    let second = runtime.process_message("impatient", false).await;
    assert!(matches!(second, Err(RankError::TurnInProgress(_))));

    first.await.unwrap().unwrap();

    // The in-flight turn's history was not corrupted by the rejection
    let history = store.history(runtime.session_key()).await;
    assert_eq!(history.len(), 3);
    assert_eq!(history[1].content, "slow turn");
    assert!(!history.iter().any(|m| m.content.contains("impatient")));

    // And the flag was released: a third turn runs fine
    runtime.process_message("next turn", false).await.unwrap();
}

#[tokio::test]
async fn transport_failure_aborts_turn_and_keeps_history() {
    let store = SessionStore::with_default_ttl();
    let sink = CollectingSink::new();
    let runtime = AgentRuntime::initialize(
        AgentConfig::new("persona"),
        SessionKey::for_agent("test-bot"),
        Arc::new(BrokenProvider),
        store.clone(),
        Arc::new(sink.clone()),
        AgentDefaults::default(),
    )
    .await
    .unwrap();

    let result = runtime.process_message("hello", false).await;
    assert!(matches!(result, Err(RankError::Provider(_))));

    // Error event reported through the sink
    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, AgentEvent::Error(_))));

    // History left as-is: system + the user message, no rollback
    let history = store.history(runtime.session_key()).await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].content, "hello");
}

#[tokio::test]
async fn tool_results_are_normalized_before_hitting_history() {
    // A tool action against echo: the scalar string stays plain text; the
    // intermediate messages are flagged.
    let provider = Arc::new(ScriptedProvider::new(&[ECHO_ACTION, FINAL_DONE]));
    let store = SessionStore::with_default_ttl();
    let sink = CollectingSink::new();
    let runtime = build_runtime(provider, store.clone(), sink.clone()).await;

    runtime.process_message("ping me", false).await.unwrap();

    let history = store.history(runtime.session_key()).await;
    let action = history.iter().find(|m| m.is_action()).unwrap();
    assert_eq!(action.tool_name.as_deref(), Some("echo"));
    assert!(action.intermediate);

    let result = history.iter().find(|m| m.is_tool_result()).unwrap();
    assert_eq!(result.content, "ping");
    assert!(result.intermediate);

    // Tool start notification was a distinct event, not answer text
    assert!(sink.events().iter().any(|e| matches!(
        e,
        AgentEvent::ToolStarted { tool, .. } if tool == "echo"
    )));
}
