//! RankMate CLI - interactive chat against the agent runtime

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use rankmate::agent::{AgentConfig, AgentRuntime};
use rankmate::config::Config;
use rankmate::events::{AgentEvent, EventSink};
use rankmate::providers::ClaudeProvider;
use rankmate::session::{SessionKey, SessionStore};
use rankmate::utils::logging::init_logging;

const DEFAULT_PERSONA: &str = "You are RankMate, a marketing assistant. \
You help with SEO research, content analysis, and API lookups. \
Be concise and use tools when they help.";

#[derive(Parser)]
#[command(name = "rankmate", version, about = "Marketing assistant agent runtime")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive chat session
    Chat {
        /// Agent identity used for the session key
        #[arg(long, default_value = "rankmate")]
        agent: String,
        /// Optional client/tenant identity for the session key
        #[arg(long)]
        client: Option<String>,
        /// Persona/goal text for the system prompt
        #[arg(long)]
        persona: Option<String>,
        /// Comma-separated tool ids to load
        #[arg(long, value_delimiter = ',', default_value = "echo,http_request,keyword_density")]
        tools: Vec<String>,
        /// Model override
        #[arg(long)]
        model: Option<String>,
        /// Print raw model tokens as they stream
        #[arg(long)]
        stream: bool,
    },
}

/// Sink that renders agent events on the terminal.
struct PrintSink {
    show_tokens: bool,
}

#[async_trait]
impl EventSink for PrintSink {
    async fn send(&self, event: AgentEvent) {
        match event {
            AgentEvent::Token(token) => {
                if self.show_tokens {
                    print!("{}", token);
                    let _ = std::io::Write::flush(&mut std::io::stdout());
                }
            }
            AgentEvent::ToolStarted { notice, .. } | AgentEvent::ToolFailed { notice, .. } => {
                eprintln!("{}", notice);
            }
            AgentEvent::Final(answer) => {
                if self.show_tokens {
                    println!();
                }
                println!("{}", answer);
            }
            AgentEvent::Error(message) => {
                eprintln!("error: {}", message);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::load().context("failed to load config")?;
    init_logging(&config.logging);

    let cli = Cli::parse();
    match cli.command {
        Command::Chat {
            agent,
            client,
            persona,
            tools,
            model,
            stream,
        } => {
            let api_key = std::env::var("ANTHROPIC_API_KEY")
                .context("ANTHROPIC_API_KEY is not set (env or .env)")?;
            let provider = Arc::new(ClaudeProvider::new(&api_key));
            let store = SessionStore::new(Duration::from_secs(config.agent.session_ttl_secs));
            let sink = Arc::new(PrintSink { show_tokens: stream });

            let mut agent_config =
                AgentConfig::new(persona.as_deref().unwrap_or(DEFAULT_PERSONA)).with_tools(tools);
            if let Some(model) = &model {
                agent_config = agent_config.with_model(model);
            }

            let session_key = SessionKey::new(&agent, client.as_deref());
            let runtime = AgentRuntime::initialize(
                agent_config,
                session_key,
                provider,
                store,
                sink,
                config.agent.clone(),
            )
            .await
            .context("failed to initialize agent session")?;

            chat_loop(&runtime).await
        }
    }
}

/// Read lines from stdin and run one turn per line. A line starting with
/// `/edit ` re-submits as an edit of the previous user message.
async fn chat_loop(runtime: &AgentRuntime) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprintln!("rankmate chat - /edit <text> to edit your last message, /quit to leave");
    loop {
        stdout.write_all(b"you> ").await?;
        stdout.flush().await?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }

        let (text, is_edit) = match line.strip_prefix("/edit ") {
            Some(rest) => (rest, true),
            None => (line, false),
        };

        if let Err(e) = runtime.process_message(text, is_edit).await {
            eprintln!("turn failed: {}", e);
        }
    }
    Ok(())
}
