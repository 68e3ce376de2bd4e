//! `filescout chat`: Interactive or single-message chat mode.

use filescout_agent::{LoopOutcome, SessionManager, StopReason};
use filescout_config::AppConfig;
use filescout_core::conversation::SessionId;
use filescout_core::event::{DomainEvent, EventBus};
use filescout_core::message::{Role, Turn};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

const BANNER: [&str; 3] = [
    "╔══════════════════════════════════════════════╗",
    "║        FileScout: Interactive Mode           ║",
    "╚══════════════════════════════════════════════╝",
];

pub struct ChatOptions {
    pub message: Option<String>,
    pub session: Option<String>,
    pub show_thinking: bool,
}

pub async fn run(
    config_path: Option<&Path>,
    options: ChatOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;

    // Fail early with setup instructions when no key is configured
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    export FILESCOUT_API_KEY='sk-...'");
        eprintln!("    export MY_OPENAI_API_KEY='sk-...'");
        eprintln!("    export OPENAI_API_KEY='sk-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", super::config_file(config_path).display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = filescout_providers::provider_from_config(&config)?;
    let tools = Arc::new(filescout_tools::default_registry(&config.tools));
    let store = filescout_memory::store_from_settings(&config.sessions);
    let events = Arc::new(EventBus::default());
    let tool_names: Vec<String> = tools.names().iter().map(|n| n.to_string()).collect();

    let manager = filescout_agent::build_session_manager(
        &config,
        provider,
        tools,
        store,
        events.clone(),
    );
    let mut rx = events.subscribe();

    let session = options
        .session
        .as_deref()
        .map(SessionId::from)
        .unwrap_or_default();
    tracing::debug!(session = %session, model = %config.model, "Chat started");

    if let Some(msg) = options.message {
        // Single message mode
        let mut view = TurnView::new(&session, options.show_thinking, false);
        run_turn(&manager, &session, &msg, &mut rx, &mut view).await?;
        return Ok(());
    }

    // Interactive mode
    let state = manager.open_session(&session).await?;

    println!();
    for line in BANNER {
        println!("  {line}");
    }
    println!();
    print_summary(&config, &session, &tool_names);
    if !state.is_empty() {
        println!("  Resumed:   {} earlier turns", state.len());
    }
    println!();
    println!("  Ask about files and directories, then press Enter.");
    println!("  Commands: 'show' history, 'clear' session, 'tools', 'quit'.");
    println!();

    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "quit" | "exit" | "q" => break,
            "clear" => {
                manager.reset_session(&session).await?;
                println!("  Session cleared.");
                println!();
            }
            "show" => {
                print_history(&manager.get_history(&session).await?);
            }
            "tools" => {
                println!("  Tools: {}", tool_names.join(", "));
                println!();
            }
            text => {
                let mut view = TurnView::new(&session, options.show_thinking, true);
                if let Err(e) = run_turn(&manager, &session, text, &mut rx, &mut view).await {
                    eprintln!("  [Error] {e}");
                    println!();
                }
            }
        }
    }

    println!("  Goodbye!");
    Ok(())
}

fn print_summary(config: &AppConfig, session: &SessionId, tool_names: &[String]) {
    println!("  Provider:  {}", config.provider);
    println!("  Model:     {}", config.model);
    println!("  Endpoint:  {}", config.api_base);
    println!("  Tools:     {}", tool_names.join(", "));
    println!("  Session:   {session}");
}

/// Post `text` and render events while the loop runs.
///
/// Every event of the run is published before `post` returns, so draining
/// the receiver afterwards leaves nothing behind for the next turn.
async fn run_turn(
    manager: &SessionManager,
    session: &SessionId,
    text: &str,
    rx: &mut broadcast::Receiver<Arc<DomainEvent>>,
    view: &mut TurnView,
) -> Result<(), Box<dyn std::error::Error>> {
    let post = manager.post(session, text);
    tokio::pin!(post);

    let outcome = loop {
        tokio::select! {
            outcome = &mut post => break outcome,
            event = rx.recv() => {
                if let Ok(event) = event {
                    view.render(&event);
                }
            }
        }
    };
    while let Ok(event) = rx.try_recv() {
        view.render(&event);
    }

    view.finish(&outcome?);
    Ok(())
}

/// Terminal rendering of one run of the control loop.
struct TurnView {
    session: String,
    show_thinking: bool,
    interactive: bool,
    streamed: bool,
}

impl TurnView {
    fn new(session: &SessionId, show_thinking: bool, interactive: bool) -> Self {
        Self {
            session: session.to_string(),
            show_thinking,
            interactive,
            streamed: false,
        }
    }

    fn render(&mut self, event: &DomainEvent) {
        match event {
            DomainEvent::DecisionMade {
                session_id,
                action,
                thinking,
                plan,
                fallback,
                ..
            } if self.show_thinking && *session_id == self.session => {
                if !thinking.is_empty() {
                    eprintln!("  [thinking] {thinking}");
                }
                if !plan.is_empty() {
                    eprintln!("  [plan] {plan}");
                }
                let note = if *fallback { " (fallback)" } else { "" };
                eprintln!("  [decision] {action}{note}");
            }
            DomainEvent::ToolStarted {
                session_id,
                tool_name,
                arguments,
                ..
            } if *session_id == self.session => {
                eprintln!("  [tool] {tool_name} {arguments}");
            }
            DomainEvent::ToolExecuted {
                session_id,
                tool_name,
                success,
                duration_ms,
                ..
            } if *session_id == self.session && (!success || self.show_thinking) => {
                let status = if *success { "ok" } else { "failed" };
                eprintln!("  [tool] {tool_name} {status} ({duration_ms} ms)");
            }
            DomainEvent::AnswerChunk {
                session_id,
                content,
            } if *session_id == self.session => {
                if !self.streamed {
                    self.streamed = true;
                    if self.interactive {
                        println!();
                        print!("  Assistant > ");
                    }
                }
                print!("{content}");
                let _ = std::io::stdout().flush();
            }
            DomainEvent::ErrorOccurred {
                context,
                error_message,
                ..
            } if self.show_thinking => {
                eprintln!("  [warning] {context}: {error_message}");
            }
            _ => {}
        }
    }

    fn finish(&mut self, outcome: &LoopOutcome) {
        if self.streamed {
            println!();
        } else if let Some(reply) = outcome.reply() {
            if self.interactive {
                println!();
                for line in reply.lines() {
                    println!("  Assistant > {line}");
                }
            } else {
                println!("{reply}");
            }
        }

        if self.interactive {
            if outcome.stop == StopReason::BudgetExceeded {
                eprintln!("  [stopped after {} decisions]", outcome.iterations);
            }
            println!();
        }
    }
}

fn print_history(turns: &[Turn]) {
    if turns.is_empty() {
        println!("  (no turns yet)");
        println!();
        return;
    }

    for turn in turns {
        match turn.role {
            Role::User => println!("  [user] {}", turn.content),
            Role::Assistant => match &turn.tool_call {
                Some(call) => println!("  [assistant] calls {} {}", call.name, call.arguments),
                None => println!("  [assistant] {}", turn.content),
            },
            Role::Tool => {
                let marker = if turn.is_error() { "tool error" } else { "tool" };
                println!("  [{marker}] {}", preview(&turn.content, 200));
            }
            Role::System => println!("  [system] {}", turn.content),
        }
    }
    println!();
}

/// First `max` characters of `text` on a single line.
fn preview(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        flat
    } else {
        let head: String = flat.chars().take(max).collect();
        format!("{head}…")
    }
}
