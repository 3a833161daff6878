use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use colored::*;
use tracing_subscriber::EnvFilter;

use answer_stream::cli::{resolve_config, Args, Command};
use answer_stream::transcript::{normalize_transcript, parse_stored};
use answer_stream::{
    render_message, AgentClient, AgentRequest, AssemblerConfig, ChatSession,
    SessionEvent, StoredAnswer, ToggleStore, ToolActivity,
};

fn init_tracing(verbose: bool) {
    let default = if verbose { "answer_stream=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// A stored transcript file: JSON string, JSON array, or raw text.
fn load_transcript(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let answer = parse_stored(&raw).unwrap_or(StoredAnswer::Single(raw));
    Ok(normalize_transcript(&answer))
}

fn store_with_expanded(config: &AssemblerConfig, base: Option<ToggleStore>, expand: &[String]) -> ToggleStore {
    let mut store = base.unwrap_or_else(|| ToggleStore::new(config.special_language.clone()));
    for id in expand {
        store.toggle(id);
    }
    store
}

fn print_header(question: &str, config: &AssemblerConfig) {
    println!("{}", "ANSWER STREAM".bright_cyan().bold());
    println!("{}: {}", "Endpoint".bright_yellow(), config.endpoint);
    println!("{}: {}", "Question".bright_yellow(), question);
    println!("{}", "=".repeat(50).bright_blue());
}

async fn ask(
    question: String,
    token: Option<String>,
    live: bool,
    expand: Vec<String>,
    config: AssemblerConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = AgentClient::new(config.endpoint.clone());
    if let Some(token) = token.or_else(|| std::env::var("ANSWER_STREAM_TOKEN").ok()) {
        client = client.with_token(token);
    }

    print_header(&question, &config);
    let (mut session, mut events) = ChatSession::new(Arc::new(client), config.clone());
    session.send(AgentRequest::question(question))?;

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                if let Some(id) = session.abandon() {
                    eprintln!("\n{} {}", "[abandoned]".bright_red(), id);
                }
                return Ok(());
            }
        };
        let Some(event) = event else { break };

        match event {
            SessionEvent::Started { .. } => {}
            SessionEvent::Progress { delta, .. } => {
                if live {
                    print!("{delta}");
                    let _ = io::stdout().flush();
                }
            }
            SessionEvent::Tool { activity, .. } => match activity {
                ToolActivity::Started { tool, description } => eprintln!(
                    "{} {} {}",
                    "[tool]".bright_magenta(),
                    tool,
                    description.unwrap_or_default().bright_black()
                ),
                ToolActivity::Finished { tool } => {
                    eprintln!("{} {} done", "[tool]".bright_magenta(), tool)
                }
            },
            SessionEvent::Finished { message } => {
                if live {
                    println!("\n{}", "=".repeat(50).bright_blue());
                }
                let base = session.toggle_store().lock().ok().map(|s| s.clone());
                let store = store_with_expanded(&config, base, &expand);
                let rendered = render_message(&message.id, &message.content, false, &store, &config);
                println!("{}", rendered.to_terminal(&config.divider));
                break;
            }
            SessionEvent::Failed { error, .. } => {
                eprintln!("{}", "Sorry, the answer could not be completed.".bright_red());
                return Err(error.into());
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);
    let config = resolve_config(&args)?;

    match args.command {
        Command::Ask { question, token, live, expand, .. } => {
            ask(question, token, live, expand, config).await?;
        }
        Command::Replay { file, message_id, expand } => {
            let content = load_transcript(&file)?;
            let store = store_with_expanded(&config, None, &expand);
            let rendered = render_message(&message_id, &content, false, &store, &config);
            println!("{}", rendered.to_terminal(&config.divider));
        }
        Command::Segments { file, streaming, message_id } => {
            let content = load_transcript(&file)?;
            let store = ToggleStore::new(config.special_language.clone());
            let rendered = render_message(&message_id, &content, streaming, &store, &config);
            println!("{}", rendered.to_json()?);
        }
    }

    Ok(())
}
