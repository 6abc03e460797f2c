//! Parlor CLI - a thin terminal REPL over the conversation engine.
//!
//! Demonstration glue: everything interesting lives in `parlor-core`. The
//! REPL subscribes to the store's watch channel to render assistant
//! replies as they stream in.

use std::io::Write as _;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use parlor_backend::{HttpBackendConfig, HttpChatBackend};
use parlor_core::{ConversationStore, SessionState};
use parlor_core_types::{MessageId, ParlorResult, Sender};

const LOG_LEVEL_ENV: &str = "PARLOR_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "parlor",
    about = "Terminal chat client for the Parlor conversation engine"
)]
struct Args {
    /// Chat API base URL; defaults to PARLOR_API_BASE_URL, then the
    /// built-in default.
    #[arg(long)]
    base_url: Option<String>,

    /// Log filter (trace|debug|info|warn|error|off); PARLOR_LOG overrides.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let mut config = HttpBackendConfig::from_env();
    if let Some(base_url) = args.base_url {
        config.base_url = base_url.trim_end_matches('/').to_string();
    }

    let backend = HttpChatBackend::new(config)?;
    let store = ConversationStore::new(backend);

    let conversation = store.initialize_conversation().await;
    println!("parlor — conversation {conversation}");
    println!("commands: :new :list :switch <id> :delete <id> :edit <id> <text> :quit");

    repl(&store).await
}

fn init_logging(default_level: &str) {
    let filter = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| default_level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_target(false)
        .init();
}

async fn repl(store: &ConversationStore<HttpChatBackend>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix(':') {
            let mut parts = rest.splitn(3, ' ');
            match (parts.next().unwrap_or(""), parts.next(), parts.next()) {
                ("quit", _, _) | ("q", _, _) => break,
                ("new", _, _) => {
                    let id = store.clear_messages().await;
                    println!("conversation {id}");
                }
                ("list", _, _) => {
                    for summary in store.load_conversations_list().await {
                        println!(
                            "{}  {}  {}",
                            summary.id, summary.title, summary.last_message
                        );
                    }
                }
                ("switch", Some(id), _) => match store.switch_conversation(id).await {
                    Ok(()) => print_transcript(store),
                    Err(err) => log::warn!("switch failed: {err}"),
                },
                ("delete", Some(id), _) => {
                    store.delete_conversation(id).await;
                    println!("deleted {id}");
                }
                ("edit", Some(id), Some(text)) => match id.parse::<u64>() {
                    Ok(id) => run_turn(store, store.edit_message(MessageId(id), text)).await,
                    Err(_) => println!("usage: :edit <numeric-id> <text>"),
                },
                _ => println!("unknown command"),
            }
            continue;
        }

        run_turn(store, store.send_message(line.clone(), Vec::new())).await;
    }
    Ok(())
}

/// Drive one send/edit operation while rendering the assistant reply live
/// from the store's watch channel.
async fn run_turn<F>(store: &ConversationStore<HttpChatBackend>, op: F)
where
    F: std::future::Future<Output = ParlorResult<()>>,
{
    let mut watcher = store.watch();
    let mut printed = String::new();

    tokio::pin!(op);
    let result = loop {
        tokio::select! {
            result = &mut op => break result,
            changed = watcher.changed() => {
                if changed.is_ok() {
                    render_reply(&watcher.borrow_and_update(), &mut printed);
                }
            }
        }
    };
    // Catch up on anything published after the last notification we saw.
    render_reply(&store.snapshot(), &mut printed);
    if !printed.is_empty() {
        println!();
    }

    if let Err(err) = result {
        log::warn!("operation failed: {err}");
    }
}

/// Print whatever part of the latest assistant reply is not on screen yet.
fn render_reply(state: &SessionState, printed: &mut String) {
    let Some(last) = state.messages.last() else {
        return;
    };
    if last.sender != Sender::Assistant || last.content == *printed {
        return;
    }
    if printed.is_empty() {
        print!("assistant> ");
    }
    if let Some(suffix) = last.content.strip_prefix(printed.as_str()) {
        print!("{suffix}");
    } else {
        // Cumulative rewrite: the fallback responder replaced a partial
        // reply from scratch.
        print!("\nassistant> {}", last.content);
    }
    let _ = std::io::stdout().flush();
    *printed = last.content.clone();
}

fn print_transcript(store: &ConversationStore<HttpChatBackend>) {
    for message in store.snapshot().messages {
        let who = match message.sender {
            Sender::User => "you",
            Sender::Assistant => "assistant",
        };
        println!("[{}] {who}> {}", message.id, message.content);
    }
}
