//! Interactive chat loop.
//!
//! Reads lines from stdin and sends each as a user message. Any message the
//! engine merges that this loop has not printed yet (rows pushed by the
//! change feed from other writers in the process) is printed as the event
//! stream reports it.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use parley_core::sync::{PageOutcome, ReplySource};
use parley_types::chat::Message;
use parley_types::error::SyncError;
use parley_types::event::SyncEvent;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::state::AppState;

use super::history::print_message;

/// A slash command or a message to send.
#[derive(Debug, PartialEq, Eq)]
enum ChatCommand<'a> {
    Quit,
    More,
    Help,
    Unknown(&'a str),
    Send(&'a str),
}

fn parse_line(line: &str) -> ChatCommand<'_> {
    let trimmed = line.trim();
    match trimmed {
        "/quit" | "/exit" | "/q" => ChatCommand::Quit,
        "/more" => ChatCommand::More,
        "/help" | "/?" => ChatCommand::Help,
        other if other.starts_with('/') => ChatCommand::Unknown(other),
        other => ChatCommand::Send(other),
    }
}

fn thinking_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("thinking...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Messages in `log` not yet on screen, oldest first. Marks them printed.
fn take_unprinted(log: Vec<Message>, printed: &mut HashSet<Uuid>) -> Vec<Message> {
    log.into_iter()
        .filter(|message| printed.insert(message.id))
        .collect()
}

/// Print a page of older history as a delimited block so it is not read as
/// following the newer messages already on screen.
fn print_earlier_block(messages: &[Message]) {
    if messages.is_empty() {
        return;
    }
    println!("  {}", style("── earlier messages ──").dim());
    for message in messages {
        print_message(message);
    }
    println!("  {}", style("── end of earlier messages ──").dim());
}

/// Run the interactive loop for `chat_id` until `/quit` or EOF.
pub async fn run_chat(state: &AppState, chat_id: Uuid) -> Result<()> {
    let engine = state.engine();
    let mut events = engine.subscribe_events();
    let chat = engine
        .select_chat(chat_id)
        .await
        .with_context(|| format!("Chat '{chat_id}' could not be opened"))?;

    println!();
    println!(
        "  {} {}  {}",
        style("#").cyan().bold(),
        style(&chat.title).cyan().bold(),
        style("/more loads older messages, /quit exits").dim()
    );
    println!();

    let mut printed: HashSet<Uuid> = HashSet::new();
    for message in engine.messages() {
        print_message(&message);
        printed.insert(message.id);
    }
    if engine.has_more_history() {
        println!("  {}", style("(older messages available: /more)").dim());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_line(&line) {
                    ChatCommand::Quit => break,
                    ChatCommand::Help => {
                        println!("  {}", style("/more  load older messages").dim());
                        println!("  {}", style("/quit  leave the chat").dim());
                    }
                    ChatCommand::Unknown(cmd) => {
                        println!("  {} Unknown command {cmd}", style("!").yellow().bold());
                    }
                    ChatCommand::More => match engine.load_more_messages().await {
                        Ok(PageOutcome::Loaded { added }) => {
                            println!("  {} Loaded {added} older messages", style("↑").blue());
                            print_earlier_block(&take_unprinted(engine.messages(), &mut printed));
                        }
                        Ok(PageOutcome::NoMoreHistory) => {
                            println!("  {}", style("Beginning of conversation.").dim());
                        }
                        Err(SyncError::InvalidState(_)) => {
                            println!("  {}", style("Nothing to page back from.").dim());
                        }
                        Err(e) => {
                            eprintln!("  {} Could not load history: {e}", style("!").red().bold());
                        }
                    },
                    ChatCommand::Send("") => {}
                    ChatCommand::Send(text) => {
                        let spinner = thinking_spinner();
                        let result = engine.send(text).await;
                        spinner.finish_and_clear();
                        match result {
                            Ok(receipt) => {
                                printed.insert(receipt.user_message.id);
                                if let Some(reply) = &receipt.reply {
                                    if printed.insert(reply.id) {
                                        print_message(reply);
                                    }
                                }
                                match (&receipt.reply, receipt.reply_source) {
                                    (None, _) => eprintln!(
                                        "  {} Reply could not be saved",
                                        style("!").yellow().bold()
                                    ),
                                    (Some(_), ReplySource::Fallback) => eprintln!(
                                        "  {}",
                                        style("(generator unavailable, fallback reply stored)").dim()
                                    ),
                                    (Some(_), ReplySource::Generated) => {}
                                }
                            }
                            Err(SyncError::Busy) => {
                                println!("  {}", style("Still sending the previous message.").dim());
                            }
                            Err(e) => {
                                eprintln!("  {} Message not sent: {e}", style("!").red().bold());
                            }
                        }
                    }
                }
            }
            event = events.recv() => match event {
                Ok(SyncEvent::MessageMerged { message, .. }) => {
                    if printed.insert(message.id) {
                        print_message(&message);
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    engine.close().await;
    println!("\n  {}", style("Chat closed.").dim());
    Ok(())
}
