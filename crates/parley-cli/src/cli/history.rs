//! `parley history`: print a chat's log as the sync engine sees it.

use anyhow::{Context, Result};
use chrono::Local;
use console::style;
use parley_core::sync::PageOutcome;
use parley_types::chat::{Message, Sender};
use parley_types::error::SyncError;
use uuid::Uuid;

use crate::state::{AppState, ConcreteEngine};

/// Print one message as a styled transcript line.
pub fn print_message(message: &Message) {
    let time = message.created_at.with_timezone(&Local).format("%H:%M");
    let who = match message.sender {
        Sender::User => style("You").green().bold(),
        Sender::Ai => style("AI ").magenta().bold(),
    };
    println!("  {} {} {}", style(time).dim(), who, message.content);
}

async fn page_to_start(engine: &ConcreteEngine) -> Result<(), SyncError> {
    while engine.has_more_history() {
        match engine.load_more_messages().await? {
            PageOutcome::Loaded { .. } => {}
            PageOutcome::NoMoreHistory => break,
        }
    }
    Ok(())
}

/// Load the most recent page (or everything with `all`) and print it.
pub async fn show_history(state: &AppState, chat_id: Uuid, all: bool, json: bool) -> Result<()> {
    let engine = state.engine();
    let chat = engine
        .select_chat(chat_id)
        .await
        .with_context(|| format!("Chat '{chat_id}' could not be opened"))?;

    let paged = if all { page_to_start(&engine).await } else { Ok(()) };
    let messages = engine.messages();
    engine.close().await;
    paged.context("Could not load older history")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    println!();
    println!("  {}", style(&chat.title).cyan().bold());
    println!();
    if messages.is_empty() {
        println!("  {}", style("No messages yet.").dim());
    }
    for message in &messages {
        print_message(message);
    }
    println!();
    Ok(())
}
