//! Chat list commands: list, new.

use anyhow::Result;
use chrono::Local;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;

use crate::state::AppState;

/// List the user's chats, newest first.
///
/// # Examples
///
/// ```bash
/// parley chats
/// parley chats --json
/// ```
pub async fn list_chats(state: &AppState, json: bool) -> Result<()> {
    let sessions = state.sessions().await?;
    let chats = sessions.chats();

    if json {
        println!("{}", serde_json::to_string_pretty(&chats)?);
        return Ok(());
    }

    if chats.is_empty() {
        println!();
        println!(
            "  {} No chats yet. Start one with: {}",
            style("i").blue().bold(),
            style("parley new").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Id").fg(Color::White),
        Cell::new("Title").fg(Color::White),
        Cell::new("Created").fg(Color::White),
    ]);

    for chat in &chats {
        table.add_row(vec![
            Cell::new(chat.id).fg(Color::DarkGrey),
            Cell::new(&chat.title).fg(Color::Cyan),
            Cell::new(
                chat.created_at
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M")
                    .to_string(),
            ),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

/// Create a chat and print its id.
pub async fn new_chat(state: &AppState, title: Option<&str>, json: bool) -> Result<()> {
    let sessions = state.sessions().await?;
    let id = match title {
        Some(title) => sessions.create_titled(title).await?,
        None => sessions.create().await?,
    };

    if json {
        let chat = sessions.get(&id);
        println!("{}", serde_json::to_string_pretty(&chat)?);
    } else {
        println!();
        println!(
            "  {} Created chat {}",
            style("✓").green().bold(),
            style(id).cyan()
        );
        println!(
            "  Open it with: {}",
            style(format!("parley chat {id}")).yellow()
        );
        println!();
    }

    sessions.logout();
    Ok(())
}
