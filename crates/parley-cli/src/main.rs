//! Parley CLI entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, initializes tracing, the database, and the sync
//! collaborators, then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,parley_core=debug,parley_infra=debug",
        _ => "trace",
    };
    parley_observe::tracing_setup::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let state = AppState::init(cli.user).await?;

    let result = match cli.command {
        Commands::Chats => cli::chats::list_chats(&state, cli.json).await,
        Commands::New { title } => cli::chats::new_chat(&state, title.as_deref(), cli.json).await,
        Commands::History { chat, all } => {
            cli::history::show_history(&state, chat, all, cli.json).await
        }
        Commands::Chat { chat } => cli::chat::run_chat(&state, chat).await,
    };

    parley_observe::tracing_setup::shutdown_tracing();
    result
}
