//! CLI command definitions for the `parley` binary.

pub mod chat;
pub mod chats;
pub mod history;

use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Realtime chat with an AI, kept in sync with the local store.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Act as this user instead of the local default identity.
    #[arg(long, global = true, env = "PARLEY_USER_ID")]
    pub user: Option<Uuid>,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true, env = "PARLEY_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List your chats, newest first.
    #[command(alias = "ls")]
    Chats,

    /// Create a new chat and print its id.
    New {
        /// Title (defaults to "Chat <local time>").
        #[arg(long)]
        title: Option<String>,
    },

    /// Print a chat's messages.
    History {
        /// Chat id.
        chat: Uuid,

        /// Page back until the whole history is loaded.
        #[arg(long)]
        all: bool,
    },

    /// Open a chat interactively.
    Chat {
        /// Chat id.
        chat: Uuid,
    },
}
