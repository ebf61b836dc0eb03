//! Canopy CLI - Command-line interface for inspecting event journals.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod error;
mod output;
mod path;

use commands::{commits, list, verify};

#[derive(Parser)]
#[command(name = "canopy")]
#[command(about = "Canopy workspace event journal inspection CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List events in a journal through a filter
    List(list::ListArgs),
    /// Check commit batch invariants of a journal
    Verify {
        /// Path to journal file
        journal: String,
        /// Exit with error code if any batch fails verification
        #[arg(long)]
        strict: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Summarize the commits in a journal
    Commits {
        /// Path to journal file
        journal: String,
        /// Workspace the journal belongs to (default: file stem)
        #[arg(long)]
        workspace: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "canopy=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::List(args) => list::run(args),
        Commands::Verify {
            journal,
            strict,
            json,
        } => verify::run(journal, strict, json),
        Commands::Commits {
            journal,
            workspace,
            json,
        } => commits::run(journal, workspace, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
