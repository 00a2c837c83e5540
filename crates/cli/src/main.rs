//! Scaffold CLI: the main entry point.
//!
//! Commands:
//! - `onboard`  : Write the default config and taxonomy
//! - `chat`     : Interactive or single-message tutoring
//! - `history`  : Show a learner's conversation
//! - `clear`    : Redact a learner's conversation text
//! - `report`   : Learner progress and weakness analysis
//! - `taxonomy` : List learning units or resolve a text to one

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "scaffold",
    about = "Scaffold: a scaffolding-aware machine learning tutor",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and the taxonomy template
    Onboard,

    /// Chat with the tutor
    Chat {
        /// Learner identifier
        #[arg(short, long, env = "SCAFFOLD_LEARNER", default_value = "student")]
        learner: String,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a learner's conversation history
    History {
        #[arg(short, long, env = "SCAFFOLD_LEARNER", default_value = "student")]
        learner: String,
    },

    /// Clear a learner's conversation text (records are kept for analytics)
    Clear {
        #[arg(short, long, env = "SCAFFOLD_LEARNER", default_value = "student")]
        learner: String,
    },

    /// Show a learner's progress report
    Report {
        #[arg(short, long, env = "SCAFFOLD_LEARNER", default_value = "student")]
        learner: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Skip the weakness analysis (no provider calls)
        #[arg(long)]
        no_analysis: bool,

        /// Report over every learner in the log
        #[arg(long)]
        all: bool,
    },

    /// List learning units, or resolve a text to its unit
    Taxonomy {
        /// Text to resolve against the taxonomy
        #[arg(short, long)]
        resolve: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat { learner, message, json } => commands::chat::run(&learner, message, json).await?,
        Commands::History { learner } => commands::history::run(&learner).await?,
        Commands::Clear { learner } => commands::clear::run(&learner).await?,
        Commands::Report { learner, json, no_analysis, all } => {
            let learner = (!all).then_some(learner.as_str());
            commands::report::run(learner, json, !no_analysis).await?
        }
        Commands::Taxonomy { resolve } => commands::taxonomy::run(resolve.as_deref()).await?,
    }

    Ok(())
}
