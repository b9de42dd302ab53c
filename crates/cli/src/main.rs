//! KnoRoute CLI: the main entry point.
//!
//! Commands:
//! - `init`      Write a default config file
//! - `query`     Ask a question against the knowledge stores
//! - `load`      Load pre-chunked documents into one store
//! - `insight`   Record a learned insight in the memory store
//! - `serve`     Start the HTTP gateway
//! - `status`    Show configuration and store sizes
//! - `doctor`    Diagnose setup problems

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "knoroute",
    about = "KnoRoute: adaptive multi-store retrieval with self-correcting retries",
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
    /// Write ~/.knoroute/config.toml with default settings
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Answer a question from the knowledge stores
    Query {
        /// The question
        text: String,

        /// Retry budget for this query (0-5)
        #[arg(long)]
        max_retries: Option<u32>,

        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load a JSON array of documents into one store
    Load {
        /// Target store: docs, code, tickets or memory
        category: String,

        /// JSON file holding `[{"content": ..., "metadata": {...}}, ...]`
        file: PathBuf,
    },

    /// Record an insight in the memory store
    Insight {
        /// The lesson learned
        text: String,

        /// The query it was learned from
        #[arg(long = "from")]
        learned_from: String,

        /// How confident the insight is, in [0, 1]
        #[arg(long, default_value_t = 0.8)]
        confidence: f32,

        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show configuration and store sizes
    Status,

    /// Diagnose setup problems
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { force } => commands::init::run(force).await?,
        Commands::Query {
            text,
            max_retries,
            json,
        } => commands::query::run(text, max_retries, json).await?,
        Commands::Load { category, file } => commands::load::run(&category, &file).await?,
        Commands::Insight {
            text,
            learned_from,
            confidence,
            tags,
        } => commands::insight::run(text, learned_from, confidence, tags).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Status => commands::status::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
