//! # docpulse CLI (`pulse`)
//!
//! The `pulse` binary is the primary interface for docpulse. It provides
//! commands for database initialization, document ingestion, status
//! polling, analysis inspection, similarity queries, and topic trends.
//!
//! ## Usage
//!
//! ```bash
//! pulse --config ./config/pulse.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pulse init` | Create the SQLite database and run schema migrations |
//! | `pulse add <file>` | Ingest a document and run the analysis pipeline |
//! | `pulse status <id>` | Lifecycle status and progress projection |
//! | `pulse show <id>` | Full document record with analysis |
//! | `pulse reprocess <id>` | Re-trigger analysis for a failed document |
//! | `pulse compare <a> <b>` | Word-overlap comparison of two documents |
//! | `pulse similar <id>` | Embedding nearest neighbors |
//! | `pulse topics` | Topic trend state |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docpulse::{config, get, ingest, migrate, pipeline, similarity, trend};

/// docpulse CLI — a document analysis and trend pipeline.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file with `[db]`, `[inference]`, and `[embedding]` sections. With no
/// providers configured, analysis runs on the deterministic local fallback.
#[derive(Parser)]
#[command(
    name = "pulse",
    about = "docpulse — document analysis and trend pipeline",
    version,
    long_about = "docpulse ingests documents, derives structured analysis (summaries, \
    sentiment, keywords, topics, entities) via a remote inference provider with a \
    deterministic local fallback, embeds documents for similarity queries, and tracks \
    per-topic trends across documents over time."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pulse.toml")]
    config: PathBuf,

    /// Owner scope for documents and topics.
    #[arg(long, global = true, default_value = "local")]
    owner: String,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (documents,
    /// topics, topic_timeline). Idempotent.
    Init,

    /// Ingest a document and run the analysis pipeline.
    ///
    /// Reads the file, extracts its text (unsupported or unreadable content
    /// is replaced with a placeholder), stores a pending record, and runs
    /// analysis. Waits for completion unless `--no-wait` is given.
    Add {
        /// Path to the document file.
        file: PathBuf,

        /// Override the content type guessed from the file extension.
        #[arg(long)]
        content_type: Option<String>,

        /// Return immediately after the record is created instead of
        /// waiting for the analysis to finish.
        #[arg(long)]
        no_wait: bool,
    },

    /// Show a document's lifecycle status and polling progress.
    Status {
        /// Document UUID.
        id: String,
    },

    /// Show the full document record including its analysis.
    Show {
        /// Document UUID.
        id: String,
    },

    /// Re-trigger analysis for a failed document.
    ///
    /// Only documents in the `failed` state are eligible; everything else
    /// is left untouched.
    Reprocess {
        /// Document UUID.
        id: String,
    },

    /// Compare two documents by word overlap.
    ///
    /// Uses Jaccard similarity over lowercase word sets — cheap and
    /// explainable, and independent of embeddings.
    Compare {
        /// First document UUID.
        first: String,
        /// Second document UUID.
        second: String,
    },

    /// Find documents most similar to the given one by embedding cosine
    /// similarity.
    Similar {
        /// Document UUID.
        id: String,

        /// Maximum number of neighbors to return.
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Inspect or manage topic trend state.
    Topics {
        #[command(subcommand)]
        action: Option<TopicsAction>,
    },
}

/// Topic management subcommands.
#[derive(Subcommand)]
enum TopicsAction {
    /// Soft-deactivate a topic. Topics are never deleted.
    Deactivate {
        /// Topic name.
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Add {
            file,
            content_type,
            no_wait,
        } => {
            ingest::run_add(&cfg, &file, content_type, &cli.owner, no_wait).await?;
        }
        Commands::Status { id } => {
            get::run_status(&cfg, &id).await?;
        }
        Commands::Show { id } => {
            get::run_show(&cfg, &id).await?;
        }
        Commands::Reprocess { id } => {
            pipeline::run_reprocess(&cfg, &id).await?;
        }
        Commands::Compare { first, second } => {
            similarity::run_compare(&cfg, &first, &second).await?;
        }
        Commands::Similar { id, limit } => {
            similarity::run_similar(&cfg, &id, limit).await?;
        }
        Commands::Topics { action } => match action {
            None => trend::run_topics(&cfg, &cli.owner).await?,
            Some(TopicsAction::Deactivate { name }) => {
                trend::run_deactivate(&cfg, &cli.owner, &name).await?;
            }
        },
    }

    Ok(())
}
