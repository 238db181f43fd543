//! # Corpus RAG CLI (`crag`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `crag init` | Create the SQLite database and schema |
//! | `crag index` | Index new and changed documents under the corpus root |
//! | `crag search "<query>"` | Print ranked matching passages |
//! | `crag ask "<question>"` | Answer one question from the index |
//! | `crag chat` | Interactive question loop |
//! | `crag stats` | Index statistics |
//! | `crag sources` | Per-source update metadata |
//!
//! ## Examples
//!
//! ```bash
//! crag init --config ./config/crag.toml
//! crag index --prune
//! crag ask "How do I bypass a WAF with SQL comments?"
//! crag sources record payloads
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use corpus_rag::ingest::IndexOptions;
use corpus_rag::progress::ProgressMode;
use corpus_rag::{ask, config, db, ingest, migrate, stats, update_meta};

/// Incremental indexing and question answering over a local document corpus.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/crag.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "crag", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/crag.toml")]
    config: PathBuf,

    /// Log per-file decisions to stderr (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Index the corpus.
    ///
    /// Unchanged files are skipped by content digest; changed files have
    /// their old chunks replaced.
    Index {
        /// Reprocess every file even when its digest is unchanged.
        #[arg(long)]
        force: bool,

        /// Remove records for files no longer present in the corpus.
        #[arg(long)]
        prune: bool,

        /// Report file and chunk counts without writing to the index.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr: `human`, `json`, or `off`.
        /// Defaults to human when stderr is a terminal.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Print passages most similar to a query.
    Search {
        query: String,

        /// Maximum number of results (defaults to `retrieval.top_k`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer a question from the indexed corpus.
    Ask {
        question: String,

        /// Number of passages to retrieve as context.
        #[arg(long)]
        k: Option<usize>,
    },

    /// Ask questions interactively. `stats` shows index stats, `quit` exits.
    Chat,

    /// Show index statistics.
    Stats,

    /// Show per-source update metadata.
    Sources {
        #[command(subcommand)]
        action: Option<SourcesAction>,
    },
}

#[derive(Subcommand)]
enum SourcesAction {
    /// Recount a source's files and stamp it as updated now.
    Record { name: String },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "corpus_rag=debug,corpus_rag_core=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Index {
            force,
            prune,
            dry_run,
            progress,
        } => {
            let mode = ProgressMode::from_flag(progress.as_deref())?;
            ingest::run_index(&cfg, IndexOptions { force, prune }, dry_run, mode).await?;
        }
        Commands::Search { query, limit } => {
            ask::run_search(&cfg, &query, limit).await?;
        }
        Commands::Ask { question, k } => {
            ask::run_ask(&cfg, &question, k).await?;
        }
        Commands::Chat => {
            ask::run_chat(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Sources { action } => match action {
            None => update_meta::run_sources(&cfg)?,
            Some(SourcesAction::Record { name }) => update_meta::run_record(&cfg, &name)?,
        },
    }

    Ok(())
}
