//! # repomind CLI (`rmind`)
//!
//! The `rmind` binary drives the indexing and retrieval pipeline from the
//! command line.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rmind init` | Create the SQLite database and run schema migrations |
//! | `rmind project add <id> <repo-url>` | Register a project to track |
//! | `rmind poll <project>` | Fetch, summarize, and persist new commits |
//! | `rmind index <project> --root <dir>` | Embed source files from a local checkout |
//! | `rmind ask <project> "<question>"` | Answer a question from the embedding index |
//! | `rmind status <project>` | Show indexing diagnostics |
//!
//! All commands accept a `--config` flag pointing to a TOML configuration
//! file; see `config/rmind.example.toml`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use repomind::ai::create_ai_client;
use repomind::config::{load_config, Config};
use repomind::db;
use repomind::github::GithubClient;
use repomind::indexer;
use repomind::ingest;
use repomind::migrate;
use repomind::models::Project;
use repomind::rate_limit::{MemoryCounterStore, RateLimiter, SqliteCounterStore};
use repomind::retrieve::{self, RetrievalParams};
use repomind::stats;
use repomind::store::sqlite::SqliteStore;
use repomind::store::Store;

/// repomind — repository indexing and semantic retrieval for AI-assisted
/// code understanding.
#[derive(Parser)]
#[command(
    name = "rmind",
    about = "Repository indexing and semantic retrieval: AI commit summaries, file embeddings, and natural-language Q&A",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rmind.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Manage tracked projects.
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Fetch recent commits, summarize new ones, and persist them.
    ///
    /// Re-running before new commits exist inserts zero rows.
    Poll {
        /// Project identifier.
        project: String,
    },

    /// Summarize and embed source files from a local checkout.
    ///
    /// Unchanged files (same content hash as the stored row) are skipped
    /// without AI calls; changed files replace their prior row.
    Index {
        /// Project identifier.
        project: String,

        /// Root of the local checkout to walk.
        #[arg(long)]
        root: PathBuf,
    },

    /// Answer a question from the project's embedding index.
    Ask {
        /// Project identifier.
        project: String,

        /// The question to answer.
        question: String,

        /// Maximum results to return.
        #[arg(long)]
        top_k: Option<usize>,

        /// Drop results scoring below this cosine similarity.
        #[arg(long)]
        min_similarity: Option<f32>,
    },

    /// Show indexing diagnostics for a project.
    Status {
        /// Project identifier.
        project: String,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Register a project to track.
    Add {
        /// Project identifier (e.g. a short slug).
        id: String,

        /// Repository URL (HTTPS or SSH remote).
        repo_url: String,

        /// Human-readable name; defaults to the id.
        #[arg(long)]
        name: Option<String>,
    },
}

/// Build the rate limiter the config asks for. `backend = "none"` selects
/// the fail-open variant once, here — callers never branch on it again.
fn build_limiter(config: &Config, pool: &sqlx::SqlitePool) -> RateLimiter {
    let window = Duration::from_secs(config.rate_limit.window_secs);
    match config.rate_limit.backend.as_str() {
        "memory" => RateLimiter::budgeted(Arc::new(MemoryCounterStore::new()), window),
        "sqlite" => RateLimiter::budgeted(Arc::new(SqliteCounterStore::new(pool.clone())), window),
        _ => RateLimiter::unbounded(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&config.db).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("database initialized at {}", config.db.path.display());
        }

        Commands::Project { command } => match command {
            ProjectCommands::Add { id, repo_url, name } => {
                let pool = db::connect(&config.db).await?;
                migrate::run_migrations(&pool).await?;
                let store = SqliteStore::new(pool);

                store
                    .insert_project(&Project {
                        name: name.unwrap_or_else(|| id.clone()),
                        id: id.clone(),
                        repo_url: Some(repo_url),
                    })
                    .await?;

                store.pool().close().await;
                println!("project '{}' added", id);
            }
        },

        Commands::Poll { project } => {
            let pool = db::connect(&config.db).await?;
            let limiter = build_limiter(&config, &pool);
            let store = SqliteStore::new(pool);
            let host = GithubClient::new(&config.github)?;
            let ai = create_ai_client(&config.ai)?;

            let outcome = ingest::poll_commits(
                &store,
                &host,
                ai.as_ref(),
                &limiter,
                &config.ingest,
                config.rate_limit.max_requests,
                &project,
            )
            .await?;

            println!("poll {}", project);
            println!("  fetched: {} commits", outcome.fetched);
            println!("  new: {}", outcome.unprocessed);
            println!("  inserted: {}", outcome.inserted);
            if outcome.failed_summaries > 0 {
                println!("  without summary: {}", outcome.failed_summaries);
            }
            println!("ok");

            store.pool().close().await;
        }

        Commands::Index { project, root } => {
            let pool = db::connect(&config.db).await?;
            let limiter = build_limiter(&config, &pool);
            let store = SqliteStore::new(pool);
            let ai = create_ai_client(&config.ai)?;

            let outcome = indexer::index_tree(
                &store,
                ai.as_ref(),
                &limiter,
                &config.index,
                config.rate_limit.max_requests,
                &project,
                &root,
            )
            .await?;

            println!("index {}", project);
            println!("  indexed: {}", outcome.indexed);
            println!("  unchanged: {}", outcome.skipped);
            if outcome.failed > 0 {
                println!("  failed: {}", outcome.failed);
            }
            println!("ok");

            store.pool().close().await;
        }

        Commands::Ask {
            project,
            question,
            top_k,
            min_similarity,
        } => {
            let pool = db::connect(&config.db).await?;
            let limiter = build_limiter(&config, &pool);
            let store = SqliteStore::new(pool);
            let ai = create_ai_client(&config.ai)?;

            let params = RetrievalParams {
                top_k: top_k.unwrap_or(config.retrieval.top_k),
                min_similarity: min_similarity.or(config.retrieval.min_similarity),
            };

            let hits = retrieve::answer(
                &store,
                ai.as_ref(),
                &limiter,
                &params,
                config.rate_limit.max_requests,
                &project,
                &question,
            )
            .await?;

            if hits.is_empty() {
                println!("no results — is the project indexed? (rmind status {})", project);
            }
            for (i, hit) in hits.iter().enumerate() {
                println!("{}. {} (similarity {:.3})", i + 1, hit.path, hit.similarity);
                println!("   {}", hit.summary);
            }

            store.pool().close().await;
        }

        Commands::Status { project } => {
            let pool = db::connect(&config.db).await?;
            let store = SqliteStore::new(pool);

            let snapshot = stats::check_indexing(&store, &project).await?;
            stats::print_stats(&snapshot);

            store.pool().close().await;
        }
    }

    Ok(())
}
