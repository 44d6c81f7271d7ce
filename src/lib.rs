//! # repomind
//!
//! Repository indexing and semantic retrieval for AI-assisted code
//! understanding.
//!
//! repomind ingests a remote repository's commit history, produces
//! AI-generated summaries and embedding vectors for its files, persists
//! them idempotently in SQLite, and answers natural-language questions by
//! cosine-similarity search over the stored vectors.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌───────────┐
//! │ Hosting API │──▶│ Ingest / Indexer │──▶│  SQLite    │
//! │  (commits,  │   │ dedup + fan-out  │   │ commits +  │
//! │   diffs)    │   │ summarize+embed  │   │ embeddings │
//! └─────────────┘   └──────┬───────────┘   └─────┬─────┘
//!                          │                     │
//!                    ┌─────┴─────┐         ┌─────┴─────┐
//!                    │ AI client │         │ Retrieval │
//!                    │ (guarded  │◀───────▶│  (top-K   │
//!                    │ by limiter)│        │  cosine)  │
//!                    └───────────┘         └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rmind init                                     # create database
//! rmind project add myapp https://github.com/org/myapp
//! rmind poll myapp                               # ingest recent commits
//! rmind index myapp --root ./checkout            # embed source files
//! rmind ask myapp "where is auth handled?"
//! rmind status myapp                             # indexing diagnostics
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`dedup`] | Already-ingested commit filtering |
//! | [`rate_limit`] | Sliding-window budgets for AI calls |
//! | [`github`] | Hosting API client (commits, diffs) |
//! | [`ai`] | Summarization and embedding provider |
//! | [`summarize`] | Per-commit diff summarization |
//! | [`ingest`] | Commit-polling coordinator |
//! | [`indexer`] | File embedding indexer |
//! | [`retrieve`] | Question answering over the index |
//! | [`stats`] | Indexing diagnostics |
//! | [`store`] | Persistence abstraction (SQLite, in-memory) |
//! | [`vectors`] | Cosine similarity and BLOB codecs |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod ai;
pub mod config;
pub mod db;
pub mod dedup;
pub mod error;
pub mod github;
pub mod indexer;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod rate_limit;
pub mod retrieve;
pub mod stats;
pub mod store;
pub mod summarize;
pub mod vectors;
