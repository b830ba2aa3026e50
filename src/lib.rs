//! # docpulse
//!
//! A document analysis and trend pipeline. Documents come in as raw text
//! and leave with AI-derived insight: summaries, sentiment, keywords,
//! topics, named entities, and a semantic embedding, with cross-document
//! trend tracking per topic over time.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌────────────┐   ┌────────────┐
//! │  Ingest  │──▶│ AnalysisEngine │──▶│ Embedding  │──▶│   SQLite   │
//! │ (extract)│   │ remote+fallback│   │ 1536 dims  │   │  documents │
//! └──────────┘   └───────────────┘   └────────────┘   └─────┬──────┘
//!                                                           │
//!                                            ┌──────────────┤
//!                                            ▼              ▼
//!                                      ┌──────────┐   ┌──────────┐
//!                                      │  Topic   │   │Similarity│
//!                                      │  trends  │   │  queries │
//!                                      └──────────┘   └──────────┘
//! ```
//!
//! Processing is asynchronous: an upload creates a `pending` record and
//! returns immediately; a detached task claims the document with an atomic
//! conditional update and runs it to `completed` or `failed`. Remote
//! inference and embedding are pluggable capabilities with deterministic
//! (simulated analysis) and random (embedding) local fallbacks, so the
//! pipeline produces a fully-populated analysis even with no provider
//! configured.
//!
//! ## Quick Start
//!
//! ```bash
//! pulse init                       # create database
//! pulse add notes.md               # ingest and analyze a document
//! pulse status <id>                # poll lifecycle status
//! pulse show <id>                  # full analysis
//! pulse similar <id>              # embedding nearest neighbors
//! pulse topics                     # topic trend state
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Declared-type text extraction |
//! | [`simulated`] | Deterministic fallback analyzer |
//! | [`inference`] | Text-completion provider abstraction |
//! | [`analysis`] | Analysis engine with validation and fallback |
//! | [`embedding`] | Embedding provider abstraction and service |
//! | [`similarity`] | Cosine and word-overlap similarity |
//! | [`pipeline`] | Processing state machine and background tasks |
//! | [`trend`] | Topic timelines and popularity scoring |
//! | [`store`] | Document persistence |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod analysis;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod get;
pub mod inference;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod similarity;
pub mod simulated;
pub mod store;
pub mod trend;
