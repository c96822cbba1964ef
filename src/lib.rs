//! # RAG Mind
//!
//! Retrieval-augmented question answering over local document folders.
//!
//! Documents under the configured paths are chunked, embedded, and stored in
//! a SQLite-backed vector collection. Questions are answered by retrieving
//! the nearest chunks and handing them, with the question, to a chat model.
//! Everything is reachable from a CLI and a JSON HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌────────────┐
//! │  Document   │──▶│ Chunk+Embed  │──▶│  SQLite    │
//! │   paths     │   │  (ingest)    │   │  vectors   │
//! └─────────────┘   └──────────────┘   └─────┬──────┘
//!                                            │
//!                   ┌──────────────┐         │
//!    question ─────▶│   answer     │◀────────┘
//!                   │ retrieve+gen │
//!                   └──────┬───────┘
//!                ┌─────────┴─────────┐
//!                ▼                   ▼
//!          ┌──────────┐        ┌──────────┐
//!          │   CLI    │        │   HTTP   │
//!          │(ragmind) │        │  (axum)  │
//!          └──────────┘        └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ragmind init                        # write config, settings, database
//! ragmind paths add ./docs
//! ragmind reindex
//! ragmind ask "What does the guide say about backups?"
//! ragmind serve                       # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and persisted runtime settings |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`chunk`] | Sliding-window text chunking |
//! | [`retry`] | Retry policy for external calls |
//! | [`embedding`] | Embedding providers and gateway |
//! | [`generation`] | Chat model providers and gateway |
//! | [`store`] | Vector index trait, SQLite and in-memory backends |
//! | [`sources`] | Document discovery |
//! | [`extract`] | Text and PDF extraction |
//! | [`ingest`] | Full reindex |
//! | [`answer`] | Retrieval and answer generation |
//! | [`service`] | Component wiring shared by CLI and server |
//! | [`server`] | HTTP API |
//! | [`stats`] | Terminal summaries |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`logging`] | Tracing setup |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod retry;
pub mod server;
pub mod service;
pub mod sources;
pub mod stats;
pub mod store;
