//! # chatdocs
//!
//! A session-based retrieval-augmented chat service for your documents.
//!
//! chatdocs ingests a set of documents into an isolated, persistent
//! conversation ("session"): text is extracted, chunked, embedded, and built
//! into a per-session vector index on disk. Questions are answered by
//! retrieving the most relevant chunks and conditioning a generation gateway
//! on them plus the conversation so far. Sessions survive process restarts;
//! their in-memory engines are reconstructed lazily on first use.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌────────────────┐
//! │  Files    │──▶│   Pipeline     │──▶│  Session dirs   │
//! │ PDF/DOCX │   │ Extract+Chunk │   │ index.json     │
//! │ /text    │   │ +Embed        │   │ session.json   │
//! └──────────┘   └───────────────┘   └───────┬────────┘
//!                                            │ lazy hydration
//!                        ┌───────────────────┤
//!                        ▼                   ▼
//!                   ┌──────────┐       ┌──────────┐
//!                   │   CLI    │       │   HTTP   │
//!                   │  (cdx)   │       │  (JSON)  │
//!                   └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cdx create report.pdf notes.md     # ingest documents into a new session
//! cdx chat <session-id> "What does the report conclude?"
//! cdx sessions                       # list sessions, most recent first
//! cdx serve                          # start the JSON HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Closed error taxonomy |
//! | [`models`] | Core data types (turns, session records) |
//! | [`extract`] | PDF/DOCX/plain-text extraction |
//! | [`chunk`] | Overlapping word-window chunking |
//! | [`embedding`] | Embedding gateway clients |
//! | [`generation`] | Generation gateway clients |
//! | [`index`] | Per-session vector index |
//! | [`engine`] | Per-session conversation engine |
//! | [`store`] | Durable session registry |
//! | [`sessions`] | Session lifecycle manager |
//! | [`server`] | JSON HTTP API |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod extract;
pub mod generation;
pub mod index;
pub mod models;
pub mod server;
pub mod sessions;
pub mod store;
pub mod test_utils;
