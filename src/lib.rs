//! # Study Harness
//!
//! Turn a set of lecture notes into a summary, a quiz with flashcards, and
//! a chatbot that answers from the notes themselves.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌───────────┐   ┌─────────────┐
//! │ Extract  │──▶│  Chunk  │──▶│ Embedding │──▶│ VectorIndex │
//! │ PDF/DOCX │   │ 500 wd  │   │  Gateway  │   │  (memory)   │
//! └──────────┘   └─────────┘   └───────────┘   └──────┬──────┘
//!                                                     │ top-k
//!                 ┌────────────┐   ┌──────────┐       ▼
//!                 │ Generation │◀──│  Prompt  │◀── query
//!                 │  Gateway   │   │ Builder  │
//!                 └────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! study summarize notes.pdf
//! study quiz notes.pdf
//! study ask notes.pdf "What is oxidative phosphorylation?"
//! study chat notes.pdf
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Text extraction from PDF, DOCX, PPTX and plain text |
//! | [`chunk`] | Word-window chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector storage trait and in-memory backend |
//! | [`index`] | Text-level add/query over a store |
//! | [`rag`] | Grounded prompt assembly |
//! | [`prompts`] | Prompt templates |
//! | [`generation`] | Generation provider abstraction |
//! | [`quiz`] | Quiz parsing, validation and scoring |
//! | [`session`] | Per-user study session state |
//! | [`progress`] | Ingest progress reporting |
//! | [`logging`] | Tracing subscriber setup |

pub mod chat_cmd;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod index;
pub mod logging;
pub mod models;
pub mod progress;
pub mod prompts;
pub mod quiz;
pub mod rag;
pub mod session;
pub mod store;
pub mod study_cmd;
