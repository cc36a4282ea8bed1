//! Core data models used throughout study-harness.
//!
//! These types represent the loaded document, its chunks, the records
//! held by the vector store, and the conversation transcript that flow
//! through the ingestion and retrieval pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Text extracted from one loaded file.
///
/// A document lives until the next file is loaded into the session.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub file_name: String,
    pub content_type: String,
    pub text: String,
    /// SHA-256 of `text`, used to detect reloads of the same material.
    pub fingerprint: String,
    pub loaded_at: DateTime<Utc>,
}

/// A bounded run of words from a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// `chunk_<index>`, assigned in document order.
    pub id: String,
    pub index: usize,
    pub text: String,
    pub word_count: usize,
    pub hash: String,
}

/// A chunk as stored in the vector index: text plus its embedding.
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: BTreeMap<String, String>,
}

/// Who produced a [`ConversationTurn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "You"),
            Role::Bot => write!(f, "Bot"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// Append-only chat transcript for one session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversationLog {
    turns: Vec<ConversationTurn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(ConversationTurn {
            role,
            content: content.into(),
            at: Utc::now(),
        });
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
