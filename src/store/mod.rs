//! Storage abstraction for embedded chunks.
//!
//! The [`VectorStore`] trait is everything the retrieval pipeline needs
//! from a backend: upsert a record, rank records against a query vector,
//! and clear. [`memory::InMemoryStore`] is the only backend; the trait
//! keeps the index code independent of it.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::EmbeddingRecord;

/// One ranked result from [`VectorStore::nearest`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    /// Chunk id (`chunk_<index>`).
    pub id: String,
    pub text: String,
    /// Cosine similarity to the query vector.
    pub score: f32,
}

/// Abstract storage backend for the vector index.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Insert a record, or overwrite one with the same id |
/// | [`nearest`](VectorStore::nearest) | Top-k records by cosine similarity |
/// | [`clear`](VectorStore::clear) | Drop every record |
/// | [`len`](VectorStore::len) | Number of stored records |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store `record`. An existing record with the same id is replaced
    /// in place and keeps its position.
    async fn upsert(&self, record: EmbeddingRecord) -> Result<()>;

    /// Return at most `k` records, most similar first. Ties keep
    /// insertion order.
    async fn nearest(&self, query_vec: &[f32], k: usize) -> Result<Vec<Hit>>;

    async fn clear(&self) -> Result<()>;

    async fn len(&self) -> Result<usize>;

    /// Stored ids in insertion order.
    async fn ids(&self) -> Result<Vec<String>>;
}
