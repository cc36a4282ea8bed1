//! Text-level vector index.
//!
//! [`VectorIndex`] pairs an [`EmbeddingProvider`] with a [`VectorStore`]:
//! `add` embeds text in document mode and stores it, `query` embeds the
//! query in query mode and returns the nearest stored chunks.
//!
//! The index holds exactly the records added since the last
//! [`clear`](VectorIndex::clear). Nothing is evicted automatically.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::embedding::{embed_query, EmbedMode, EmbeddingProvider};
use crate::models::{Chunk, EmbeddingRecord};
use crate::progress::{IngestProgressEvent, IngestProgressReporter, NoProgress};
use crate::store::memory::InMemoryStore;
use crate::store::{Hit, VectorStore};

pub struct VectorIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Index backed by a fresh [`InMemoryStore`].
    pub fn in_memory(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self::new(embedder, Arc::new(InMemoryStore::new()))
    }

    /// Embed `text` and store it under `id`, overwriting any record with
    /// the same id.
    pub async fn add(&self, id: &str, text: &str) -> Result<()> {
        let vectors = self
            .embedder
            .embed(&[text.to_string()], EmbedMode::Document)
            .await
            .with_context(|| format!("failed to embed {}", id))?;
        let vector = match vectors.into_iter().next() {
            Some(v) => v,
            None => bail!("Empty embedding response for {}", id),
        };
        self.check_dims(&vector, id)?;
        self.store
            .upsert(EmbeddingRecord {
                id: id.to_string(),
                text: text.to_string(),
                vector,
                metadata: BTreeMap::new(),
            })
            .await
    }

    /// Embed and store a document's chunks in one batch call.
    pub async fn add_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        self.add_chunks_with_progress(chunks, &NoProgress).await
    }

    /// Like [`add_chunks`](Self::add_chunks), reporting each stored chunk.
    ///
    /// Nothing is stored unless every chunk embeds successfully.
    pub async fn add_chunks_with_progress(
        &self,
        chunks: &[Chunk],
        progress: &dyn IngestProgressReporter,
    ) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let total = chunks.len() as u64;
        progress.report(IngestProgressEvent::Embedding { total });

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .embedder
            .embed(&texts, EmbedMode::Document)
            .await
            .with_context(|| format!("failed to embed {} chunks", chunks.len()))?;
        if vectors.len() != chunks.len() {
            bail!(
                "embedding provider returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            );
        }
        for (chunk, vector) in chunks.iter().zip(&vectors) {
            self.check_dims(vector, &chunk.id)?;
        }

        for (n, (chunk, vector)) in chunks.iter().zip(vectors).enumerate() {
            let mut metadata = BTreeMap::new();
            metadata.insert("hash".to_string(), chunk.hash.clone());
            metadata.insert("words".to_string(), chunk.word_count.to_string());
            self.store
                .upsert(EmbeddingRecord {
                    id: chunk.id.clone(),
                    text: chunk.text.clone(),
                    vector,
                    metadata,
                })
                .await?;
            progress.report(IngestProgressEvent::Stored {
                n: n as u64 + 1,
                total,
            });
        }
        tracing::info!(
            chunks = chunks.len(),
            model = self.embedder.model_name(),
            "indexed chunks"
        );
        Ok(())
    }

    /// Return up to `k` stored chunks most similar to `text`.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<Hit>> {
        if k == 0 || self.store.len().await? == 0 {
            return Ok(Vec::new());
        }
        let query_vec = embed_query(self.embedder.as_ref(), text)
            .await
            .context("failed to embed query")?;
        self.check_dims(&query_vec, "query")?;
        let hits = self.store.nearest(&query_vec, k).await?;
        tracing::debug!(k, hits = hits.len(), "vector query");
        Ok(hits)
    }

    /// Vectors must match the provider's configured size when it has one.
    fn check_dims(&self, vector: &[f32], what: &str) -> Result<()> {
        let dims = self.embedder.dims();
        if dims > 0 && vector.len() != dims {
            bail!(
                "embedding for {} has {} dimensions, expected {}",
                what,
                vector.len(),
                dims
            );
        }
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await
    }

    pub async fn len(&self) -> Result<usize> {
        self.store.len().await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.store.len().await? == 0)
    }

    pub async fn ids(&self) -> Result<Vec<String>> {
        self.store.ids().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::build_chunks;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Letter-frequency embedder: deterministic and self-similar.
    struct LetterEmbedder {
        calls: AtomicUsize,
    }

    impl LetterEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for LetterEmbedder {
        fn model_name(&self) -> &str {
            "letters"
        }
        fn dims(&self) -> usize {
            26
        }
        async fn embed(&self, texts: &[String], _mode: EmbedMode) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 26];
                    for c in t.to_ascii_lowercase().bytes() {
                        if c.is_ascii_lowercase() {
                            v[(c - b'a') as usize] += 1.0;
                        }
                    }
                    v
                })
                .collect())
        }
    }

    struct ShortEmbedder;

    #[async_trait]
    impl EmbeddingProvider for ShortEmbedder {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed(&self, _texts: &[String], _mode: EmbedMode) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0]])
        }
    }

    #[tokio::test]
    async fn self_similarity_is_top_result() {
        let index = VectorIndex::in_memory(Arc::new(LetterEmbedder::new()));
        index.add("chunk_0", "photosynthesis in plants").await.unwrap();
        index.add("chunk_1", "zzz quartz jazz").await.unwrap();
        index.add("chunk_2", "mitochondria powerhouse").await.unwrap();

        let hits = index.query("zzz quartz jazz", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "zzz quartz jazz");
    }

    #[tokio::test]
    async fn query_returns_at_most_k_and_stored() {
        let index = VectorIndex::in_memory(Arc::new(LetterEmbedder::new()));
        index.add("chunk_0", "alpha").await.unwrap();
        index.add("chunk_1", "beta").await.unwrap();

        assert_eq!(index.query("alpha", 1).await.unwrap().len(), 1);
        assert_eq!(index.query("alpha", 5).await.unwrap().len(), 2);
        assert!(index.query("alpha", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_index_skips_embedding() {
        let embedder = Arc::new(LetterEmbedder::new());
        let index = VectorIndex::in_memory(embedder.clone());
        assert!(index.query("anything", 3).await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn add_chunks_embeds_once_and_keeps_order() {
        let embedder = Arc::new(LetterEmbedder::new());
        let index = VectorIndex::in_memory(embedder.clone());
        let chunks = build_chunks("one two three four five six seven", 2);
        index.add_chunks(&chunks).await.unwrap();

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            index.ids().await.unwrap(),
            vec!["chunk_0", "chunk_1", "chunk_2", "chunk_3"]
        );
    }

    #[tokio::test]
    async fn vector_count_mismatch_stores_nothing() {
        let index = VectorIndex::in_memory(Arc::new(ShortEmbedder));
        let chunks = build_chunks("a b c d", 1);
        assert!(index.add_chunks(&chunks).await.is_err());
        assert!(index.is_empty().await.unwrap());
    }

    /// Claims 26 dimensions but returns 3.
    struct WrongSizeEmbedder;

    #[async_trait]
    impl EmbeddingProvider for WrongSizeEmbedder {
        fn model_name(&self) -> &str {
            "wrong-size"
        }
        fn dims(&self) -> usize {
            26
        }
        async fn embed(&self, texts: &[String], _mode: EmbedMode) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn wrong_dimension_vectors_are_rejected() {
        let index = VectorIndex::in_memory(Arc::new(WrongSizeEmbedder));
        let chunks = build_chunks("a b c d", 2);
        let err = index.add_chunks(&chunks).await.unwrap_err();
        assert!(err.to_string().contains("3 dimensions, expected 26"));
        assert!(index.is_empty().await.unwrap());
        assert!(index.add("chunk_0", "a b").await.is_err());
    }

    #[tokio::test]
    async fn wrong_dimension_query_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let good = VectorIndex::new(Arc::new(LetterEmbedder::new()), store.clone());
        good.add("chunk_0", "alpha").await.unwrap();

        let bad = VectorIndex::new(Arc::new(WrongSizeEmbedder), store);
        let err = bad.query("alpha", 1).await.unwrap_err();
        assert!(err.to_string().contains("query"));
    }

    #[tokio::test]
    async fn clear_resets_contents() {
        let index = VectorIndex::in_memory(Arc::new(LetterEmbedder::new()));
        index.add("chunk_0", "old lecture").await.unwrap();
        index.clear().await.unwrap();
        index.add("chunk_0", "new lecture").await.unwrap();
        assert_eq!(index.len().await.unwrap(), 1);
        let hits = index.query("lecture", 3).await.unwrap();
        assert_eq!(hits[0].text, "new lecture");
    }
}
