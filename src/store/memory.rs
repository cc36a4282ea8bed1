//! In-memory [`VectorStore`] implementation.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`. Search is
//! brute-force cosine similarity over every stored vector, which is
//! plenty for a single set of lecture notes.
//!
//! The lock makes each call atomic, but nothing coordinates a sequence of
//! calls (`clear` then `upsert`s) across sessions sharing one store.

use std::sync::{PoisonError, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::EmbeddingRecord;

use super::{Hit, VectorStore};

/// In-memory store for embedded chunks.
pub struct InMemoryStore {
    records: RwLock<Vec<EmbeddingRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> anyhow::Error {
    anyhow!("vector store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn upsert(&self, record: EmbeddingRecord) -> Result<()> {
        let mut records = self.records.write().map_err(poisoned)?;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => {
                tracing::debug!(id = %record.id, "overwriting existing record");
                *existing = record;
            }
            None => records.push(record),
        }
        Ok(())
    }

    async fn nearest(&self, query_vec: &[f32], k: usize) -> Result<Vec<Hit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let records = self.records.read().map_err(poisoned)?;
        let mut hits: Vec<Hit> = records
            .iter()
            .map(|r| Hit {
                id: r.id.clone(),
                text: r.text.clone(),
                score: cosine_similarity(query_vec, &r.vector),
            })
            .collect();
        // stable: equal scores stay in insertion order, NaN ranks last
        hits.sort_by(|a, b| rank_key(b.score).total_cmp(&rank_key(a.score)));
        hits.truncate(k);
        Ok(hits)
    }

    async fn clear(&self) -> Result<()> {
        self.records.write().map_err(poisoned)?.clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.records.read().map_err(poisoned)?.len())
    }

    async fn ids(&self) -> Result<Vec<String>> {
        Ok(self
            .records
            .read()
            .map_err(poisoned)?
            .iter()
            .map(|r| r.id.clone())
            .collect())
    }
}

fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}
