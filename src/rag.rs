//! Retrieval-augmented prompt assembly.
//!
//! Fetches the top-k chunks for a query from the [`VectorIndex`], joins
//! their text with newlines in retrieval order, and wraps it with the
//! query in the grounded-answer template. There is no truncation beyond
//! top-k; an oversized prompt fails at the generation service.

use anyhow::Result;
use serde::Serialize;

use crate::index::VectorIndex;
use crate::prompts::grounded_answer_prompt;
use crate::store::Hit;

/// Default number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct GroundedPrompt {
    pub prompt: String,
    /// Retrieved chunks, most similar first.
    pub sources: Vec<Hit>,
}

impl GroundedPrompt {
    /// Retrieved context exactly as embedded in the prompt.
    pub fn context(&self) -> String {
        join_context(&self.sources)
    }
}

fn join_context(hits: &[Hit]) -> String {
    hits.iter()
        .map(|h| h.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn build_grounded_prompt(
    index: &VectorIndex,
    query: &str,
    k: usize,
) -> Result<GroundedPrompt> {
    let sources = index.query(query, k).await?;
    let prompt = grounded_answer_prompt(&join_context(&sources), query);
    Ok(GroundedPrompt { prompt, sources })
}
