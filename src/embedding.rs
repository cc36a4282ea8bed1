//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAIProvider`]**: calls the OpenAI embeddings API.
//! - **[`GeminiProvider`]**: calls the Gemini `batchEmbedContents` API with
//!   retrieval task types.
//! - **[`OllamaProvider`]**: calls a local Ollama instance's `/api/embed` endpoint.
//!
//! Every provider embeds in batches of `embedding.batch_size` and returns
//! exactly one vector per input, in input order.
//!
//! # Provider Selection
//!
//! ```rust
//! # use study_harness::config::EmbeddingConfig;
//! # use study_harness::embedding::{create_provider, EmbeddingProvider};
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```
//!
//! # Retry Strategy
//!
//! Failures are fatal for the triggering action by default
//! (`max_retries = 0`). When retries are configured:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Whether texts are being indexed or used to search the index.
///
/// Some services embed the two differently (Gemini task types).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedMode {
    Document,
    Query,
}

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the configured vector dimensionality, `0` if unknown.
    fn dims(&self) -> usize;
    /// Embed `texts`, returning one vector per input in the same order.
    async fn embed(&self, texts: &[String], mode: EmbedMode) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single query text.
pub async fn embed_query(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let results = provider.embed(&[text.to_string()], EmbedMode::Query).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Empty embedding response"))
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String], _mode: EmbedMode) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.")
    }
}

// ============ Shared HTTP plumbing ============

/// HTTP settings shared by the remote providers.
struct HttpSettings {
    client: reqwest::Client,
    batch_size: usize,
    max_retries: u32,
}

impl HttpSettings {
    fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build embedding HTTP client")?;
        Ok(Self {
            client,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        })
    }
}

/// POST `body` as JSON and return the response JSON, retrying transient
/// failures up to `max_retries` times.
pub(crate) async fn post_json_with_retry(
    request: impl Fn() -> reqwest::RequestBuilder,
    max_retries: u32,
    service: &str,
) -> Result<Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::warn!(service, attempt, ?delay, "retrying after transient error");
            tokio::time::sleep(delay).await;
        }

        match request().send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json::<Value>()
                        .await
                        .with_context(|| format!("{} returned a non-JSON body", service));
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow!("{} API error {}: {}", service, status, body_text));
                    continue;
                }

                bail!("{} API error {}: {}", service, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow!("{} request failed: {}", service, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} request failed after retries", service)))
}

fn api_key(config_env: Option<&str>, default_env: &str) -> Result<String> {
    let var = config_env.unwrap_or(default_env);
    std::env::var(var).map_err(|_| anyhow!("{} environment variable not set", var))
}

fn json_floats(value: &Value, what: &str) -> Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| anyhow!("Invalid {} response: embedding is not an array", what))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| anyhow!("Invalid {} response: non-numeric component", what))
        })
        .collect()
}

fn ensure_count(got: usize, expected: usize, service: &str) -> Result<()> {
    if got != expected {
        bail!(
            "{} returned {} embeddings for {} inputs",
            service,
            got,
            expected
        );
    }
    Ok(())
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API (`POST /v1/embeddings`).
///
/// Requires `OPENAI_API_KEY` (or the variable named by `api_key_env`).
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    url: String,
    api_key: String,
    http: HttpSettings,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for OpenAI provider"))?;
        let api_key = api_key(config.api_key_env.as_deref(), "OPENAI_API_KEY")?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());

        Ok(Self {
            model,
            dims: config.dims.unwrap_or(0),
            url: url.trim_end_matches('/').to_string(),
            api_key,
            http: HttpSettings::new(config)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String], _mode: EmbedMode) -> Result<Vec<Vec<f32>>> {
        let endpoint = format!("{}/v1/embeddings", self.url);
        let mut out = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.http.batch_size) {
            let body = serde_json::json!({
                "model": self.model,
                "input": batch,
            });
            let json = post_json_with_retry(
                || {
                    self.http
                        .client
                        .post(&endpoint)
                        .bearer_auth(&self.api_key)
                        .json(&body)
                },
                self.http.max_retries,
                "OpenAI",
            )
            .await?;
            let vectors = parse_openai_response(&json)?;
            ensure_count(vectors.len(), batch.len(), "OpenAI")?;
            out.extend(vectors);
        }

        Ok(out)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        indexed.push((index, json_floats(embedding, "OpenAI")?));
    }
    indexed.sort_by_key(|(i, _)| *i);

    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Gemini Provider ============

/// Title attached to document-mode Gemini embeddings.
const GEMINI_DOCUMENT_TITLE: &str = "Lecture Notes";

/// Embedding provider using the Gemini API (`models/{model}:batchEmbedContents`).
///
/// Document mode sends task type `RETRIEVAL_DOCUMENT` with a title; query
/// mode sends `RETRIEVAL_QUERY`. Requires `GEMINI_API_KEY` (or the
/// variable named by `api_key_env`).
pub struct GeminiProvider {
    model: String,
    dims: usize,
    url: String,
    api_key: String,
    http: HttpSettings,
}

impl GeminiProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for Gemini provider"))?;
        let api_key = api_key(config.api_key_env.as_deref(), "GEMINI_API_KEY")?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string());

        Ok(Self {
            model: model.trim_start_matches("models/").to_string(),
            dims: config.dims.unwrap_or(0),
            url: url.trim_end_matches('/').to_string(),
            api_key,
            http: HttpSettings::new(config)?,
        })
    }

    fn request_body(&self, batch: &[String], mode: EmbedMode) -> Value {
        let model_path = format!("models/{}", self.model);
        let requests: Vec<Value> = batch
            .iter()
            .map(|text| {
                let mut req = serde_json::json!({
                    "model": model_path,
                    "content": { "parts": [{ "text": text }] },
                });
                match mode {
                    EmbedMode::Document => {
                        req["taskType"] = "RETRIEVAL_DOCUMENT".into();
                        req["title"] = GEMINI_DOCUMENT_TITLE.into();
                    }
                    EmbedMode::Query => {
                        req["taskType"] = "RETRIEVAL_QUERY".into();
                    }
                }
                if self.dims > 0 {
                    req["outputDimensionality"] = self.dims.into();
                }
                req
            })
            .collect();
        serde_json::json!({ "requests": requests })
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String], mode: EmbedMode) -> Result<Vec<Vec<f32>>> {
        let endpoint = format!(
            "{}/v1beta/models/{}:batchEmbedContents",
            self.url, self.model
        );
        let mut out = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.http.batch_size) {
            let body = self.request_body(batch, mode);
            let json = post_json_with_retry(
                || {
                    self.http
                        .client
                        .post(&endpoint)
                        .header("x-goog-api-key", &self.api_key)
                        .json(&body)
                },
                self.http.max_retries,
                "Gemini",
            )
            .await?;
            let vectors = parse_gemini_response(&json)?;
            ensure_count(vectors.len(), batch.len(), "Gemini")?;
            out.extend(vectors);
        }

        Ok(out)
    }
}

fn parse_gemini_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|e| {
            let values = e
                .get("values")
                .ok_or_else(|| anyhow!("Invalid Gemini response: missing values"))?;
            json_floats(values, "Gemini")
        })
        .collect()
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default: `http://localhost:11434`).
pub struct OllamaProvider {
    model: String,
    dims: usize,
    url: String,
    http: HttpSettings,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            model,
            dims: config.dims.unwrap_or(0),
            url: url.trim_end_matches('/').to_string(),
            http: HttpSettings::new(config)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String], _mode: EmbedMode) -> Result<Vec<Vec<f32>>> {
        let endpoint = format!("{}/api/embed", self.url);
        let mut out = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.http.batch_size) {
            let body = serde_json::json!({
                "model": self.model,
                "input": batch,
            });
            let json = post_json_with_retry(
                || self.http.client.post(&endpoint).json(&body),
                self.http.max_retries,
                "Ollama",
            )
            .await
            .with_context(|| format!("is Ollama running at {}?", self.url))?;
            let vectors = parse_ollama_response(&json)?;
            ensure_count(vectors.len(), batch.len(), "Ollama")?;
            out.extend(vectors);
        }

        Ok(out)
    }
}

fn parse_ollama_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings.iter().map(|e| json_floats(e, "Ollama")).collect()
}

/// Create the [`EmbeddingProvider`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"gemini"` | [`GeminiProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => Ok(Box::new(OpenAIProvider::new(config)?)),
        "gemini" => Ok(Box::new(GeminiProvider::new(config)?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero-magnitude vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_openai_response_reordered_by_index() {
        let json = serde_json::json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] },
            ]
        });
        let vecs = parse_openai_response(&json).unwrap();
        assert_eq!(vecs, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_gemini_response_parsed() {
        let json = serde_json::json!({
            "embeddings": [ { "values": [0.5, 0.25] }, { "values": [1.0, 0.0] } ]
        });
        let vecs = parse_gemini_response(&json).unwrap();
        assert_eq!(vecs.len(), 2);
        assert_eq!(vecs[0], vec![0.5, 0.25]);
    }

    #[test]
    fn test_malformed_responses_rejected() {
        assert!(parse_openai_response(&serde_json::json!({})).is_err());
        assert!(parse_gemini_response(&serde_json::json!({"embeddings": [{}]})).is_err());
        assert!(parse_ollama_response(&serde_json::json!({"embeddings": [["x"]]})).is_err());
    }

    #[test]
    fn test_count_mismatch_is_error() {
        assert!(ensure_count(2, 3, "Test").is_err());
        assert!(ensure_count(3, 3, "Test").is_ok());
    }

    #[test]
    fn test_gemini_task_types() {
        let provider = GeminiProvider {
            model: "text-embedding-004".to_string(),
            dims: 0,
            url: String::new(),
            api_key: String::new(),
            http: HttpSettings::new(&EmbeddingConfig::default()).unwrap(),
        };
        let texts = vec!["a".to_string()];
        let doc = provider.request_body(&texts, EmbedMode::Document);
        assert_eq!(doc["requests"][0]["taskType"], "RETRIEVAL_DOCUMENT");
        assert_eq!(doc["requests"][0]["title"], "Lecture Notes");
        assert_eq!(doc["requests"][0]["model"], "models/text-embedding-004");
        let query = provider.request_body(&texts, EmbedMode::Query);
        assert_eq!(query["requests"][0]["taskType"], "RETRIEVAL_QUERY");
        assert!(query["requests"][0].get("title").is_none());
    }

    #[tokio::test]
    async fn test_disabled_provider_errors() {
        let err = DisabledProvider
            .embed(&["x".to_string()], EmbedMode::Document)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }
}
