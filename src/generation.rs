//! Text generation providers and the three study calls built on them.
//!
//! [`GenerationProvider`] is the single capability (prompt in, text out).
//! Concrete providers:
//! - **[`DisabledGenerator`]**: returns errors; used when generation is not configured.
//! - **[`OpenAIGenerator`]**: `POST /v1/chat/completions`.
//! - **[`GeminiGenerator`]**: `models/{model}:generateContent`.
//! - **[`OllamaGenerator`]**: `POST /api/generate` with `stream: false`.
//!
//! On top of it sit [`summarize`], [`generate_quiz`] and [`answer`].
//! Quiz parse failures surface as [`QuizError`] inside the returned
//! `anyhow::Error` (use `downcast_ref::<QuizError>()`), never as an empty
//! bundle.
//!
//! [`QuizError`]: crate::quiz::QuizError

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::config::GenerationConfig;
use crate::embedding::post_json_with_retry;
use crate::index::VectorIndex;
use crate::prompts::{quiz_prompt, summary_prompt};
use crate::quiz::{parse_bundle, QuizBundle};
use crate::rag::{build_grounded_prompt, GroundedPrompt};

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn model_name(&self) -> &str;
    /// Send `prompt` and return the raw response text.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Summarize the full document text.
pub async fn summarize(generator: &dyn GenerationProvider, text: &str) -> Result<String> {
    let response = generator
        .generate(&summary_prompt(text))
        .await
        .context("summary generation failed")?;
    Ok(response.trim().to_string())
}

/// Generate and validate a quiz/flashcard bundle from a summary.
pub async fn generate_quiz(
    generator: &dyn GenerationProvider,
    summary: &str,
) -> Result<QuizBundle> {
    let response = generator
        .generate(&quiz_prompt(summary))
        .await
        .context("quiz generation failed")?;
    let bundle = parse_bundle(&response)?;
    Ok(bundle)
}

/// A chatbot answer plus the chunks it was grounded on.
#[derive(Debug, Clone)]
pub struct GroundedAnswer {
    pub answer: String,
    pub grounding: GroundedPrompt,
}

/// Answer `query` from the top-`k` indexed chunks.
pub async fn answer(
    generator: &dyn GenerationProvider,
    index: &VectorIndex,
    query: &str,
    k: usize,
) -> Result<GroundedAnswer> {
    let grounding = build_grounded_prompt(index, query, k).await?;
    let response = generator
        .generate(&grounding.prompt)
        .await
        .context("answer generation failed")?;
    Ok(GroundedAnswer {
        answer: response.trim().to_string(),
        grounding,
    })
}

// ============ Disabled ============

pub struct DisabledGenerator;

#[async_trait]
impl GenerationProvider for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("Generation provider is disabled. Set [generation] provider in config.")
    }
}

// ============ Shared ============

struct HttpSettings {
    client: reqwest::Client,
    model: String,
    url: String,
    temperature: f32,
    max_retries: u32,
}

impl HttpSettings {
    fn new(config: &GenerationConfig, default_url: &str, service: &str) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("generation.model required for {} provider", service))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build generation HTTP client")?;
        let url = config.url.as_deref().unwrap_or(default_url);
        Ok(Self {
            client,
            model,
            url: url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

fn api_key(config: &GenerationConfig, default_env: &str) -> Result<String> {
    let var = config.api_key_env.as_deref().unwrap_or(default_env);
    std::env::var(var).map_err(|_| anyhow!("{} environment variable not set", var))
}

// ============ OpenAI ============

pub struct OpenAIGenerator {
    http: HttpSettings,
    api_key: String,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            http: HttpSettings::new(config, "https://api.openai.com", "OpenAI")?,
            api_key: api_key(config, "OPENAI_API_KEY")?,
        })
    }
}

#[async_trait]
impl GenerationProvider for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.http.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let endpoint = format!("{}/v1/chat/completions", self.http.url);
        let body = serde_json::json!({
            "model": self.http.model,
            "temperature": self.http.temperature,
            "messages": [{ "role": "user", "content": prompt }],
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
        parse_openai_chat(&json)
    }
}

fn parse_openai_chat(json: &Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

// ============ Gemini ============

pub struct GeminiGenerator {
    http: HttpSettings,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let mut http =
            HttpSettings::new(config, "https://generativelanguage.googleapis.com", "Gemini")?;
        http.model = http.model.trim_start_matches("models/").to_string();
        Ok(Self {
            http,
            api_key: api_key(config, "GEMINI_API_KEY")?,
        })
    }
}

#[async_trait]
impl GenerationProvider for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.http.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            self.http.url, self.http.model
        );
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": self.http.temperature },
        });
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
        parse_gemini_candidates(&json)
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_gemini_candidates(json: &Value) -> Result<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            let reason = json
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .unwrap_or("missing candidates[0].content.parts");
            anyhow!("Invalid Gemini response: {}", reason)
        })?;
    Ok(parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join(""))
}

// ============ Ollama ============

pub struct OllamaGenerator {
    http: HttpSettings,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            http: HttpSettings::new(config, "http://localhost:11434", "Ollama")?,
        })
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.http.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let endpoint = format!("{}/api/generate", self.http.url);
        let body = serde_json::json!({
            "model": self.http.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.http.temperature },
        });
        let json = post_json_with_retry(
            || self.http.client.post(&endpoint).json(&body),
            self.http.max_retries,
            "Ollama",
        )
        .await
        .with_context(|| format!("is Ollama running at {}?", self.http.url))?;
        json.get("response")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Invalid Ollama response: missing response"))
    }
}

/// Create the [`GenerationProvider`] named by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn GenerationProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "openai" => Ok(Box::new(OpenAIGenerator::new(config)?)),
        "gemini" => Ok(Box::new(GeminiGenerator::new(config)?)),
        "ollama" => Ok(Box::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
