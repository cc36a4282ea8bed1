use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::chunk::DEFAULT_CHUNK_WORDS;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: default_chunk_size(),
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_WORDS
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (Ollama host, proxies, test servers).
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            api_key_env: None,
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            api_key_env: None,
            temperature: default_temperature(),
            max_retries: 0,
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_timeout_secs() -> u64 {
    30
}
fn default_generation_timeout_secs() -> u64 {
    120
}
fn default_temperature() -> f32 {
    0.2
}

const PROVIDERS: &[&str] = &["disabled", "openai", "gemini", "ollama"];

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Read and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Load `path` if it exists; otherwise fall back to built-in defaults.
///
/// Only used for the CLI's default config location. An explicitly passed
/// path goes through [`load_config`] and must exist.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Ok(Config::default())
    }
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.size == 0 {
        anyhow::bail!("chunking.size must be > 0");
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if !PROVIDERS.contains(&config.embedding.provider.as_str()) {
        anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be one of: {}.",
            config.embedding.provider,
            PROVIDERS.join(", ")
        );
    }
    if !PROVIDERS.contains(&config.generation.provider.as_str()) {
        anyhow::bail!(
            "Unknown generation provider: '{}'. Must be one of: {}.",
            config.generation.provider,
            PROVIDERS.join(", ")
        );
    }

    if config.embedding.is_enabled() {
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.dims == Some(0) {
            anyhow::bail!("embedding.dims must be > 0 when set");
        }
        if config.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
    }

    if config.generation.is_enabled() && config.generation.model.is_none() {
        anyhow::bail!(
            "generation.model must be specified when provider is '{}'",
            config.generation.provider
        );
    }

    if !(0.0..=2.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.chunking.size, 500);
        assert_eq!(cfg.retrieval.top_k, 3);
        assert!(!cfg.embedding.is_enabled());
        assert!(!cfg.generation.is_enabled());
        assert_eq!(cfg.embedding.max_retries, 0);
    }

    #[test]
    fn full_config_parses() {
        let cfg = parse_config(
            r#"
[chunking]
size = 200

[retrieval]
top_k = 5

[embedding]
provider = "gemini"
model = "text-embedding-004"
dims = 768

[generation]
provider = "openai"
model = "gpt-4o-mini"
temperature = 0.7
"#,
        )
        .unwrap();
        assert_eq!(cfg.chunking.size, 200);
        assert_eq!(cfg.retrieval.top_k, 5);
        assert_eq!(cfg.embedding.dims, Some(768));
        assert_eq!(cfg.generation.model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let err = parse_config("[chunking]\nsize = 0\n").unwrap_err();
        assert!(err.to_string().contains("chunking.size"));
    }

    #[test]
    fn zero_top_k_rejected() {
        assert!(parse_config("[retrieval]\ntop_k = 0\n").is_err());
    }

    #[test]
    fn unknown_provider_rejected() {
        let err = parse_config("[embedding]\nprovider = \"cohere\"\nmodel = \"x\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn enabled_provider_requires_model() {
        assert!(parse_config("[generation]\nprovider = \"gemini\"\n").is_err());
        assert!(parse_config("[embedding]\nprovider = \"ollama\"\n").is_err());
    }

    #[test]
    fn temperature_out_of_range_rejected() {
        assert!(parse_config("[generation]\ntemperature = 3.5\n").is_err());
    }

    #[test]
    fn missing_default_file_falls_back() {
        let cfg = load_config_or_default(Path::new("/nonexistent/study.toml")).unwrap();
        assert_eq!(cfg.chunking.size, 500);
        assert!(load_config(Path::new("/nonexistent/study.toml")).is_err());
    }
}
