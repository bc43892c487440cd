//! TOML configuration for the `gate` binary.
//!
//! Every section is optional; missing keys fall back to the defaults
//! below. [`load_config`] validates the whole file once at startup and
//! refuses to continue on any out-of-range value.
//!
//! ```toml
//! [scoring]
//! fallback_threshold = 0.6
//!
//! [retrieval]
//! backend = "keyword"       # or "embedding"
//! k = 4
//! fallback_k = 8            # defaults to 2 × k
//!
//! [embedding]               # used by the "embedding" backend
//! model = "text-embedding-3-small"
//!
//! [chunking]
//! max_tokens = 250
//!
//! [generation]
//! provider = "extractive"   # or "openai"
//!
//! [session]
//! dir = "sessions"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use answer_gate_core::config::{FallbackParams, ScoringConfig};
use answer_gate_core::gate::GateOptions;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// `[retrieval]`: the passage index backend plus the sizes and cut-offs
/// handed to the gate.
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// `"keyword"` (term overlap, offline) or `"embedding"` (cosine over
    /// OpenAI embeddings).
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(flatten)]
    pub params: FallbackParams,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            params: FallbackParams::default(),
        }
    }
}

fn default_backend() -> String {
    "keyword".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    250
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_generation_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_generation_max_tokens(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "extractive".to_string()
}
fn default_model() -> Option<String> {
    Some("gpt-3.5-turbo".to_string())
}
fn default_temperature() -> f64 {
    0.3
}
fn default_generation_max_tokens() -> u32 {
    2048
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_true")]
    pub assess_quality: bool,
    #[serde(default = "default_true")]
    pub check_hallucination: bool,
    #[serde(default = "default_true")]
    pub enable_fallback: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            assess_quality: true,
            check_hallucination: true,
            enable_fallback: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl PipelineConfig {
    pub fn gate_options(&self) -> GateOptions {
        GateOptions {
            assess_quality: self.assess_quality,
            check_hallucination: self.check_hallucination,
            enable_fallback: self.enable_fallback,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_session_dir")]
    pub dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dir: default_session_dir(),
        }
    }
}

fn default_session_dir() -> PathBuf {
    PathBuf::from("sessions")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    config
        .scoring
        .validate()
        .context("Invalid [scoring] section")?;
    config
        .retrieval
        .params
        .validate()
        .context("Invalid [retrieval] section")?;

    match config.retrieval.backend.as_str() {
        "keyword" => {}
        "embedding" => {
            if config.embedding.model.is_empty() {
                anyhow::bail!("embedding.model must be specified for the embedding backend");
            }
            if config.embedding.batch_size == 0 {
                anyhow::bail!("embedding.batch_size must be > 0");
            }
        }
        other => anyhow::bail!(
            "Unknown retrieval backend: '{}'. Must be keyword or embedding.",
            other
        ),
    }

    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }

    let generation = &config.generation;
    match generation.provider.as_str() {
        "extractive" => {}
        "openai" => {
            if generation.model.as_deref().map_or(true, str::is_empty) {
                anyhow::bail!("generation.model must be specified when provider is 'openai'");
            }
        }
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be extractive or openai.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}
