use std::path::PathBuf;

use lectern_index::Metric;
use lectern_index::document::DEFAULT_MAX_FILE_SIZE;
use serde::{Deserialize, Serialize};

use crate::secret::Secret;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// Generation backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Gemini,
    Ollama,
    OpenAi,
    Compatible,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Compatible => "compatible",
        }
    }

    /// Model used when `[llm] model` is not set.
    #[must_use]
    pub fn default_model(self) -> Option<&'static str> {
        match self {
            Self::Gemini => Some("gemini-2.5-pro"),
            Self::Ollama => Some("llama3.2"),
            Self::OpenAi => Some("gpt-4o-mini"),
            Self::Compatible => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Embedding backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    #[default]
    Hash,
    Ollama,
    OpenAi,
    Candle,
}

impl EmbedderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Candle => "candle",
        }
    }

    #[must_use]
    pub fn default_model(self) -> Option<&'static str> {
        match self {
            Self::Hash => None,
            Self::Ollama => Some("nomic-embed-text"),
            Self::OpenAi => Some("text-embedding-3-small"),
            Self::Candle => Some("sentence-transformers/all-MiniLM-L6-v2"),
        }
    }
}

impl std::fmt::Display for EmbedderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) const OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub(crate) const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn default_compatible_name() -> String {
    "compatible".into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature, honored by OpenAI-compatible backends.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Label for the `compatible` backend in logs and key lookup.
    #[serde(default = "default_compatible_name")]
    pub name: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            base_url: None,
            model: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            name: default_compatible_name(),
        }
    }
}

impl LlmConfig {
    /// Configured model, falling back to the provider's default.
    #[must_use]
    pub fn model_name(&self) -> Option<&str> {
        self.model
            .as_deref()
            .or_else(|| self.provider.default_model())
    }
}

fn default_dimensions() -> usize {
    lectern_llm::hash::DEFAULT_DIMENSIONS
}

fn default_batch_size() -> usize {
    32
}

fn default_device() -> String {
    "cpu".into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbedderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Vector length for the hashing embedder; requested output size for OpenAI models.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// `cpu`, `cuda`, `metal` or `auto` for the candle backend.
    #[serde(default = "default_device")]
    pub device: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbedderKind::default(),
            model: None,
            base_url: None,
            dimensions: default_dimensions(),
            batch_size: default_batch_size(),
            device: default_device(),
        }
    }
}

impl EmbeddingConfig {
    #[must_use]
    pub fn model_name(&self) -> Option<&str> {
        self.model
            .as_deref()
            .or_else(|| self.provider.default_model())
    }
}

fn default_chunk_size() -> usize {
    2000
}

fn default_chunk_overlap() -> usize {
    400
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_true")]
    pub trim_whitespace: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            trim_whitespace: true,
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./lectern_index")
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_load_concurrency() -> usize {
    4
}

#[derive(Debug, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
    #[serde(default)]
    pub metric: Metric,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_load_concurrency")]
    pub load_concurrency: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            source_dir: default_source_dir(),
            metric: Metric::default(),
            max_file_size: default_max_file_size(),
            load_concurrency: default_load_concurrency(),
        }
    }
}

fn default_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            score_threshold: None,
        }
    }
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_generation_timeout() -> u64 {
    120
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_embedding_timeout")]
    pub embedding_secs: u64,
    #[serde(default = "default_generation_timeout")]
    pub generation_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            embedding_secs: default_embedding_timeout(),
            generation_secs: default_generation_timeout(),
        }
    }
}

/// Keys read from the environment after the file is parsed.
#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub openai_api_key: Option<Secret>,
    pub gemini_api_key: Option<Secret>,
    /// Fallback for any backend without a dedicated variable.
    pub api_key: Option<Secret>,
}

impl ResolvedSecrets {
    /// Key for a generation or embedding backend, most specific variable first.
    #[must_use]
    pub fn key_for(&self, backend: &str) -> Option<&Secret> {
        let specific = match backend {
            "openai" => self.openai_api_key.as_ref(),
            "gemini" => self.gemini_api_key.as_ref(),
            _ => None,
        };
        specific.or(self.api_key.as_ref())
    }
}
