mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};
use lectern_index::BuilderConfig;
use lectern_index::document::SplitterConfig;

use crate::secret::Secret;

impl Config {
    /// Load configuration from a TOML file, apply `LECTERN_*` overrides and validate.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if the resulting
    /// values are out of range.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.resolve_secrets();
        config.validate()?;
        Ok(config)
    }

    /// Read API keys from the environment. Keys are never taken from the file.
    pub fn resolve_secrets(&mut self) {
        self.secrets.openai_api_key = Secret::from_env("LECTERN_OPENAI_API_KEY");
        self.secrets.gemini_api_key = Secret::from_env("LECTERN_GEMINI_API_KEY");
        self.secrets.api_key = Secret::from_env("LECTERN_API_KEY");
    }

    /// # Errors
    ///
    /// Returns an error naming the first setting that is out of range.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.splitter_config()
            .validate()
            .context("invalid [chunking] section")?;
        if self.retrieval.k == 0 {
            bail!("retrieval.k must be greater than zero");
        }
        if let Some(threshold) = self.retrieval.score_threshold
            && !threshold.is_finite()
        {
            bail!("retrieval.score_threshold must be a finite number");
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be greater than zero");
        }
        if self.embedding.dimensions == 0 {
            bail!("embedding.dimensions must be greater than zero");
        }
        if self.index.load_concurrency == 0 {
            bail!("index.load_concurrency must be greater than zero");
        }
        if self.index.max_file_size == 0 {
            bail!("index.max_file_size must be greater than zero");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!(
                "llm.temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            );
        }
        if self.llm.max_tokens == 0 {
            bail!("llm.max_tokens must be greater than zero");
        }
        if self.timeouts.embedding_secs == 0 || self.timeouts.generation_secs == 0 {
            bail!("timeouts must be greater than zero seconds");
        }
        Ok(())
    }

    #[must_use]
    pub fn splitter_config(&self) -> SplitterConfig {
        SplitterConfig {
            chunk_size: self.chunking.chunk_size,
            chunk_overlap: self.chunking.chunk_overlap,
            trim_whitespace: self.chunking.trim_whitespace,
        }
    }

    #[must_use]
    pub fn builder_config(&self) -> BuilderConfig {
        BuilderConfig {
            embed_batch_size: self.embedding.batch_size,
            load_concurrency: self.index.load_concurrency,
            metric: self.index.metric,
        }
    }
}
