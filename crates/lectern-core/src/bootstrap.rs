//! Turns a [`Config`] into concrete backends, stores and contexts.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use lectern_index::document::{LoaderRegistry, TextSplitter};
use lectern_index::{FsIndexStore, IndexBuilder, IndexStore};
use lectern_llm::compatible::CompatibleProvider;
use lectern_llm::hash::HashEmbedder;
use lectern_llm::ollama::OllamaProvider;
use lectern_llm::openai::OpenAiProvider;
use lectern_llm::{AnyEmbedder, AnyProvider};

use crate::config::{Config, EmbedderKind, OLLAMA_BASE_URL, OPENAI_BASE_URL, ProviderKind};
use crate::context::RagContext;
use crate::error::RagError;

const DEFAULT_CONFIG_PATH: &str = "lectern.toml";

/// Priority: `--config` > `LECTERN_CONFIG` > `lectern.toml`.
#[must_use]
pub fn resolve_config_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("LECTERN_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

/// # Errors
///
/// Returns an error if the selected backend is missing a model or key, or the candle model
/// cannot be loaded.
pub fn create_embedder(config: &Config) -> anyhow::Result<AnyEmbedder> {
    let cfg = &config.embedding;
    match cfg.provider {
        EmbedderKind::Hash => Ok(AnyEmbedder::Hash(HashEmbedder::new(cfg.dimensions))),
        EmbedderKind::Ollama => {
            let model = cfg
                .model_name()
                .context("embedding.model required for ollama")?
                .to_owned();
            let base_url = cfg.base_url.as_deref().unwrap_or(OLLAMA_BASE_URL);
            Ok(AnyEmbedder::Ollama(OllamaProvider::new(
                base_url,
                model.clone(),
                model,
            )))
        }
        EmbedderKind::OpenAi => {
            let model = cfg
                .model_name()
                .context("embedding.model required for openai")?
                .to_owned();
            let api_key = config
                .secrets
                .key_for("openai")
                .context("LECTERN_OPENAI_API_KEY not set")?
                .expose()
                .to_owned();
            let base_url = cfg
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_owned());
            let mut provider =
                OpenAiProvider::new(api_key, base_url, model.clone(), 0, Some(model));
            if cfg.dimensions != lectern_llm::hash::DEFAULT_DIMENSIONS {
                provider = provider.with_dimensions(cfg.dimensions);
            }
            Ok(AnyEmbedder::OpenAi(provider))
        }
        EmbedderKind::Candle => create_candle_embedder(config),
    }
}

#[cfg(feature = "candle")]
fn create_candle_embedder(config: &Config) -> anyhow::Result<AnyEmbedder> {
    use lectern_llm::candle_embed::{CandleEmbedder, DEFAULT_REPO, select_device};

    let repo = config.embedding.model_name().unwrap_or(DEFAULT_REPO);
    let device = select_device(&config.embedding.device)?;
    let embedder = CandleEmbedder::load(repo, &device)
        .with_context(|| format!("failed to load embedding model {repo}"))?;
    Ok(AnyEmbedder::Candle(embedder))
}

#[cfg(not(feature = "candle"))]
fn create_candle_embedder(_config: &Config) -> anyhow::Result<AnyEmbedder> {
    anyhow::bail!("embedding provider candle not available (feature not enabled)")
}

/// # Errors
///
/// Returns an error if the selected backend has no model or no API key.
pub fn create_provider(config: &Config) -> anyhow::Result<AnyProvider> {
    let llm = &config.llm;
    let model = llm
        .model_name()
        .with_context(|| format!("llm.model required for {} provider", llm.provider))?
        .to_owned();

    match llm.provider {
        ProviderKind::Ollama => {
            let base_url = llm.base_url.as_deref().unwrap_or(OLLAMA_BASE_URL);
            Ok(AnyProvider::Ollama(OllamaProvider::new(
                base_url,
                model,
                String::new(),
            )))
        }
        ProviderKind::OpenAi => {
            let api_key = required_key(config, "openai", "LECTERN_OPENAI_API_KEY")?;
            let base_url = llm
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_owned());
            Ok(AnyProvider::OpenAi(
                OpenAiProvider::new(api_key, base_url, model, llm.max_tokens, None)
                    .with_temperature(llm.temperature),
            ))
        }
        ProviderKind::Gemini => {
            let api_key = required_key(config, "gemini", "LECTERN_GEMINI_API_KEY")?;
            Ok(AnyProvider::Compatible(
                CompatibleProvider::gemini(api_key, model, llm.max_tokens)
                    .with_temperature(llm.temperature),
            ))
        }
        ProviderKind::Compatible => {
            let base_url = llm
                .base_url
                .clone()
                .context("llm.base_url required for compatible provider")?;
            let api_key = config
                .secrets
                .key_for(&llm.name)
                .map(|s| s.expose().to_owned())
                .unwrap_or_default();
            Ok(AnyProvider::Compatible(
                CompatibleProvider::new(
                    llm.name.clone(),
                    api_key,
                    base_url,
                    model,
                    llm.max_tokens,
                    None,
                )
                .with_temperature(llm.temperature),
            ))
        }
    }
}

fn required_key(config: &Config, backend: &str, var: &str) -> anyhow::Result<String> {
    Ok(config
        .secrets
        .key_for(backend)
        .with_context(|| format!("{var} (or LECTERN_API_KEY) not set"))?
        .expose()
        .to_owned())
}

#[must_use]
pub fn create_store(config: &Config) -> Arc<dyn IndexStore> {
    Arc::new(FsIndexStore::new(&config.index.path))
}

/// # Errors
///
/// Returns an error if the chunking or builder settings are invalid.
pub fn create_builder(
    config: &Config,
    embedder: Arc<AnyEmbedder>,
) -> anyhow::Result<IndexBuilder<AnyEmbedder>> {
    let loaders = LoaderRegistry::with_defaults(config.index.max_file_size);
    let splitter = TextSplitter::new(config.splitter_config())?;
    let builder = IndexBuilder::new(
        loaders,
        splitter,
        embedder,
        create_store(config),
        config.builder_config(),
    )?;
    Ok(builder)
}

/// Open the persisted index with the configured embedder, timeouts and score threshold.
///
/// # Errors
///
/// Returns the index error when the index is missing, corrupt or built with another model.
pub async fn open_context(
    config: &Config,
    embedder: Arc<AnyEmbedder>,
) -> Result<RagContext<AnyEmbedder>, RagError> {
    let store = create_store(config);
    let ctx = RagContext::open(store.as_ref(), embedder).await?;
    Ok(ctx
        .with_timeouts(
            Duration::from_secs(config.timeouts.embedding_secs),
            Duration::from_secs(config.timeouts.generation_secs),
        )
        .with_score_threshold(config.retrieval.score_threshold))
}
