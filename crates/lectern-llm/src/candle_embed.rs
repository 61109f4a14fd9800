//! Local BERT sentence embeddings with candle.

use std::sync::Arc;

pub use candle_core::Device;
use candle_core::{DType, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;

use crate::embed::Embedder;
use crate::error::LlmError;

/// Default sentence-transformer repository.
pub const DEFAULT_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Longer inputs are truncated; BERT position embeddings stop here.
const MAX_SEQUENCE_TOKENS: usize = 512;

#[derive(Clone)]
pub struct EmbedModel {
    model: Arc<BertModel>,
    tokenizer: Tokenizer,
    device: Device,
}

impl std::fmt::Debug for EmbedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedModel")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl EmbedModel {
    /// Download (or reuse the cached copy of) a BERT model from the `HuggingFace` Hub.
    ///
    /// # Errors
    ///
    /// Returns an error if model download or loading fails.
    pub fn load(repo_id: &str, device: &Device) -> Result<Self, LlmError> {
        let api = hf_hub::api::sync::Api::new()
            .map_err(|e| LlmError::ModelLoad(format!("hub client: {e}")))?;
        let repo = api.model(repo_id.to_owned());

        let fetch = |file: &str| {
            repo.get(file)
                .map_err(|e| LlmError::ModelLoad(format!("{repo_id}/{file}: {e}")))
        };
        let config_path = fetch("config.json")?;
        let tokenizer_path = fetch("tokenizer.json")?;
        let weights_path = fetch("model.safetensors")?;

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| LlmError::ModelLoad(format!("read {}: {e}", config_path.display())))?;
        let config: BertConfig = serde_json::from_str(&config_str)?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| LlmError::ModelLoad(format!("tokenizer: {e}")))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQUENCE_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| LlmError::ModelLoad(format!("tokenizer truncation: {e}")))?;

        // SAFETY: the safetensors file lives in the hub cache and is not modified while mapped.
        let vb =
            unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)? };
        let model = BertModel::load(vb, &config)?;

        Ok(Self {
            model: Arc::new(model),
            tokenizer,
            device: device.clone(),
        })
    }

    /// Mean-pooled, L2-normalized sentence embedding.
    ///
    /// # Errors
    ///
    /// Returns an error if tokenization or the forward pass fails.
    pub fn embed_sync(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| LlmError::Inference(format!("tokenizer encode failed: {e}")))?;

        let token_ids = encoding.get_ids();
        let token_type_ids = vec![0u32; token_ids.len()];

        let input_ids = Tensor::new(token_ids, &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(token_type_ids.as_slice(), &self.device)?.unsqueeze(0)?;

        let hidden = self.model.forward(&input_ids, &token_type_ids, None)?;

        let seq_len = u32::try_from(hidden.dim(1)?)
            .map_err(|e| LlmError::Inference(format!("sequence length overflow: {e}")))?;
        let pooled = (hidden.sum(1)? / f64::from(seq_len))?;

        let norm = pooled.sqr()?.sum_keepdim(1)?.sqrt()?;
        let normalized = pooled.broadcast_div(&norm)?.squeeze(0)?;

        normalized.to_vec1::<f32>().map_err(LlmError::Candle)
    }
}

/// [`Embedder`] over an [`EmbedModel`]; inference runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct CandleEmbedder {
    model: Arc<EmbedModel>,
    repo_id: String,
}

impl CandleEmbedder {
    /// # Errors
    ///
    /// Returns an error if the model cannot be downloaded or loaded.
    pub fn load(repo_id: &str, device: &Device) -> Result<Self, LlmError> {
        tracing::info!(repo = repo_id, "loading embedding model");
        Ok(Self {
            model: Arc::new(EmbedModel::load(repo_id, device)?),
            repo_id: repo_id.to_owned(),
        })
    }
}

impl Embedder for CandleEmbedder {
    fn model_id(&self) -> &str {
        &self.repo_id
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let model = Arc::clone(&self.model);
        let text = text.to_owned();
        tokio::task::spawn_blocking(move || model.embed_sync(&text))
            .await
            .map_err(|e| LlmError::Inference(format!("candle embedding task failed: {e}")))?
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            texts
                .iter()
                .map(|t| model.embed_sync(t))
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(|e| LlmError::Inference(format!("candle embedding task failed: {e}")))?
    }
}

/// Resolve a device preference (`cpu`, `cuda`, `metal`, `auto`).
///
/// # Errors
///
/// Returns an error if an accelerator is requested that this build does not support.
pub fn select_device(preference: &str) -> Result<Device, LlmError> {
    match preference {
        "metal" => {
            #[cfg(feature = "metal")]
            return Ok(Device::new_metal(0)?);
            #[cfg(not(feature = "metal"))]
            return Err(LlmError::ModelLoad(
                "candle compiled without metal feature".into(),
            ));
        }
        "cuda" => {
            #[cfg(feature = "cuda")]
            return Ok(Device::new_cuda(0)?);
            #[cfg(not(feature = "cuda"))]
            return Err(LlmError::ModelLoad(
                "candle compiled without cuda feature".into(),
            ));
        }
        "auto" => {
            #[cfg(feature = "metal")]
            if let Ok(device) = Device::new_metal(0) {
                return Ok(device);
            }
            #[cfg(feature = "cuda")]
            if let Ok(device) = Device::new_cuda(0) {
                return Ok(device);
            }
            Ok(Device::Cpu)
        }
        _ => Ok(Device::Cpu),
    }
}
