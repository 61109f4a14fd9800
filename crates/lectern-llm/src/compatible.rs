use crate::embed::Embedder;
use crate::error::LlmError;
use crate::openai::OpenAiProvider;
use crate::provider::{LlmProvider, Message};

/// Base URL of Gemini's OpenAI-compatible surface.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// A named server that speaks the OpenAI wire format (Gemini, vLLM, LM Studio, ...).
#[derive(Debug, Clone)]
pub struct CompatibleProvider {
    inner: OpenAiProvider,
    provider_name: String,
}

impl CompatibleProvider {
    #[must_use]
    pub fn new(
        provider_name: String,
        api_key: String,
        base_url: String,
        model: String,
        max_tokens: u32,
        embedding_model: Option<String>,
    ) -> Self {
        let inner = OpenAiProvider::new(api_key, base_url, model, max_tokens, embedding_model);
        Self {
            inner,
            provider_name,
        }
    }

    #[must_use]
    pub fn gemini(api_key: String, model: String, max_tokens: u32) -> Self {
        Self::new(
            "gemini".into(),
            api_key,
            GEMINI_BASE_URL.into(),
            model,
            max_tokens,
            None,
        )
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.inner = self.inner.with_temperature(temperature);
        self
    }
}

impl LlmProvider for CompatibleProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.inner.chat(messages).await
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}

impl Embedder for CompatibleProvider {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.inner.embed_batch(texts).await
    }
}
