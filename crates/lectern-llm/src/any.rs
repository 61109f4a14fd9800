#[cfg(feature = "candle")]
use crate::candle_embed::CandleEmbedder;
use crate::compatible::CompatibleProvider;
use crate::embed::Embedder;
use crate::error::LlmError;
use crate::hash::HashEmbedder;
#[cfg(feature = "mock")]
use crate::mock::MockProvider;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;
use crate::provider::{LlmProvider, Message};

/// Generates a match over all `AnyProvider` variants, binding the inner provider
/// and evaluating the given expression for each arm.
macro_rules! delegate_provider {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyProvider::Ollama($p) => $expr,
            AnyProvider::OpenAi($p) => $expr,
            AnyProvider::Compatible($p) => $expr,
            #[cfg(feature = "mock")]
            AnyProvider::Mock($p) => $expr,
        }
    };
}

/// Same as `delegate_provider!` for `AnyEmbedder`.
macro_rules! delegate_embedder {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyEmbedder::Hash($p) => $expr,
            AnyEmbedder::Ollama($p) => $expr,
            AnyEmbedder::OpenAi($p) => $expr,
            AnyEmbedder::Compatible($p) => $expr,
            #[cfg(feature = "candle")]
            AnyEmbedder::Candle($p) => $expr,
            #[cfg(feature = "mock")]
            AnyEmbedder::Mock($p) => $expr,
        }
    };
}

/// Generation backend chosen once from configuration.
#[derive(Debug, Clone)]
pub enum AnyProvider {
    Ollama(OllamaProvider),
    OpenAi(OpenAiProvider),
    Compatible(CompatibleProvider),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl LlmProvider for AnyProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        delegate_provider!(self, |p| p.chat(messages).await)
    }

    fn name(&self) -> &str {
        delegate_provider!(self, |p| p.name())
    }

    fn model(&self) -> &str {
        delegate_provider!(self, |p| p.model())
    }
}

/// Embedding backend chosen once from configuration.
#[derive(Debug, Clone)]
pub enum AnyEmbedder {
    Hash(HashEmbedder),
    Ollama(OllamaProvider),
    OpenAi(OpenAiProvider),
    Compatible(CompatibleProvider),
    #[cfg(feature = "candle")]
    Candle(CandleEmbedder),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl AnyEmbedder {
    /// Short backend label for logs.
    #[must_use]
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Hash(_) => "hash",
            Self::Ollama(_) => "ollama",
            Self::OpenAi(_) => "openai",
            Self::Compatible(_) => "compatible",
            #[cfg(feature = "candle")]
            Self::Candle(_) => "candle",
            #[cfg(feature = "mock")]
            Self::Mock(_) => "mock",
        }
    }
}

impl Embedder for AnyEmbedder {
    fn model_id(&self) -> &str {
        delegate_embedder!(self, |p| p.model_id())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        delegate_embedder!(self, |p| p.embed(text).await)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        delegate_embedder!(self, |p| p.embed_batch(texts).await)
    }
}
