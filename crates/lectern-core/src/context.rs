//! Query-time session: an opened index, the embedder that matches it, and an optional
//! generation backend.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lectern_index::{IndexError, IndexStore, Retriever, SearchFilter, SearchHit};
use lectern_llm::{AnyProvider, Embedder, LlmProvider, Message};
use serde::Serialize;

use crate::config::TimeoutConfig;
use crate::error::RagError;
use crate::prompt::build_prompt;

/// Generated answer together with the passages it was conditioned on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SearchHit>,
}

/// Owned replacement for process-wide session state; the caller decides its lifetime.
pub struct RagContext<E: Embedder, P: LlmProvider = AnyProvider> {
    retriever: Retriever<E>,
    provider: Option<P>,
    embedding_timeout: Duration,
    generation_timeout: Duration,
}

impl<E: Embedder, P: LlmProvider> std::fmt::Debug for RagContext<E, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagContext")
            .field("retriever", &self.retriever)
            .field("provider", &self.provider.as_ref().map(|p| p.name()))
            .field("embedding_timeout", &self.embedding_timeout)
            .field("generation_timeout", &self.generation_timeout)
            .finish()
    }
}

impl<E: Embedder, P: LlmProvider> RagContext<E, P> {
    #[must_use]
    pub fn new(retriever: Retriever<E>) -> Self {
        let timeouts = TimeoutConfig::default();
        Self {
            retriever,
            provider: None,
            embedding_timeout: Duration::from_secs(timeouts.embedding_secs),
            generation_timeout: Duration::from_secs(timeouts.generation_secs),
        }
    }

    /// Open the live index in `store` and bind `embedder` to it.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotFound`] or [`IndexError::Corrupt`] from the store, or
    /// [`IndexError::ModelMismatch`] if `embedder` is not the model the index was built with.
    pub async fn open(store: &dyn IndexStore, embedder: Arc<E>) -> Result<Self, RagError> {
        let index = match store.open().await {
            Ok(index) => index,
            Err(e @ IndexError::NotFound(_)) => {
                tracing::warn!(location = %store.location(), "no index found, build one first");
                return Err(e.into());
            }
            Err(e @ IndexError::Corrupt { .. }) => {
                tracing::error!(location = %store.location(), "{e}");
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(
            entries = index.len(),
            model = index.model(),
            "opened index"
        );
        Ok(Self::new(Retriever::new(embedder, index)?))
    }

    #[must_use]
    pub fn with_provider(mut self, provider: P) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, embedding: Duration, generation: Duration) -> Self {
        self.embedding_timeout = embedding;
        self.generation_timeout = generation;
        self
    }

    #[must_use]
    pub fn with_score_threshold(mut self, threshold: Option<f32>) -> Self {
        self.retriever = self.retriever.with_score_threshold(threshold);
        self
    }

    #[must_use]
    pub fn retriever(&self) -> &Retriever<E> {
        &self.retriever
    }

    #[must_use]
    pub fn provider(&self) -> Option<&P> {
        self.provider.as_ref()
    }

    /// Top-`k` passages for `query`, best first.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidK`] for `k == 0`, an embedding error, or
    /// [`RagError::Timeout`] if the query embedding exceeds the embedding deadline.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, RagError> {
        with_deadline(
            "retrieval",
            self.embedding_timeout,
            self.retriever.retrieve(query, k),
        )
        .await
    }

    /// # Errors
    ///
    /// Same as [`retrieve`](Self::retrieve).
    pub async fn retrieve_filtered(
        &self,
        query: &str,
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchHit>, RagError> {
        with_deadline(
            "retrieval",
            self.embedding_timeout,
            self.retriever.retrieve_filtered(query, k, filter),
        )
        .await
    }

    /// Retrieve `k` passages and ask the generation backend to answer from them.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NoProvider`] when no backend was attached, any retrieval error,
    /// the backend's error, or [`RagError::Timeout`].
    pub async fn ask(&self, question: &str, k: usize) -> Result<Answer, RagError> {
        let provider = self.provider.as_ref().ok_or(RagError::NoProvider)?;
        let sources = self.retrieve(question, k).await?;
        let prompt = build_prompt(&sources, question);

        tracing::info!(
            provider = provider.name(),
            model = provider.model(),
            passages = sources.len(),
            "generating answer"
        );
        let messages = [Message::user(prompt)];
        let text = with_deadline(
            "generation",
            self.generation_timeout,
            provider.chat(&messages),
        )
        .await?;

        Ok(Answer { text, sources })
    }
}

async fn with_deadline<T, Er>(
    operation: &'static str,
    limit: Duration,
    fut: impl Future<Output = Result<T, Er>>,
) -> Result<T, RagError>
where
    Er: Into<RagError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(RagError::Timeout {
            operation,
            secs: limit.as_secs(),
        }),
    }
}
