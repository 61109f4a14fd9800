//! Query-side entry point: embed the query with the index's model, then search.

use std::sync::Arc;

use lectern_llm::Embedder;

use crate::error::IndexError;
use crate::filter::SearchFilter;
use crate::index::{Index, SearchHit};

/// Binds an embedder to an opened index after checking they agree on the model.
pub struct Retriever<E: Embedder> {
    embedder: Arc<E>,
    index: Arc<Index>,
    score_threshold: Option<f32>,
}

impl<E: Embedder> std::fmt::Debug for Retriever<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("model", &self.index.model())
            .field("entries", &self.index.len())
            .field("score_threshold", &self.score_threshold)
            .finish_non_exhaustive()
    }
}

impl<E: Embedder> Retriever<E> {
    /// # Errors
    ///
    /// Returns [`IndexError::ModelMismatch`] if the embedder's model differs from the one the
    /// index was built with.
    pub fn new(embedder: Arc<E>, index: Arc<Index>) -> Result<Self, IndexError> {
        if embedder.model_id() != index.model() {
            return Err(IndexError::ModelMismatch {
                index: index.model().to_owned(),
                query: embedder.model_id().to_owned(),
            });
        }
        Ok(Self {
            embedder,
            index,
            score_threshold: None,
        })
    }

    /// Drop hits scoring below `threshold`.
    #[must_use]
    pub fn with_score_threshold(mut self, threshold: Option<f32>) -> Self {
        self.score_threshold = threshold;
        self
    }

    #[must_use]
    pub fn index(&self) -> &Arc<Index> {
        &self.index
    }

    /// Top-`k` passages for `query`, best first.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidK`] for `k == 0`, [`IndexError::Embedding`] if the query
    /// cannot be embedded and [`IndexError::DimensionMismatch`] if the vector does not fit the
    /// index.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, IndexError> {
        self.search(query, k, None).await
    }

    /// Like [`retrieve`](Self::retrieve), restricted to entries matching `filter`.
    ///
    /// # Errors
    ///
    /// Same as [`retrieve`](Self::retrieve).
    pub async fn retrieve_filtered(
        &self,
        query: &str,
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<SearchHit>, IndexError> {
        self.search(query, k, Some(filter)).await
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchHit>, IndexError> {
        if k == 0 {
            return Err(IndexError::InvalidK);
        }
        if self.index.is_empty() {
            tracing::debug!("index is empty, skipping query embedding");
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(query).await?;
        let mut hits = self.index.search(&vector, k, filter)?;
        if let Some(threshold) = self.score_threshold {
            hits.retain(|h| h.score >= threshold);
        }
        tracing::debug!(k, hits = hits.len(), "retrieval complete");
        Ok(hits)
    }
}
