use lectern_index::IndexError;
use lectern_llm::LlmError;

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("generation failed: {0}")]
    Llm(#[from] LlmError),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    #[error("no generation provider configured")]
    NoProvider,
}

impl RagError {
    /// True when the failure comes from the persisted index rather than a backend.
    #[must_use]
    pub fn is_index_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Index(IndexError::NotFound(_) | IndexError::Corrupt { .. })
        )
    }
}
