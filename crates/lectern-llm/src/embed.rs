use std::future::Future;

use crate::error::LlmError;

/// Maps text to fixed-length dense vectors.
///
/// Vectors produced under the same [`model_id`](Embedder::model_id) are comparable with each
/// other; vectors from different identifiers are not.
pub trait Embedder: Send + Sync {
    /// Pinned identifier of the model behind this embedder. Stored alongside every index.
    fn model_id(&self) -> &str;

    /// # Errors
    ///
    /// Returns an error if the backend fails to produce a vector.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    /// Embed many texts, returning exactly one vector per input in input order.
    ///
    /// Any failure fails the whole batch.
    ///
    /// # Errors
    ///
    /// Returns an error if any text fails to embed.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send {
        async move {
            let mut vectors = Vec::with_capacity(texts.len());
            for text in texts {
                vectors.push(self.embed(text).await?);
            }
            Ok(vectors)
        }
    }
}

/// Reject batch responses whose length differs from the request.
pub(crate) fn ensure_batch_len(
    provider: &str,
    expected: usize,
    vectors: Vec<Vec<f32>>,
) -> Result<Vec<Vec<f32>>, LlmError> {
    if vectors.len() == expected {
        Ok(vectors)
    } else {
        Err(LlmError::BatchMismatch {
            provider: provider.to_owned(),
            expected,
            actual: vectors.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LenEmbedder;

    impl Embedder for LenEmbedder {
        fn model_id(&self) -> &str {
            "len"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
            if text == "boom" {
                return Err(LlmError::Other("boom".into()));
            }
            #[allow(clippy::cast_precision_loss)]
            Ok(vec![text.len() as f32])
        }
    }

    #[tokio::test]
    async fn default_batch_preserves_order() {
        let texts = vec!["a".to_owned(), "abc".to_owned(), "ab".to_owned()];
        let vectors = LenEmbedder.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0], vec![3.0], vec![2.0]]);
    }

    #[tokio::test]
    async fn default_batch_fails_whole_batch() {
        let texts = vec!["a".to_owned(), "boom".to_owned(), "ab".to_owned()];
        assert!(LenEmbedder.embed_batch(&texts).await.is_err());
    }

    #[test]
    fn ensure_batch_len_rejects_short_response() {
        let err = ensure_batch_len("test", 3, vec![vec![0.0]]).unwrap_err();
        assert!(matches!(
            err,
            LlmError::BatchMismatch {
                expected: 3,
                actual: 1,
                ..
            }
        ));
    }
}
