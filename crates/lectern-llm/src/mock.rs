//! Test-only mock backend for both generation and embedding.

use std::sync::{Arc, Mutex};

use crate::embed::Embedder;
use crate::error::LlmError;
use crate::provider::{LlmProvider, Message};

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    captured: Arc<Mutex<Vec<Vec<Message>>>>,
    pub default_response: String,
    pub model_id: String,
    /// Vector returned for every text; `None` means embeddings are unsupported.
    pub embedding: Option<Vec<f32>>,
    pub fail_chat: bool,
    pub fail_embed: bool,
    /// Milliseconds to sleep before answering either capability.
    pub delay_ms: u64,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            captured: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            model_id: "mock-embed".into(),
            embedding: Some(vec![0.0; 384]),
            fail_chat: false,
            fail_embed: false,
            delay_ms: 0,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            fail_embed: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Every message list passed to [`LlmProvider::chat`], oldest first.
    #[must_use]
    pub fn captured(&self) -> Vec<Vec<Message>> {
        self.captured.lock().unwrap().clone()
    }

    async fn pause(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
    }
}

impl LlmProvider for MockProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.pause().await;
        self.captured.lock().unwrap().push(messages.to_vec());
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn model(&self) -> &str {
        "mock-chat"
    }
}

impl Embedder for MockProvider {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
        self.pause().await;
        if self.fail_embed {
            return Err(LlmError::Other("mock embedding error".into()));
        }
        self.embedding.clone().ok_or(LlmError::EmbedUnsupported {
            provider: "mock".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn responses_are_consumed_in_order() {
        let mock = MockProvider::with_responses(vec!["one".into(), "two".into()]);
        let msgs = [Message::user("q")];
        assert_eq!(mock.chat(&msgs).await.unwrap(), "one");
        assert_eq!(mock.chat(&msgs).await.unwrap(), "two");
        assert_eq!(mock.chat(&msgs).await.unwrap(), "mock response");
        assert_eq!(mock.captured().len(), 3);
    }

    #[tokio::test]
    async fn failing_mock_fails_both_capabilities() {
        let mock = MockProvider::failing();
        assert!(mock.chat(&[Message::user("q")]).await.is_err());
        assert!(mock.embed("x").await.is_err());
    }

    #[tokio::test]
    async fn embedding_is_fixed() {
        let mock = MockProvider::default().with_embedding(vec![1.0, 0.0]);
        let vectors = mock
            .embed_batch(&["a".to_owned(), "b".to_owned()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![1.0, 0.0]]);
    }
}
