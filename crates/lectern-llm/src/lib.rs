//! Embedding and generation backends behind two small capabilities:
//! [`Embedder`] for the retrieval side and [`LlmProvider`] for answer generation.

pub mod any;
#[cfg(feature = "candle")]
pub mod candle_embed;
pub mod compatible;
pub mod embed;
pub mod error;
pub mod hash;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;

pub use any::{AnyEmbedder, AnyProvider};
pub use embed::Embedder;
pub use error::LlmError;
pub use provider::{LlmProvider, Message, Role};
