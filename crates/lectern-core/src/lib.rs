//! Configuration, bootstrap, and the retrieval-augmented answer flow.

pub mod bootstrap;
pub mod config;
pub mod context;
pub mod error;
pub mod prompt;
pub mod secret;

pub use config::Config;
pub use context::{Answer, RagContext};
pub use error::RagError;
pub use secret::Secret;
