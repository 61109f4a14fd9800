pub mod error;
pub mod loader;
pub mod splitter;
pub mod types;

pub use error::DocumentError;
#[cfg(feature = "pdf")]
pub use loader::PdfLoader;
pub use loader::{DocxLoader, LoaderRegistry, TextLoader};
pub use splitter::{Span, SplitterConfig, TextSplitter};
pub use types::{Chunk, Document, DocumentMetadata};

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

pub trait DocumentLoader: Send + Sync {
    fn load(
        &self,
        path: &std::path::Path,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>,
    >;

    /// Lower-case file extensions this loader accepts, without the dot.
    fn supported_extensions(&self) -> &[&str];
}
