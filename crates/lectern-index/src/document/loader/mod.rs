mod docx;
#[cfg(feature = "pdf")]
mod pdf;
mod text;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use docx::DocxLoader;
#[cfg(feature = "pdf")]
pub use pdf::PdfLoader;
pub use text::TextLoader;

use super::{Document, DocumentError, DocumentLoader, DocumentMetadata};

/// Dispatches files to loaders by lower-cased extension.
#[derive(Clone, Default)]
pub struct LoaderRegistry {
    loaders: Vec<Arc<dyn DocumentLoader>>,
}

impl std::fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let exts: Vec<&str> = self
            .loaders
            .iter()
            .flat_map(|l| l.supported_extensions().iter().copied())
            .collect();
        f.debug_struct("LoaderRegistry")
            .field("extensions", &exts)
            .finish()
    }
}

impl LoaderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Text, DOCX and (with the `pdf` feature) PDF loaders sharing one size limit.
    #[must_use]
    pub fn with_defaults(max_file_size: u64) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TextLoader { max_file_size }));
        registry.register(Arc::new(DocxLoader { max_file_size }));
        #[cfg(feature = "pdf")]
        registry.register(Arc::new(PdfLoader { max_file_size }));
        registry
    }

    /// Later registrations win for extensions claimed twice.
    pub fn register(&mut self, loader: Arc<dyn DocumentLoader>) {
        self.loaders.push(loader);
    }

    #[must_use]
    pub fn loader_for(&self, path: &Path) -> Option<&dyn DocumentLoader> {
        let ext = extension(path)?;
        self.loaders
            .iter()
            .rev()
            .find(|l| l.supported_extensions().contains(&ext.as_str()))
            .map(AsRef::as_ref)
    }

    #[must_use]
    pub fn supports(&self, path: &Path) -> bool {
        self.loader_for(path).is_some()
    }

    /// # Errors
    ///
    /// Returns [`DocumentError::UnsupportedFormat`] when no loader claims the extension, or the
    /// loader's own error.
    pub async fn load(&self, path: &Path) -> Result<Vec<Document>, DocumentError> {
        match self.loader_for(path) {
            Some(loader) => loader.load(path).await,
            None => Err(DocumentError::UnsupportedFormat(
                extension(path).unwrap_or_else(|| path.display().to_string()),
            )),
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Canonicalize `path` and reject files over `max_size` bytes.
async fn open_checked(path: &Path, max_size: u64) -> Result<PathBuf, DocumentError> {
    let path = tokio::fs::canonicalize(path).await?;
    let meta = tokio::fs::metadata(&path).await?;
    if meta.len() > max_size {
        return Err(DocumentError::FileTooLarge(meta.len()));
    }
    Ok(path)
}

fn metadata_for(path: &Path, content_type: &str, page: Option<u32>) -> DocumentMetadata {
    DocumentMetadata {
        source: path.display().to_string(),
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        content_type: content_type.to_owned(),
        page,
        extra: HashMap::new(),
    }
}

fn join_error(e: tokio::task::JoinError) -> DocumentError {
    DocumentError::Io(std::io::Error::other(e))
}
