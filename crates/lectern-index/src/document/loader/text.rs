use std::path::Path;
use std::pin::Pin;

use super::{metadata_for, open_checked};
use crate::document::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader};

/// UTF-8 plain text and markdown.
pub struct TextLoader {
    pub max_file_size: u64,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader for TextLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let path = open_checked(&path, max_size).await?;

            let content_type = match path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
                .as_deref()
            {
                Some("md" | "markdown") => "text/markdown",
                _ => "text/plain",
            };

            // Non-UTF-8 input surfaces as an `InvalidData` IO error.
            let content = tokio::fs::read_to_string(&path).await?;

            Ok(vec![Document {
                content,
                metadata: metadata_for(&path, content_type, None),
            }])
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["txt", "md", "markdown"]
    }
}
