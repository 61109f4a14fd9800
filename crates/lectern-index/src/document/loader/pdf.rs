use std::path::Path;
use std::pin::Pin;

use super::{join_error, metadata_for, open_checked};
use crate::document::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader};

/// One [`Document`] per non-empty page; `metadata.page` is 1-based.
pub struct PdfLoader {
    pub max_file_size: u64,
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader for PdfLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let path = open_checked(&path, max_size).await?;

            let path_buf = path.clone();
            let pages = tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text_by_pages(&path_buf)
                    .map_err(|e| DocumentError::Pdf(e.to_string()))
            })
            .await
            .map_err(join_error)??;

            let mut docs = Vec::with_capacity(pages.len());
            for (idx, content) in pages.into_iter().enumerate() {
                if content.trim().is_empty() {
                    continue;
                }
                let page = u32::try_from(idx + 1).map_err(|_| {
                    DocumentError::Pdf(format!("page number overflow at index {idx}"))
                })?;
                docs.push(Document {
                    content,
                    metadata: metadata_for(&path, "application/pdf", Some(page)),
                });
            }
            Ok(docs)
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["pdf"]
    }
}
