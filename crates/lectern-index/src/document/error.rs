#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),

    #[cfg(feature = "pdf")]
    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("DOCX error: {0}")]
    Docx(String),
}

impl DocumentError {
    /// Whether the file was recognized but could not be read.
    ///
    /// Unsupported formats are expected in a mixed source directory and are not failures.
    #[must_use]
    pub fn is_load_failure(&self) -> bool {
        !matches!(self, Self::UnsupportedFormat(_))
    }
}
