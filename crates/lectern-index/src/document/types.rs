use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    /// Canonical path of the file the text came from.
    pub source: String,
    pub file_name: String,
    pub content_type: String,
    /// 1-based page number for paged formats.
    pub page: Option<u32>,
    pub extra: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// Contiguous slice of a [`Document`].
///
/// `start..end` are byte offsets into the parent content: `&doc.content[start..end] == content`.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub content: String,
    pub metadata: DocumentMetadata,
    pub chunk_index: usize,
    pub start: usize,
    pub end: usize,
}
