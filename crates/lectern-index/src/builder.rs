//! Offline pipeline: list files -> load -> chunk -> embed -> publish one index generation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use lectern_llm::{Embedder, LlmError};

use crate::document::{Chunk, DocumentError, LoaderRegistry, TextSplitter};
use crate::error::IndexError;
use crate::index::{ChunkMetadata, Index, IndexEntry, IndexSnapshot, Metric};
use crate::store::IndexStore;

#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Chunks sent to the embedder per request.
    pub embed_batch_size: usize,
    /// Files loaded concurrently.
    pub load_concurrency: usize,
    pub metric: Metric,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            embed_batch_size: 32,
            load_concurrency: 4,
            metric: Metric::Cosine,
        }
    }
}

/// Summary of a build run.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub files_scanned: usize,
    pub files_indexed: usize,
    /// Files without a loader for their extension.
    pub files_skipped: usize,
    /// Files that loaded but produced no chunks (empty text, image-only PDF).
    pub files_empty: usize,
    pub chunks_created: usize,
    /// One line per file that had a loader but failed to load.
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// Builds a complete index from a source directory and publishes it through an [`IndexStore`].
///
/// Every build is a full rebuild: the stored index is replaced only after all chunks are
/// embedded, so a failed build leaves the previous index untouched.
pub struct IndexBuilder<E: Embedder> {
    loaders: LoaderRegistry,
    splitter: TextSplitter,
    embedder: Arc<E>,
    store: Arc<dyn IndexStore>,
    config: BuilderConfig,
}

impl<E: Embedder> std::fmt::Debug for IndexBuilder<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexBuilder")
            .field("loaders", &self.loaders)
            .field("splitter", &self.splitter)
            .field("model", &self.embedder.model_id())
            .field("store", &self.store.location())
            .field("config", &self.config)
            .finish()
    }
}

impl<E: Embedder> IndexBuilder<E> {
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidConfig`] if the batch size or concurrency is zero.
    pub fn new(
        loaders: LoaderRegistry,
        splitter: TextSplitter,
        embedder: Arc<E>,
        store: Arc<dyn IndexStore>,
        config: BuilderConfig,
    ) -> Result<Self, IndexError> {
        if config.embed_batch_size == 0 {
            return Err(IndexError::InvalidConfig(
                "embed_batch_size must be greater than zero".into(),
            ));
        }
        if config.load_concurrency == 0 {
            return Err(IndexError::InvalidConfig(
                "load_concurrency must be greater than zero".into(),
            ));
        }
        splitter.config().validate()?;
        Ok(Self {
            loaders,
            splitter,
            embedder,
            store,
            config,
        })
    }

    /// Index every regular file directly inside `source_dir`.
    ///
    /// Unsupported files are skipped and files that fail to load are reported in
    /// [`BuildReport::errors`]; neither aborts the build.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::SourceNotFound`] if `source_dir` is not a directory,
    /// [`IndexError::Embedding`] if any chunk fails to embed, or the store's error if the new
    /// generation cannot be published.
    pub async fn build(&self, source_dir: &Path) -> Result<(BuildReport, Arc<Index>), IndexError> {
        let start = std::time::Instant::now();
        let mut report = BuildReport::default();

        let files = list_files(source_dir).await?;
        let total = files.len();
        report.files_scanned = total;
        tracing::info!(total, source = %source_dir.display(), "indexing started");

        let loaded: Vec<_> = futures::stream::iter(files.iter().map(|path| async move {
            (path, self.loaders.load(path).await)
        }))
        .buffered(self.config.load_concurrency)
        .collect()
        .await;

        let mut chunks: Vec<Chunk> = Vec::new();
        for (i, (path, result)) in loaded.into_iter().enumerate() {
            let name = file_label(path);
            match result {
                Ok(documents) => {
                    let before = chunks.len();
                    for document in &documents {
                        chunks.extend(self.splitter.split(document));
                    }
                    let produced = chunks.len() - before;
                    if produced == 0 {
                        report.files_empty += 1;
                        tracing::info!(file = %name, "no content loaded from file");
                        continue;
                    }
                    report.files_indexed += 1;
                    tracing::info!(
                        file = %name,
                        progress = format_args!("{}/{total}", i + 1),
                        chunks = produced,
                    );
                }
                Err(DocumentError::UnsupportedFormat(ext)) => {
                    report.files_skipped += 1;
                    tracing::info!(file = %name, ext = %ext, "skipping unsupported file");
                }
                Err(e) => {
                    tracing::warn!(file = %name, "failed to load: {e}");
                    report.errors.push(format!("{name}: {e}"));
                }
            }
        }
        report.chunks_created = chunks.len();

        let entries = self.embed_chunks(chunks).await?;
        let index = self
            .store
            .rebuild(IndexSnapshot {
                model: self.embedder.model_id().to_owned(),
                metric: self.config.metric,
                entries,
            })
            .await?;

        report.duration_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        tracing::info!(
            files_scanned = report.files_scanned,
            files_indexed = report.files_indexed,
            files_skipped = report.files_skipped,
            files_empty = report.files_empty,
            chunks = report.chunks_created,
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            "index build complete"
        );
        Ok((report, index))
    }

    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<IndexEntry>, IndexError> {
        let mut entries = Vec::with_capacity(chunks.len());
        let batches = chunks.len().div_ceil(self.config.embed_batch_size);
        for (n, batch) in chunks.chunks(self.config.embed_batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(LlmError::BatchMismatch {
                    provider: self.embedder.model_id().to_owned(),
                    expected: batch.len(),
                    actual: vectors.len(),
                }
                .into());
            }
            tracing::debug!(batch = n + 1, batches, "embedded batch");
            entries.extend(batch.iter().zip(vectors).map(|(chunk, vector)| IndexEntry {
                vector,
                text: chunk.content.clone(),
                metadata: ChunkMetadata {
                    source: chunk.metadata.source.clone(),
                    file_name: chunk.metadata.file_name.clone(),
                    content_type: chunk.metadata.content_type.clone(),
                    page: chunk.metadata.page,
                    chunk_index: chunk.chunk_index,
                    start: chunk.start,
                    end: chunk.end,
                },
            }));
        }
        Ok(entries)
    }
}

/// Regular files directly inside `dir`, sorted by file name.
async fn list_files(dir: &Path) -> Result<Vec<PathBuf>, IndexError> {
    let is_dir = tokio::fs::metadata(dir)
        .await
        .is_ok_and(|m| m.is_dir());
    if !is_dir {
        return Err(IndexError::SourceNotFound(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        // Follows symlinks.
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!(path = %path.display(), "cannot stat: {e}"),
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use lectern_llm::hash::HashEmbedder;
    use lectern_llm::mock::MockProvider;

    use super::*;
    use crate::document::SplitterConfig;
    use crate::store::MemoryIndexStore;

    fn splitter(chunk_size: usize, chunk_overlap: usize) -> TextSplitter {
        TextSplitter::new(SplitterConfig {
            chunk_size,
            chunk_overlap,
            trim_whitespace: true,
        })
        .unwrap()
    }

    fn builder<E: Embedder>(embedder: E, store: Arc<dyn IndexStore>) -> IndexBuilder<E> {
        IndexBuilder::new(
            LoaderRegistry::with_defaults(1024 * 1024),
            splitter(200, 20),
            Arc::new(embedder),
            store,
            BuilderConfig {
                embed_batch_size: 2,
                ..BuilderConfig::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn zero_batch_size_rejected() {
        let result = IndexBuilder::new(
            LoaderRegistry::new(),
            splitter(10, 0),
            Arc::new(HashEmbedder::default()),
            Arc::new(MemoryIndexStore::new()),
            BuilderConfig {
                embed_batch_size: 0,
                ..BuilderConfig::default()
            },
        );
        assert!(matches!(result, Err(IndexError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn builds_from_mixed_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "The grass is green.").unwrap();
        std::fs::write(dir.path().join("a.md"), "# Sky\n\nThe sky is blue.").unwrap();
        std::fs::write(dir.path().join("c.csv"), "x,y").unwrap();
        std::fs::write(dir.path().join("d.txt"), [0xffu8, 0xfe]).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("e.txt"), "ignored").unwrap();

        let store = Arc::new(MemoryIndexStore::new());
        let (report, index) = builder(HashEmbedder::default(), store.clone())
            .build(dir.path())
            .await
            .unwrap();

        assert_eq!(report.files_scanned, 4);
        assert_eq!(report.files_indexed, 2);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("d.txt"));
        assert_eq!(report.chunks_created, 2);

        let files: Vec<&str> = index
            .entries()
            .iter()
            .map(|e| e.metadata.file_name.as_str())
            .collect();
        assert_eq!(files, ["a.md", "b.txt"]);
        assert_eq!(index.entries()[0].text, "# Sky\n\nThe sky is blue.");
        assert_eq!(index.model(), "lectern-hash-384");
        assert_eq!(store.open().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_files_are_counted_apart_from_indexed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blank.txt"), "").unwrap();
        std::fs::write(dir.path().join("spaces.md"), "  \n\n\t ").unwrap();
        std::fs::write(dir.path().join("real.txt"), "The sky is blue.").unwrap();

        let (report, index) = builder(HashEmbedder::default(), Arc::new(MemoryIndexStore::new()))
            .build(dir.path())
            .await
            .unwrap();

        assert_eq!(report.files_scanned, 3);
        assert_eq!(report.files_indexed, 1);
        assert_eq!(report.files_empty, 2);
        assert!(report.errors.is_empty());
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn missing_source_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = builder(HashEmbedder::default(), Arc::new(MemoryIndexStore::new()))
            .build(&dir.path().join("absent"))
            .await;
        assert!(matches!(result, Err(IndexError::SourceNotFound(_))));
    }

    #[tokio::test]
    async fn embedding_failure_keeps_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "some text").unwrap();
        let store: Arc<dyn IndexStore> = Arc::new(MemoryIndexStore::new());

        builder(
            MockProvider::default().with_embedding(vec![1.0, 0.0]),
            Arc::clone(&store),
        )
        .build(dir.path())
        .await
        .unwrap();

        let err = builder(MockProvider::failing(), Arc::clone(&store))
            .build(dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Embedding(_)));
        assert_eq!(store.open().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn chunk_offsets_are_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let text = "First paragraph here.\n\nSecond paragraph follows.";
        std::fs::write(dir.path().join("p.txt"), text).unwrap();

        let builder = IndexBuilder::new(
            LoaderRegistry::with_defaults(1024),
            splitter(30, 0),
            Arc::new(HashEmbedder::new(8)),
            Arc::new(MemoryIndexStore::new()),
            BuilderConfig::default(),
        )
        .unwrap();
        let (_, index) = builder.build(dir.path()).await.unwrap();

        for entry in index.entries() {
            let m = &entry.metadata;
            assert_eq!(&text[m.start..m.end], entry.text);
        }
        assert_eq!(index.entries()[1].metadata.chunk_index, 1);
    }
}
