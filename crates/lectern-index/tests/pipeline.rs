use std::path::Path;
use std::sync::{Arc, Mutex};

use lectern_index::document::{LoaderRegistry, SplitterConfig, TextSplitter};
use lectern_index::{
    BuilderConfig, FieldCondition, FsIndexStore, IndexBuilder, IndexError, IndexStore, Retriever,
    SearchFilter,
};
use lectern_llm::hash::HashEmbedder;
use tracing::instrument::WithSubscriber;

fn builder(
    store: Arc<dyn IndexStore>,
    chunk_size: usize,
    chunk_overlap: usize,
) -> IndexBuilder<HashEmbedder> {
    IndexBuilder::new(
        LoaderRegistry::with_defaults(1024 * 1024),
        TextSplitter::new(SplitterConfig {
            chunk_size,
            chunk_overlap,
            trim_whitespace: true,
        })
        .unwrap(),
        Arc::new(HashEmbedder::default()),
        store,
        BuilderConfig::default(),
    )
    .unwrap()
}

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

/// In-memory log sink for asserting on emitted events.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn sky_and_grass_end_to_end() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write(src.path(), "a.txt", "The sky is blue.");
    write(src.path(), "b.txt", "The grass is green.");

    let store = Arc::new(FsIndexStore::new(out.path().join("index")));
    let (report, _) = builder(store.clone(), 2000, 400)
        .build(src.path())
        .await
        .unwrap();
    assert_eq!(report.files_indexed, 2);
    assert_eq!(report.chunks_created, 2);

    // Query side opens the persisted copy, as a separate process would.
    let reader = FsIndexStore::new(out.path().join("index"));
    let index = reader.open().await.unwrap();
    let retriever = Retriever::new(Arc::new(HashEmbedder::default()), index).unwrap();

    let hits = retriever.retrieve("What color is the sky?", 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, "The sky is blue.");
    assert_eq!(hits[0].metadata.file_name, "a.txt");

    assert!(matches!(
        retriever.retrieve("What color is the sky?", 0).await,
        Err(IndexError::InvalidK)
    ));
}

#[tokio::test]
async fn csv_only_directory_builds_empty_index() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write(src.path(), "data.csv", "a,b\n1,2\n");

    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();

    let store = Arc::new(FsIndexStore::new(out.path()));
    let (report, index) = builder(store.clone(), 2000, 400)
        .build(src.path())
        .with_subscriber(subscriber)
        .await
        .unwrap();
    assert_eq!(report.files_scanned, 1);
    assert_eq!(report.files_skipped, 1);
    let logged = logs.contents();
    assert!(logged.contains("skipping unsupported file"), "{logged}");
    assert!(logged.contains("data.csv"), "{logged}");
    assert!(report.errors.is_empty());
    assert!(index.is_empty());

    let reopened = store.open().await.unwrap();
    assert!(reopened.is_empty());
    let retriever = Retriever::new(Arc::new(HashEmbedder::default()), reopened).unwrap();
    assert!(retriever.retrieve("anything", 3).await.unwrap().is_empty());
}

#[tokio::test]
async fn rebuild_fully_replaces_entries() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write(src.path(), "old.txt", "Old content about rivers.");

    let store = Arc::new(FsIndexStore::new(out.path()));
    let b = builder(store.clone(), 2000, 400);
    b.build(src.path()).await.unwrap();

    std::fs::remove_file(src.path().join("old.txt")).unwrap();
    write(src.path(), "new.md", "New content about mountains.");
    b.build(src.path()).await.unwrap();

    let index = store.open().await.unwrap();
    let files: Vec<&str> = index
        .entries()
        .iter()
        .map(|e| e.metadata.file_name.as_str())
        .collect();
    assert_eq!(files, ["new.md"]);
}

#[tokio::test]
async fn small_chunks_respect_bounds() {
    let src = tempfile::tempdir().unwrap();
    let text = "This is a long document that needs to be chunked for processing.";
    write(src.path(), "doc.txt", text);

    let store = Arc::new(FsIndexStore::new(src.path().join(".index")));
    let (report, index) = builder(store, 20, 9).build(src.path()).await.unwrap();

    assert_eq!(report.chunks_created, 6);
    for entry in index.entries() {
        assert!(entry.text.chars().count() <= 20);
        assert_eq!(&text[entry.metadata.start..entry.metadata.end], entry.text);
    }
    for pair in index.entries().windows(2) {
        assert!(pair[1].metadata.start < pair[0].metadata.end);
    }
}

#[tokio::test]
async fn missing_and_corrupt_indexes_are_distinguished() {
    let out = tempfile::tempdir().unwrap();
    let store = FsIndexStore::new(out.path());
    assert!(matches!(store.open().await, Err(IndexError::NotFound(_))));

    std::fs::write(out.path().join("CURRENT"), "gen-gone\n").unwrap();
    assert!(matches!(
        store.open().await,
        Err(IndexError::Corrupt { .. })
    ));
}

#[tokio::test]
async fn model_change_requires_rebuild() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write(src.path(), "a.txt", "Some text.");

    let store = Arc::new(FsIndexStore::new(out.path()));
    builder(store.clone(), 2000, 400)
        .build(src.path())
        .await
        .unwrap();

    let index = store.open().await.unwrap();
    let err = Retriever::new(Arc::new(HashEmbedder::new(128)), index).unwrap_err();
    assert!(matches!(err, IndexError::ModelMismatch { .. }));
}

#[tokio::test]
async fn filtered_retrieval_by_file() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write(src.path(), "a.txt", "The sky is blue.");
    write(src.path(), "b.txt", "The grass is green.");

    let store = Arc::new(FsIndexStore::new(out.path()));
    let (_, index) = builder(store, 2000, 400)
        .build(src.path())
        .await
        .unwrap();
    let retriever = Retriever::new(Arc::new(HashEmbedder::default()), index).unwrap();

    let filter = SearchFilter::default().must_not(FieldCondition::text("file_name", "a.txt"));
    let hits = retriever
        .retrieve_filtered("What color is the sky?", 5, &filter)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata.file_name, "b.txt");
}
