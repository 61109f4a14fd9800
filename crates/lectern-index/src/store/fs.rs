//! Directory-backed store with atomic generation swaps.
//!
//! Layout under the root directory:
//!
//! ```text
//! CURRENT              name of the live generation, e.g. `gen-3f2a...`
//! .lock                present while a rebuild is running
//! gen-<uuid>/
//!     manifest.json    IndexManifest
//!     entries.jsonl    one IndexEntry per line
//! ```
//!
//! A rebuild writes a complete new generation, fsyncs it, then replaces `CURRENT` through
//! write-temp-then-rename. Older generations and leftovers of interrupted rebuilds are removed
//! afterwards, so a reader can lose the generation it just resolved; it then follows `CURRENT`
//! to the replacement and only reports corruption when the pointer has not moved.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{BoxFuture, IndexStore};
use crate::error::IndexError;
use crate::index::{FORMAT_VERSION, Index, IndexEntry, IndexManifest, IndexSnapshot};

const CURRENT: &str = "CURRENT";
const LOCK: &str = ".lock";
const MANIFEST: &str = "manifest.json";
const ENTRIES: &str = "entries.jsonl";
const GEN_PREFIX: &str = "gen-";
const TMP_PREFIX: &str = "CURRENT.tmp-";
/// Generation swaps a single `open` will follow before giving up.
const MAX_OPEN_ATTEMPTS: usize = 8;

#[derive(Debug, Clone)]
pub struct FsIndexStore {
    root: PathBuf,
}

impl FsIndexStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl IndexStore for FsIndexStore {
    fn rebuild(&self, snapshot: IndexSnapshot) -> BoxFuture<'_, Result<Arc<Index>, IndexError>> {
        Box::pin(async move {
            let index = Arc::new(Index::from_snapshot(snapshot)?);
            let root = self.root.clone();
            let written = Arc::clone(&index);
            let generation = tokio::task::spawn_blocking(move || write_generation(&root, &written))
                .await
                .map_err(|e| IndexError::Io(std::io::Error::other(e)))??;
            tracing::info!(
                path = %self.root.display(),
                generation = %generation,
                entries = index.len(),
                "index generation published"
            );
            Ok(index)
        })
    }

    fn open(&self) -> BoxFuture<'_, Result<Arc<Index>, IndexError>> {
        Box::pin(async move {
            let root = self.root.clone();
            let index = tokio::task::spawn_blocking(move || read_current(&root))
                .await
                .map_err(|e| IndexError::Io(std::io::Error::other(e)))??;
            Ok(Arc::new(index))
        })
    }

    fn exists(&self) -> BoxFuture<'_, Result<bool, IndexError>> {
        Box::pin(async move { Ok(tokio::fs::try_exists(self.root.join(CURRENT)).await?) })
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

/// Exclusive build lock; the lock file is removed on drop.
struct BuildLock {
    path: PathBuf,
}

impl BuildLock {
    fn acquire(root: &Path) -> Result<Self, IndexError> {
        let path = root.join(LOCK);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(IndexError::Locked(root.to_path_buf()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), "failed to remove build lock: {e}");
        }
    }
}

fn write_generation(root: &Path, index: &Index) -> Result<String, IndexError> {
    fs::create_dir_all(root)?;
    let _lock = BuildLock::acquire(root)?;

    let name = format!("{GEN_PREFIX}{}", uuid::Uuid::new_v4().simple());
    let dir = root.join(&name);
    fs::create_dir(&dir)?;

    if let Err(e) = write_generation_files(&dir, index) {
        let _ = fs::remove_dir_all(&dir);
        return Err(e);
    }

    let tmp = root.join(format!("{TMP_PREFIX}{}", uuid::Uuid::new_v4().simple()));
    {
        let mut file = File::create(&tmp)?;
        writeln!(file, "{name}")?;
        file.sync_all()?;
    }
    if let Err(e) = fs::rename(&tmp, root.join(CURRENT)) {
        let _ = fs::remove_file(&tmp);
        let _ = fs::remove_dir_all(&dir);
        return Err(e.into());
    }
    sync_dir(root)?;

    remove_stale(root, &name);
    Ok(name)
}

fn write_generation_files(dir: &Path, index: &Index) -> Result<(), IndexError> {
    let manifest = File::create(dir.join(MANIFEST))?;
    let mut writer = BufWriter::new(manifest);
    serde_json::to_writer_pretty(&mut writer, index.manifest())?;
    writer.flush()?;
    writer.get_ref().sync_all()?;

    let entries = File::create(dir.join(ENTRIES))?;
    let mut writer = BufWriter::new(entries);
    for entry in index.entries() {
        serde_json::to_writer(&mut writer, entry)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    writer.get_ref().sync_all()?;

    sync_dir(dir)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), IndexError> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<(), IndexError> {
    Ok(())
}

/// Best-effort removal of superseded generations and orphaned temp files.
fn remove_stale(root: &Path, live: &str) {
    let Ok(read_dir) = fs::read_dir(root) else {
        return;
    };
    for entry in read_dir.flatten() {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let result = if name.starts_with(GEN_PREFIX) && name != live {
            fs::remove_dir_all(entry.path())
        } else if name.starts_with(TMP_PREFIX) {
            fs::remove_file(entry.path())
        } else {
            continue;
        };
        match result {
            Ok(()) => tracing::debug!(name, "removed stale index data"),
            Err(e) => tracing::warn!(name, "failed to remove stale index data: {e}"),
        }
    }
}

fn read_current(root: &Path) -> Result<Index, IndexError> {
    let name = current_generation(root)?;
    read_following(root, name)
}

/// Read generation `name`; if it fails and `CURRENT` has since moved on, read the new one.
fn read_following(root: &Path, mut name: String) -> Result<Index, IndexError> {
    let mut attempts = 1;
    loop {
        let err = match read_generation(root, &name) {
            Ok(index) => return Ok(index),
            Err(e) => e,
        };
        if !matches!(err, IndexError::Corrupt { .. }) || attempts >= MAX_OPEN_ATTEMPTS {
            return Err(err);
        }
        let latest = current_generation(root)?;
        if latest == name {
            return Err(err);
        }
        tracing::debug!(from = %name, to = %latest, "generation replaced during open, retrying");
        name = latest;
        attempts += 1;
    }
}

fn current_generation(root: &Path) -> Result<String, IndexError> {
    let current = match fs::read_to_string(root.join(CURRENT)) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(IndexError::NotFound(root.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    let name = current.trim();
    if !name.starts_with(GEN_PREFIX) || name.contains(['/', '\\']) || name.contains("..") {
        return Err(IndexError::corrupt(
            root,
            format!("CURRENT names an invalid generation {name:?}"),
        ));
    }
    Ok(name.to_owned())
}

fn read_generation(root: &Path, name: &str) -> Result<Index, IndexError> {
    let dir = root.join(name);

    let manifest_raw = fs::read_to_string(dir.join(MANIFEST))
        .map_err(|e| IndexError::corrupt(&dir, format!("{MANIFEST}: {e}")))?;
    let manifest: IndexManifest = serde_json::from_str(&manifest_raw)
        .map_err(|e| IndexError::corrupt(&dir, format!("{MANIFEST}: {e}")))?;
    if manifest.format_version != FORMAT_VERSION {
        return Err(IndexError::corrupt(
            &dir,
            format!(
                "unsupported format version {} (expected {FORMAT_VERSION})",
                manifest.format_version
            ),
        ));
    }

    let file = File::open(dir.join(ENTRIES))
        .map_err(|e| IndexError::corrupt(&dir, format!("{ENTRIES}: {e}")))?;
    let mut entries = Vec::with_capacity(manifest.entry_count);
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| IndexError::corrupt(&dir, format!("{ENTRIES}: {e}")))?;
        if line.is_empty() {
            continue;
        }
        let entry: IndexEntry = serde_json::from_str(&line).map_err(|e| {
            IndexError::corrupt(&dir, format!("{ENTRIES} line {}: {e}", lineno + 1))
        })?;
        if entry.vector.len() != manifest.dimension {
            return Err(IndexError::corrupt(
                &dir,
                format!(
                    "{ENTRIES} line {}: vector has {} components, manifest says {}",
                    lineno + 1,
                    entry.vector.len(),
                    manifest.dimension
                ),
            ));
        }
        if !entry.vector.iter().all(|x| x.is_finite()) {
            return Err(IndexError::corrupt(
                &dir,
                format!("{ENTRIES} line {}: non-finite vector component", lineno + 1),
            ));
        }
        entries.push(entry);
    }
    if entries.len() != manifest.entry_count {
        return Err(IndexError::corrupt(
            &dir,
            format!(
                "manifest lists {} entries, found {}",
                manifest.entry_count,
                entries.len()
            ),
        ));
    }

    Ok(Index::from_parts(manifest, entries))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::index::{ChunkMetadata, Metric};

    fn snapshot(texts: &[&str]) -> IndexSnapshot {
        IndexSnapshot {
            model: "lectern-hash-4".into(),
            metric: Metric::Cosine,
            entries: texts
                .iter()
                .enumerate()
                .map(|(i, t)| IndexEntry {
                    vector: vec![1.0, 0.5, 0.0, 0.25],
                    text: (*t).to_owned(),
                    metadata: ChunkMetadata {
                        source: "/docs/a.txt".into(),
                        file_name: "a.txt".into(),
                        content_type: "text/plain".into(),
                        page: Some(1),
                        chunk_index: i,
                        start: 0,
                        end: t.len(),
                    },
                })
                .collect(),
        }
    }

    fn generations(root: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(root)
            .unwrap()
            .filter_map(|e| e.ok()?.file_name().into_string().ok())
            .filter(|n| n.starts_with(GEN_PREFIX))
            .collect();
        names.sort();
        names
    }

    fn live_dir(root: &Path) -> PathBuf {
        root.join(fs::read_to_string(root.join(CURRENT)).unwrap().trim())
    }

    #[tokio::test]
    async fn round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIndexStore::new(dir.path().join("idx"));
        assert!(!store.exists().await.unwrap());

        let built = store.rebuild(snapshot(&["alpha", "beta"])).await.unwrap();
        assert!(store.exists().await.unwrap());

        let opened = store.open().await.unwrap();
        assert_eq!(opened.manifest(), built.manifest());
        assert_eq!(opened.entries(), built.entries());
        assert_eq!(opened.model(), "lectern-hash-4");
        assert_eq!(opened.dimension(), 4);
        assert!(!dir.path().join("idx").join(LOCK).exists());
    }

    #[tokio::test]
    async fn missing_index_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIndexStore::new(dir.path().join("nothing"));
        assert!(matches!(store.open().await, Err(IndexError::NotFound(_))));
    }

    #[tokio::test]
    async fn rebuild_replaces_and_cleans_old_generation() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let store = FsIndexStore::new(&root);

        store.rebuild(snapshot(&["one", "two", "three"])).await.unwrap();
        let first = generations(&root);
        store.rebuild(snapshot(&["four"])).await.unwrap();
        let second = generations(&root);

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_ne!(first, second);

        let index = store.open().await.unwrap();
        let texts: Vec<&str> = index.entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["four"]);
    }

    #[tokio::test]
    async fn empty_snapshot_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIndexStore::new(dir.path());
        store.rebuild(snapshot(&[])).await.unwrap();
        let index = store.open().await.unwrap();
        assert!(index.is_empty());
        assert_eq!(index.dimension(), 0);
    }

    #[tokio::test]
    async fn held_lock_rejects_rebuild_and_keeps_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIndexStore::new(dir.path());
        store.rebuild(snapshot(&["kept"])).await.unwrap();

        fs::write(dir.path().join(LOCK), "12345").unwrap();
        let err = store.rebuild(snapshot(&["lost"])).await.unwrap_err();
        assert!(matches!(err, IndexError::Locked(_)));
        assert!(dir.path().join(LOCK).exists());
        assert_eq!(store.open().await.unwrap().entries()[0].text, "kept");
    }

    #[tokio::test]
    async fn orphaned_generation_is_removed_by_next_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIndexStore::new(dir.path());
        fs::create_dir(dir.path().join("gen-orphan")).unwrap();
        fs::write(dir.path().join("CURRENT.tmp-orphan"), "gen-orphan").unwrap();

        store.rebuild(snapshot(&["x"])).await.unwrap();
        assert_eq!(generations(dir.path()).len(), 1);
        assert!(!dir.path().join("CURRENT.tmp-orphan").exists());
    }

    #[tokio::test]
    async fn truncated_entries_are_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIndexStore::new(dir.path());
        store.rebuild(snapshot(&["a", "b"])).await.unwrap();

        let entries = live_dir(dir.path()).join(ENTRIES);
        let raw = fs::read_to_string(&entries).unwrap();
        let first_line = raw.lines().next().unwrap();
        fs::write(&entries, format!("{first_line}\n")).unwrap();

        let err = store.open().await.unwrap_err();
        assert!(matches!(err, IndexError::Corrupt { .. }), "{err}");
    }

    #[tokio::test]
    async fn garbage_manifest_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIndexStore::new(dir.path());
        store.rebuild(snapshot(&["a"])).await.unwrap();
        fs::write(live_dir(dir.path()).join(MANIFEST), "{not json").unwrap();
        assert!(matches!(
            store.open().await,
            Err(IndexError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_version_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIndexStore::new(dir.path());
        store.rebuild(snapshot(&["a"])).await.unwrap();
        let path = live_dir(dir.path()).join(MANIFEST);
        let mut manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        manifest["format_version"] = serde_json::json!(99);
        fs::write(&path, manifest.to_string()).unwrap();

        let err = store.open().await.unwrap_err();
        assert!(err.to_string().contains("format version 99"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn open_during_rebuilds_never_sees_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIndexStore::new(dir.path());
        store.rebuild(snapshot(&["seed-a", "seed-b"])).await.unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let reader = {
            let store = store.clone();
            let done = Arc::clone(&done);
            tokio::spawn(async move {
                let mut opened = 0usize;
                while !done.load(Ordering::Relaxed) {
                    let index = store.open().await.unwrap();
                    assert_eq!(index.len(), 2);
                    opened += 1;
                }
                opened
            })
        };

        for i in 0..150 {
            let (a, b) = (format!("a{i}"), format!("b{i}"));
            store
                .rebuild(snapshot(&[a.as_str(), b.as_str()]))
                .await
                .unwrap();
        }
        done.store(true, Ordering::Relaxed);
        assert!(reader.await.unwrap() > 0);
        assert_eq!(generations(dir.path()).len(), 1);
    }

    #[tokio::test]
    async fn removed_generation_follows_current() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIndexStore::new(dir.path());
        store.rebuild(snapshot(&["live"])).await.unwrap();

        // Resolved before a rebuild swapped CURRENT and deleted it.
        let index = read_following(dir.path(), "gen-superseded".into()).unwrap();
        assert_eq!(index.entries()[0].text, "live");
    }

    #[tokio::test]
    async fn broken_live_generation_is_still_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsIndexStore::new(dir.path());
        store.rebuild(snapshot(&["a"])).await.unwrap();
        fs::remove_file(live_dir(dir.path()).join(ENTRIES)).unwrap();

        let live = current_generation(dir.path()).unwrap();
        assert!(matches!(
            read_following(dir.path(), live),
            Err(IndexError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn dangling_current_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CURRENT), "gen-missing\n").unwrap();
        let store = FsIndexStore::new(dir.path());
        assert!(matches!(
            store.open().await,
            Err(IndexError::Corrupt { .. })
        ));

        fs::write(dir.path().join(CURRENT), "../elsewhere\n").unwrap();
        assert!(matches!(
            store.open().await,
            Err(IndexError::Corrupt { .. })
        ));
    }
}
