use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use super::{BoxFuture, IndexStore};
use crate::error::IndexError;
use crate::index::{Index, IndexSnapshot};

const LOCATION: &str = ":memory:";

/// Process-local store for tests and throwaway indexes.
#[derive(Default)]
pub struct MemoryIndexStore {
    current: RwLock<Option<Arc<Index>>>,
}

impl MemoryIndexStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for MemoryIndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryIndexStore").finish_non_exhaustive()
    }
}

fn poisoned(e: impl std::fmt::Display) -> IndexError {
    IndexError::Io(std::io::Error::other(format!("index lock poisoned: {e}")))
}

impl IndexStore for MemoryIndexStore {
    fn rebuild(&self, snapshot: IndexSnapshot) -> BoxFuture<'_, Result<Arc<Index>, IndexError>> {
        Box::pin(async move {
            let index = Arc::new(Index::from_snapshot(snapshot)?);
            let mut current = self.current.write().map_err(poisoned)?;
            *current = Some(Arc::clone(&index));
            Ok(index)
        })
    }

    fn open(&self) -> BoxFuture<'_, Result<Arc<Index>, IndexError>> {
        Box::pin(async move {
            self.current
                .read()
                .map_err(poisoned)?
                .clone()
                .ok_or_else(|| IndexError::NotFound(PathBuf::from(LOCATION)))
        })
    }

    fn exists(&self) -> BoxFuture<'_, Result<bool, IndexError>> {
        Box::pin(async move { Ok(self.current.read().map_err(poisoned)?.is_some()) })
    }

    fn location(&self) -> String {
        LOCATION.to_owned()
    }
}
