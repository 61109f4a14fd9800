//! Persistence for built indexes.
//!
//! A store holds at most one live [`Index`]. [`IndexStore::rebuild`] replaces it wholesale;
//! readers that opened the previous index keep their `Arc` and never observe a partial swap.

mod fs;
mod memory;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use fs::FsIndexStore;
pub use memory::MemoryIndexStore;

use crate::error::IndexError;
use crate::index::{Index, IndexSnapshot};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait IndexStore: Send + Sync {
    /// Validate `snapshot` and make it the live index, returning it.
    ///
    /// On error the previously live index, if any, stays in place.
    fn rebuild(&self, snapshot: IndexSnapshot) -> BoxFuture<'_, Result<Arc<Index>, IndexError>>;

    /// Load the live index.
    ///
    /// Fails with [`IndexError::NotFound`] when nothing was ever built and
    /// [`IndexError::Corrupt`] when the stored data cannot be trusted.
    fn open(&self) -> BoxFuture<'_, Result<Arc<Index>, IndexError>>;

    fn exists(&self) -> BoxFuture<'_, Result<bool, IndexError>>;

    /// Human-readable location for logs.
    fn location(&self) -> String;
}
