//! Retrieval half of lectern: documents in, ranked passages out.
//!
//! [`document`] turns files into overlapping chunks, [`builder::IndexBuilder`] embeds them and
//! writes an [`index::Index`] through an [`store::IndexStore`], and [`retriever::Retriever`]
//! answers top-k queries against it.

pub mod builder;
pub mod document;
pub mod error;
pub mod filter;
pub mod index;
pub mod retriever;
pub mod store;

pub use builder::{BuildReport, BuilderConfig, IndexBuilder};
pub use error::IndexError;
pub use filter::{FieldCondition, FieldValue, SearchFilter};
pub use index::{
    ChunkMetadata, Index, IndexEntry, IndexManifest, IndexSnapshot, Metric, SearchHit,
};
pub use retriever::Retriever;
pub use store::{FsIndexStore, IndexStore, MemoryIndexStore};
