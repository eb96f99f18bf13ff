//! Anchorage Store - Durable Collections
//!
//! Document storage behind the [`DocumentStore`] trait. Two collection
//! layouts exist: append-only logs (raw records, manifests, headers,
//! broadcast receipts) and a keyed table (anchors, one per commitment
//! root).
//!
//! - [`MemoryStore`]: shared in-memory state for tests and simulation
//! - [`FileStore`]: one JSON Lines changelog per collection, replayed on open

#![forbid(unsafe_code)]

/// Collection names, layouts and key fields
pub mod collection;

/// JSON Lines file store
pub mod file;

/// In-memory store
pub mod memory;

/// Store interface
pub mod traits;

pub use collection::{document_key, Collection, Layout};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use traits::{DocumentStore, DocumentStoreExt};
