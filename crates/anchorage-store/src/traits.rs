//! Storage interface consumed by the pipeline

use anchorage_core::{AnchorageError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::collection::Collection;

/// Durable document store over named collections
///
/// One writer at a time per collection; implementations serialise writes
/// internally so a shared reference is enough. No atomicity is promised
/// across collections.
pub trait DocumentStore: Send + Sync {
    /// Append a document to an append-only collection
    fn append(&self, collection: Collection, doc: Value) -> Result<()>;

    /// Append several documents in order
    fn append_all(&self, collection: Collection, docs: Vec<Value>) -> Result<()> {
        for doc in docs {
            self.append(collection, doc)?;
        }
        Ok(())
    }

    /// Insert or replace the document sharing `doc`'s key in a keyed collection
    ///
    /// Returns whether an existing document was replaced.
    fn upsert(&self, collection: Collection, doc: Value) -> Result<bool>;

    /// Every document of the collection in write order
    fn read_all(&self, collection: Collection) -> Result<Vec<Value>>;

    /// Latest document whose key field equals `key`
    fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>>;

    /// First document matching `predicate`
    fn find(&self, collection: Collection, predicate: &dyn Fn(&Value) -> bool)
        -> Result<Option<Value>>;

    /// Make every completed write durable
    fn flush(&self) -> Result<()>;
}

/// Typed access on top of [`DocumentStore`]
pub trait DocumentStoreExt: DocumentStore {
    /// Append a serializable document
    fn append_typed<T: Serialize>(&self, collection: Collection, doc: &T) -> Result<()> {
        self.append(collection, serde_json::to_value(doc)?)
    }

    /// Upsert a serializable document
    fn upsert_typed<T: Serialize>(&self, collection: Collection, doc: &T) -> Result<bool> {
        self.upsert(collection, serde_json::to_value(doc)?)
    }

    /// Look up and decode a document by key
    fn get_typed<T: DeserializeOwned>(&self, collection: Collection, key: &str) -> Result<Option<T>> {
        self.get(collection, key)?
            .map(|doc| decode(collection, doc))
            .transpose()
    }

    /// Decode every document of a collection
    fn read_all_typed<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>> {
        self.read_all(collection)?
            .into_iter()
            .map(|doc| decode(collection, doc))
            .collect()
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}

fn decode<T: DeserializeOwned>(collection: Collection, doc: Value) -> Result<T> {
    serde_json::from_value(doc).map_err(|e| {
        AnchorageError::serialization(format!("malformed document in {collection}: {e}"))
    })
}
