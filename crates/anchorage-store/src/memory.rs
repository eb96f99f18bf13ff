//! In-memory document store for tests and simulation

use std::collections::HashMap;
use std::sync::Arc;

use anchorage_core::Result;
use parking_lot::RwLock;
use serde_json::Value;

use crate::collection::{Collection, CollectionState};
use crate::traits::DocumentStore;

/// Memory-backed store; clones share the same state
#[derive(Debug, Clone)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<Collection, CollectionState>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        let collections = Collection::ALL
            .into_iter()
            .map(|collection| (collection, CollectionState::new(collection)))
            .collect();
        Self {
            collections: Arc::new(RwLock::new(collections)),
        }
    }

    /// Number of documents in a collection (for testing)
    pub fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .get(&collection)
            .map_or(0, |state| state.docs().len())
    }

    /// Whether a collection holds no documents
    pub fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection) == 0
    }

    /// Overwrite a stored document in place, bypassing layout rules
    ///
    /// Lets tests simulate on-disk tampering.
    pub fn tamper(&self, collection: Collection, position: usize, doc: Value) -> bool {
        let mut collections = self.collections.write();
        let Some(state) = collections.get_mut(&collection) else {
            return false;
        };
        state.replace_at(position, doc)
    }

    fn with_state<R>(&self, collection: Collection, f: impl FnOnce(&mut CollectionState) -> R) -> R {
        let mut collections = self.collections.write();
        let state = collections
            .entry(collection)
            .or_insert_with(|| CollectionState::new(collection));
        f(state)
    }
}

impl DocumentStore for MemoryStore {
    fn append(&self, collection: Collection, doc: Value) -> Result<()> {
        self.with_state(collection, |state| {
            state.check_append(&doc)?;
            state.push(doc);
            Ok(())
        })
    }

    fn upsert(&self, collection: Collection, doc: Value) -> Result<bool> {
        self.with_state(collection, |state| {
            let key = state.check_upsert(&doc)?;
            Ok(state.put(key, doc))
        })
    }

    fn read_all(&self, collection: Collection) -> Result<Vec<Value>> {
        let collections = self.collections.read();
        Ok(collections
            .get(&collection)
            .map(|state| state.docs().to_vec())
            .unwrap_or_default())
    }

    fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>> {
        let collections = self.collections.read();
        Ok(collections
            .get(&collection)
            .and_then(|state| state.get(key))
            .cloned())
    }

    fn find(
        &self,
        collection: Collection,
        predicate: &dyn Fn(&Value) -> bool,
    ) -> Result<Option<Value>> {
        let collections = self.collections.read();
        Ok(collections
            .get(&collection)
            .and_then(|state| state.docs().iter().find(|doc| predicate(doc)))
            .cloned())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
