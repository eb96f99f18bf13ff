//! Named collections and their in-memory state

use std::collections::HashMap;
use std::fmt;

use anchorage_core::{AnchorageError, Result};
use serde_json::Value;

/// How writes to a collection are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Every document is kept, in write order
    AppendOnly,
    /// One document per key; a later write replaces the earlier one
    Keyed,
}

/// Collections of the gateway store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    /// Raw records as ingested
    RawRecords,
    /// Batch manifests
    Batches,
    /// Anchors, one per commitment root
    Anchors,
    /// Chain headers of the simulated ledger
    Headers,
    /// Receipts issued by the simulated backend, one per broadcast
    Broadcasts,
}

impl Collection {
    /// Every collection, in a stable order
    pub const ALL: [Collection; 5] = [
        Collection::RawRecords,
        Collection::Batches,
        Collection::Anchors,
        Collection::Headers,
        Collection::Broadcasts,
    ];

    /// Collection name, also the stem of its changelog file
    pub fn name(self) -> &'static str {
        match self {
            Collection::RawRecords => "raw_records",
            Collection::Batches => "batches",
            Collection::Anchors => "anchors",
            Collection::Headers => "headers",
            Collection::Broadcasts => "broadcasts",
        }
    }

    /// File holding this collection inside a store directory
    pub fn file_name(self) -> String {
        format!("{}.jsonl", self.name())
    }

    /// Document field identifying an entry
    pub fn key_field(self) -> &'static str {
        match self {
            Collection::RawRecords => "record_id",
            Collection::Batches | Collection::Anchors => "merkle_root",
            Collection::Headers => "height",
            Collection::Broadcasts => "receipt_id",
        }
    }

    /// Write resolution for this collection
    pub fn layout(self) -> Layout {
        match self {
            Collection::Anchors => Layout::Keyed,
            _ => Layout::AppendOnly,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Key of `doc` under `field`; strings and numbers are accepted
pub fn document_key(doc: &Value, field: &str) -> Option<String> {
    match doc.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Documents of one collection plus the key index for keyed layouts
#[derive(Debug, Clone)]
pub(crate) struct CollectionState {
    collection: Collection,
    docs: Vec<Value>,
    index: HashMap<String, usize>,
}

impl CollectionState {
    pub(crate) fn new(collection: Collection) -> Self {
        Self {
            collection,
            docs: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Reject appends to keyed collections before anything is written
    pub(crate) fn check_append(&self, doc: &Value) -> Result<()> {
        if self.collection.layout() == Layout::Keyed {
            return Err(AnchorageError::storage(format!(
                "collection {} is keyed; use upsert",
                self.collection
            )));
        }
        if !doc.is_object() {
            return Err(AnchorageError::storage(format!(
                "documents in {} must be JSON objects",
                self.collection
            )));
        }
        Ok(())
    }

    /// Validate an upsert and return the key it resolves to
    pub(crate) fn check_upsert(&self, doc: &Value) -> Result<String> {
        if self.collection.layout() != Layout::Keyed {
            return Err(AnchorageError::storage(format!(
                "collection {} is append-only",
                self.collection
            )));
        }
        document_key(doc, self.collection.key_field()).ok_or_else(|| {
            AnchorageError::storage(format!(
                "document for {} has no {} key",
                self.collection,
                self.collection.key_field()
            ))
        })
    }

    pub(crate) fn push(&mut self, doc: Value) {
        self.docs.push(doc);
    }

    /// Returns whether an existing entry was replaced
    pub(crate) fn put(&mut self, key: String, doc: Value) -> bool {
        match self.index.get(&key) {
            Some(&position) => {
                self.docs[position] = doc;
                true
            }
            None => {
                self.index.insert(key, self.docs.len());
                self.docs.push(doc);
                false
            }
        }
    }

    /// Apply a document read back from a changelog
    pub(crate) fn replay(&mut self, doc: Value) -> Result<()> {
        match self.collection.layout() {
            Layout::AppendOnly => {
                self.check_append(&doc)?;
                self.push(doc);
            }
            Layout::Keyed => {
                let key = self.check_upsert(&doc)?;
                self.put(key, doc);
            }
        }
        Ok(())
    }

    /// Overwrite the document at `position` without touching the index
    pub(crate) fn replace_at(&mut self, position: usize, doc: Value) -> bool {
        match self.docs.get_mut(position) {
            Some(slot) => {
                *slot = doc;
                true
            }
            None => false,
        }
    }

    pub(crate) fn docs(&self) -> &[Value] {
        &self.docs
    }

    /// Latest document whose key field equals `key`
    pub(crate) fn get(&self, key: &str) -> Option<&Value> {
        match self.collection.layout() {
            Layout::Keyed => self.index.get(key).map(|&position| &self.docs[position]),
            Layout::AppendOnly => {
                let field = self.collection.key_field();
                self.docs
                    .iter()
                    .rev()
                    .find(|doc| document_key(doc, field).as_deref() == Some(key))
            }
        }
    }
}
