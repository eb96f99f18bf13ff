//! Windowed batch construction
//!
//! Records are cut into fixed-size windows in input order; the trailing
//! window may be short. Each window is signed, committed to a Merkle tree
//! and persisted as raw records followed by its manifest. Every fallible
//! step of a window runs before the first write, so a window is either
//! persisted whole or not at all.

use std::collections::HashSet;
use std::sync::Arc;

use anchorage_core::{
    AnchorageError, Batch, Clock, ManifestItem, MerkleTree, Record, RecordSigner, Result,
};
use anchorage_store::{Collection, DocumentStore, DocumentStoreExt};
use tracing::{debug, info};

/// Builds and persists batch manifests
pub struct BatchBuilder {
    window_size: usize,
    signer: Arc<dyn RecordSigner>,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for BatchBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchBuilder")
            .field("window_size", &self.window_size)
            .finish_non_exhaustive()
    }
}

impl BatchBuilder {
    /// Create a builder; `window_size` must be at least 1
    pub fn new(
        window_size: usize,
        signer: Arc<dyn RecordSigner>,
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if window_size == 0 {
            return Err(AnchorageError::config("window_size must be at least 1"));
        }
        Ok(Self {
            window_size,
            signer,
            store,
            clock,
        })
    }

    /// Records per full window
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Commit `records` window by window, returning manifests in order
    ///
    /// Stops at the first failing window; windows before it stay committed.
    pub fn build_batches(&self, records: &[Record]) -> Result<Vec<Batch>> {
        records
            .chunks(self.window_size)
            .map(|window| self.commit_window(window))
            .collect()
    }

    /// Compute the manifest for one window without persisting anything
    pub fn prepare_window(&self, window: &[Record]) -> Result<Batch> {
        let mut seen = HashSet::with_capacity(window.len());
        for record in window {
            if !seen.insert(record.record_id()) {
                return Err(AnchorageError::invalid_record(format!(
                    "duplicate record_id {} within window",
                    record.record_id()
                )));
            }
        }

        let leaves = window
            .iter()
            .map(|record| self.signer.leaf_payload(record))
            .collect::<Result<Vec<_>>>()?;
        let tree = MerkleTree::build(&leaves);
        let root = tree.root();

        let items = window
            .iter()
            .enumerate()
            .map(|(leaf_index, record)| {
                let proof = tree.proof(leaf_index)?;
                Ok(ManifestItem {
                    record_id: record.record_id().to_string(),
                    leaf_index,
                    proof: proof.siblings(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            merkle_root = %root,
            count = window.len(),
            depth = tree.depth(),
            "prepared window"
        );

        Ok(Batch {
            timestamp: self.clock.now_unix(),
            merkle_root: root,
            count: window.len(),
            items,
        })
    }

    fn commit_window(&self, window: &[Record]) -> Result<Batch> {
        let batch = self.prepare_window(window)?;
        self.store.append_all(
            Collection::RawRecords,
            window.iter().map(Record::to_value).collect(),
        )?;
        self.store.append_typed(Collection::Batches, &batch)?;
        info!(merkle_root = %batch.merkle_root, count = batch.count, "committed batch");
        Ok(batch)
    }
}
