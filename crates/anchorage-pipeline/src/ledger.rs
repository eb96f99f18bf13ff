//! Anchor lifecycle per commitment root
//!
//! Absent -> `Broadcast` on backend acceptance -> `Confirmed` once a block
//! height is supplied. Anchors live in the keyed `anchors` collection, so
//! every transition is an upsert by root. Transitions through one ledger
//! are serialised, so interleaved callers never lose a confirmation.

use std::sync::Arc;

use anchorage_core::{Anchor, AnchorageError, Hash32, Result};
use anchorage_store::{Collection, DocumentStore, DocumentStoreExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backend::AnchoringBackend;

/// What `anchor` does with a root that already has an anchor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReanchorPolicy {
    /// Broadcast again and replace the stored anchor
    #[default]
    Overwrite,
    /// Refuse with `AlreadyAnchored` before contacting the backend
    Reject,
}

/// Block identifier derived from a receipt and the height it landed at
pub fn block_hash_for(receipt_id: &str, height: u64) -> Hash32 {
    Hash32::digest(format!("{receipt_id}{height}").as_bytes())
}

/// Tracks anchors over a store and an anchoring backend
pub struct AnchorLedger {
    store: Arc<dyn DocumentStore>,
    backend: Arc<dyn AnchoringBackend>,
    policy: ReanchorPolicy,
    // Held across every read-modify-write of an anchor.
    update_lock: Mutex<()>,
}

impl AnchorLedger {
    /// Ledger with the default overwrite policy
    pub fn new(store: Arc<dyn DocumentStore>, backend: Arc<dyn AnchoringBackend>) -> Self {
        Self {
            store,
            backend,
            policy: ReanchorPolicy::default(),
            update_lock: Mutex::new(()),
        }
    }

    /// Replace the re-anchor policy
    pub fn with_policy(mut self, policy: ReanchorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Active re-anchor policy
    pub fn policy(&self) -> ReanchorPolicy {
        self.policy
    }

    /// Broadcast `root` and record it in the `Broadcast` state
    pub fn anchor(&self, root: &Hash32) -> Result<Anchor> {
        let _guard = self.update_lock.lock();
        let existing = self.get(root)?;
        if existing.is_some() && self.policy == ReanchorPolicy::Reject {
            return Err(AnchorageError::already_anchored(root.to_hex()));
        }

        let receipt = self.backend.broadcast(root)?;
        let anchor = Anchor::broadcast(*root, receipt);
        self.store.upsert_typed(Collection::Anchors, &anchor)?;

        if let Some(previous) = existing {
            warn!(
                merkle_root = %root,
                previous_receipt = %previous.receipt_id,
                receipt_id = %anchor.receipt_id,
                "re-anchored root; previous receipt replaced"
            );
        } else {
            info!(merkle_root = %root, receipt_id = %anchor.receipt_id, "anchor broadcast");
        }
        Ok(anchor)
    }

    /// Record the block height at which `root`'s receipt landed
    ///
    /// Idempotent for a given height. Confirmations are raised to at least
    /// one and never lowered.
    pub fn confirm(&self, root: &Hash32, height: u64) -> Result<Anchor> {
        let _guard = self.update_lock.lock();
        let mut anchor = self.require(root)?;
        anchor.block_hash = Some(block_hash_for(&anchor.receipt_id, height));
        anchor.block_height = Some(height);
        anchor.confirmations = anchor.confirmations.max(1);
        self.store.upsert_typed(Collection::Anchors, &anchor)?;
        info!(
            merkle_root = %root,
            block_height = height,
            confirmations = anchor.confirmations,
            "anchor confirmed"
        );
        Ok(anchor)
    }

    /// Raise the confirmation count to an observed chain depth
    ///
    /// Only confirmed anchors have a depth; broadcast ones are returned as is.
    pub fn record_depth(&self, root: &Hash32, depth: u64) -> Result<Anchor> {
        let _guard = self.update_lock.lock();
        let mut anchor = self.require(root)?;
        if anchor.block_height.is_some() && depth > anchor.confirmations {
            anchor.confirmations = depth;
            self.store.upsert_typed(Collection::Anchors, &anchor)?;
        }
        Ok(anchor)
    }

    /// Current snapshot for `root`, if anchored
    pub fn get(&self, root: &Hash32) -> Result<Option<Anchor>> {
        self.store.get_typed(Collection::Anchors, &root.to_hex())
    }

    /// Every anchor in first-anchored order
    pub fn anchors(&self) -> Result<Vec<Anchor>> {
        self.store.read_all_typed(Collection::Anchors)
    }

    fn require(&self, root: &Hash32) -> Result<Anchor> {
        self.get(root)?
            .ok_or_else(|| AnchorageError::anchor_not_found(root.to_hex()))
    }
}
