//! Persisted document types: manifests, anchors and chain headers
//!
//! Field names are the wire schema of the stored collections.

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::hash::Hash32;
use crate::merkle::InclusionProof;

/// Manifest of one committed window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Unix seconds at which the window was committed
    pub timestamp: u64,
    /// Commitment root over the window's leaf payloads
    pub merkle_root: Hash32,
    /// Number of records in the window
    pub count: usize,
    /// One item per record, in window order
    pub items: Vec<ManifestItem>,
}

impl Batch {
    /// Manifest item for `record_id`, if the record is in this batch
    pub fn item(&self, record_id: &str) -> Option<&ManifestItem> {
        self.items.iter().find(|item| item.record_id == record_id)
    }
}

/// Per-record entry of a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestItem {
    /// Record identifier
    pub record_id: String,
    /// Position of the record within its window
    pub leaf_index: usize,
    /// Sibling hashes, leaf level first
    pub proof: Vec<Hash32>,
}

impl ManifestItem {
    /// Structured proof with per-step sides
    pub fn inclusion_proof(&self) -> Result<InclusionProof> {
        InclusionProof::from_siblings(self.leaf_index, &self.proof)
    }
}

/// Receipt returned by an anchoring backend on acceptance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastReceipt {
    /// Backend transaction / receipt identifier
    pub id: String,
    /// Unix seconds at which the backend first saw the root
    pub first_seen: u64,
}

/// Lifecycle state of an anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorState {
    /// Accepted by the backend, no block height yet
    Broadcast,
    /// A block height has been recorded
    Confirmed,
}

/// Binding between a commitment root and its broadcast receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    /// Commitment root (the key)
    pub merkle_root: Hash32,
    /// Backend receipt identifier
    pub receipt_id: String,
    /// Unix seconds of first sighting
    pub first_seen: u64,
    /// Block identifier, set on confirmation
    pub block_hash: Option<Hash32>,
    /// Block height, set on confirmation
    pub block_height: Option<u64>,
    /// Confirmation count; never decreases
    pub confirmations: u64,
}

impl Anchor {
    /// Fresh anchor in the broadcast state
    pub fn broadcast(merkle_root: Hash32, receipt: BroadcastReceipt) -> Self {
        Self {
            merkle_root,
            receipt_id: receipt.id,
            first_seen: receipt.first_seen,
            block_hash: None,
            block_height: None,
            confirmations: 0,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> AnchorState {
        if self.block_height.is_some() {
            AnchorState::Confirmed
        } else {
            AnchorState::Broadcast
        }
    }
}

/// Header of the external ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHeader {
    /// Height; genesis is 0
    pub height: u64,
    /// Block hash
    pub hash: Hash32,
    /// Unix seconds
    pub time: u64,
}
