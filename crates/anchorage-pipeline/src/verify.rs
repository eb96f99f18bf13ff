//! Record verification against persisted manifests and anchors
//!
//! Given a record id, find its manifest item and raw record, rebuild the
//! leaf payload with the device signer, check the stored proof against the
//! stored root and report the anchor status. Missing data is an outcome,
//! not an error; a stored proof that does not reproduce its stored root is
//! reported as corruption.

use std::sync::Arc;

use anchorage_core::{
    Anchor, AnchorageError, Batch, Hash32, ManifestItem, Record, RecordSigner, Result,
};
use anchorage_store::{Collection, DocumentStore, DocumentStoreExt};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::spv::SpvChecker;

/// Anchor status of a verified record's batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnchorStatus {
    /// The batch root has no anchor
    Unanchored,
    /// The batch root has an anchor
    Anchored {
        /// Backend receipt identifier
        receipt_id: String,
        /// Block height, if confirmed
        block_height: Option<u64>,
        /// Stored confirmation count
        confirmations: u64,
        /// Whether the chain tip has reached the block height
        spv_confirmed: bool,
    },
}

/// Everything learned about one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// Record identifier
    pub record_id: String,
    /// Root of the batch holding the record
    pub batch_root: Hash32,
    /// Leaf index within the batch
    pub leaf_index: usize,
    /// Number of proof steps
    pub proof_len: usize,
    /// Whether the proof reproduces the batch root
    pub proof_valid: bool,
    /// Anchor status of the batch root
    pub anchor: AnchorStatus,
}

/// Result of verifying a record id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerifyOutcome {
    /// No manifest lists the record
    NotInManifest {
        /// Requested record id
        record_id: String,
    },
    /// A manifest lists the record but its raw content is missing
    RawRecordMissing {
        /// Requested record id
        record_id: String,
        /// Root of the listing batch
        batch_root: Hash32,
    },
    /// The stored proof does not reproduce the stored root
    Corrupted(VerificationReport),
    /// The record is included in its batch
    Included(VerificationReport),
}

impl VerifyOutcome {
    /// Whether the record or its content could not be found
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotInManifest { .. } | Self::RawRecordMissing { .. }
        )
    }

    /// Report for outcomes that got as far as proof checking
    pub fn report(&self) -> Option<&VerificationReport> {
        match self {
            Self::Corrupted(report) | Self::Included(report) => Some(report),
            _ => None,
        }
    }
}

/// Verifies records using the persisted pipeline state
pub struct RecordVerifier {
    store: Arc<dyn DocumentStore>,
    signer: Arc<dyn RecordSigner>,
    spv: SpvChecker,
}

impl RecordVerifier {
    /// Create a verifier
    pub fn new(
        store: Arc<dyn DocumentStore>,
        signer: Arc<dyn RecordSigner>,
        spv: SpvChecker,
    ) -> Self {
        Self { store, signer, spv }
    }

    /// Verify the record identified by `record_id`
    pub fn verify(&self, record_id: &str) -> Result<VerifyOutcome> {
        let Some((batch, item)) = self.find_manifest_item(record_id)? else {
            debug!(record_id, "record not in any manifest");
            return Ok(VerifyOutcome::NotInManifest {
                record_id: record_id.to_string(),
            });
        };

        let record = match self.record(record_id) {
            Ok(record) => record,
            Err(AnchorageError::RecordNotFound { .. }) => {
                debug!(record_id, "raw record missing");
                return Ok(VerifyOutcome::RawRecordMissing {
                    record_id: record_id.to_string(),
                    batch_root: batch.merkle_root,
                });
            }
            Err(e) => return Err(e),
        };

        let leaf = self.signer.leaf_payload(&record)?;
        let proof_valid = item
            .inclusion_proof()
            .map(|proof| proof.verify(&leaf, &batch.merkle_root))
            .unwrap_or(false);

        let report = VerificationReport {
            record_id: record_id.to_string(),
            batch_root: batch.merkle_root,
            leaf_index: item.leaf_index,
            proof_len: item.proof.len(),
            proof_valid,
            anchor: self.anchor_status(&batch.merkle_root)?,
        };

        if proof_valid {
            Ok(VerifyOutcome::Included(report))
        } else {
            warn!(
                record_id,
                merkle_root = %batch.merkle_root,
                leaf_index = item.leaf_index,
                "stored proof does not reproduce stored root"
            );
            Ok(VerifyOutcome::Corrupted(report))
        }
    }

    /// Latest raw copy of `record_id`
    pub fn record(&self, record_id: &str) -> Result<Record> {
        let raw = self
            .store
            .get(Collection::RawRecords, record_id)?
            .ok_or_else(|| AnchorageError::record_not_found(record_id))?;
        Record::from_value(raw).map_err(|e| {
            AnchorageError::corruption(format!("stored raw record {record_id} is invalid: {e}"))
        })
    }

    /// Latest manifest committed under `root`
    pub fn batch(&self, root: &Hash32) -> Result<Batch> {
        self.store
            .get_typed(Collection::Batches, &root.to_hex())?
            .ok_or_else(|| AnchorageError::batch_not_found(root.to_hex()))
    }

    // Latest manifest listing the record, matching the latest raw copy.
    fn find_manifest_item(&self, record_id: &str) -> Result<Option<(Batch, ManifestItem)>> {
        let lists_record = |doc: &Value| {
            doc.get("items")
                .and_then(Value::as_array)
                .is_some_and(|items| {
                    items
                        .iter()
                        .any(|item| item.get("record_id").and_then(Value::as_str) == Some(record_id))
                })
        };

        let batches = self.store.read_all(Collection::Batches)?;
        for doc in batches.into_iter().rev().filter(|doc| lists_record(doc)) {
            let batch: Batch = serde_json::from_value(doc).map_err(|e| {
                AnchorageError::corruption(format!("stored manifest is malformed: {e}"))
            })?;
            if let Some(item) = batch.item(record_id).cloned() {
                return Ok(Some((batch, item)));
            }
        }
        Ok(None)
    }

    fn anchor_status(&self, root: &Hash32) -> Result<AnchorStatus> {
        let anchor: Option<Anchor> = self.store.get_typed(Collection::Anchors, &root.to_hex())?;
        Ok(match anchor {
            None => AnchorStatus::Unanchored,
            Some(anchor) => AnchorStatus::Anchored {
                spv_confirmed: self.spv.is_confirmed(&anchor)?,
                receipt_id: anchor.receipt_id,
                block_height: anchor.block_height,
                confirmations: anchor.confirmations,
            },
        })
    }
}
