//! Anchoring backends
//!
//! A backend accepts a commitment root for publication on an external
//! ledger and hands back a receipt. Real-chain RPC backends sit behind the
//! same trait; [`SimulatedBackend`] is the deterministic stand-in used by
//! the CLI and tests.

use std::sync::Arc;

use anchorage_core::hash::{hasher, Hasher as _};
use anchorage_core::{BroadcastReceipt, Clock, Hash32, Result};
use anchorage_store::{Collection, DocumentStore, DocumentStoreExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Publishes commitment roots to an external ledger
pub trait AnchoringBackend: Send + Sync {
    /// Broadcast `root`; may be slow and may fail with `BackendUnavailable`
    fn broadcast(&self, root: &Hash32) -> Result<BroadcastReceipt>;
}

/// One receipt issued by [`SimulatedBackend`], as kept in `broadcasts`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastEntry {
    /// Issued receipt id
    pub receipt_id: String,
    /// Root that was broadcast
    pub merkle_root: Hash32,
    /// Position in the backend's sequence
    pub sequence: u64,
    /// Issue time, unix seconds
    pub first_seen: u64,
}

/// Simulation double: receipt ids are `sha256(root || sequence)`
///
/// Not a ledger. Receipts are unique per call and reproducible for a given
/// sequence of roots, and nothing leaves the process. A backend opened over
/// a store logs every receipt to the `broadcasts` collection and resumes
/// its sequence from that log, so receipts stay unique across processes.
pub struct SimulatedBackend {
    clock: Arc<dyn Clock>,
    log: Option<Arc<dyn DocumentStore>>,
    sequence: Mutex<u64>,
}

impl SimulatedBackend {
    /// In-process backend starting at sequence zero
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            log: None,
            sequence: Mutex::new(0),
        }
    }

    /// Backend logging receipts to `store`, resuming after the last one
    pub fn open(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        let issued = store.read_all(Collection::Broadcasts)?.len() as u64;
        debug!(issued, "resuming simulated backend");
        Ok(Self {
            clock,
            log: Some(store),
            sequence: Mutex::new(issued),
        })
    }
}

impl AnchoringBackend for SimulatedBackend {
    fn broadcast(&self, root: &Hash32) -> Result<BroadcastReceipt> {
        let mut sequence = self.sequence.lock();
        let mut h = hasher();
        h.update(root.as_bytes());
        h.update(&sequence.to_be_bytes());
        let receipt = BroadcastReceipt {
            id: Hash32(h.finalize()).to_hex(),
            first_seen: self.clock.now_unix(),
        };

        if let Some(log) = &self.log {
            log.append_typed(
                Collection::Broadcasts,
                &BroadcastEntry {
                    receipt_id: receipt.id.clone(),
                    merkle_root: *root,
                    sequence: *sequence,
                    first_seen: receipt.first_seen,
                },
            )?;
        }
        *sequence += 1;

        debug!(merkle_root = %root, receipt_id = %receipt.id, "simulated broadcast");
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchorage_core::FixedClock;
    use anchorage_store::MemoryStore;
    use std::collections::HashSet;

    #[test]
    fn test_receipts_are_unique_and_reproducible() {
        let root = Hash32([0xaa; 32]);
        let a = SimulatedBackend::new(Arc::new(FixedClock::new(10)));
        let b = SimulatedBackend::new(Arc::new(FixedClock::new(10)));

        let first = a.broadcast(&root).unwrap();
        let second = a.broadcast(&root).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(first, b.broadcast(&root).unwrap());
        assert_eq!(first.first_seen, 10);
        assert_eq!(first.id.len(), 64);
    }

    #[test]
    fn test_reopened_backend_never_repeats_a_receipt() {
        let store = MemoryStore::new();
        let clock = Arc::new(FixedClock::new(0));
        let root = Hash32([0x11; 32]);

        let mut ids = HashSet::new();
        for _ in 0..3 {
            let backend = SimulatedBackend::open(Arc::new(store.clone()), clock.clone()).unwrap();
            assert!(ids.insert(backend.broadcast(&root).unwrap().id));
        }

        let log: Vec<BroadcastEntry> = store.read_all_typed(Collection::Broadcasts).unwrap();
        let sequences: Vec<u64> = log.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert!(log.iter().all(|e| e.merkle_root == root));
    }
}
