//! Chain head feeds
//!
//! A feed is an append-only header sequence with strictly increasing
//! heights. [`SimulatedChainFeed`] keeps its headers in the store's
//! `headers` collection, so a later process observes the tip an earlier one
//! grew.

use std::sync::Arc;

use anchorage_core::{AnchorageError, ChainHeader, Clock, Hash32, Result};
use anchorage_store::{Collection, DocumentStore, DocumentStoreExt};
use parking_lot::Mutex;
use tracing::{debug, info};

/// Source of chain headers
pub trait ChainHeadFeed: Send + Sync {
    /// Extend the chain by `n` headers, returning them in height order
    fn append(&self, n: u64) -> Result<Vec<ChainHeader>>;

    /// Latest header, or `None` for an empty feed
    fn tip(&self) -> Result<Option<ChainHeader>>;
}

/// Simulation double producing deterministic headers over a store
///
/// Header hashes chain the height and the previous hash; they are not
/// proof-of-work and carry no block contents.
pub struct SimulatedChainFeed {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    // Serialises appends so heights stay strictly increasing.
    append_lock: Mutex<()>,
}

impl SimulatedChainFeed {
    /// Open the feed, writing a genesis header if the store has none
    pub fn open(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        let feed = Self {
            store,
            clock,
            append_lock: Mutex::new(()),
        };
        if feed.tip()?.is_none() {
            let genesis = ChainHeader {
                height: 0,
                hash: Hash32::digest(b"genesis"),
                time: feed.clock.now_unix(),
            };
            feed.store.append_typed(Collection::Headers, &genesis)?;
            debug!(hash = %genesis.hash, "wrote genesis header");
        }
        Ok(feed)
    }

    /// Every header from genesis to tip
    pub fn headers(&self) -> Result<Vec<ChainHeader>> {
        self.store.read_all_typed(Collection::Headers)
    }
}

impl ChainHeadFeed for SimulatedChainFeed {
    fn append(&self, n: u64) -> Result<Vec<ChainHeader>> {
        let _guard = self.append_lock.lock();
        let mut tip = self
            .tip()?
            .ok_or_else(|| AnchorageError::chain_feed("feed has no genesis header"))?;

        let mut appended = Vec::new();
        for _ in 0..n {
            let height = tip.height + 1;
            let header = ChainHeader {
                height,
                hash: Hash32::digest(format!("block-{height}-{}", tip.hash).as_bytes()),
                time: self.clock.now_unix().max(tip.time),
            };
            self.store.append_typed(Collection::Headers, &header)?;
            tip = header.clone();
            appended.push(header);
        }
        if n > 0 {
            info!(tip_height = tip.height, appended = n, "chain grown");
        }
        Ok(appended)
    }

    fn tip(&self) -> Result<Option<ChainHeader>> {
        let mut headers = self.store.read_all(Collection::Headers)?;
        headers
            .pop()
            .map(|doc| {
                serde_json::from_value(doc).map_err(|e| {
                    AnchorageError::chain_feed(format!("malformed tip header: {e}"))
                })
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchorage_core::FixedClock;
    use anchorage_store::MemoryStore;

    fn feed(store: &MemoryStore) -> SimulatedChainFeed {
        SimulatedChainFeed::open(Arc::new(store.clone()), Arc::new(FixedClock::new(100))).unwrap()
    }

    #[test]
    fn test_opens_at_genesis() {
        let store = MemoryStore::new();
        let tip = feed(&store).tip().unwrap().unwrap();
        assert_eq!(tip.height, 0);
        assert_eq!(tip.hash, Hash32::digest(b"genesis"));
    }

    #[test]
    fn test_reopen_keeps_existing_chain() {
        let store = MemoryStore::new();
        feed(&store).append(3).unwrap();
        let reopened = feed(&store);
        assert_eq!(reopened.tip().unwrap().unwrap().height, 3);
        assert_eq!(store.len(Collection::Headers), 4);
    }

    #[test]
    fn test_heights_increase_and_hashes_differ() {
        let store = MemoryStore::new();
        let feed = feed(&store);
        let appended = feed.append(5).unwrap();
        let heights: Vec<u64> = appended.iter().map(|h| h.height).collect();
        assert_eq!(heights, vec![1, 2, 3, 4, 5]);

        let headers = feed.headers().unwrap();
        for pair in headers.windows(2) {
            assert_eq!(pair[1].height, pair[0].height + 1);
            assert_ne!(pair[1].hash, pair[0].hash);
            assert!(pair[1].time >= pair[0].time);
        }
    }

    #[test]
    fn test_append_zero_is_noop() {
        let store = MemoryStore::new();
        assert!(feed(&store).append(0).unwrap().is_empty());
        assert_eq!(store.len(Collection::Headers), 1);
    }
}
