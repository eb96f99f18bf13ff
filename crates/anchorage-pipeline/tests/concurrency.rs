//! Integration tests: interleaved callers
//!
//! The anchor table, the header sequence and the manifest/raw logs must stay
//! consistent when several threads drive them at once.

use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use anchorage_core::{
    DeviceSecret, FixedClock, Hash32, HmacRecordSigner, Record, RecordSigner, Result,
};
use anchorage_pipeline::{
    AnchorLedger, BatchBuilder, ChainHeadFeed, RecordVerifier, SimulatedBackend,
    SimulatedChainFeed, SpvChecker, VerifyOutcome,
};
use anchorage_store::{Collection, DocumentStore, FileStore, MemoryStore};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;

/// Store that stalls one chosen thread right after its next anchor read
struct StallingStore {
    inner: MemoryStore,
    stall: Mutex<Option<(ThreadId, Sender<()>)>>,
}

impl StallingStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            stall: Mutex::new(None),
        }
    }

    /// Stall the calling thread after its next anchor read, signalling `read`
    fn stall_next_anchor_read(&self, read: Sender<()>) {
        *self.stall.lock() = Some((thread::current().id(), read));
    }
}

impl DocumentStore for StallingStore {
    fn append(&self, collection: Collection, doc: Value) -> Result<()> {
        self.inner.append(collection, doc)
    }

    fn upsert(&self, collection: Collection, doc: Value) -> Result<bool> {
        self.inner.upsert(collection, doc)
    }

    fn read_all(&self, collection: Collection) -> Result<Vec<Value>> {
        self.inner.read_all(collection)
    }

    fn get(&self, collection: Collection, key: &str) -> Result<Option<Value>> {
        let doc = self.inner.get(collection, key)?;
        if collection == Collection::Anchors {
            let armed = {
                let mut stall = self.stall.lock();
                match stall.as_ref() {
                    Some((id, _)) if *id == thread::current().id() => stall.take(),
                    _ => None,
                }
            };
            if let Some((_, read)) = armed {
                let _ = read.send(());
                thread::sleep(Duration::from_millis(200));
            }
        }
        Ok(doc)
    }

    fn find(
        &self,
        collection: Collection,
        predicate: &dyn Fn(&Value) -> bool,
    ) -> Result<Option<Value>> {
        self.inner.find(collection, predicate)
    }

    fn flush(&self) -> Result<()> {
        self.inner.flush()
    }
}

fn memory_ledger(store: Arc<dyn DocumentStore>) -> AnchorLedger {
    AnchorLedger::new(
        store,
        Arc::new(SimulatedBackend::new(Arc::new(FixedClock::new(0)))),
    )
}

#[test]
fn confirm_racing_record_depth_keeps_the_raised_count() {
    let store = Arc::new(StallingStore::new());
    let ledger = Arc::new(memory_ledger(store.clone()));
    let root = Hash32([0x3c; 32]);
    ledger.anchor(&root).unwrap();
    ledger.confirm(&root, 1).unwrap();

    let (read_tx, read_rx) = mpsc::channel();
    let confirmer = {
        let ledger = ledger.clone();
        let store = store.clone();
        thread::spawn(move || {
            store.stall_next_anchor_read(read_tx);
            ledger.confirm(&root, 1).unwrap()
        })
    };

    // The confirmer has read the anchor and is stalled before writing.
    read_rx.recv().unwrap();
    ledger.record_depth(&root, 5).unwrap();
    confirmer.join().unwrap();

    let stored = ledger.get(&root).unwrap().unwrap();
    assert_eq!(stored.confirmations, 5);
    assert_eq!(stored.block_height, Some(1));
}

#[test]
fn interleaved_confirms_and_depths_end_at_the_deepest() {
    let ledger = Arc::new(memory_ledger(Arc::new(MemoryStore::new())));
    let root = Hash32([0x4d; 32]);
    ledger.anchor(&root).unwrap();
    ledger.confirm(&root, 10).unwrap();

    let workers: Vec<_> = (0..4u64)
        .map(|worker| {
            let ledger = ledger.clone();
            thread::spawn(move || {
                for step in 0..25u64 {
                    if step % 3 == 0 {
                        ledger.confirm(&root, 10).unwrap();
                    } else {
                        let anchor = ledger.record_depth(&root, worker * 25 + step).unwrap();
                        assert!(anchor.confirmations >= 1);
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    // Deepest depth recorded: worker 3, step 23 (step 24 is a confirm).
    let stored = ledger.get(&root).unwrap().unwrap();
    assert_eq!(stored.confirmations, 3 * 25 + 23);
}

#[test]
fn concurrent_appends_keep_heights_contiguous() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let feed = Arc::new(SimulatedChainFeed::open(store, Arc::new(FixedClock::new(0))).unwrap());

    let workers: Vec<_> = (1..=4u64)
        .map(|n| {
            let feed = feed.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    let appended = feed.append(n).unwrap();
                    assert_eq!(appended.len() as u64, n);
                    assert!(appended.windows(2).all(|w| w[1].height == w[0].height + 1));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let headers = feed.headers().unwrap();
    assert_eq!(headers.len(), 1 + 10 * (1 + 2 + 3 + 4));
    for (expected, pair) in headers.windows(2).enumerate() {
        assert_eq!(pair[0].height, expected as u64);
        assert_eq!(pair[1].height, pair[0].height + 1);
        let hash = Hash32::digest(format!("block-{}-{}", pair[1].height, pair[0].hash).as_bytes());
        assert_eq!(pair[1].hash, hash);
    }
    assert_eq!(feed.tip().unwrap().unwrap().height, 100);
}

#[test]
fn concurrent_file_appends_survive_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = Arc::new(FileStore::open(dir.path()).unwrap());
        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let store = store.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        store
                            .append(
                                Collection::RawRecords,
                                json!({"record_id": format!("w{worker}:{i:03}")}),
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        store.flush().unwrap();
    }

    let store = FileStore::open(dir.path()).unwrap();
    let docs = store.read_all(Collection::RawRecords).unwrap();
    assert_eq!(docs.len(), 200);
    for worker in 0..4 {
        let prefix = format!("w{worker}:");
        let own: Vec<&str> = docs
            .iter()
            .filter_map(|doc| doc["record_id"].as_str())
            .filter(|id| id.starts_with(&prefix))
            .collect();
        let expected: Vec<String> = (0..50).map(|i| format!("w{worker}:{i:03}")).collect();
        assert_eq!(own, expected);
    }
}

#[test]
fn concurrent_batch_builders_commit_verifiable_manifests() {
    let dir = TempDir::new().unwrap();
    let signer: Arc<dyn RecordSigner> =
        Arc::new(HmacRecordSigner::new(DeviceSecret::new(b"k".to_vec())));
    let clock = Arc::new(FixedClock::new(0));
    {
        let store: Arc<dyn DocumentStore> = Arc::new(FileStore::open(dir.path()).unwrap());
        let workers: Vec<_> = ["devA", "devB", "devC"]
            .into_iter()
            .map(|device| {
                let builder =
                    BatchBuilder::new(4, signer.clone(), store.clone(), clock.clone()).unwrap();
                thread::spawn(move || {
                    let records: Vec<Record> = (0..10)
                        .map(|i| {
                            Record::from_value(json!({"record_id": format!("{device}:{i:04}")}))
                                .unwrap()
                        })
                        .collect();
                    builder.build_batches(&records).unwrap().len()
                })
            })
            .collect();
        let batches: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(batches, 9);
        store.flush().unwrap();
    }

    let store: Arc<dyn DocumentStore> = Arc::new(FileStore::open(dir.path()).unwrap());
    let feed = Arc::new(SimulatedChainFeed::open(store.clone(), clock).unwrap());
    let verifier = RecordVerifier::new(store, signer, SpvChecker::new(feed));
    for device in ["devA", "devB", "devC"] {
        for i in 0..10 {
            let id = format!("{device}:{i:04}");
            assert!(
                matches!(verifier.verify(&id).unwrap(), VerifyOutcome::Included(_)),
                "{id} not included"
            );
        }
    }
}
