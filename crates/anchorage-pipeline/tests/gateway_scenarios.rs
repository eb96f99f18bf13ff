//! Integration tests: end-to-end gateway flows
//!
//! Exercises ingest and verify over the file-backed store, including
//! collaborator failures and on-disk tampering.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anchorage_core::{
    AnchorageError, AuthTag, BroadcastReceipt, DeviceSecret, FixedClock, Hash32,
    HmacRecordSigner, Record, RecordSigner, Result,
};
use anchorage_pipeline::{
    AnchorLedger, AnchorStatus, AnchoringBackend, ChainHeadFeed, Gateway, GatewayConfig,
    GatewayParts, SimulatedBackend, SimulatedChainFeed, SpvChecker, VerifyOutcome,
};
use anchorage_store::{Collection, DocumentStore, FileStore, MemoryStore};
use assert_matches::assert_matches;
use serde_json::json;
use tempfile::TempDir;

fn records(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| {
            Record::from_value(json!({"record_id": format!("devA:{i:04}"), "temp_c": 18 + i % 5}))
                .unwrap()
        })
        .collect()
}

fn config(window: usize) -> GatewayConfig {
    GatewayConfig {
        window_size: window,
        ..GatewayConfig::default()
    }
}

fn file_gateway(dir: &TempDir, window: usize) -> Gateway {
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    Gateway::simulated(config(window), store, Arc::new(FixedClock::new(1_700_000_000))).unwrap()
}

#[test]
fn ten_records_window_four_across_processes() {
    let dir = TempDir::new().unwrap();
    let report = file_gateway(&dir, 4).ingest(&records(10)).unwrap();
    let counts: Vec<usize> = report.batches.iter().map(|b| b.count).collect();
    assert_eq!(counts, vec![4, 4, 2]);

    // A fresh process sees the manifests, anchors and grown chain.
    let gateway = file_gateway(&dir, 4);
    assert_eq!(gateway.feed().tip().unwrap().unwrap().height, 3);

    let outcome = gateway.verify("devA:0005").unwrap();
    let VerifyOutcome::Included(report) = &outcome else {
        panic!("expected inclusion, got {outcome:?}");
    };
    assert_eq!(report.leaf_index, 1);
    assert_eq!(report.proof_len, 2);
    assert_matches!(
        report.anchor,
        AnchorStatus::Anchored {
            block_height: Some(2),
            spv_confirmed: true,
            ..
        }
    );
}

#[test]
fn unknown_record_is_reported_not_raised() {
    let dir = TempDir::new().unwrap();
    let gateway = file_gateway(&dir, 4);
    gateway.ingest(&records(3)).unwrap();
    assert_eq!(
        gateway.verify("devZ:9999").unwrap(),
        VerifyOutcome::NotInManifest {
            record_id: "devZ:9999".into()
        }
    );
}

#[test]
fn tampered_manifest_on_disk_is_corruption() {
    let dir = TempDir::new().unwrap();
    file_gateway(&dir, 4).ingest(&records(4)).unwrap();

    let path = dir.path().join("batches.jsonl");
    let text = std::fs::read_to_string(&path).unwrap();
    let mut manifest: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
    manifest["items"][2]["proof"][0] = json!(Hash32::digest(b"forged").to_hex());
    std::fs::write(&path, format!("{manifest}\n")).unwrap();

    let outcome = file_gateway(&dir, 4).verify("devA:0002").unwrap();
    assert_matches!(outcome, VerifyOutcome::Corrupted(ref r) if !r.proof_valid);
    // Siblings of other leaves are untouched.
    assert_matches!(
        file_gateway(&dir, 4).verify("devA:0000").unwrap(),
        VerifyOutcome::Included(_)
    );
}

/// Signer that fails on one record id
struct FailingSigner {
    inner: HmacRecordSigner,
    poisoned: &'static str,
}

impl RecordSigner for FailingSigner {
    fn sign(&self, record: &Record) -> Result<AuthTag> {
        if record.record_id() == self.poisoned {
            return Err(AnchorageError::invalid_record("signer refused record"));
        }
        self.inner.sign(record)
    }
}

/// Backend that accepts a fixed number of broadcasts, then fails
struct FlakyBackend {
    inner: SimulatedBackend,
    remaining: AtomicUsize,
}

impl AnchoringBackend for FlakyBackend {
    fn broadcast(&self, root: &Hash32) -> Result<BroadcastReceipt> {
        if self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
        {
            return Err(AnchorageError::backend_unavailable("rpc timeout"));
        }
        self.inner.broadcast(root)
    }
}

fn assembled(
    store: &MemoryStore,
    signer: Arc<dyn RecordSigner>,
    backend: Arc<dyn AnchoringBackend>,
) -> Gateway {
    let clock = Arc::new(FixedClock::new(1_700_000_000));
    let feed = Arc::new(SimulatedChainFeed::open(Arc::new(store.clone()), clock.clone()).unwrap());
    Gateway::new(
        config(4),
        GatewayParts {
            store: Arc::new(store.clone()),
            signer,
            backend,
            feed,
            clock,
        },
    )
    .unwrap()
}

#[test]
fn signing_failure_aborts_whole_window() {
    let store = MemoryStore::new();
    let clock = Arc::new(FixedClock::new(0));
    let signer = Arc::new(FailingSigner {
        inner: HmacRecordSigner::new(DeviceSecret::new(b"demo-device-secret".to_vec())),
        poisoned: "devA:0006",
    });
    let gateway = assembled(&store, signer, Arc::new(SimulatedBackend::new(clock)));

    assert_matches!(
        gateway.ingest(&records(10)),
        Err(AnchorageError::InvalidRecord { .. })
    );
    // First window committed; the poisoned second window left no trace.
    assert_eq!(store.len(Collection::Batches), 1);
    assert_eq!(store.len(Collection::RawRecords), 4);
    assert!(gateway.verify("devA:0004").unwrap().is_not_found());
}

#[test]
fn backend_failure_surfaces_and_leaves_batch_unanchored() {
    let store = MemoryStore::new();
    let clock = Arc::new(FixedClock::new(0));
    let backend = Arc::new(FlakyBackend {
        inner: SimulatedBackend::new(clock),
        remaining: AtomicUsize::new(1),
    });
    let signer = Arc::new(HmacRecordSigner::new(DeviceSecret::new(
        b"demo-device-secret".to_vec(),
    )));
    let gateway = assembled(&store, signer, backend);

    assert_matches!(
        gateway.ingest(&records(8)),
        Err(AnchorageError::BackendUnavailable { .. })
    );
    assert_eq!(store.len(Collection::Anchors), 1);

    let outcome = gateway.verify("devA:0005").unwrap();
    assert_eq!(outcome.report().unwrap().anchor, AnchorStatus::Unanchored);
    assert!(outcome.report().unwrap().proof_valid);
}

#[test]
fn chain_feed_starts_at_genesis_and_confirms_after_five_blocks() {
    let store = MemoryStore::new();
    let dyn_store: Arc<dyn DocumentStore> = Arc::new(store.clone());
    let clock = Arc::new(FixedClock::new(0));
    let feed = Arc::new(SimulatedChainFeed::open(dyn_store.clone(), clock.clone()).unwrap());
    let ledger = AnchorLedger::new(
        dyn_store,
        Arc::new(SimulatedBackend::new(clock)),
    );
    let spv = SpvChecker::new(feed.clone());

    let root = Hash32([0xaa; 32]);
    ledger.anchor(&root).unwrap();
    let anchor = ledger.confirm(&root, 5).unwrap();
    assert_eq!(feed.tip().unwrap().unwrap().height, 0);
    assert!(!spv.is_confirmed(&anchor).unwrap());

    feed.append(5).unwrap();
    assert!(spv.is_confirmed(&anchor).unwrap());
}
