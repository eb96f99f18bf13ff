//! Process-level ingest and verify flows
//!
//! Ingest commits records in windows, anchors each root, lets the chain
//! grow by `confirm_after_blocks` and confirms the anchor at the first new
//! block. Verify delegates to [`RecordVerifier`].

use std::sync::Arc;

use anchorage_core::{
    Anchor, AnchorageError, Batch, Clock, Hash32, HmacRecordSigner, Record, RecordSigner, Result,
};
use anchorage_store::DocumentStore;
use serde::Serialize;
use tracing::info;

use crate::backend::{AnchoringBackend, SimulatedBackend};
use crate::batch::BatchBuilder;
use crate::chain::{ChainHeadFeed, SimulatedChainFeed};
use crate::config::GatewayConfig;
use crate::ledger::AnchorLedger;
use crate::spv::SpvChecker;
use crate::verify::{RecordVerifier, VerifyOutcome};

/// Per-batch result of an ingest run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// Batch root
    pub merkle_root: Hash32,
    /// Records in the batch
    pub count: usize,
    /// Receipt id returned by the backend
    pub receipt_id: String,
    /// Height the anchor was confirmed at, if the chain grew
    pub block_height: Option<u64>,
    /// Confirmations after the run
    pub confirmations: u64,
}

impl BatchOutcome {
    fn from_anchor(anchor: &Anchor, count: usize) -> Self {
        Self {
            merkle_root: anchor.merkle_root,
            count,
            receipt_id: anchor.receipt_id.clone(),
            block_height: anchor.block_height,
            confirmations: anchor.confirmations,
        }
    }
}

/// Summary of an ingest run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Records read
    pub records: usize,
    /// One entry per committed batch, in order
    pub batches: Vec<BatchOutcome>,
}

/// Collaborators a gateway is assembled from
pub struct GatewayParts {
    /// Document store
    pub store: Arc<dyn DocumentStore>,
    /// Record signer
    pub signer: Arc<dyn RecordSigner>,
    /// Anchoring backend
    pub backend: Arc<dyn AnchoringBackend>,
    /// Chain head feed
    pub feed: Arc<dyn ChainHeadFeed>,
    /// Clock for manifests
    pub clock: Arc<dyn Clock>,
}

/// Commitment pipeline wired end to end
pub struct Gateway {
    config: GatewayConfig,
    store: Arc<dyn DocumentStore>,
    builder: BatchBuilder,
    ledger: AnchorLedger,
    feed: Arc<dyn ChainHeadFeed>,
    spv: SpvChecker,
    verifier: RecordVerifier,
}

impl Gateway {
    /// Assemble a gateway from explicit collaborators
    pub fn new(config: GatewayConfig, parts: GatewayParts) -> Result<Self> {
        config.validate()?;
        let builder = BatchBuilder::new(
            config.window_size,
            parts.signer.clone(),
            parts.store.clone(),
            parts.clock,
        )?;
        let ledger = AnchorLedger::new(parts.store.clone(), parts.backend)
            .with_policy(config.reanchor_policy);
        let verifier = RecordVerifier::new(
            parts.store.clone(),
            parts.signer,
            SpvChecker::new(parts.feed.clone()),
        );
        Ok(Self {
            config,
            store: parts.store,
            builder,
            ledger,
            spv: SpvChecker::new(parts.feed.clone()),
            feed: parts.feed,
            verifier,
        })
    }

    /// Gateway over `store` using the HMAC signer and simulation doubles
    pub fn simulated(
        config: GatewayConfig,
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let signer = Arc::new(HmacRecordSigner::new(config.device_secret()?));
        let feed = Arc::new(SimulatedChainFeed::open(store.clone(), clock.clone())?);
        let backend = Arc::new(SimulatedBackend::open(store.clone(), clock.clone())?);
        Self::new(
            config,
            GatewayParts {
                store,
                signer,
                backend,
                feed,
                clock,
            },
        )
    }

    /// Active configuration
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Anchor ledger
    pub fn ledger(&self) -> &AnchorLedger {
        &self.ledger
    }

    /// Chain head feed
    pub fn feed(&self) -> &dyn ChainHeadFeed {
        self.feed.as_ref()
    }

    /// SPV checker over the gateway's feed
    pub fn spv(&self) -> &SpvChecker {
        &self.spv
    }

    /// Commit, anchor and confirm `records`
    ///
    /// Fails on the first window or backend error; batches before the
    /// failure stay committed and anchored. The store is flushed either way.
    pub fn ingest(&self, records: &[Record]) -> Result<IngestReport> {
        let result = self.ingest_inner(records);
        let flushed = self.store.flush();
        let report = result?;
        flushed?;
        Ok(report)
    }

    fn ingest_inner(&self, records: &[Record]) -> Result<IngestReport> {
        let batches = self.builder.build_batches(records)?;
        let mut report = IngestReport {
            records: records.len(),
            batches: Vec::with_capacity(batches.len()),
        };

        for batch in &batches {
            let mut anchor = self.ledger.anchor(&batch.merkle_root)?;
            let grown = self.feed.append(self.config.confirm_after_blocks)?;
            if let Some(first) = grown.first() {
                anchor = self.ledger.confirm(&batch.merkle_root, first.height)?;
                if let Some(depth) = self.spv.depth(&anchor)? {
                    anchor = self.ledger.record_depth(&batch.merkle_root, depth)?;
                }
            }
            report
                .batches
                .push(BatchOutcome::from_anchor(&anchor, batch.count));
        }

        info!(
            records = report.records,
            batches = report.batches.len(),
            "ingest complete"
        );
        Ok(report)
    }

    /// Verify inclusion and confirmation of one record
    pub fn verify(&self, record_id: &str) -> Result<VerifyOutcome> {
        self.verifier.verify(record_id)
    }

    /// Manifest committed under `root`; `BatchNotFound` if there is none
    pub fn batch(&self, root: &Hash32) -> Result<Batch> {
        self.verifier.batch(root)
    }

    /// Grow the chain by `blocks` and refresh every confirmed anchor's depth
    pub fn grow_chain(&self, blocks: u64) -> Result<u64> {
        self.feed.append(blocks)?;
        for anchor in self.ledger.anchors()? {
            if let Some(depth) = self.spv.depth(&anchor)? {
                self.ledger.record_depth(&anchor.merkle_root, depth)?;
            }
        }
        self.store.flush()?;
        let tip = self
            .feed
            .tip()?
            .ok_or_else(|| AnchorageError::chain_feed("feed has no headers"))?;
        Ok(tip.height)
    }
}
