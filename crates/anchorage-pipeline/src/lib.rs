//! Anchorage Pipeline - Batching, Anchoring and Verification
//!
//! Drives the core primitives against a [`DocumentStore`](anchorage_store::DocumentStore):
//!
//! - [`BatchBuilder`]: windows records and persists manifests
//! - [`AnchoringBackend`]: publishes roots; [`SimulatedBackend`] stands in for a chain
//! - [`AnchorLedger`]: Broadcast -> Confirmed lifecycle per root
//! - [`ChainHeadFeed`]: header sequence; [`SimulatedChainFeed`] persists to the store
//! - [`SpvChecker`]: relative-depth confirmation
//! - [`RecordVerifier`]: inclusion and confirmation report for one record
//! - [`Gateway`]: ingest and verify, configured by [`GatewayConfig`]
//!
//! Everything is synchronous. Only backend and feed calls may be slow or
//! fail, and nothing is retried automatically.

#![forbid(unsafe_code)]

/// Anchoring backends
pub mod backend;

/// Windowed batch construction
pub mod batch;

/// Chain head feeds
pub mod chain;

/// Gateway configuration
pub mod config;

/// Ingest and verify flows
pub mod gateway;

/// Anchor lifecycle
pub mod ledger;

/// Confirmation-depth checks
pub mod spv;

/// Record verification
pub mod verify;

pub use backend::{AnchoringBackend, BroadcastEntry, SimulatedBackend};
pub use batch::BatchBuilder;
pub use chain::{ChainHeadFeed, SimulatedChainFeed};
pub use config::GatewayConfig;
pub use gateway::{BatchOutcome, Gateway, GatewayParts, IngestReport};
pub use ledger::{block_hash_for, AnchorLedger, ReanchorPolicy};
pub use spv::SpvChecker;
pub use verify::{AnchorStatus, RecordVerifier, VerificationReport, VerifyOutcome};
