//! Anchorage Core - Commitment Primitives
//!
//! Pure, synchronous building blocks of the gateway commitment pipeline. No
//! storage, no I/O beyond reading the wall clock.
//!
//! # Layers
//!
//! ## Encoding
//! - `canonical`: sorted-key compact JSON, the only encoding that is ever hashed
//! - `record`: validated immutable records carrying a `record_id`
//!
//! ## Cryptography
//! - `hash`: SHA-256 and the [`Hash32`] wire type
//! - `signer`: HMAC-SHA256 authentication tags and leaf payloads
//! - `merkle`: duplicate-last-node Merkle trees and side-flagged proofs
//!
//! ## Persisted shapes
//! - `types`: manifests, anchors and chain headers as stored
//!
//! ## Invariants
//! - `root(L)` and `sign(record, secret)` are deterministic
//! - `verify(L[i], proof(L, i), i, root(L))` holds for every valid `i`
//! - Anchor confirmations never decrease

#![forbid(unsafe_code)]

/// Canonical JSON encoding
pub mod canonical;

/// Configuration validation helpers
pub mod config;

/// Unified error handling
pub mod errors;

/// SHA-256 hashing
pub mod hash;

/// Merkle commitments and inclusion proofs
pub mod merkle;

/// Gateway records
pub mod record;

/// Record authentication tags
pub mod signer;

/// Clock abstraction for deterministic tests
pub mod time;

/// Manifest, anchor and header documents
pub mod types;

// === Public API Re-exports ===

pub use config::{ConfigValidator, ValidationError, ValidationResult};
pub use errors::{AnchorageError, Result};
pub use hash::{hash_pair, Hash32};
pub use merkle::{
    merkle_proof, merkle_root, verify_proof, InclusionProof, MerkleTree, ProofStep, Side,
    EMPTY_ROOT,
};
pub use record::{Record, RecordBuilder, RECORD_ID_FIELD};
pub use signer::{AuthTag, DeviceSecret, HmacRecordSigner, RecordSigner};
pub use time::{Clock, FixedClock, SystemClock};
pub use types::{Anchor, AnchorState, Batch, BroadcastReceipt, ChainHeader, ManifestItem};
