//! Unified error type for the commitment pipeline
//!
//! Every fallible operation in the workspace returns [`AnchorageError`].
//! Not-found variants are expected outcomes that callers usually turn into
//! reports; `Corruption` is reserved for persisted state that contradicts
//! itself.

use serde::{Deserialize, Serialize};

/// Error type for all Anchorage operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum AnchorageError {
    /// Record cannot be canonically encoded or is structurally invalid
    #[error("Invalid record: {message}")]
    InvalidRecord {
        /// What made the record unusable
        message: String,
    },

    /// Proof requested for a leaf that does not exist
    #[error("Leaf index {index} out of range for {len} leaves")]
    IndexOutOfRange {
        /// Requested leaf index
        index: usize,
        /// Number of leaves in the tree
        len: usize,
    },

    /// Confirmation or lookup against a root that was never anchored
    #[error("Anchor not found for root {root}")]
    AnchorNotFound {
        /// Hex-encoded commitment root
        root: String,
    },

    /// Re-anchoring rejected by a write-once policy
    #[error("Root {root} is already anchored")]
    AlreadyAnchored {
        /// Hex-encoded commitment root
        root: String,
    },

    /// No manifest item or raw record exists for the record id
    #[error("Record not found: {record_id}")]
    RecordNotFound {
        /// Requested record id
        record_id: String,
    },

    /// No batch manifest exists for the root
    #[error("Batch not found for root {root}")]
    BatchNotFound {
        /// Hex-encoded commitment root
        root: String,
    },

    /// The anchoring backend rejected or failed the broadcast
    #[error("Anchoring backend unavailable: {message}")]
    BackendUnavailable {
        /// Backend failure description
        message: String,
    },

    /// The chain head feed could not be read or extended
    #[error("Chain feed error: {message}")]
    ChainFeed {
        /// Feed failure description
        message: String,
    },

    /// Storage operation failed
    #[error("Storage error: {message}")]
    Storage {
        /// Storage failure description
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Serialization failure description
        message: String,
    },

    /// Persisted state violates a pipeline invariant
    #[error("Corruption detected: {message}")]
    Corruption {
        /// Which invariant was violated
        message: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Configuration failure description
        message: String,
    },
}

impl AnchorageError {
    /// Create an invalid record error
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Create an index out of range error
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { index, len }
    }

    /// Create an anchor not found error
    pub fn anchor_not_found(root: impl Into<String>) -> Self {
        Self::AnchorNotFound { root: root.into() }
    }

    /// Create an already anchored error
    pub fn already_anchored(root: impl Into<String>) -> Self {
        Self::AlreadyAnchored { root: root.into() }
    }

    /// Create a record not found error
    pub fn record_not_found(record_id: impl Into<String>) -> Self {
        Self::RecordNotFound {
            record_id: record_id.into(),
        }
    }

    /// Create a batch not found error
    pub fn batch_not_found(root: impl Into<String>) -> Self {
        Self::BatchNotFound { root: root.into() }
    }

    /// Create a backend unavailable error
    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            message: message.into(),
        }
    }

    /// Create a chain feed error
    pub fn chain_feed(message: impl Into<String>) -> Self {
        Self::ChainFeed {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a corruption error
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error reports a missing entity rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::AnchorNotFound { .. } | Self::RecordNotFound { .. } | Self::BatchNotFound { .. }
        )
    }
}

/// Standard Result type for Anchorage operations
pub type Result<T> = std::result::Result<T, AnchorageError>;

impl From<std::io::Error> for AnchorageError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(err.to_string())
    }
}

impl From<serde_json::Error> for AnchorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
