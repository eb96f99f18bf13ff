//! Deterministic per-record authentication tags
//!
//! The tag is HMAC-SHA256 over the canonical encoding of the record, keyed
//! with the device secret. It stands in for a hardware-backed device
//! signature; the [`RecordSigner`] trait is the seam where a TPM or HSM
//! signer would plug in.
//!
//! The leaf payload fed to the Merkle tree is the canonical encoding of
//! `{"record": <record>, "sig": <hex tag>}`.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;
use std::fmt;

use crate::canonical;
use crate::errors::{AnchorageError, Result};
use crate::record::Record;

type HmacSha256 = Hmac<Sha256>;

/// Key used to authenticate records from one device
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceSecret(Vec<u8>);

impl DeviceSecret {
    /// Wrap raw key bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether the secret has no bytes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for DeviceSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceSecret(<{} bytes>)", self.0.len())
    }
}

/// 32-byte record authentication tag
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AuthTag(pub [u8; 32]);

impl AuthTag {
    /// Lowercase hex encoding
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for AuthTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthTag({})", self.to_hex())
    }
}

impl From<AuthTag> for String {
    fn from(tag: AuthTag) -> Self {
        tag.to_hex()
    }
}

impl TryFrom<String> for AuthTag {
    type Error = AnchorageError;

    fn try_from(value: String) -> Result<Self> {
        let bytes = hex::decode(&value)
            .map_err(|e| AnchorageError::serialization(format!("invalid tag hex: {e}")))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AnchorageError::serialization("tag must be 32 bytes"))?;
        Ok(Self(array))
    }
}

/// Compute the authentication tag for a record
///
/// Pure and deterministic: identical records and secrets always produce
/// identical tags.
pub fn sign(record: &Record, secret: &DeviceSecret) -> Result<AuthTag> {
    let payload = canonical::to_canonical_vec(record)?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AnchorageError::invalid_record(format!("unusable device secret: {e}")))?;
    mac.update(&payload);
    Ok(AuthTag(mac.finalize().into_bytes().into()))
}

/// Canonical leaf payload bytes for a record and its tag
pub fn leaf_payload(record: &Record, tag: &AuthTag) -> Result<Vec<u8>> {
    let mut envelope = Map::new();
    envelope.insert("record".to_string(), record.to_value());
    envelope.insert("sig".to_string(), Value::String(tag.to_hex()));
    canonical::encode_value(&Value::Object(envelope))
}

/// Produces authentication tags and leaf payloads for records
pub trait RecordSigner: Send + Sync {
    /// Authentication tag for `record`
    fn sign(&self, record: &Record) -> Result<AuthTag>;

    /// Leaf payload for `record`, recomputed on every call
    fn leaf_payload(&self, record: &Record) -> Result<Vec<u8>> {
        let tag = self.sign(record)?;
        leaf_payload(record, &tag)
    }
}

/// HMAC-SHA256 record signer holding a device secret
#[derive(Debug, Clone)]
pub struct HmacRecordSigner {
    secret: DeviceSecret,
}

impl HmacRecordSigner {
    /// Create a signer for the given device secret
    pub fn new(secret: DeviceSecret) -> Self {
        Self { secret }
    }
}

impl RecordSigner for HmacRecordSigner {
    fn sign(&self, record: &Record) -> Result<AuthTag> {
        sign(record, &self.secret)
    }
}
