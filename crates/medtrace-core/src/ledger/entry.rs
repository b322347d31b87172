// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Ledger entries and their hash chain.
//!
//! Every committed write is one [`LedgerEntry`]: a sequence number, the hash of
//! the entry before it, and the operation. The entry hash is
//! `BLAKE3("entry:" || cbor(entry))`, computed over the exact payload bytes
//! that were written, so replay recomputes it without re-encoding.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::batch::Batch;
use crate::error::{InvalidInput, LedgerError};
use crate::ident::{BatchId, Identity};

/// A 32-byte BLAKE3 entry hash.
///
/// Serializes as lowercase hex in every format so receipts and history read
/// the same in JSON and in the ledger file.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntryHash(pub [u8; 32]);

impl EntryHash {
    /// Chain anchor: the `prev_hash` of the first entry.
    pub const ZERO: Self = Self([0u8; 32]);

    /// View the hash as bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for EntryHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for EntryHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryHash({self})")
    }
}

impl TryFrom<String> for EntryHash {
    type Error = InvalidInput;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&value, &mut bytes)
            .map_err(|_| InvalidInput::MalformedHash(value.clone()))?;
        Ok(Self(bytes))
    }
}

impl From<EntryHash> for String {
    fn from(value: EntryHash) -> Self {
        value.to_string()
    }
}

/// A state transition recorded on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerOp {
    /// Unregistered → Registered(owner).
    Create(Batch),
    /// Registered(from) → Registered(to).
    Transfer {
        /// Batch being handed over.
        id: BatchId,
        /// Owner at the time of commit.
        from: Identity,
        /// New owner.
        to: Identity,
    },
}

impl LedgerOp {
    /// The batch this operation touches.
    pub fn batch_id(&self) -> &BatchId {
        match self {
            Self::Create(batch) => batch.id(),
            Self::Transfer { id, .. } => id,
        }
    }
}

/// One link of the ledger's hash chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// 1-based position in the ledger.
    pub seq: u64,
    /// Hash of entry `seq - 1`, or [`EntryHash::ZERO`] for the first entry.
    pub prev_hash: EntryHash,
    /// The transition.
    pub op: LedgerOp,
}

impl LedgerEntry {
    /// Encode to CBOR.
    pub fn encode(&self) -> Result<Vec<u8>, LedgerError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| LedgerError::Codec(e.to_string()))?;
        Ok(buf)
    }

    /// Decode from CBOR. Field validation (ids, identities, text) runs here.
    pub fn decode(payload: &[u8]) -> Result<Self, LedgerError> {
        ciborium::from_reader(payload).map_err(|e| LedgerError::Codec(e.to_string()))
    }

    /// Encode and hash in one step.
    pub fn seal(&self) -> Result<(Vec<u8>, EntryHash), LedgerError> {
        let payload = self.encode()?;
        let hash = entry_hash(&payload);
        Ok((payload, hash))
    }
}

/// Produces the domain-separated entry hash (prefix `b"entry:"`) of an encoded entry.
pub fn entry_hash(payload: &[u8]) -> EntryHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"entry:");
    hasher.update(payload);
    EntryHash(hasher.finalize().into())
}
