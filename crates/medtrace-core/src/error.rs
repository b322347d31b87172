// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error taxonomy for the registry and its ledger.
//!
//! Four domain kinds (`DuplicateBatch`, `BatchNotFound`, `Unauthorized`,
//! `InvalidInput`) are kept apart from each other and from ledger/storage
//! failures. Boundary layers switch on [`RegistryError::kind`] and must not
//! collapse them into one message.

use std::path::PathBuf;

use thiserror::Error;

use crate::guard::DenyReason;
use crate::ident::{BatchId, Identity, LedgerInstanceId};

/// Why a caller-supplied value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidInput {
    /// A required text field was empty (or only whitespace).
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    /// A text field exceeded its byte budget.
    #[error("{field} is {len} bytes, limit is {max}")]
    FieldTooLong {
        /// Field name.
        field: &'static str,
        /// Maximum accepted byte length.
        max: usize,
        /// Actual byte length.
        len: usize,
    },
    /// A text field contained a control character.
    #[error("{0} must not contain control characters")]
    ControlCharacter(&'static str),
    /// A batch id carried leading or trailing whitespace.
    #[error("batch id {0:?} has surrounding whitespace")]
    PaddedBatchId(String),
    /// Text that is not a 20-byte hex address.
    #[error("malformed identity {0:?}")]
    MalformedIdentity(String),
    /// The null identity was offered where an owner is required.
    #[error("{0} must not be the null identity")]
    NullIdentity(&'static str),
    /// Text that is not a 32-byte hex instance id.
    #[error("malformed ledger instance id {0:?}")]
    MalformedInstanceId(String),
    /// Text that is not a 32-byte hex entry hash.
    #[error("malformed entry hash {0:?}")]
    MalformedHash(String),
}

/// Failures of the durable ledger itself, independent of registry rules.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Underlying file I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// An entry could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),
    /// The ledger file failed an integrity check while being read.
    #[error("corrupt ledger at offset {offset}: {detail}")]
    Corrupt {
        /// Byte offset of the offending header or frame.
        offset: u64,
        /// What was wrong.
        detail: String,
    },
    /// The ledger file belongs to another instance.
    #[error("ledger instance mismatch: expected {expected}, found {found}")]
    InstanceMismatch {
        /// Instance the caller asked for.
        expected: LedgerInstanceId,
        /// Instance recorded in the file header.
        found: LedgerInstanceId,
    },
    /// `create` was asked to publish over an existing file.
    #[error("ledger already exists at {0}")]
    AlreadyExists(PathBuf),
    /// Another handle holds the ledger file open for writing.
    #[error("ledger {0} is locked by another writer")]
    Locked(PathBuf),
    /// The ledger was opened as a read-only snapshot.
    #[error("ledger {0} was opened read-only")]
    ReadOnly(PathBuf),
    /// A failed append could not be rolled back; the file ends in a torn
    /// frame past `offset` and no further writes are accepted.
    #[error("ledger tail past offset {offset} is damaged; writes refused")]
    TailDamaged {
        /// Length of the last intact frame boundary.
        offset: u64,
    },
    /// A lock was poisoned by a panicking writer.
    #[error("ledger lock poisoned")]
    Poisoned,
}

/// Coarse error classification for boundary layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Creation collided with an existing id.
    DuplicateBatch,
    /// Lookup or transfer named an absent id.
    BatchNotFound,
    /// Transfer attempted by a non-owner.
    Unauthorized,
    /// Empty or malformed input.
    InvalidInput,
    /// Storage failure; not caused by the request.
    Ledger,
}

impl ErrorKind {
    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            Self::DuplicateBatch => "DUPLICATE_BATCH",
            Self::BatchNotFound => "BATCH_NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidInput => "INVALID_INPUT",
            Self::Ledger => "LEDGER",
        }
    }
}

/// Error returned by every registry operation.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A batch with this id was already created.
    #[error("[DUPLICATE_BATCH] batch {0} already exists")]
    DuplicateBatch(BatchId),
    /// No batch with this id exists.
    #[error("[BATCH_NOT_FOUND] batch {0} does not exist")]
    BatchNotFound(BatchId),
    /// The caller may not transfer this batch.
    #[error("[UNAUTHORIZED] {caller} may not transfer batch {id}: {reason}")]
    Unauthorized {
        /// Batch the transfer targeted.
        id: BatchId,
        /// Identity that submitted the transfer.
        caller: Identity,
        /// Guard decision detail.
        reason: DenyReason,
    },
    /// The request carried an invalid field.
    #[error("[INVALID_INPUT] {0}")]
    InvalidInput(#[from] InvalidInput),
    /// The ledger failed underneath the registry.
    #[error("[LEDGER] {0}")]
    Ledger(#[from] LedgerError),
}

impl RegistryError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateBatch(_) => ErrorKind::DuplicateBatch,
            Self::BatchNotFound(_) => ErrorKind::BatchNotFound,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Ledger(_) => ErrorKind::Ledger,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_distinct_codes() {
        let id = BatchId::new("B1").unwrap();
        let dup = RegistryError::DuplicateBatch(id.clone());
        let missing = RegistryError::BatchNotFound(id.clone());
        let denied = RegistryError::Unauthorized {
            id,
            caller: Identity([0xCC; 20]),
            reason: DenyReason::NotOwner,
        };
        assert!(dup.to_string().starts_with("[DUPLICATE_BATCH]"));
        assert!(missing.to_string().starts_with("[BATCH_NOT_FOUND]"));
        assert!(denied.to_string().starts_with("[UNAUTHORIZED]"));
        assert_eq!(dup.kind().code(), "DUPLICATE_BATCH");
        assert_eq!(missing.kind(), ErrorKind::BatchNotFound);
        assert_eq!(denied.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn invalid_input_and_ledger_are_separate_kinds() {
        let bad: RegistryError = InvalidInput::EmptyField("name").into();
        let io: RegistryError = LedgerError::Poisoned.into();
        assert_eq!(bad.kind(), ErrorKind::InvalidInput);
        assert_eq!(io.kind(), ErrorKind::Ledger);
        assert_ne!(bad.kind().code(), io.kind().code());
    }
}
