// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Batch record store.
//!
//! [`BatchStore`] is the seam between the registry and durable storage. Two
//! implementations ship: [`MemoryStore`] for tests and ephemeral nodes, and
//! [`FileLedger`](crate::ledger::FileLedger) for a persistent ledger instance.
//! Both keep the same hash chain, so receipts and history look identical.
//!
//! # Atomicity
//!
//! `insert` and `set_owner` each commit one ledger entry. All of a record's
//! fields become visible together or not at all; a failed call leaves the
//! store unchanged.
//!
//! # Absence Semantics
//!
//! Unlike a content-addressed lookup table, absence here is an answer the
//! caller must act on: `get`, `set_owner` and `history` fail with
//! [`RegistryError::BatchNotFound`] rather than returning an empty value.

mod index;
mod memory;

pub(crate) use index::Index;
pub use memory::MemoryStore;

use serde::Serialize;

use crate::batch::Batch;
use crate::error::RegistryError;
use crate::ident::{BatchId, Identity};
use crate::ledger::EntryHash;

/// Commit acknowledgment for one write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Receipt {
    /// Ledger position of the committed entry.
    pub seq: u64,
    /// Hash of the committed entry.
    pub entry_hash: EntryHash,
}

/// Tip of the ledger's hash chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LedgerHead {
    /// Number of committed entries.
    pub seq: u64,
    /// Hash of the latest entry ([`EntryHash::ZERO`] when empty).
    pub head_hash: EntryHash,
}

/// One step in a batch's provenance trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvenanceEvent {
    /// Ledger position of the entry that recorded this step.
    pub seq: u64,
    /// Hash of that entry.
    pub entry_hash: EntryHash,
    /// What happened.
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Kind of provenance step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    /// The batch was registered with its first owner.
    Created {
        /// Creator and first owner.
        owner: Identity,
    },
    /// Custody moved.
    Transferred {
        /// Previous owner.
        from: Identity,
        /// New owner.
        to: Identity,
    },
}

/// Durable mapping from batch id to record.
///
/// Methods take `&self`; implementations serialize their own writes so a store
/// can sit behind an `Arc` shared by request handlers. Reads reflect the latest
/// committed state and never observe a write in flight.
pub trait BatchStore: Send + Sync {
    /// Whether a batch with this id has been committed.
    fn exists(&self, id: &BatchId) -> Result<bool, RegistryError>;

    /// Commit a new record.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateBatch`] if the id already exists; the existing
    /// record is untouched.
    fn insert(&self, batch: Batch) -> Result<Receipt, RegistryError>;

    /// Fetch a committed record.
    ///
    /// # Errors
    ///
    /// [`RegistryError::BatchNotFound`] if absent.
    fn get(&self, id: &BatchId) -> Result<Batch, RegistryError>;

    /// Replace only the owner of a committed record.
    ///
    /// # Errors
    ///
    /// [`RegistryError::BatchNotFound`] if absent.
    fn set_owner(&self, id: &BatchId, new_owner: Identity) -> Result<Receipt, RegistryError>;

    /// Provenance trail of a committed record, oldest first.
    ///
    /// # Errors
    ///
    /// [`RegistryError::BatchNotFound`] if absent.
    fn history(&self, id: &BatchId) -> Result<Vec<ProvenanceEvent>, RegistryError>;

    /// Current tip of the hash chain.
    fn head(&self) -> Result<LedgerHead, RegistryError>;
}
