// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Committed-state index shared by every store implementation.
//!
//! The index is the fold of the ledger: applying entries 1..=n in order yields
//! the registry state after n commits. Writers go through two steps: `prepare`
//! checks an operation against current state and builds the next entry, then
//! `apply` links and folds it in. Replay only calls `apply`, which re-checks
//! the same rules, so a ledger that would not have been accepted live is
//! rejected on load.

use std::collections::BTreeMap;

use crate::batch::Batch;
use crate::error::RegistryError;
use crate::ident::{BatchId, Identity};
use crate::ledger::{EntryHash, LedgerEntry, LedgerOp};

use super::{EventKind, LedgerHead, ProvenanceEvent, Receipt};

#[derive(Debug, Clone)]
struct Record {
    batch: Batch,
    events: Vec<ProvenanceEvent>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Index {
    records: BTreeMap<BatchId, Record>,
    head: LedgerHead,
}

impl Index {
    pub(crate) fn contains(&self, id: &BatchId) -> bool {
        self.records.contains_key(id)
    }

    pub(crate) fn batch(&self, id: &BatchId) -> Result<Batch, RegistryError> {
        self.records
            .get(id)
            .map(|r| r.batch.clone())
            .ok_or_else(|| RegistryError::BatchNotFound(id.clone()))
    }

    pub(crate) fn events(&self, id: &BatchId) -> Result<Vec<ProvenanceEvent>, RegistryError> {
        self.records
            .get(id)
            .map(|r| r.events.clone())
            .ok_or_else(|| RegistryError::BatchNotFound(id.clone()))
    }

    pub(crate) fn head(&self) -> LedgerHead {
        self.head
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Build the entry that would create `batch`.
    pub(crate) fn prepare_create(&self, batch: Batch) -> Result<LedgerEntry, RegistryError> {
        if self.contains(batch.id()) {
            return Err(RegistryError::DuplicateBatch(batch.id().clone()));
        }
        Ok(self.next_entry(LedgerOp::Create(batch)))
    }

    /// Build the entry that would hand `id` to `to`, recording the current owner.
    pub(crate) fn prepare_transfer(
        &self,
        id: &BatchId,
        to: Identity,
    ) -> Result<LedgerEntry, RegistryError> {
        let record = self
            .records
            .get(id)
            .ok_or_else(|| RegistryError::BatchNotFound(id.clone()))?;
        Ok(self.next_entry(LedgerOp::Transfer {
            id: id.clone(),
            from: record.batch.owner(),
            to,
        }))
    }

    fn next_entry(&self, op: LedgerOp) -> LedgerEntry {
        LedgerEntry {
            seq: self.head.seq + 1,
            prev_hash: self.head.head_hash,
            op,
        }
    }

    /// Fold one sealed entry into the index.
    ///
    /// Returns a description of the violated rule when the entry does not
    /// extend the chain or contradicts current state; the index is unchanged
    /// in that case.
    pub(crate) fn apply(&mut self, entry: LedgerEntry, hash: EntryHash) -> Result<Receipt, String> {
        if entry.seq != self.head.seq + 1 {
            return Err(format!(
                "sequence gap: expected {}, got {}",
                self.head.seq + 1,
                entry.seq
            ));
        }
        if entry.prev_hash != self.head.head_hash {
            return Err(format!(
                "broken chain at seq {}: prev_hash {} does not match head {}",
                entry.seq, entry.prev_hash, self.head.head_hash
            ));
        }

        let seq = entry.seq;
        match entry.op {
            LedgerOp::Create(batch) => {
                if self.contains(batch.id()) {
                    return Err(format!("seq {seq}: duplicate create of {}", batch.id()));
                }
                let event = ProvenanceEvent {
                    seq,
                    entry_hash: hash,
                    kind: EventKind::Created {
                        owner: batch.owner(),
                    },
                };
                self.records.insert(
                    batch.id().clone(),
                    Record {
                        batch,
                        events: vec![event],
                    },
                );
            }
            LedgerOp::Transfer { id, from, to } => {
                if to.is_null() {
                    return Err(format!("seq {seq}: transfer of {id} to the null identity"));
                }
                let record = self
                    .records
                    .get_mut(&id)
                    .ok_or_else(|| format!("seq {seq}: transfer of unknown batch {id}"))?;
                if record.batch.owner() != from {
                    return Err(format!(
                        "seq {seq}: transfer of {id} from {from}, but owner is {}",
                        record.batch.owner()
                    ));
                }
                record.batch.set_owner(to);
                record.events.push(ProvenanceEvent {
                    seq,
                    entry_hash: hash,
                    kind: EventKind::Transferred { from, to },
                });
            }
        }

        self.head = LedgerHead {
            seq,
            head_hash: hash,
        };
        Ok(Receipt {
            seq,
            entry_hash: hash,
        })
    }
}
