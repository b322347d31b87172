// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Registry state machine.
//!
//! Each batch is either Unregistered or Registered(owner). `create` moves
//! Unregistered → Registered(creator); `transfer` moves Registered(owner) →
//! Registered(new_owner) when the caller is the owner; nothing moves back.
//!
//! The registry is the only writer of its store. Writes are serialized by a
//! gate held across the whole check-then-commit sequence, so a transfer that
//! loses a race re-reads the new owner and is denied instead of overwriting.
//! Reads bypass the gate.

use std::sync::Mutex;

use tracing::{debug, info, instrument, warn};

use crate::batch::Batch;
use crate::error::{LedgerError, RegistryError};
use crate::guard::{authorize, Decision};
use crate::ident::{BatchId, Identity};
use crate::query::QueryInterface;
use crate::store::{BatchStore, LedgerHead, ProvenanceEvent, Receipt};

/// Entry point for create, transfer, and read.
#[derive(Debug)]
pub struct Registry<S> {
    store: S,
    writes: Mutex<()>,
}

impl<S: BatchStore> Registry<S> {
    /// Take ownership of `store`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            writes: Mutex::new(()),
        }
    }

    /// Read-only access to the backing store (instance id, path, ...).
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read-only view for verifiers.
    pub fn query(&self) -> QueryInterface<'_, S> {
        QueryInterface::new(self)
    }

    /// Register a new batch owned by `creator`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::InvalidInput`] for blank/oversized text or a null creator.
    /// - [`RegistryError::DuplicateBatch`] if `id` exists; nothing is written.
    #[instrument(skip_all, fields(id = %id, creator = %creator))]
    pub fn create(
        &self,
        id: BatchId,
        name: &str,
        manufacturer: &str,
        creator: Identity,
    ) -> Result<Receipt, RegistryError> {
        let creator = creator.require_owner("creator").map_err(|e| {
            warn!(error = %e, "rejected create");
            e
        })?;
        let batch = Batch::new(id, name, manufacturer, creator).map_err(|e| {
            warn!(error = %e, "rejected create");
            e
        })?;

        let _gate = self.writes.lock().map_err(|_| LedgerError::Poisoned)?;
        if self.store.exists(batch.id())? {
            warn!("duplicate batch");
            return Err(RegistryError::DuplicateBatch(batch.id().clone()));
        }
        let receipt = self.store.insert(batch)?;
        info!(seq = receipt.seq, entry = %receipt.entry_hash, "batch created");
        Ok(receipt)
    }

    /// Hand `id` from its current owner to `new_owner`.
    ///
    /// Existence is checked before authorization, and authorization before
    /// mutation.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::InvalidInput`] if `new_owner` is the null identity.
    /// - [`RegistryError::BatchNotFound`] if `id` is absent.
    /// - [`RegistryError::Unauthorized`] if `caller` is not the current owner.
    #[instrument(skip_all, fields(id = %id, to = %new_owner, caller = %caller))]
    pub fn transfer(
        &self,
        id: &BatchId,
        new_owner: Identity,
        caller: Identity,
    ) -> Result<Receipt, RegistryError> {
        let new_owner = new_owner.require_owner("new_owner").map_err(|e| {
            warn!(error = %e, "rejected transfer");
            e
        })?;

        let _gate = self.writes.lock().map_err(|_| LedgerError::Poisoned)?;
        let batch = self.store.get(id)?;
        if let Decision::Deny(reason) = authorize(&batch, caller) {
            warn!(%reason, owner = %batch.owner(), "transfer denied");
            return Err(RegistryError::Unauthorized {
                id: id.clone(),
                caller,
                reason,
            });
        }
        let receipt = self.store.set_owner(id, new_owner)?;
        info!(seq = receipt.seq, entry = %receipt.entry_hash, "batch transferred");
        Ok(receipt)
    }

    /// Current record for `id`. No authorization: provenance is public.
    ///
    /// # Errors
    ///
    /// [`RegistryError::BatchNotFound`] if absent.
    pub fn read(&self, id: &BatchId) -> Result<Batch, RegistryError> {
        debug!(%id, "read");
        self.store.get(id)
    }

    /// Provenance trail for `id`, oldest first.
    pub fn history(&self, id: &BatchId) -> Result<Vec<ProvenanceEvent>, RegistryError> {
        self.store.history(id)
    }

    /// Tip of the ledger's hash chain.
    pub fn head(&self) -> Result<LedgerHead, RegistryError> {
        self.store.head()
    }
}
