// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Read-only verification lookups.
//!
//! A verifier wants one of two answers, "this batch is on record as X" or
//! "there is no such batch", and must never confuse the second with an empty
//! record. [`QueryInterface`] folds `BatchNotFound` into [`Verification::NotFound`]
//! and reserves the `Err` channel for ledger failures, which are neither.

use serde::Serialize;

use crate::batch::Batch;
use crate::error::RegistryError;
use crate::ident::BatchId;
use crate::registry::Registry;
use crate::store::{BatchStore, LedgerHead, ProvenanceEvent};

/// Outcome of a verification lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verification {
    /// The batch is on record.
    Found {
        /// The committed record.
        batch: Batch,
    },
    /// No batch with this id has ever been created.
    NotFound {
        /// The id that was looked up.
        id: BatchId,
    },
}

impl Verification {
    /// Returns `true` for [`Verification::Found`].
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    /// The record, if found.
    pub fn batch(&self) -> Option<&Batch> {
        match self {
            Self::Found { batch } => Some(batch),
            Self::NotFound { .. } => None,
        }
    }
}

/// Read-only handle over a [`Registry`]. Has no write methods.
#[derive(Debug, Clone, Copy)]
pub struct QueryInterface<'r, S> {
    registry: &'r Registry<S>,
}

impl<'r, S: BatchStore> QueryInterface<'r, S> {
    pub(crate) fn new(registry: &'r Registry<S>) -> Self {
        Self { registry }
    }

    /// Look up `id` for display as an authenticity result.
    ///
    /// # Errors
    ///
    /// Only ledger failures; absence is [`Verification::NotFound`].
    pub fn verify(&self, id: &BatchId) -> Result<Verification, RegistryError> {
        match self.registry.read(id) {
            Ok(batch) => Ok(Verification::Found { batch }),
            Err(RegistryError::BatchNotFound(id)) => Ok(Verification::NotFound { id }),
            Err(err) => Err(err),
        }
    }

    /// Provenance trail of `id`, or `None` if no such batch exists.
    pub fn provenance(&self, id: &BatchId) -> Result<Option<Vec<ProvenanceEvent>>, RegistryError> {
        match self.registry.history(id) {
            Ok(events) => Ok(Some(events)),
            Err(RegistryError::BatchNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Tip of the ledger's hash chain, for auditors pinning a point in history.
    pub fn head(&self) -> Result<LedgerHead, RegistryError> {
        self.registry.head()
    }
}
