// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory batch store.

use std::sync::RwLock;

use tracing::debug;

use crate::batch::Batch;
use crate::error::{LedgerError, RegistryError};
use crate::ident::{BatchId, Identity};

use super::{BatchStore, Index, LedgerHead, ProvenanceEvent, Receipt};

/// In-memory batch store.
///
/// Keeps the same hash-chained entries as the file ledger but never touches
/// disk; state is lost when the store is dropped. Each write runs under a
/// single write lock, so check-and-commit is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    index: RwLock<Index>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Index>, RegistryError> {
        self.index.read().map_err(|_| LedgerError::Poisoned.into())
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Index>, RegistryError> {
        self.index.write().map_err(|_| LedgerError::Poisoned.into())
    }
}

impl BatchStore for MemoryStore {
    fn exists(&self, id: &BatchId) -> Result<bool, RegistryError> {
        Ok(self.read()?.contains(id))
    }

    fn insert(&self, batch: Batch) -> Result<Receipt, RegistryError> {
        let mut index = self.write()?;
        let entry = index.prepare_create(batch)?;
        let (_, hash) = entry.seal()?;
        let receipt = index.apply(entry, hash).map_err(|detail| LedgerError::Corrupt {
            offset: 0,
            detail,
        })?;
        debug!(seq = receipt.seq, "memory store committed create");
        Ok(receipt)
    }

    fn get(&self, id: &BatchId) -> Result<Batch, RegistryError> {
        self.read()?.batch(id)
    }

    fn set_owner(&self, id: &BatchId, new_owner: Identity) -> Result<Receipt, RegistryError> {
        let mut index = self.write()?;
        let entry = index.prepare_transfer(id, new_owner)?;
        let (_, hash) = entry.seal()?;
        let receipt = index.apply(entry, hash).map_err(|detail| LedgerError::Corrupt {
            offset: 0,
            detail,
        })?;
        debug!(seq = receipt.seq, "memory store committed transfer");
        Ok(receipt)
    }

    fn history(&self, id: &BatchId) -> Result<Vec<ProvenanceEvent>, RegistryError> {
        self.read()?.events(id)
    }

    fn head(&self) -> Result<LedgerHead, RegistryError> {
        Ok(self.read()?.head())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::EventKind;

    fn alice() -> Identity {
        Identity([0xAA; 20])
    }

    fn b1() -> BatchId {
        BatchId::new("B1").unwrap()
    }

    fn paracetamol() -> Batch {
        Batch::new(b1(), "Paracetamol", "AcmePharma", alice()).unwrap()
    }

    #[test]
    fn insert_then_get() {
        let store = MemoryStore::new();
        assert!(!store.exists(&b1()).unwrap());
        store.insert(paracetamol()).unwrap();
        assert!(store.exists(&b1()).unwrap());
        assert_eq!(store.get(&b1()).unwrap(), paracetamol());
        assert_eq!(store.head().unwrap().seq, 1);
    }

    #[test]
    fn duplicate_insert_leaves_store_unchanged() {
        let store = MemoryStore::new();
        store.insert(paracetamol()).unwrap();
        let head = store.head().unwrap();

        let imposter = Batch::new(b1(), "Aspirin", "OtherCo", Identity([0xCC; 20])).unwrap();
        assert!(matches!(
            store.insert(imposter),
            Err(RegistryError::DuplicateBatch(_))
        ));
        assert_eq!(store.get(&b1()).unwrap(), paracetamol());
        assert_eq!(store.head().unwrap(), head);
    }

    #[test]
    fn set_owner_touches_only_owner() {
        let store = MemoryStore::new();
        store.insert(paracetamol()).unwrap();
        let bob = Identity([0xBB; 20]);
        let receipt = store.set_owner(&b1(), bob).unwrap();
        assert_eq!(receipt.seq, 2);

        let batch = store.get(&b1()).unwrap();
        assert_eq!(batch.owner(), bob);
        assert_eq!(batch.name(), "Paracetamol");
        assert_eq!(batch.manufacturer(), "AcmePharma");

        let history = store.history(&b1()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(
            history[1].kind,
            EventKind::Transferred {
                from: alice(),
                to: bob
            }
        );
    }

    #[test]
    fn absent_ids_are_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(store.get(&b1()), Err(RegistryError::BatchNotFound(_))));
        assert!(matches!(
            store.set_owner(&b1(), alice()),
            Err(RegistryError::BatchNotFound(_))
        ));
        assert!(matches!(
            store.history(&b1()),
            Err(RegistryError::BatchNotFound(_))
        ));
        assert_eq!(store.head().unwrap(), LedgerHead::default());
    }
}
