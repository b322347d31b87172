// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Durable, append-only ledger instance.
//!
//! A [`FileLedger`] is one registry instance: a single file holding a header
//! (magic, version, [`LedgerInstanceId`]) followed by checksummed frames, each
//! carrying one hash-chained [`LedgerEntry`]. Opening a ledger replays every
//! frame through the same rules the registry enforces live, so a file whose
//! bytes, order, or history were edited is refused rather than served.
//!
//! # Finality
//!
//! A write is final when `insert`/`set_owner` returns: the frame has been
//! written and `sync_data`'d, and only then is the in-memory index updated.
//! Readers consult the index and never wait for a pending append's I/O.
//!
//! # Single writer
//!
//! A writable handle takes an exclusive advisory lock on the file, so a
//! second [`FileLedger::open`] on the same path fails with
//! [`LedgerError::Locked`] until the first handle is dropped. Writers inside
//! one handle are serialized by the tail mutex. [`FileLedger::open_read_only`]
//! and [`FileLedger::verify`] take no lock and see the file as of the call.

mod entry;
mod frame;

pub use entry::{entry_hash, EntryHash, LedgerEntry, LedgerOp};
pub use frame::{FrameError, FRAME_OVERHEAD, HEADER_LEN, MAGIC, VERSION};

use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{ErrorKind as IoErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, error, info, instrument};

use crate::batch::Batch;
use crate::error::{LedgerError, RegistryError};
use crate::ident::{make_instance_id, BatchId, Identity, LedgerInstanceId};
use crate::store::{BatchStore, Index, LedgerHead, ProvenanceEvent, Receipt};

/// Result of an offline integrity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSummary {
    /// Instance recorded in the header.
    pub instance: LedgerInstanceId,
    /// Tip of the verified chain.
    pub head: LedgerHead,
    /// Number of registered batches.
    pub batches: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TailState {
    Writable,
    ReadOnly,
    Damaged,
}

struct Tail {
    file: File,
    len: u64,
    state: TailState,
}

impl Tail {
    fn writable(file: File, len: u64) -> Self {
        Self {
            file,
            len,
            state: TailState::Writable,
        }
    }

    /// Append one frame and flush it to stable storage. A failed append is
    /// truncated back to the last frame boundary; if that also fails the tail
    /// is marked damaged and every later append is refused.
    fn append(&mut self, path: &Path, frame: &[u8]) -> Result<(), LedgerError> {
        match self.state {
            TailState::Writable => {}
            TailState::ReadOnly => return Err(LedgerError::ReadOnly(path.to_path_buf())),
            TailState::Damaged => return Err(LedgerError::TailDamaged { offset: self.len }),
        }
        let result = self
            .file
            .write_all(frame)
            .and_then(|()| self.file.sync_data());
        if let Err(err) = result {
            if let Err(rollback) = self.file.set_len(self.len) {
                error!(%err, %rollback, offset = self.len, "append rollback failed; ledger tail damaged");
                self.state = TailState::Damaged;
            }
            return Err(err.into());
        }
        self.len += frame.len() as u64;
        Ok(())
    }
}

/// File-backed ledger instance.
pub struct FileLedger {
    path: PathBuf,
    instance: LedgerInstanceId,
    tail: Mutex<Tail>,
    index: RwLock<Index>,
}

impl std::fmt::Debug for FileLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLedger")
            .field("path", &self.path)
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}

fn corrupt(offset: usize, detail: impl ToString) -> LedgerError {
    LedgerError::Corrupt {
        offset: offset as u64,
        detail: detail.to_string(),
    }
}

fn replay(bytes: &[u8]) -> Result<(LedgerInstanceId, Index), LedgerError> {
    let instance = frame::decode_header(bytes).map_err(|e| corrupt(0, e))?;
    let mut index = Index::default();
    let mut offset = HEADER_LEN;
    while offset < bytes.len() {
        let (payload, used) =
            frame::decode_frame(&bytes[offset..]).map_err(|e| corrupt(offset, e))?;
        let entry = LedgerEntry::decode(payload).map_err(|e| corrupt(offset, e))?;
        let id = entry.op.batch_id().clone();
        index
            .apply(entry, entry_hash(payload))
            .map_err(|detail| corrupt(offset, format!("batch {id}: {detail}")))?;
        offset += used;
    }
    Ok((instance, index))
}

fn lock_exclusive(file: &File, path: &Path) -> Result<(), LedgerError> {
    match file.try_lock() {
        Ok(()) => Ok(()),
        Err(TryLockError::WouldBlock) => Err(LedgerError::Locked(path.to_path_buf())),
        Err(TryLockError::Error(err)) => Err(err.into()),
    }
}

impl FileLedger {
    /// Publish a new, empty ledger instance at `path`.
    ///
    /// The instance id is derived from `label` and a fresh nonce, so two
    /// instances published under one label still get distinct ids.
    ///
    /// # Errors
    ///
    /// [`LedgerError::AlreadyExists`] if `path` exists; the file is not touched.
    #[instrument(skip_all, fields(path = %path.as_ref().display(), label = %label))]
    pub fn create(path: impl AsRef<Path>, label: &str) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default()
            .to_le_bytes();
        let mut seed = nonce.to_vec();
        seed.extend_from_slice(&std::process::id().to_le_bytes());
        let instance = make_instance_id(label, &seed);

        let mut file = match OpenOptions::new().append(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == IoErrorKind::AlreadyExists => {
                return Err(LedgerError::AlreadyExists(path.to_path_buf()));
            }
            Err(err) => return Err(err.into()),
        };
        lock_exclusive(&file, path)?;
        let header = frame::encode_header(&instance);
        file.write_all(&header)?;
        file.sync_all()?;
        info!(%instance, "published ledger instance");

        Ok(Self {
            path: path.to_path_buf(),
            instance,
            tail: Mutex::new(Tail::writable(file, HEADER_LEN as u64)),
            index: RwLock::new(Index::default()),
        })
    }

    /// Open and replay an existing ledger for writing, whatever its instance.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Locked`] if another handle already has it open for writing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        Self::open_inner(path.as_ref(), None, TailState::Writable)
    }

    /// Open an existing ledger, refusing a file that belongs to another instance.
    pub fn open_instance(
        path: impl AsRef<Path>,
        expected: LedgerInstanceId,
    ) -> Result<Self, LedgerError> {
        Self::open_inner(path.as_ref(), Some(expected), TailState::Writable)
    }

    /// Replay a ledger into a snapshot that serves reads but refuses writes
    /// with [`LedgerError::ReadOnly`]. Takes no lock, so it works while a
    /// writer holds the file; commits made after the call are not seen.
    pub fn open_read_only(
        path: impl AsRef<Path>,
        expected: Option<LedgerInstanceId>,
    ) -> Result<Self, LedgerError> {
        Self::open_inner(path.as_ref(), expected, TailState::ReadOnly)
    }

    #[instrument(skip_all, fields(path = %path.display(), read_only = state == TailState::ReadOnly))]
    fn open_inner(
        path: &Path,
        expected: Option<LedgerInstanceId>,
        state: TailState,
    ) -> Result<Self, LedgerError> {
        let mut file = if state == TailState::Writable {
            let file = OpenOptions::new().read(true).append(true).open(path)?;
            lock_exclusive(&file, path)?;
            file
        } else {
            File::open(path)?
        };
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let (instance, index) = replay(&bytes)?;
        if let Some(expected) = expected {
            if expected != instance {
                return Err(LedgerError::InstanceMismatch {
                    expected,
                    found: instance,
                });
            }
        }
        let head = index.head();
        info!(%instance, seq = head.seq, head = %head.head_hash, "opened ledger");
        Ok(Self {
            path: path.to_path_buf(),
            instance,
            tail: Mutex::new(Tail {
                file,
                len: bytes.len() as u64,
                state,
            }),
            index: RwLock::new(index),
        })
    }

    /// Replay a ledger file without opening it for writing.
    pub fn verify(path: impl AsRef<Path>) -> Result<LedgerSummary, LedgerError> {
        let bytes = fs::read(path.as_ref())?;
        let (instance, index) = replay(&bytes)?;
        Ok(LedgerSummary {
            instance,
            head: index.head(),
            batches: index.len(),
        })
    }

    /// Fixed address of this instance.
    pub fn instance_id(&self) -> LedgerInstanceId {
        self.instance
    }

    /// Location of the ledger file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Index>, LedgerError> {
        self.index.read().map_err(|_| LedgerError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Index>, LedgerError> {
        self.index.write().map_err(|_| LedgerError::Poisoned)
    }

    /// Serialize one write: build the entry against committed state, make it
    /// durable, then publish it to readers.
    fn commit<F>(&self, build: F) -> Result<Receipt, RegistryError>
    where
        F: FnOnce(&Index) -> Result<LedgerEntry, RegistryError>,
    {
        let mut tail = self.tail.lock().map_err(|_| LedgerError::Poisoned)?;
        let entry = build(&*self.read()?)?;
        let (payload, hash) = entry.seal()?;
        let framed = frame::encode_frame(&payload).map_err(|e| LedgerError::Codec(e.to_string()))?;
        let offset = tail.len;
        tail.append(&self.path, &framed)?;
        let receipt = self
            .write()?
            .apply(entry, hash)
            .map_err(|detail| LedgerError::Corrupt { offset, detail })?;
        debug!(seq = receipt.seq, offset, "ledger frame committed");
        Ok(receipt)
    }
}

impl BatchStore for FileLedger {
    fn exists(&self, id: &BatchId) -> Result<bool, RegistryError> {
        Ok(self.read()?.contains(id))
    }

    fn insert(&self, batch: Batch) -> Result<Receipt, RegistryError> {
        self.commit(|index| index.prepare_create(batch))
    }

    fn get(&self, id: &BatchId) -> Result<Batch, RegistryError> {
        self.read()?.batch(id)
    }

    fn set_owner(&self, id: &BatchId, new_owner: Identity) -> Result<Receipt, RegistryError> {
        self.commit(|index| index.prepare_transfer(id, new_owner))
    }

    fn history(&self, id: &BatchId) -> Result<Vec<ProvenanceEvent>, RegistryError> {
        self.read()?.events(id)
    }

    fn head(&self) -> Result<LedgerHead, RegistryError> {
        Ok(self.read()?.head())
    }
}
