// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pharmaceutical batch provenance registry.
//!
//! `medtrace-core` records each batch (id, name, manufacturer, owner) on an
//! append-only, hash-chained ledger and lets any party verify a batch's
//! origin and current custodian.
//!
//! # Layers
//!
//! - [`ident`]: validated identities, batch ids, and ledger instance ids.
//! - [`store`]: the [`BatchStore`] seam and the in-memory [`MemoryStore`].
//! - [`ledger`]: the durable [`FileLedger`] and its entry/frame formats.
//! - [`guard`]: transfer authorization (current owner only).
//! - [`registry`]: the create/transfer/read state machine.
//! - [`query`]: read-only verification for external verifiers.
//!
//! # Identity
//!
//! Caller identity is an explicit argument to every write. Establishing it
//! (wallet, session, network selection) is the caller's job and a
//! precondition of calling in.
#![forbid(unsafe_code)]

pub mod batch;
pub mod error;
pub mod guard;
pub mod ident;
pub mod ledger;
pub mod query;
pub mod registry;
pub mod store;

pub use batch::Batch;
pub use error::{ErrorKind, InvalidInput, LedgerError, RegistryError};
pub use guard::{authorize, Decision, DenyReason};
pub use ident::{make_instance_id, BatchId, Identity, LedgerInstanceId};
pub use ledger::{EntryHash, FileLedger, LedgerSummary};
pub use query::{QueryInterface, Verification};
pub use registry::Registry;
pub use store::{BatchStore, EventKind, LedgerHead, MemoryStore, ProvenanceEvent, Receipt};
