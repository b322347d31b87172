// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Transfer authorization.
//!
//! The only source of transfer authority is current on-record ownership: no
//! delegation, allowlist, or administrative override. The guard inspects the
//! caller; it never records it.

use std::fmt;

use crate::batch::Batch;
use crate::ident::Identity;

/// Guard verdict for one transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The caller may transfer the batch.
    Allow,
    /// The caller may not transfer the batch.
    Deny(DenyReason),
}

/// Why a transfer was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The caller is not the batch's current owner.
    NotOwner,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotOwner => f.write_str("caller is not the current owner"),
        }
    }
}

/// Decide whether `caller` may transfer `batch`.
///
/// [`Identity`] equality is byte equality over the parsed address, so text
/// that differs only in case or prefix compares equal.
#[must_use]
pub fn authorize(batch: &Batch, caller: Identity) -> Decision {
    if batch.owner() == caller {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::NotOwner)
    }
}
