// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tamper detection: a ledger file whose bytes, order, or history were edited
//! must be refused on open, even when the attacker recomputes frame checksums.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::fs;
use std::path::{Path, PathBuf};

use medtrace_core::ledger::{LedgerEntry, LedgerOp, FRAME_OVERHEAD, HEADER_LEN};
use medtrace_core::{
    Batch, BatchId, BatchStore, EntryHash, FileLedger, Identity, LedgerError, Registry,
};

const ALICE: Identity = Identity([0xAA; 20]);
const BOB: Identity = Identity([0xBB; 20]);
const MALLORY: Identity = Identity([0xEE; 20]);

fn b1() -> BatchId {
    BatchId::new("B1").unwrap()
}

/// Ledger with: create B1 (alice), transfer B1 alice → bob.
fn seeded_ledger(dir: &Path) -> (PathBuf, EntryHash) {
    let path = dir.join("med.ledger");
    let reg = Registry::new(FileLedger::create(&path, "tamper").unwrap());
    reg.create(b1(), "Paracetamol", "AcmePharma", ALICE).unwrap();
    reg.transfer(&b1(), BOB, ALICE).unwrap();
    let head = reg.head().unwrap().head_hash;
    (path, head)
}

/// Frame a payload the way the ledger does, checksum included.
fn frame(payload: &[u8]) -> Vec<u8> {
    let len = u32::try_from(payload.len()).unwrap().to_be_bytes();
    let mut hasher = blake3::Hasher::new();
    hasher.update(&len);
    hasher.update(payload);
    let mut out = len.to_vec();
    out.extend_from_slice(payload);
    out.extend_from_slice(hasher.finalize().as_bytes());
    out
}

/// Split a ledger file into (header, frames).
fn split(bytes: &[u8]) -> (Vec<u8>, Vec<Vec<u8>>) {
    let header = bytes[..HEADER_LEN].to_vec();
    let mut frames = Vec::new();
    let mut offset = HEADER_LEN;
    while offset < bytes.len() {
        let len = u32::from_be_bytes(bytes[offset..offset + 4].try_into().unwrap()) as usize;
        let end = offset + FRAME_OVERHEAD + len;
        frames.push(bytes[offset..end].to_vec());
        offset = end;
    }
    (header, frames)
}

fn assert_corrupt(path: &Path) {
    match FileLedger::open(path) {
        Err(LedgerError::Corrupt { .. }) => {}
        other => panic!("expected corrupt ledger, got {other:?}"),
    }
    assert!(matches!(
        FileLedger::verify(path),
        Err(LedgerError::Corrupt { .. })
    ));
}

#[test]
fn untouched_ledger_verifies() {
    let dir = tempfile::tempdir().unwrap();
    let (path, head) = seeded_ledger(dir.path());
    let summary = FileLedger::verify(&path).unwrap();
    assert_eq!(summary.head.seq, 2);
    assert_eq!(summary.head.head_hash, head);
}

#[test]
fn flipped_byte_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _) = seeded_ledger(dir.path());
    let mut bytes = fs::read(&path).unwrap();
    let target = HEADER_LEN + 10;
    bytes[target] ^= 0x40;
    fs::write(&path, bytes).unwrap();
    assert_corrupt(&path);
}

#[test]
fn torn_tail_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _) = seeded_ledger(dir.path());
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();
    assert_corrupt(&path);
}

#[test]
fn bad_header_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _) = seeded_ledger(dir.path());
    let mut bytes = fs::read(&path).unwrap();
    bytes[0] = b'X';
    fs::write(&path, bytes).unwrap();
    assert_corrupt(&path);
}

#[test]
fn reordered_frames_are_detected() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _) = seeded_ledger(dir.path());
    let (header, frames) = split(&fs::read(&path).unwrap());
    assert_eq!(frames.len(), 2);
    let mut bytes = header;
    bytes.extend_from_slice(&frames[1]);
    bytes.extend_from_slice(&frames[0]);
    fs::write(&path, bytes).unwrap();
    assert_corrupt(&path);
}

#[test]
fn rewritten_history_breaks_the_chain() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _) = seeded_ledger(dir.path());
    let (header, frames) = split(&fs::read(&path).unwrap());

    // Forge the genesis entry so Mallory is the creator, with a valid checksum.
    let forged = LedgerEntry {
        seq: 1,
        prev_hash: EntryHash::ZERO,
        op: LedgerOp::Create(Batch::new(b1(), "Paracetamol", "AcmePharma", MALLORY).unwrap()),
    };
    let mut bytes = header;
    bytes.extend_from_slice(&frame(&forged.encode().unwrap()));
    bytes.extend_from_slice(&frames[1]);
    fs::write(&path, bytes).unwrap();
    assert_corrupt(&path);
}

#[test]
fn appended_transfer_by_non_owner_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let (path, head) = seeded_ledger(dir.path());

    // Correct seq and prev_hash, valid checksum, but Mallory never owned B1.
    let forged = LedgerEntry {
        seq: 3,
        prev_hash: head,
        op: LedgerOp::Transfer {
            id: b1(),
            from: MALLORY,
            to: MALLORY,
        },
    };
    let mut bytes = fs::read(&path).unwrap();
    bytes.extend_from_slice(&frame(&forged.encode().unwrap()));
    fs::write(&path, bytes).unwrap();
    assert_corrupt(&path);
    match FileLedger::verify(&path) {
        Err(LedgerError::Corrupt { detail, .. }) => {
            assert!(detail.starts_with("batch B1:"), "{detail}");
        }
        other => panic!("expected corrupt ledger, got {other:?}"),
    }
}

#[test]
fn well_formed_appended_entry_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let (path, head) = seeded_ledger(dir.path());

    // Same construction as the forgery above, but signed off by the real owner.
    let entry = LedgerEntry {
        seq: 3,
        prev_hash: head,
        op: LedgerOp::Transfer {
            id: b1(),
            from: BOB,
            to: ALICE,
        },
    };
    let mut bytes = fs::read(&path).unwrap();
    bytes.extend_from_slice(&frame(&entry.encode().unwrap()));
    fs::write(&path, bytes).unwrap();

    let ledger = FileLedger::open(&path).unwrap();
    assert_eq!(ledger.get(&b1()).unwrap().owner(), ALICE);
    assert_eq!(ledger.head().unwrap().seq, 3);
}
