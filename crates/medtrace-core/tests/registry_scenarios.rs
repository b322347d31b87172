// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! End-to-end registry scenarios, run against both store implementations.
//!
//! Walks one batch through its life: create as `0xAAA…`, transfer to
//! `0xBBB…`, a denied transfer by `0xCCC…`, a duplicate create, and an unknown
//! lookup.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use medtrace_core::{
    BatchId, BatchStore, EventKind, FileLedger, Identity, MemoryStore, Registry, RegistryError,
    Verification,
};

fn addr(nibble: u8) -> Identity {
    Identity([nibble * 0x11; 20])
}

fn owner_a() -> Identity {
    addr(0xA)
}

fn owner_b() -> Identity {
    addr(0xB)
}

fn stranger_c() -> Identity {
    addr(0xC)
}

fn stranger_d() -> Identity {
    addr(0xD)
}

fn b1() -> BatchId {
    BatchId::new("B1").unwrap()
}

fn run_lifecycle<S: BatchStore>(reg: &Registry<S>) {
    // create B1 as 0xAAA
    reg.create(b1(), "Paracetamol", "AcmePharma", owner_a())
        .expect("create B1");
    let (id, name, manufacturer, owner) = reg.read(&b1()).unwrap().into_parts();
    assert_eq!(
        (id.as_str(), name.as_str(), manufacturer.as_str(), owner),
        ("B1", "Paracetamol", "AcmePharma", owner_a())
    );

    // 0xAAA transfers to 0xBBB
    reg.transfer(&b1(), owner_b(), owner_a())
        .expect("owner transfer");
    assert_eq!(reg.read(&b1()).unwrap().owner(), owner_b());

    // 0xCCC is not the owner
    let err = reg.transfer(&b1(), stranger_d(), stranger_c()).unwrap_err();
    assert!(matches!(err, RegistryError::Unauthorized { .. }), "{err}");
    assert_eq!(reg.read(&b1()).unwrap().owner(), owner_b());

    // re-create fails and leaves the record alone
    let err = reg
        .create(b1(), "Aspirin", "OtherCo", stranger_c())
        .unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateBatch(_)), "{err}");
    let batch = reg.read(&b1()).unwrap();
    assert_eq!(batch.name(), "Paracetamol");
    assert_eq!(batch.manufacturer(), "AcmePharma");
    assert_eq!(batch.owner(), owner_b());

    // unknown id
    let unknown = BatchId::new("UNKNOWN").unwrap();
    assert!(matches!(
        reg.read(&unknown),
        Err(RegistryError::BatchNotFound(_))
    ));
    assert_eq!(
        reg.query().verify(&unknown).unwrap(),
        Verification::NotFound { id: unknown }
    );

    // provenance trail: created, then one transfer
    let kinds: Vec<EventKind> = reg.history(&b1()).unwrap().into_iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Created { owner: owner_a() },
            EventKind::Transferred {
                from: owner_a(),
                to: owner_b()
            },
        ]
    );
    assert_eq!(reg.head().unwrap().seq, 2);
}

#[test]
fn lifecycle_in_memory() {
    run_lifecycle(&Registry::new(MemoryStore::new()));
}

#[test]
fn lifecycle_on_file_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("amoy.ledger");
    let reg = Registry::new(FileLedger::create(&path, "amoy").unwrap());
    run_lifecycle(&reg);
    let instance = reg.store().instance_id();
    let head = reg.head().unwrap();
    drop(reg);

    // committed state is exactly what a fresh open sees
    let reopened = Registry::new(FileLedger::open_instance(&path, instance).unwrap());
    assert_eq!(reopened.head().unwrap(), head);
    assert_eq!(reopened.read(&b1()).unwrap().owner(), owner_b());
    assert!(matches!(
        reopened.create(b1(), "Paracetamol", "AcmePharma", owner_a()),
        Err(RegistryError::DuplicateBatch(_))
    ));
}

#[test]
fn memory_and_file_ledgers_agree_on_receipts() {
    let dir = tempfile::tempdir().unwrap();
    let file = Registry::new(FileLedger::create(dir.path().join("l"), "x").unwrap());
    let memory = Registry::new(MemoryStore::new());

    for reg_receipts in [
        (
            file.create(b1(), "Paracetamol", "AcmePharma", owner_a()).unwrap(),
            memory.create(b1(), "Paracetamol", "AcmePharma", owner_a()).unwrap(),
        ),
        (
            file.transfer(&b1(), owner_b(), owner_a()).unwrap(),
            memory.transfer(&b1(), owner_b(), owner_a()).unwrap(),
        ),
    ] {
        assert_eq!(reg_receipts.0, reg_receipts.1);
    }
}

#[test]
fn identity_text_case_does_not_matter_for_authority() {
    let reg = Registry::new(MemoryStore::new());
    let upper = Identity::parse("0xABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD").unwrap();
    let lower = Identity::parse("abcdefabcdefabcdefabcdefabcdefabcdefabcd").unwrap();
    reg.create(b1(), "Paracetamol", "AcmePharma", upper).unwrap();
    reg.transfer(&b1(), owner_b(), lower).unwrap();
    assert_eq!(reg.read(&b1()).unwrap().owner(), owner_b());
}
