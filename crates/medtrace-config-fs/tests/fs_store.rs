// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `FsConfigStore` against a real directory, driven through `ConfigService`.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use medtrace_app_core::config::{ConfigError, ConfigService, ConfigStore};
use medtrace_app_core::node::{NodeConfig, NodeOverrides, NODE_CONFIG_KEY};
use medtrace_config_fs::FsConfigStore;

#[test]
fn missing_key_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsConfigStore::with_base(dir.path()).unwrap();
    match store.load_raw("node") {
        Err(ConfigError::NotFound(key)) => assert_eq!(key, "node"),
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn save_replaces_whole_file_and_leaves_no_staging_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsConfigStore::with_base(dir.path()).unwrap();
    store.save_raw("node", b"{\"listen\":\"0.0.0.0:1\",\"log\":\"trace\"}").unwrap();
    store.save_raw("node", b"{}").unwrap();

    assert_eq!(store.load_raw("node").unwrap(), b"{}");
    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(names, vec!["node.json".to_owned()]);
}

#[test]
fn keys_cannot_escape_the_base_dir() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("cfg");
    let store = FsConfigStore::with_base(&base).unwrap();
    assert!(matches!(
        store.save_raw("../node", b"{}"),
        Err(ConfigError::InvalidKey(_))
    ));
    assert!(matches!(store.load_raw("../node"), Err(ConfigError::InvalidKey(_))));
    assert!(!dir.path().join("node.json").exists());
}

#[test]
fn with_base_creates_nested_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("a").join("b");
    let store = FsConfigStore::with_base(&base).unwrap();
    assert!(base.is_dir());
    assert_eq!(store.base(), base.as_path());
}

#[test]
fn node_config_persists_defaults_once_then_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let svc = ConfigService::new(FsConfigStore::with_base(dir.path()).unwrap());

    let (cfg, wrote) = svc.load_or_init::<NodeConfig>(NODE_CONFIG_KEY).unwrap();
    assert!(wrote);
    assert_eq!(cfg, NodeConfig::default());
    assert!(dir.path().join("node.json").is_file());

    let edited = cfg.merged(NodeOverrides {
        log: Some("medtrace_core=debug".into()),
        ..NodeOverrides::default()
    });
    svc.save(NODE_CONFIG_KEY, &edited).unwrap();

    let (again, wrote) = svc.load_or_init::<NodeConfig>(NODE_CONFIG_KEY).unwrap();
    assert!(!wrote);
    assert_eq!(again.log, "medtrace_core=debug");
    assert_eq!(
        again.resolve_ledger_path(svc.store().base()),
        dir.path().join("medtrace.ledger")
    );
}
