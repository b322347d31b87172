// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Saved settings for a MedTrace node (daemon and CLI).
//!
//! Values come from three places, highest first: command-line flags
//! ([`NodeOverrides`]), the saved [`NodeConfig`], and built-in defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Config key the node settings are stored under.
pub const NODE_CONFIG_KEY: &str = "node";

/// Default ledger file name, relative to the config directory.
pub const DEFAULT_LEDGER_FILE: &str = "medtrace.ledger";

/// Default daemon listen address.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8545";

/// Default log filter.
pub const DEFAULT_LOG: &str = "info";

/// Persisted node settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Ledger file. Relative paths resolve against the config directory.
    pub ledger_path: PathBuf,
    /// Expected ledger instance (hex). `None` accepts whatever the file holds.
    pub instance_id: Option<String>,
    /// Daemon listen address.
    pub listen: String,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from(DEFAULT_LEDGER_FILE),
            instance_id: None,
            listen: DEFAULT_LISTEN.to_owned(),
            log: DEFAULT_LOG.to_owned(),
        }
    }
}

impl NodeConfig {
    /// Apply command-line overrides on top of these settings.
    #[must_use]
    pub fn merged(self, overrides: NodeOverrides) -> Self {
        Self {
            ledger_path: overrides.ledger_path.unwrap_or(self.ledger_path),
            instance_id: overrides.instance_id.or(self.instance_id),
            listen: overrides.listen.unwrap_or(self.listen),
            log: overrides.log.unwrap_or(self.log),
        }
    }

    /// Ledger path made absolute against `base` when it is relative.
    pub fn resolve_ledger_path(&self, base: &Path) -> PathBuf {
        if self.ledger_path.is_absolute() {
            self.ledger_path.clone()
        } else {
            base.join(&self.ledger_path)
        }
    }
}

/// Values given on the command line; `None` means "not given".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeOverrides {
    /// `--ledger`
    pub ledger_path: Option<PathBuf>,
    /// `--instance`
    pub instance_id: Option<String>,
    /// `--listen`
    pub listen: Option<String>,
    /// `--log`
    pub log: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: NodeConfig = serde_json::from_str(r#"{"listen":"0.0.0.0:9000"}"#).unwrap();
        assert_eq!(cfg.listen, "0.0.0.0:9000");
        assert_eq!(cfg.ledger_path, PathBuf::from(DEFAULT_LEDGER_FILE));
        assert_eq!(cfg.log, DEFAULT_LOG);
        assert_eq!(cfg.instance_id, None);
    }

    #[test]
    fn flags_beat_saved_values() {
        let saved = NodeConfig {
            listen: "10.0.0.1:1".into(),
            log: "debug".into(),
            ..NodeConfig::default()
        };
        let merged = saved.merged(NodeOverrides {
            listen: Some("127.0.0.1:2".into()),
            ..NodeOverrides::default()
        });
        assert_eq!(merged.listen, "127.0.0.1:2");
        assert_eq!(merged.log, "debug");
    }

    #[test]
    fn relative_ledger_path_resolves_under_base() {
        let cfg = NodeConfig::default();
        assert_eq!(
            cfg.resolve_ledger_path(Path::new("/etc/medtrace")),
            PathBuf::from("/etc/medtrace").join(DEFAULT_LEDGER_FILE)
        );
        let abs = NodeConfig {
            ledger_path: PathBuf::from("/var/lib/med.ledger"),
            ..NodeConfig::default()
        };
        assert_eq!(
            abs.resolve_ledger_path(Path::new("/etc/medtrace")),
            PathBuf::from("/var/lib/med.ledger")
        );
    }
}
