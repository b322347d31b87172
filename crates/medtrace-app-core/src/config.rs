// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config service and storage port for MedTrace tools.
//!
//! Values are JSON documents stored under short keys (`node`, ...). A key is
//! also a file stem for filesystem stores, so only `[A-Za-z0-9_-]` is
//! accepted.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Storage port for raw config blobs (keyed by logical name).
pub trait ConfigStore {
    /// Load a raw config blob. Returns [`ConfigError::NotFound`] when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw config blob, replacing any previous value whole.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Nothing saved under this key.
    #[error("[CONFIG_NOT_FOUND] no saved config for {0:?}")]
    NotFound(String),
    /// Key would not make a safe file stem.
    #[error("[CONFIG_KEY] invalid config key {0:?}")]
    InvalidKey(String),
    /// I/O error while reading/writing.
    #[error("[CONFIG_IO] {0}")]
    Io(#[from] std::io::Error),
    /// Saved value is not valid JSON for the requested type.
    #[error("[CONFIG_SERDE] config {key:?}: {source}")]
    Serde {
        /// Key being loaded or saved.
        key: String,
        /// Decoder/encoder failure.
        source: serde_json::Error,
    },
    /// The platform gave us nowhere to keep config.
    #[error("[CONFIG_NO_DIR] could not resolve config dir")]
    NoConfigDir,
}

/// Reject keys that are empty or could escape a store's directory.
pub fn check_key(key: &str) -> Result<(), ConfigError> {
    let ok = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidKey(key.to_owned()))
    }
}

/// Typed JSON view over a [`ConfigStore`].
#[derive(Debug)]
pub struct ConfigService<S> {
    store: S,
}

impl<S: ConfigStore> ConfigService<S> {
    /// Wrap `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrow the inner store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Saved value for `key`; `None` when nothing (or only whitespace) is saved.
    ///
    /// # Errors
    ///
    /// Invalid keys, store I/O failures and JSON that does not decode as `T`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        check_key(key)?;
        let bytes = match self.store.load_raw(key) {
            Err(ConfigError::NotFound(_)) => return Ok(None),
            other => other?,
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| ConfigError::Serde {
                key: key.to_owned(),
                source,
            })
    }

    /// Write `value` under `key` as pretty JSON.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ConfigError> {
        check_key(key)?;
        let mut doc = serde_json::to_vec_pretty(value).map_err(|source| ConfigError::Serde {
            key: key.to_owned(),
            source,
        })?;
        doc.push(b'\n');
        self.store.save_raw(key, &doc)
    }

    /// Load `key`, or write `T::default()` under it when nothing is saved yet.
    ///
    /// The flag is `true` when defaults were just written.
    pub fn load_or_init<T>(&self, key: &str) -> Result<(T, bool), ConfigError>
    where
        T: DeserializeOwned + Serialize + Default,
    {
        if let Some(value) = self.load(key)? {
            return Ok((value, false));
        }
        let value = T::default();
        self.save(key, &value)?;
        Ok((value, true))
    }
}
