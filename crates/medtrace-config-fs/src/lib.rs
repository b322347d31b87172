// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed `ConfigStore` for MedTrace tools.
//!
//! One `{key}.json` per key, under the platform config dir or any directory
//! handed to [`FsConfigStore::with_base`].

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use medtrace_app_core::config::{check_key, ConfigError, ConfigStore};

/// Store configs as JSON files under one directory.
#[derive(Debug, Clone)]
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Create a store rooted at the user config directory (e.g., `~/.config/medtrace`).
    ///
    /// # Errors
    ///
    /// [`ConfigError::NoConfigDir`] when the platform has no home directory,
    /// or the I/O error from creating it.
    pub fn new() -> Result<Self, ConfigError> {
        let proj = ProjectDirs::from("dev", "medtrace", "MedTrace").ok_or(ConfigError::NoConfigDir)?;
        Self::with_base(proj.config_dir())
    }

    /// Create a store rooted at `base`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// The I/O error from creating `base`.
    pub fn with_base(base: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    /// Directory the JSON files live in; relative ledger paths resolve here too.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ConfigError> {
        check_key(key)?;
        Ok(self.base.join(key).with_extension("json"))
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        fs::read(self.path_for(key)?).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ConfigError::NotFound(key.to_owned()),
            _ => err.into(),
        })
    }

    /// Writes `{key}.json.tmp`, syncs it, then renames it over `{key}.json`,
    /// so a reader sees either the old document or the new one.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key)?;
        let staged = path.with_extension("json.tmp");
        {
            let mut file = File::create(&staged)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        fs::rename(&staged, &path)?;
        Ok(())
    }
}
