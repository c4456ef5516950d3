// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ledger configuration: where the key, the chain and the exported
// certificates live.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShunyaError};

/// Name of the optional config file inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Environment variable holding the passphrase for a sealed key.
pub const PASSPHRASE_ENV: &str = "SHUNYA_KEY_PASSPHRASE";

/// Persistent ledger settings.
///
/// Relative paths are resolved against `data_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Root directory for all ledger state.
    pub data_dir: PathBuf,
    /// Signing key PEM (plain or age-sealed, see `seal_key`).
    pub key_file: PathBuf,
    /// The chain artifact.
    pub chain_file: PathBuf,
    /// Where `certificate_<nonce>.json` exports are written.
    pub certificate_dir: PathBuf,
    /// Seal the signing key with a passphrase instead of storing it in the clear.
    pub seal_key: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::rooted_at(default_data_dir())
    }
}

impl LedgerConfig {
    /// Default layout beneath `data_dir`.
    pub fn rooted_at(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            key_file: PathBuf::from("certificates/private_key.pem"),
            chain_file: PathBuf::from("blockchain.json"),
            certificate_dir: PathBuf::from("certificates"),
            seal_key: false,
        }
    }

    /// Read `<data_dir>/config.json` if it exists, otherwise use the default
    /// layout.  `data_dir` always wins over whatever the file says.
    pub fn load(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let path = data_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::rooted_at(data_dir));
        }
        let mut config = Self::from_file(&path)?;
        config.data_dir = data_dir;
        Ok(config)
    }

    /// Read a config file from an explicit location.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| ShunyaError::Config(format!("{}: {e}", path.display())))
    }

    pub fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(self.data_dir.join(CONFIG_FILE), json)?;
        Ok(())
    }

    pub fn key_path(&self) -> PathBuf {
        self.resolve(&self.key_file)
    }

    pub fn chain_path(&self) -> PathBuf {
        self.resolve(&self.chain_file)
    }

    pub fn certificate_path(&self) -> PathBuf {
        self.resolve(&self.certificate_dir)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }
}

/// `$XDG_DATA_HOME/shunya`, else `$HOME/.local/share/shunya`.
pub fn default_data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".local").join("share")
    } else {
        PathBuf::from(".")
    };
    base.join("shunya")
}
