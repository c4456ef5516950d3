// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Certificate archive: one pretty-printed JSON file per certificate,
// `certificate_<nonce>.json`, for the renderer and for handing to auditors.
// The chain stays the source of truth; a lost archive file can be
// re-exported from it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use shunya_core::error::{PersistStage, Result, ShunyaError};
use shunya_core::Certificate;
use tracing::{debug, instrument};

use crate::fsio;

#[derive(Debug, Clone)]
pub struct CertificateArchive {
    dir: PathBuf,
}

impl CertificateArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, nonce: u64) -> PathBuf {
        self.dir.join(format!("certificate_{nonce}.json"))
    }

    /// Write `cert` to its archive file, replacing any earlier export.
    #[instrument(skip_all, fields(nonce = cert.nonce))]
    pub fn store(&self, cert: &Certificate) -> Result<PathBuf> {
        let path = self.path_for(cert.nonce);
        let bytes = serde_json::to_vec_pretty(cert)?;
        fsio::write_atomic(&path, &bytes, PersistStage::Certificate { nonce: cert.nonce })?;
        debug!(path = %path.display(), "certificate exported");
        Ok(path)
    }

    pub fn load(&self, nonce: u64) -> Result<Certificate> {
        let bytes = match fs::read(self.path_for(nonce)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ShunyaError::CertificateNotFound { nonce });
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}
