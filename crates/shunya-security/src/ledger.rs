// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ledger: append-only hash chain of certificates in a single JSON file.
//
// Block hash:
//   hash = SHA-256( canonical(cert) || ascii(prev_hash) )
// with prev_hash of the first block fixed to GENESIS_HASH.
//
// Every append rewrites the whole file through a temp file and rename, under
// an exclusive `<chain>.lock` file.  Inside the lock the on-disk tip is
// compared with the caller's snapshot so a stale writer is refused instead
// of silently dropping someone else's block.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use shunya_core::error::{PersistStage, Result, ShunyaError};
use shunya_core::{Block, Certificate, Chain, ChainFault, ChainVerification, GENESIS_HASH};
use tracing::{debug, info, instrument, warn};

use crate::fsio;
use crate::integrity::canonical_bytes;

/// Hash of a block holding `cert` linked to `prev_hash`.
pub fn link_hash(cert: &Certificate, prev_hash: &str) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(canonical_bytes(cert)?);
    hasher.update(prev_hash.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Walk `chain` from genesis and report the first block that does not hold.
///
/// Each hash is recomputed from the block's certificate and the previous
/// block's *recomputed* hash, so a rewritten block is caught at its own index
/// and nothing earlier is blamed.  Tampering is reported in the return
/// value; `Err` only signals that a certificate could not be serialized.
pub fn verify(chain: &Chain) -> Result<ChainVerification> {
    let mut expected_prev = GENESIS_HASH.to_owned();

    for (index, block) in chain.blocks().iter().enumerate() {
        if block.prev_hash != expected_prev {
            let fault = if index == 0 {
                ChainFault::GenesisMismatch {
                    found: block.prev_hash.clone(),
                }
            } else {
                ChainFault::BrokenLink {
                    expected: expected_prev,
                    found: block.prev_hash.clone(),
                }
            };
            warn!(index, nonce = block.cert.nonce, "ledger link broken");
            return Ok(ChainVerification::Broken { index, fault });
        }

        let recomputed = link_hash(&block.cert, &expected_prev)?;
        if recomputed != block.hash {
            warn!(index, nonce = block.cert.nonce, "ledger block hash mismatch");
            return Ok(ChainVerification::Broken {
                index,
                fault: ChainFault::HashMismatch {
                    stored: block.hash.clone(),
                    recomputed,
                },
            });
        }
        expected_prev = recomputed;
    }

    Ok(ChainVerification::Valid {
        length: chain.len(),
    })
}

/// The chain artifact on disk.
#[derive(Debug, Clone)]
pub struct LedgerChain {
    path: PathBuf,
    lock_path: PathBuf,
}

impl LedgerChain {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");
        Self {
            path,
            lock_path: PathBuf::from(lock_path),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the chain.  A missing file is an empty chain; an unparsable one
    /// is `LedgerCorrupt` and is never repaired here.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<Chain> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no ledger yet, starting empty");
                return Ok(Chain::new());
            }
            Err(e) => return Err(e.into()),
        };
        let chain: Chain = serde_json::from_slice(&bytes).map_err(|e| ShunyaError::LedgerCorrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        debug!(blocks = chain.len(), "ledger loaded");
        Ok(chain)
    }

    /// Take the single-writer lock.  Released when the guard drops.
    pub fn lock(&self) -> Result<LedgerLock> {
        LedgerLock::acquire(&self.lock_path)
    }

    /// Append `cert` to `chain` and persist the result.
    ///
    /// `chain` must be what is on disk right now; if another writer got in
    /// first this fails with `LedgerConflict` and nothing is written.  On
    /// success `chain` includes the new block.
    #[instrument(skip_all, fields(path = %self.path.display(), nonce = cert.nonce))]
    pub fn append(&self, chain: &mut Chain, cert: Certificate) -> Result<Block> {
        let _lock = self.lock()?;
        let on_disk = self.load()?;
        if on_disk.len() != chain.len() || on_disk.tip_hash() != chain.tip_hash() {
            return Err(ShunyaError::LedgerConflict {
                expected: chain.tip_hash().to_owned(),
                found: on_disk.tip_hash().to_owned(),
            });
        }
        self.append_locked(chain, cert)
    }

    /// Lock, load the current chain, append `cert`, persist.
    #[instrument(skip_all, fields(path = %self.path.display(), nonce = cert.nonce))]
    pub fn append_latest(&self, cert: Certificate) -> Result<Block> {
        let _lock = self.lock()?;
        let mut chain = self.load()?;
        self.append_locked(&mut chain, cert)
    }

    fn append_locked(&self, chain: &mut Chain, cert: Certificate) -> Result<Block> {
        let nonce = cert.nonce;
        if chain.contains_nonce(nonce) {
            return Err(ShunyaError::DuplicateCertificate { nonce });
        }

        let prev_hash = chain.tip_hash().to_owned();
        let hash = link_hash(&cert, &prev_hash)?;
        let block = Block {
            cert,
            prev_hash,
            hash,
        };

        let mut updated: Vec<&Block> = chain.blocks().iter().collect();
        updated.push(&block);
        let bytes = serde_json::to_vec_pretty(&updated)?;
        fsio::write_atomic(&self.path, &bytes, PersistStage::Chain { nonce })?;

        chain.push_linked(block.clone())?;
        info!(height = chain.len(), hash = %block.hash, "block appended");
        Ok(block)
    }

    /// Load and verify in one step.
    pub fn verify_stored(&self) -> Result<ChainVerification> {
        verify(&self.load()?)
    }

    /// The block certifying wipe run `nonce`.
    pub fn find(&self, nonce: u64) -> Result<Block> {
        self.load()?
            .find(nonce)
            .cloned()
            .ok_or(ShunyaError::CertificateNotFound { nonce })
    }
}

/// Exclusive writer lock: a file created with create-new semantics and
/// removed on drop.  A crash leaves it behind; it then has to be removed by
/// hand, which `LedgerLocked` tells the operator.
#[derive(Debug)]
pub struct LedgerLock {
    path: PathBuf,
    file: File,
}

impl LedgerLock {
    fn acquire(path: &Path) -> Result<Self> {
        let fail = |source| ShunyaError::PersistenceFailure {
            stage: PersistStage::Lock,
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(fail)?;
        }
        let file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(ShunyaError::LedgerLocked {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => return Err(fail(e)),
        };
        Self::claim(path, file, |mut file: &File| writeln!(file, "{}", std::process::id()))
    }

    /// Take ownership of a freshly created lock file and stamp it.  If the
    /// stamp fails, the guard is dropped and the file removed again.
    fn claim(path: &Path, file: File, stamp: impl FnOnce(&File) -> io::Result<()>) -> Result<Self> {
        let lock = Self {
            path: path.to_path_buf(),
            file,
        };
        stamp(&lock.file).map_err(|source| ShunyaError::PersistenceFailure {
            stage: PersistStage::Lock,
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "ledger lock taken");
        Ok(lock)
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release ledger lock");
        }
    }
}
