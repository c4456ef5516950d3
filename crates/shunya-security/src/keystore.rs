// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Key stores: where the ledger signing key lives between runs.
//
// The first call on a fresh installation generates the key and publishes it
// with no-clobber semantics: if two processes race on first run, the loser
// discards its key and loads the winner's.  Existing material that fails to
// parse is reported, never replaced, since a new key would orphan the
// provenance of every certificate already issued.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use age::secrecy::SecretString;
use shunya_core::config::LedgerConfig;
use shunya_core::error::{PersistStage, Result, ShunyaError};
use tracing::{debug, info, instrument, warn};

use crate::fsio::{self, Published};
use crate::keys::SigningKeyPair;

/// Source of the ledger signing key.
///
/// `CertificateBuilder` and `LedgerChain` never see how the key is stored;
/// swapping the plain file for a sealed or hardware-backed store only
/// touches the composition root.
pub trait KeyStore {
    /// Load the persisted key, or generate and persist one if none exists.
    fn load_or_create(&self) -> Result<SigningKeyPair>;

    /// Load the persisted key without ever creating one.
    fn load(&self) -> Result<Option<SigningKeyPair>>;

    /// Where the key material lives.
    fn location(&self) -> &Path;
}

// ---------------------------------------------------------------------------
// Plain PEM file
// ---------------------------------------------------------------------------

/// Private key stored as an unencrypted PKCS#1 PEM file, readable by the
/// owner only.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    path: PathBuf,
}

impl FileKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn decode(bytes: &[u8]) -> std::result::Result<SigningKeyPair, String> {
        let pem = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
        SigningKeyPair::from_pem(pem)
    }
}

impl KeyStore for FileKeyStore {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn load_or_create(&self) -> Result<SigningKeyPair> {
        load_or_create_with(&self.path, Self::decode, |key| {
            Ok(key.to_pem()?.into_bytes())
        })
    }

    fn load(&self) -> Result<Option<SigningKeyPair>> {
        load_with(&self.path, Self::decode)
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

// ---------------------------------------------------------------------------
// Passphrase-sealed file
// ---------------------------------------------------------------------------

/// Private key PEM encrypted with an `age` scrypt recipient.
///
/// The passphrase is held in a `SecretString` for the lifetime of the store
/// and zeroised on drop.  A wrong passphrase is indistinguishable from a
/// damaged file and is reported as corrupt key material.
pub struct SealedKeyStore {
    path: PathBuf,
    passphrase: SecretString,
}

impl SealedKeyStore {
    pub fn new(path: impl Into<PathBuf>, passphrase: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            passphrase: SecretString::from(passphrase.into()),
        }
    }

    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let encryptor = age::Encryptor::with_user_passphrase(self.passphrase.clone());
        let mut ciphertext = Vec::new();

        let mut writer = encryptor
            .wrap_output(&mut ciphertext)
            .map_err(|e| ShunyaError::Signing(format!("sealing key failed: {e}")))?;
        writer
            .write_all(plaintext)
            .map_err(|e| ShunyaError::Signing(format!("sealing key failed: {e}")))?;
        writer
            .finish()
            .map_err(|e| ShunyaError::Signing(format!("sealing key failed: {e}")))?;

        Ok(ciphertext)
    }

    fn decode(&self, bytes: &[u8]) -> std::result::Result<SigningKeyPair, String> {
        let plaintext = self.unseal(bytes)?;
        let pem = std::str::from_utf8(&plaintext).map_err(|e| e.to_string())?;
        SigningKeyPair::from_pem(pem)
    }

    fn unseal(&self, ciphertext: &[u8]) -> std::result::Result<Vec<u8>, String> {
        let decryptor = age::Decryptor::new(ciphertext).map_err(|e| e.to_string())?;
        let identity = age::scrypt::Identity::new(self.passphrase.clone());

        let mut reader = decryptor
            .decrypt(std::iter::once(&identity as &dyn age::Identity))
            .map_err(|e| e.to_string())?;

        let mut plaintext = Vec::new();
        reader
            .read_to_end(&mut plaintext)
            .map_err(|e| e.to_string())?;
        Ok(plaintext)
    }
}

impl KeyStore for SealedKeyStore {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn load_or_create(&self) -> Result<SigningKeyPair> {
        load_or_create_with(
            &self.path,
            |bytes| self.decode(bytes),
            |key| self.seal(key.to_pem()?.as_bytes()),
        )
    }

    fn load(&self) -> Result<Option<SigningKeyPair>> {
        load_with(&self.path, |bytes| self.decode(bytes))
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

// ---------------------------------------------------------------------------
// Shared lifecycle
// ---------------------------------------------------------------------------

fn load_or_create_with(
    path: &Path,
    decode: impl Fn(&[u8]) -> std::result::Result<SigningKeyPair, String>,
    encode: impl Fn(&SigningKeyPair) -> Result<Vec<u8>>,
) -> Result<SigningKeyPair> {
    if let Some(key) = load_with(path, &decode)? {
        return Ok(key);
    }

    let key = SigningKeyPair::generate()?;
    let encoded = encode(&key)?;
    match fsio::publish_new(path, &encoded, true, PersistStage::KeyMaterial)? {
        Published::Created => {
            info!(fingerprint = %key.public_key().fingerprint(), "generated new signing key");
            Ok(key)
        }
        Published::AlreadyExists => {
            warn!("another process created the signing key first; using theirs");
            let bytes = read_existing(path)?.ok_or_else(|| {
                corrupt(path, "key file vanished right after it was created".into())
            })?;
            decode(&bytes).map_err(|reason| corrupt(path, reason))
        }
    }
}

fn load_with(
    path: &Path,
    decode: impl Fn(&[u8]) -> std::result::Result<SigningKeyPair, String>,
) -> Result<Option<SigningKeyPair>> {
    let Some(bytes) = read_existing(path)? else {
        return Ok(None);
    };
    let key = decode(&bytes).map_err(|reason| corrupt(path, reason))?;
    debug!(fingerprint = %key.public_key().fingerprint(), "signing key loaded");
    Ok(Some(key))
}

fn read_existing(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(corrupt(path, format!("unreadable: {e}"))),
    }
}

fn corrupt(path: &Path, reason: String) -> ShunyaError {
    ShunyaError::KeyMaterialCorrupt {
        path: path.to_path_buf(),
        reason,
    }
}

/// Pick the key store the configuration asks for.
///
/// A sealed store without a passphrase is a configuration error rather than
/// a silent fallback to the plain file.
pub fn key_store_for(config: &LedgerConfig, passphrase: Option<String>) -> Result<Box<dyn KeyStore>> {
    let path = config.key_path();
    if config.seal_key {
        let passphrase = passphrase.filter(|p| !p.is_empty()).ok_or_else(|| {
            ShunyaError::Config(format!(
                "seal_key is set but {} is empty",
                shunya_core::config::PASSPHRASE_ENV
            ))
        })?;
        Ok(Box::new(SealedKeyStore::new(path, passphrase)))
    } else {
        Ok(Box::new(FileKeyStore::new(path)))
    }
}
