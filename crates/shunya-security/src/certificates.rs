// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Erasure certificates: digest and sign a finished wipe log.
//
// The digest and the signature both cover the canonical bytes of the whole
// log record, progress trail and unknown fields included.  Signing those
// bytes rather than the hex digest binds the certificate to the record
// itself.

use chrono::{SecondsFormat, Utc};
use shunya_core::error::{Result, ShunyaError};
use shunya_core::{Certificate, WipeLogRecord};
use tracing::{debug, instrument};

use crate::integrity::{canonical_bytes, hash_bytes, verify_hash};
use crate::keys::{LedgerPublicKey, SigningKeyPair};

/// Turns finished wipe logs into signed certificates.
///
/// Holds the key pair it was constructed with; owns no persistent state.
#[derive(Debug, Clone)]
pub struct CertificateBuilder {
    key: SigningKeyPair,
}

impl CertificateBuilder {
    pub fn new(key: SigningKeyPair) -> Self {
        Self { key }
    }

    pub fn public_key(&self) -> &LedgerPublicKey {
        self.key.public_key()
    }

    /// Build a certificate for `log`.
    ///
    /// Fails with `IncompleteLogRecord` if the nonce, device, method, start
    /// or end time is missing; an unfinished wipe never gets a certificate.
    #[instrument(skip_all, fields(nonce = ?log.nonce))]
    pub fn build(&self, log: &WipeLogRecord) -> Result<Certificate> {
        let done = log.require_complete()?;

        let canonical = canonical_bytes(log)?;
        let log_hash = hash_bytes(&canonical);
        let signature = self.key.sign(&canonical)?;

        debug!(%log_hash, canonical_len = canonical.len(), "wipe log signed");

        Ok(Certificate {
            device: done.device.to_owned(),
            wipe_method: done.method.to_owned(),
            start_time: done.start_time.to_owned(),
            end_time: done.end_time.to_owned(),
            nonce: done.nonce,
            log_hash,
            signature: hex::encode(signature),
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        })
    }
}

/// Check that `cert` was issued for `log` under `public_key`.
///
/// * `IntegrityMismatch`: the log's digest or descriptive fields differ
///   from what the certificate states.
/// * `SignatureInvalid`: the signature does not verify over the log's
///   canonical bytes with this key.
pub fn verify_certificate(
    cert: &Certificate,
    log: &WipeLogRecord,
    public_key: &LedgerPublicKey,
) -> Result<()> {
    let canonical = canonical_bytes(log)?;
    verify_hash(&canonical, &cert.log_hash)?;

    let done = log.require_complete()?;
    let nonce = done.nonce.to_string();
    let claimed_nonce = cert.nonce.to_string();
    let pairs = [
        (done.device, cert.device.as_str()),
        (done.method, cert.wipe_method.as_str()),
        (done.start_time, cert.start_time.as_str()),
        (done.end_time, cert.end_time.as_str()),
        (nonce.as_str(), claimed_nonce.as_str()),
    ];
    if let Some((expected, actual)) = pairs.into_iter().find(|(log_side, cert_side)| log_side != cert_side) {
        return Err(ShunyaError::IntegrityMismatch {
            expected: expected.to_owned(),
            actual: actual.to_owned(),
        });
    }

    let signature = hex::decode(&cert.signature).map_err(|_| ShunyaError::SignatureInvalid)?;
    public_key.verify(&canonical, &signature)
}
