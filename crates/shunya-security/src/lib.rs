// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! shunya-security: signed erasure certificates and the tamper-evident
//! ledger they are recorded in.
//!
//! A finished wipe log is reduced to canonical JSON, hashed, and signed with
//! the ledger's RSA key; the resulting certificate is appended to a
//! SHA-256 hash chain persisted as a single JSON file.  Any later edit to a
//! recorded certificate, or to the order of blocks, is reported by
//! [`ledger::verify`] at the first block it affects.

pub mod appender;
pub mod archive;
pub mod certificates;
mod fsio;
pub mod integrity;
pub mod keys;
pub mod keystore;
pub mod ledger;

#[cfg(test)]
mod test_support;

pub use appender::{LedgerAppender, Receipt};
pub use archive::CertificateArchive;
pub use certificates::{CertificateBuilder, verify_certificate};
pub use integrity::{canonical_bytes, canonical_digest, hash_bytes, verify_hash};
pub use keys::{LedgerPublicKey, SigningKeyPair};
pub use keystore::{FileKeyStore, KeyStore, SealedKeyStore, key_store_for};
pub use ledger::{LedgerChain, LedgerLock, link_hash, verify};
