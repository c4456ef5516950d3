// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Shunya.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which durable write failed.  Carries the certificate nonce where one is
/// involved so that a caller can tell which wipe run was affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistStage {
    /// Publishing freshly generated key material.
    KeyMaterial,
    /// Exporting a certificate into the archive directory.
    Certificate { nonce: u64 },
    /// Rewriting the chain artifact after an append.
    Chain { nonce: u64 },
    /// Creating or releasing the single-writer lock file.
    Lock,
}

impl fmt::Display for PersistStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyMaterial => f.write_str("key material"),
            Self::Certificate { nonce } => write!(f, "certificate export (nonce {nonce})"),
            Self::Chain { nonce } => write!(f, "chain append (nonce {nonce})"),
            Self::Lock => f.write_str("ledger lock"),
        }
    }
}

/// Top-level error type for all Shunya operations.
#[derive(Debug, Error)]
pub enum ShunyaError {
    // -- Input --
    #[error("incomplete wipe log: missing `{field}`{}", nonce_suffix(*.nonce))]
    IncompleteLogRecord {
        field: &'static str,
        nonce: Option<u64>,
    },

    #[error("number {value} cannot be represented exactly; integers must fit in 64 bits")]
    InexactNumber { value: String },

    // -- Key material --
    #[error("no signing key at {}", .path.display())]
    KeyMissing { path: PathBuf },

    #[error("key material at {} is unusable: {reason}", .path.display())]
    KeyMaterialCorrupt { path: PathBuf, reason: String },

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("signature does not verify")]
    SignatureInvalid,

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    // -- Ledger --
    #[error("ledger at {} cannot be parsed: {reason}", .path.display())]
    LedgerCorrupt { path: PathBuf, reason: String },

    #[error("ledger is locked by another writer ({})", .path.display())]
    LedgerLocked { path: PathBuf },

    #[error("ledger changed underneath this writer: expected tip {expected}, found {found}")]
    LedgerConflict { expected: String, found: String },

    #[error("a certificate for nonce {nonce} is already in the ledger")]
    DuplicateCertificate { nonce: u64 },

    #[error("no certificate for nonce {nonce}")]
    CertificateNotFound { nonce: u64 },

    // -- Storage / persistence --
    #[error("failed to persist {stage} at {}: {source}", .path.display())]
    PersistenceFailure {
        stage: PersistStage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn nonce_suffix(nonce: Option<u64>) -> String {
    nonce.map(|n| format!(" (nonce {n})")).unwrap_or_default()
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ShunyaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_record_names_field_and_nonce() {
        let err = ShunyaError::IncompleteLogRecord {
            field: "end_time",
            nonce: Some(1_700_000_000),
        };
        assert_eq!(
            err.to_string(),
            "incomplete wipe log: missing `end_time` (nonce 1700000000)"
        );

        let err = ShunyaError::IncompleteLogRecord {
            field: "nonce",
            nonce: None,
        };
        assert_eq!(err.to_string(), "incomplete wipe log: missing `nonce`");
    }

    #[test]
    fn inexact_number_quotes_the_value() {
        let err = ShunyaError::InexactNumber {
            value: "1.2345678901234568e23".into(),
        };
        assert!(err.to_string().starts_with("number 1.2345678901234568e23 "));
    }

    #[test]
    fn persistence_failure_reports_stage() {
        let err = ShunyaError::PersistenceFailure {
            stage: PersistStage::Chain { nonce: 7 },
            path: PathBuf::from("/var/lib/shunya/blockchain.json"),
            source: std::io::Error::other("disk full"),
        };
        let text = err.to_string();
        assert!(text.contains("chain append (nonce 7)"), "{text}");
        assert!(text.contains("disk full"), "{text}");
    }
}
