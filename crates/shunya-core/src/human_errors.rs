// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operator-facing explanations for ledger errors.
//
// Every error maps to a plain statement, a next step, and a severity that
// tells the caller whether re-running the wipe-to-certificate pipeline makes
// sense.  Nothing here repairs anything: key and ledger corruption always
// stop for a human.

use crate::error::{PersistStage, ShunyaError};

/// Severity of an error from the operator's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Disk hiccup or lock contention; running the pipeline again may work.
    Retryable,
    /// The operator has to do something first (free space, fix a path).
    ActionRequired,
    /// The input itself is unacceptable; retrying the same input never helps.
    Rejected,
    /// Key or ledger integrity is in doubt; stop and investigate.
    Fatal,
}

/// A plain-language error with an actionable suggestion.
#[derive(Debug, Clone)]
pub struct OperatorMessage {
    pub message: String,
    pub suggestion: String,
    pub retriable: bool,
    pub severity: Severity,
}

impl OperatorMessage {
    fn new(message: impl Into<String>, suggestion: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            retriable: severity == Severity::Retryable,
            severity,
        }
    }
}

/// Convert a `ShunyaError` into something an operator can act on.
pub fn explain(err: &ShunyaError) -> OperatorMessage {
    match err {
        ShunyaError::IncompleteLogRecord { field, nonce } => OperatorMessage::new(
            "The wipe log is not finished, so no certificate can be issued.",
            match nonce {
                Some(n) => format!("Field `{field}` is missing in the log of run {n}. Re-run the wipe to completion."),
                None => format!("Field `{field}` is missing. Re-run the wipe to completion."),
            },
            Severity::Rejected,
        ),

        ShunyaError::InexactNumber { value } => OperatorMessage::new(
            "The wipe log holds a number that cannot be signed exactly.",
            format!("Have the executor write {value} as a string, then certify the log again."),
            Severity::Rejected,
        ),

        ShunyaError::KeyMissing { path } => OperatorMessage::new(
            "There is no signing key to check against.",
            format!(
                "Pass the issuer's key with `--public-key`, or run this on the host that holds {}.",
                path.display()
            ),
            Severity::ActionRequired,
        ),

        ShunyaError::KeyMaterialCorrupt { path, .. } => OperatorMessage::new(
            "The signing key cannot be read.",
            format!(
                "Restore {} from backup. Do not delete it: a new key would orphan every certificate already issued.",
                path.display()
            ),
            Severity::Fatal,
        ),

        ShunyaError::Signing(_) => OperatorMessage::new(
            "The certificate could not be signed.",
            "Check that the signing key is a 2048-bit RSA key.",
            Severity::Fatal,
        ),

        ShunyaError::SignatureInvalid => OperatorMessage::new(
            "The certificate signature does not match.",
            "The certificate was altered or was issued under a different key.",
            Severity::Rejected,
        ),

        ShunyaError::IntegrityMismatch { .. } => OperatorMessage::new(
            "The certificate does not belong to this wipe log.",
            "Make sure the certificate and the log come from the same run.",
            Severity::Rejected,
        ),

        ShunyaError::LedgerCorrupt { path, .. } => OperatorMessage::new(
            "The ledger file cannot be parsed.",
            format!(
                "Restore {} from backup and run `shunya verify`. Do not hand-edit it.",
                path.display()
            ),
            Severity::Fatal,
        ),

        ShunyaError::LedgerLocked { path } => OperatorMessage::new(
            "Another process is writing to the ledger.",
            format!(
                "Wait for it to finish. If no other process is running, remove the stale lock {}.",
                path.display()
            ),
            Severity::Retryable,
        ),

        ShunyaError::LedgerConflict { .. } => OperatorMessage::new(
            "The ledger changed while this certificate was being added.",
            "Run the command again; it will link to the new tip.",
            Severity::Retryable,
        ),

        ShunyaError::DuplicateCertificate { nonce } => OperatorMessage::new(
            "This wipe run is already certified.",
            format!("Use `shunya export {nonce}` to write its certificate again."),
            Severity::Rejected,
        ),

        ShunyaError::CertificateNotFound { nonce } => OperatorMessage::new(
            "No certificate exists for this wipe run.",
            format!("Check the nonce {nonce}, or certify the wipe log first."),
            Severity::ActionRequired,
        ),

        ShunyaError::PersistenceFailure { stage, source, .. } => {
            let suggestion = match stage {
                PersistStage::Certificate { nonce } => format!(
                    "The ledger entry is safe. Free up disk space, then run `shunya export {nonce}`."
                ),
                _ => format!("Free up disk space or fix permissions, then try again. ({source})"),
            };
            OperatorMessage::new(format!("Writing the {stage} failed."), suggestion, Severity::ActionRequired)
        }

        ShunyaError::Config(detail) => OperatorMessage::new(
            "The configuration file is invalid.",
            format!("Fix or remove the config file. ({detail})"),
            Severity::ActionRequired,
        ),

        ShunyaError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
            OperatorMessage::new(
                "A file could not be found.",
                "Check the path and try again.",
                Severity::ActionRequired,
            )
        }

        ShunyaError::Io(io_err) => OperatorMessage::new(
            "A file could not be read or written.",
            format!("Check permissions and free space. ({io_err})"),
            Severity::Retryable,
        ),

        ShunyaError::Serialization(detail) => OperatorMessage::new(
            "A file is not valid JSON.",
            format!("Check that the file was written completely. ({detail})"),
            Severity::Rejected,
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn incomplete_log_is_rejected() {
        let err = ShunyaError::IncompleteLogRecord {
            field: "end_time",
            nonce: Some(5),
        };
        let msg = explain(&err);
        assert_eq!(msg.severity, Severity::Rejected);
        assert!(!msg.retriable);
        assert!(msg.suggestion.contains("end_time"));
    }

    #[test]
    fn corrupt_key_and_ledger_are_fatal() {
        let key = ShunyaError::KeyMaterialCorrupt {
            path: PathBuf::from("k.pem"),
            reason: "bad PEM".into(),
        };
        let ledger = ShunyaError::LedgerCorrupt {
            path: PathBuf::from("chain.json"),
            reason: "EOF".into(),
        };
        assert_eq!(explain(&key).severity, Severity::Fatal);
        assert_eq!(explain(&ledger).severity, Severity::Fatal);
    }

    #[test]
    fn missing_key_asks_for_a_public_key() {
        let err = ShunyaError::KeyMissing {
            path: PathBuf::from("certificates/private_key.pem"),
        };
        let msg = explain(&err);
        assert_eq!(msg.severity, Severity::ActionRequired);
        assert!(msg.suggestion.contains("--public-key"));
        assert_eq!(
            explain(&ShunyaError::InexactNumber { value: "1e30".into() }).severity,
            Severity::Rejected
        );
    }

    #[test]
    fn lock_contention_is_retryable() {
        let err = ShunyaError::LedgerLocked {
            path: PathBuf::from("chain.json.lock"),
        };
        let msg = explain(&err);
        assert!(msg.retriable);
        assert!(msg.suggestion.contains("chain.json.lock"));
    }

    #[test]
    fn failed_export_points_at_export_command() {
        let err = ShunyaError::PersistenceFailure {
            stage: PersistStage::Certificate { nonce: 1_700_000_000 },
            path: PathBuf::from("certificate_1700000000.json"),
            source: std::io::Error::other("disk full"),
        };
        let msg = explain(&err);
        assert_eq!(msg.severity, Severity::ActionRequired);
        assert!(msg.suggestion.contains("shunya export 1700000000"));
    }
}
