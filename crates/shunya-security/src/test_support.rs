// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared fixtures for unit tests.  RSA key generation dominates test time,
// so every test in the crate reuses the same two keys.

use std::sync::OnceLock;

use shunya_core::WipeLogRecord;

use crate::keys::SigningKeyPair;

pub(crate) fn shared_key() -> SigningKeyPair {
    static KEY: OnceLock<SigningKeyPair> = OnceLock::new();
    KEY.get_or_init(|| SigningKeyPair::generate().expect("generate shared test key"))
        .clone()
}

pub(crate) fn other_key() -> SigningKeyPair {
    static KEY: OnceLock<SigningKeyPair> = OnceLock::new();
    KEY.get_or_init(|| SigningKeyPair::generate().expect("generate second test key"))
        .clone()
}

/// A finished wipe log with a short progress trail.
pub(crate) fn sample_log(nonce: u64) -> WipeLogRecord {
    WipeLogRecord::completed(
        "/dev/sdX",
        "standard",
        "2026-10-16T08:00:00.000000",
        "2026-10-16T08:42:10.512000",
        nonce,
    )
    .with_progress("2026-10-16T08:00:00.000000", "Wipe started")
    .with_progress("2026-10-16T08:21:03.000000", "Pass 1/1: 50%")
    .with_progress("2026-10-16T08:42:10.512000", "Wipe completed")
}
