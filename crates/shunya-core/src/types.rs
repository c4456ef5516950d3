// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: the wipe log handed over by the executor, the signed
// certificate derived from it, and the hash-linked blocks of the ledger.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ShunyaError};

/// Predecessor link of the first block: 64 ASCII zeros.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

// ---------------------------------------------------------------------------
// Wipe log
// ---------------------------------------------------------------------------

/// One line of the executor's progress trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub time: String,
    pub msg: String,
    /// Anything else the executor attached to this line.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// The finalized log of a single wipe run, as written by the wipe executor.
///
/// Every field the executor wrote is kept, including ones this crate does not
/// interpret (`extra`), because the certificate digest covers the whole
/// record.  Required fields are optional here so that an unfinished log still
/// parses; [`WipeLogRecord::require_complete`] is the gate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WipeLogRecord {
    #[serde(
        default,
        alias = "device_path",
        alias = "device",
        skip_serializing_if = "Option::is_none"
    )]
    pub drive_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Vec<ProgressEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    /// Fields outside the known schema, kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Borrowed view of the fields a certificate cannot be issued without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedWipe<'a> {
    pub device: &'a str,
    pub method: &'a str,
    pub start_time: &'a str,
    pub end_time: &'a str,
    pub nonce: u64,
}

impl WipeLogRecord {
    /// A finished log with no progress trail.
    pub fn completed(
        drive_path: impl Into<String>,
        method: impl Into<String>,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
        nonce: u64,
    ) -> Self {
        Self {
            drive_path: Some(drive_path.into()),
            method: Some(method.into()),
            start_time: Some(start_time.into()),
            end_time: Some(end_time.into()),
            nonce: Some(nonce),
            ..Self::default()
        }
    }

    /// Append a progress line.
    pub fn with_progress(mut self, time: impl Into<String>, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        self.last_message = Some(msg.clone());
        self.progress.get_or_insert_with(Vec::new).push(ProgressEntry {
            time: time.into(),
            msg,
            extra: BTreeMap::new(),
        });
        self
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Check that every field a certificate needs is present and non-blank.
    ///
    /// The nonce is checked first so that later failures can name the run.
    pub fn require_complete(&self) -> Result<CompletedWipe<'_>> {
        let nonce = self.nonce.ok_or(ShunyaError::IncompleteLogRecord {
            field: "nonce",
            nonce: None,
        })?;

        Ok(CompletedWipe {
            device: required(&self.drive_path, "drive_path", nonce)?,
            method: required(&self.method, "method", nonce)?,
            start_time: required(&self.start_time, "start_time", nonce)?,
            end_time: required(&self.end_time, "end_time", nonce)?,
            nonce,
        })
    }
}

fn required<'a>(value: &'a Option<String>, field: &'static str, nonce: u64) -> Result<&'a str> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ShunyaError::IncompleteLogRecord {
            field,
            nonce: Some(nonce),
        }),
    }
}

// ---------------------------------------------------------------------------
// Certificate
// ---------------------------------------------------------------------------

/// Signed statement that a wipe took place.  Field names are the stable
/// interface consumed by the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub device: String,
    pub wipe_method: String,
    pub start_time: String,
    pub end_time: String,
    pub nonce: u64,
    /// Lowercase hex SHA-256 of the canonical wipe log bytes.
    pub log_hash: String,
    /// Lowercase hex RSA-PSS signature over the canonical wipe log bytes.
    pub signature: String,
    /// RFC 3339 UTC instant the certificate was issued.
    pub generated_at: String,
}

impl Certificate {
    /// Text embedded in the certificate's QR code.
    pub fn qr_payload(&self) -> String {
        format!("SHA256:{}", self.log_hash)
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// One link of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub cert: Certificate,
    pub prev_hash: String,
    pub hash: String,
}

/// Ordered, append-only sequence of blocks.  Serializes as a plain JSON
/// array, which is the on-disk format of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap blocks obtained elsewhere (e.g. for verification).  No link
    /// checks are made; run the ledger verifier over the result.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn last(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Hash the next block must link to.
    pub fn tip_hash(&self) -> &str {
        self.blocks.last().map_or(GENESIS_HASH, |b| b.hash.as_str())
    }

    pub fn find(&self, nonce: u64) -> Option<&Block> {
        self.blocks.iter().find(|b| b.cert.nonce == nonce)
    }

    pub fn contains_nonce(&self, nonce: u64) -> bool {
        self.find(nonce).is_some()
    }

    /// Push a block that was linked against the current tip.
    ///
    /// Rejects a block whose `prev_hash` is not this chain's tip and a
    /// certificate nonce that is already present.
    pub fn push_linked(&mut self, block: Block) -> Result<()> {
        if block.prev_hash != self.tip_hash() {
            return Err(ShunyaError::LedgerConflict {
                expected: self.tip_hash().to_owned(),
                found: block.prev_hash,
            });
        }
        if self.contains_nonce(block.cert.nonce) {
            return Err(ShunyaError::DuplicateCertificate {
                nonce: block.cert.nonce,
            });
        }
        self.blocks.push(block);
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Chain {
    type Item = &'a Block;
    type IntoIter = std::slice::Iter<'a, Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

/// Why a block failed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainFault {
    /// Block 0 does not link to [`GENESIS_HASH`].
    GenesisMismatch { found: String },
    /// `prev_hash` is not the recomputed hash of the preceding block.
    BrokenLink { expected: String, found: String },
    /// Stored `hash` disagrees with the hash recomputed from the block.
    HashMismatch { stored: String, recomputed: String },
}

/// Outcome of walking the chain from genesis.  Tampering is a normal result,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainVerification {
    Valid { length: usize },
    Broken { index: usize, fault: ChainFault },
}

impl ChainVerification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Index of the first block that failed, if any.
    pub fn first_mismatch(&self) -> Option<usize> {
        match self {
            Self::Valid { .. } => None,
            Self::Broken { index, .. } => Some(*index),
        }
    }
}

impl fmt::Display for ChainVerification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid { length } => write!(f, "chain intact ({length} blocks)"),
            Self::Broken { index, fault } => match fault {
                ChainFault::GenesisMismatch { found } => {
                    write!(f, "block {index}: does not start at genesis (prev_hash {found})")
                }
                ChainFault::BrokenLink { expected, found } => {
                    write!(f, "block {index}: prev_hash {found}, expected {expected}")
                }
                ChainFault::HashMismatch { stored, recomputed } => {
                    write!(f, "block {index}: stored hash {stored}, recomputed {recomputed}")
                }
            },
        }
    }
}
