// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Appender: the certify path from a finished wipe log to a committed block.
//
// Order matters: the chain append is the commit point.  The archive export
// runs only after it, so a failed export never leaves an unrecorded
// certificate behind; it can be redone from the chain.

use std::path::PathBuf;

use shunya_core::config::LedgerConfig;
use shunya_core::error::Result;
use shunya_core::{Certificate, WipeLogRecord};
use tracing::{info, instrument};

use crate::archive::CertificateArchive;
use crate::certificates::CertificateBuilder;
use crate::keystore::KeyStore;
use crate::ledger::LedgerChain;

/// What a successful `certify` produced.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub block_hash: String,
    pub certificate: Certificate,
    pub exported_to: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct LedgerAppender {
    builder: CertificateBuilder,
    ledger: LedgerChain,
    archive: Option<CertificateArchive>,
}

impl LedgerAppender {
    pub fn new(builder: CertificateBuilder, ledger: LedgerChain) -> Self {
        Self {
            builder,
            ledger,
            archive: None,
        }
    }

    pub fn with_archive(mut self, archive: CertificateArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Wire up key store, chain file and archive directory from `config`.
    pub fn open(config: &LedgerConfig, keys: &dyn KeyStore) -> Result<Self> {
        let key = keys.load_or_create()?;
        Ok(Self::new(
            CertificateBuilder::new(key),
            LedgerChain::new(config.chain_path()),
        )
        .with_archive(CertificateArchive::new(config.certificate_path())))
    }

    #[instrument(skip_all, fields(nonce = ?log.nonce))]
    pub fn certify(&self, log: &WipeLogRecord) -> Result<Receipt> {
        let certificate = self.builder.build(log)?;
        let block = self.ledger.append_latest(certificate)?;

        let exported_to = match &self.archive {
            Some(archive) => Some(archive.store(&block.cert)?),
            None => None,
        };
        info!(hash = %block.hash, "wipe certified");

        Ok(Receipt {
            block_hash: block.hash,
            certificate: block.cert,
            exported_to,
        })
    }

    pub fn builder(&self) -> &CertificateBuilder {
        &self.builder
    }

    pub fn ledger(&self) -> &LedgerChain {
        &self.ledger
    }

    pub fn archive(&self) -> Option<&CertificateArchive> {
        self.archive.as_ref()
    }
}
