// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "shunya",
    about = "Shunya — signed erasure certificates on a tamper-evident ledger",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding the key, the ledger and exported certificates.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Explicit config file; defaults to `<data-dir>/config.json` if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Certify a finished wipe log and append it to the ledger
    Certify(CertifyArgs),
    /// Verify the whole ledger from genesis
    Verify,
    /// Check a certificate against its wipe log
    Check(CheckArgs),
    /// Re-export a certificate from the ledger into the archive
    Export(ExportArgs),
    /// List the ledger's blocks
    List,
    /// Print the ledger public key (SPKI PEM)
    PublicKey,
}

#[derive(Debug, Args)]
pub struct CertifyArgs {
    /// Wipe log JSON written by the wipe executor.
    pub log: PathBuf,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Certificate JSON.
    pub cert: PathBuf,
    /// The wipe log the certificate claims to cover.
    #[arg(long)]
    pub log: PathBuf,
    /// Verify with this public key PEM instead of the local signing key.
    #[arg(long)]
    pub public_key: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    pub nonce: u64,
}
