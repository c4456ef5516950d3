// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand implementations.  Output goes to the writer passed in; logging
// goes to stderr through tracing.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use shunya_core::config::{self, LedgerConfig};
use shunya_core::error::{Result, ShunyaError};
use shunya_core::{Certificate, ChainVerification, WipeLogRecord};
use shunya_security::{
    CertificateArchive, KeyStore, LedgerAppender, LedgerChain, LedgerPublicKey, key_store_for,
    link_hash, verify_certificate,
};
use tracing::info;

use crate::cli::{CertifyArgs, CheckArgs, Cli, Command, ExportArgs};

/// Exit status for a ledger that fails verification.
pub const EXIT_BROKEN_CHAIN: u8 = 2;

pub fn run_command(cli: Cli, out: &mut dyn Write) -> Result<ExitCode> {
    let config = resolve_config(cli.config.as_deref(), cli.data_dir)?;
    info!(data_dir = %config.data_dir.display(), "configuration resolved");

    match cli.command {
        Command::Certify(args) => cmd_certify(&config, args, out),
        Command::Verify => cmd_verify(&config, out),
        Command::Check(args) => cmd_check(&config, args, out),
        Command::Export(args) => cmd_export(&config, args, out),
        Command::List => cmd_list(&config, out),
        Command::PublicKey => cmd_public_key(&config, out),
    }
}

/// `--config` names a file to read; `--data-dir` overrides its data root.
/// Without `--config`, `<data-dir>/config.json` is used when present.
fn resolve_config(
    config_file: Option<&Path>,
    data_dir: Option<std::path::PathBuf>,
) -> Result<LedgerConfig> {
    match config_file {
        Some(path) => {
            let mut config = LedgerConfig::from_file(path)?;
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            Ok(config)
        }
        None => LedgerConfig::load(data_dir.unwrap_or_else(config::default_data_dir)),
    }
}

fn key_store(config: &LedgerConfig) -> Result<Box<dyn KeyStore>> {
    key_store_for(config, std::env::var(config::PASSPHRASE_ENV).ok())
}

/// Only the certify path may create the signing key.
fn open_appender(config: &LedgerConfig) -> Result<LedgerAppender> {
    LedgerAppender::open(config, key_store(config)?.as_ref())
}

/// Public half of the existing signing key; `KeyMissing` if there is none.
fn existing_public_key(config: &LedgerConfig) -> Result<LedgerPublicKey> {
    let keys = key_store(config)?;
    match keys.load()? {
        Some(key) => Ok(key.public_key().clone()),
        None => Err(ShunyaError::KeyMissing {
            path: keys.location().to_path_buf(),
        }),
    }
}

fn cmd_certify(config: &LedgerConfig, args: CertifyArgs, out: &mut dyn Write) -> Result<ExitCode> {
    let log = WipeLogRecord::from_slice(&fs::read(&args.log)?)?;
    let receipt = open_appender(config)?.certify(&log)?;

    writeln!(out, "certified nonce {}", receipt.certificate.nonce)?;
    writeln!(out, "  block    {}", receipt.block_hash)?;
    writeln!(out, "  log_hash {}", receipt.certificate.log_hash)?;
    writeln!(out, "  qr       {}", receipt.certificate.qr_payload())?;
    if let Some(path) = &receipt.exported_to {
        writeln!(out, "  exported {}", path.display())?;
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_verify(config: &LedgerConfig, out: &mut dyn Write) -> Result<ExitCode> {
    let ledger = LedgerChain::new(config.chain_path());
    let result = ledger.verify_stored()?;
    writeln!(out, "{}: {result}", ledger.path().display())?;
    Ok(match result {
        ChainVerification::Valid { .. } => ExitCode::SUCCESS,
        ChainVerification::Broken { .. } => ExitCode::from(EXIT_BROKEN_CHAIN),
    })
}

fn cmd_check(config: &LedgerConfig, args: CheckArgs, out: &mut dyn Write) -> Result<ExitCode> {
    let cert: Certificate = serde_json::from_slice(&fs::read(&args.cert)?)?;
    let log = WipeLogRecord::from_slice(&fs::read(&args.log)?)?;

    let public_key = match &args.public_key {
        Some(path) => LedgerPublicKey::from_pem(&fs::read_to_string(path)?)?,
        None => existing_public_key(config)?,
    };
    verify_certificate(&cert, &log, &public_key)?;
    writeln!(out, "certificate {} matches its wipe log", cert.nonce)?;

    // The ledger holds exactly one certificate per nonce; a different one
    // there means this copy was not the one recorded.
    let chain = LedgerChain::new(config.chain_path()).load()?;
    match chain.blocks().iter().position(|b| b.cert.nonce == cert.nonce) {
        Some(index) => {
            let block = &chain.blocks()[index];
            let recomputed = link_hash(&cert, &block.prev_hash)?;
            if recomputed != block.hash {
                return Err(ShunyaError::IntegrityMismatch {
                    expected: block.hash.clone(),
                    actual: recomputed,
                });
            }
            writeln!(out, "recorded in ledger block {index}")?;
        }
        None => writeln!(out, "not recorded in this ledger")?,
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_export(config: &LedgerConfig, args: ExportArgs, out: &mut dyn Write) -> Result<ExitCode> {
    let block = LedgerChain::new(config.chain_path()).find(args.nonce)?;
    let path = CertificateArchive::new(config.certificate_path()).store(&block.cert)?;
    writeln!(out, "{}", path.display())?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_list(config: &LedgerConfig, out: &mut dyn Write) -> Result<ExitCode> {
    let chain = LedgerChain::new(config.chain_path()).load()?;
    if chain.is_empty() {
        writeln!(out, "ledger is empty")?;
    }
    for (index, block) in chain.blocks().iter().enumerate() {
        writeln!(
            out,
            "{index:>5}  {:>12}  {:<16}  {}",
            block.cert.nonce, block.cert.device, block.hash
        )?;
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_public_key(config: &LedgerConfig, out: &mut dyn Write) -> Result<ExitCode> {
    let public_key = existing_public_key(config)?;
    write!(out, "{}", public_key.to_pem()?)?;
    info!(fingerprint = %public_key.fingerprint(), "public key exported");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    struct Workspace {
        dir: tempfile::TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn data_dir(&self) -> &Path {
            self.dir.path()
        }

        fn run(&self, args: &[&str]) -> (Result<ExitCode>, String) {
            let mut argv = vec!["shunya", "--data-dir", self.data_dir().to_str().unwrap()];
            argv.extend_from_slice(args);
            let cli = Cli::try_parse_from(argv).unwrap();
            let mut out = Vec::new();
            let result = run_command(cli, &mut out);
            (result, String::from_utf8(out).unwrap())
        }

        fn write_log(&self, nonce: u64) -> String {
            let path = self.dir.path().join(format!("wipe_{nonce}.json"));
            let log = serde_json::json!({
                "drive_path": "/dev/sdX",
                "method": "standard",
                "start_time": "2026-10-16T08:00:00.000000",
                "end_time": "2026-10-16T08:42:10.512000",
                "nonce": nonce,
                "progress": [{"time": "2026-10-16T08:42:10.512000", "msg": "Wipe completed"}],
                "last_message": "Wipe completed"
            });
            fs::write(&path, serde_json::to_vec_pretty(&log).unwrap()).unwrap();
            path.to_str().unwrap().to_owned()
        }
    }

    #[test]
    fn certify_list_export_check_verify() {
        let ws = Workspace::new();
        let first = ws.write_log(1_700_000_000);
        let second = ws.write_log(1_700_000_500);

        let (result, text) = ws.run(&["certify", &first]);
        assert_eq!(result.unwrap(), ExitCode::SUCCESS);
        assert!(text.contains("certified nonce 1700000000"));
        assert!(text.contains("SHA256:"));
        ws.run(&["certify", &second]).0.unwrap();

        let (_, listing) = ws.run(&["list"]);
        assert_eq!(listing.lines().count(), 2);
        assert!(listing.contains("1700000500"));

        let exported = ws.data_dir().join("certificates/certificate_1700000000.json");
        fs::remove_file(&exported).unwrap();
        let (result, text) = ws.run(&["export", "1700000000"]);
        assert_eq!(result.unwrap(), ExitCode::SUCCESS);
        assert_eq!(text.trim(), exported.display().to_string());

        let (result, text) = ws.run(&["check", exported.to_str().unwrap(), "--log", &first]);
        assert_eq!(result.unwrap(), ExitCode::SUCCESS);
        assert!(text.contains("recorded in ledger block 0"));

        let (result, text) = ws.run(&["verify"]);
        assert_eq!(result.unwrap(), ExitCode::SUCCESS);
        assert!(text.contains("chain intact (2 blocks)"));

        let (result, pem) = ws.run(&["public-key"]);
        assert_eq!(result.unwrap(), ExitCode::SUCCESS);
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));

        // Tamper with the first block and verify again.
        let chain_path = ws.data_dir().join("blockchain.json");
        let mut value: serde_json::Value =
            serde_json::from_slice(&fs::read(&chain_path).unwrap()).unwrap();
        value[0]["cert"]["device"] = "/dev/sdY".into();
        fs::write(&chain_path, serde_json::to_vec(&value).unwrap()).unwrap();

        let (result, _) = ws.run(&["verify"]);
        assert_eq!(result.unwrap(), ExitCode::from(EXIT_BROKEN_CHAIN));
    }

    #[test]
    fn unknown_nonce_and_incomplete_log_are_errors() {
        let ws = Workspace::new();
        assert!(matches!(
            ws.run(&["export", "5"]).0,
            Err(ShunyaError::CertificateNotFound { nonce: 5 })
        ));

        let path = ws.dir.path().join("partial.json");
        fs::write(&path, br#"{"drive_path": "/dev/sdX", "nonce": 6}"#).unwrap();
        assert!(matches!(
            ws.run(&["certify", path.to_str().unwrap()]).0,
            Err(ShunyaError::IncompleteLogRecord { field: "method", nonce: Some(6) })
        ));
    }

    #[test]
    fn read_only_commands_never_create_a_key() {
        let ws = Workspace::new();
        let log = ws.write_log(9);
        let cert_path = ws.dir.path().join("cert.json");
        fs::write(
            &cert_path,
            br#"{"device": "/dev/sdX", "wipe_method": "standard",
                 "start_time": "2026-10-16T08:00:00.000000",
                 "end_time": "2026-10-16T08:42:10.512000", "nonce": 9,
                 "log_hash": "00", "signature": "00", "generated_at": "T"}"#,
        )
        .unwrap();
        let key_path = ws.data_dir().join("certificates/private_key.pem");

        assert!(matches!(
            ws.run(&["check", cert_path.to_str().unwrap(), "--log", &log]).0,
            Err(ShunyaError::KeyMissing { path }) if path == key_path
        ));
        assert!(matches!(
            ws.run(&["public-key"]).0,
            Err(ShunyaError::KeyMissing { .. })
        ));
        assert!(!key_path.exists());
        assert!(!ws.data_dir().join("certificates").exists());
    }

    #[test]
    fn empty_ledger_lists_and_verifies() {
        let ws = Workspace::new();
        let (result, text) = ws.run(&["list"]);
        assert_eq!(result.unwrap(), ExitCode::SUCCESS);
        assert_eq!(text.trim(), "ledger is empty");
        assert_eq!(ws.run(&["verify"]).0.unwrap(), ExitCode::SUCCESS);
    }

    #[test]
    fn explicit_config_file_with_data_dir_override() {
        let ws = Workspace::new();
        let config_path = ws.dir.path().join("custom.json");
        fs::write(&config_path, br#"{"chain_file": "ledger/chain.json"}"#).unwrap();

        let config = resolve_config(Some(&config_path), Some(ws.data_dir().to_path_buf())).unwrap();
        assert_eq!(config.chain_path(), ws.data_dir().join("ledger/chain.json"));
        assert_eq!(config.key_path(), ws.data_dir().join("certificates/private_key.pem"));
    }
}
