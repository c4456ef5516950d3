// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shunya: signed erasure certificates on a tamper-evident ledger
//
// Entry point. Initialises logging, parses the command line, and runs the
// requested subcommand.  Failures are printed in operator terms.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use shunya_core::human_errors::explain;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    let mut stdout = std::io::stdout().lock();

    match commands::run_command(cli, &mut stdout) {
        Ok(code) => code,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            let help = explain(&err);
            eprintln!("error: {}", help.message);
            eprintln!("  cause: {err}");
            eprintln!("  next:  {}", help.suggestion);
            ExitCode::FAILURE
        }
    }
}
