// src/bin/jobline.rs

use anyhow::Result;
use clap::Parser;
use colored::*;
use jobline::{Shell, cli::Cli, t};

/// Runs one command line and maps the outcome onto the process exit status:
/// 0 when orchestration succeeded, 1 after a reported wait failure or a fatal error.
fn main() {
    env_logger::init();

    match run(Cli::parse()) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            // --- Centralized Error Handling ---
            eprintln!("{}: {:#}", t!("cli.error.label").red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    log::debug!("CLI args parsed: {:?}", cli);

    let options = cli.options();
    let tokens = cli.into_tokens()?;

    // The policy has to be in place before the first fork.
    let shell = Shell::startup(options)?;
    let succeeded = shell.dispatch(tokens)?;
    shell.teardown();

    Ok(succeeded)
}
