//! CLI entry point for ztnc.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use ztnc_cli::{execute, CliConfig, Options};
use ztnc_core::CancellationToken;
use ztnc_loopback::LoopbackStack;
use ztnc_streaming::LocalIo;

/// Exit status for malformed invocations (-1 as seen by the shell).
const USAGE_EXIT: u8 = 255;

fn main() -> ExitCode {
    let config = match CliConfig::try_parse() {
        Ok(config) => config,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(USAGE_EXIT)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_tracing(config.verbose);

    let options = match config.options() {
        Ok(options) => options,
        Err(err) => {
            eprintln!("ztnc: {err}");
            return ExitCode::from(USAGE_EXIT);
        }
    };

    match run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!(error = ?err, "session failed");
            eprintln!("ztnc: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(options: &Options) -> anyhow::Result<()> {
    let token = CancellationToken::new();
    token
        .register_term_signals()
        .context("failed to install signal handlers")?;

    // The temporary directory outlives `stack` (dropped in reverse order),
    // so it is deleted only after the node is down.
    let (cache_dir, _ephemeral) = match &options.cache_dir {
        Some(dir) => (dir.clone(), None),
        None => {
            let tmp = tempfile::Builder::new()
                .prefix("ztnc-")
                .tempdir()
                .context("failed to create cache directory")?;
            (tmp.path().to_path_buf(), Some(tmp))
        }
    };

    let stack = LoopbackStack::default();
    let local = LocalIo::stdio(options.pump.poll_interval);
    execute(&stack, options, &cache_dir, local, &token)?;
    Ok(())
}
