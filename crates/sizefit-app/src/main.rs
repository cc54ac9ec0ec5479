// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sizefit — fit PDF files under a per-file size limit.
//
// Entry point. Initialises logging, resolves the limit and profile from the
// command line and configuration, runs the compression job on the worker,
// and places the resulting files on disk.

mod cli;
mod config_dir;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sizefit_core::config::BackendSettings;
use sizefit_core::error::{Result, SizefitError};
use sizefit_core::human_errors::humanize_error;
use sizefit_engine::{Backend, CompressionOrchestrator, CompressionRequest, CompressionWorker};

use cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::info!(input = %args.input.display(), "Sizefit starting");

    match run(&args).await {
        Ok(paths) => {
            for path in paths {
                println!("{}", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "Sizefit failed");
            let human = humanize_error(&err);
            eprintln!("{}\n{}", human.message, human.suggestion);
            ExitCode::FAILURE
        }
    }
}

/// Run one invocation end to end and return the files written.
async fn run(args: &Args) -> Result<Vec<PathBuf>> {
    let config = config_dir::load_config(args.config.as_deref())?;
    let budget = args.resolve_budget(&config)?;
    let profile = args.resolve_profile(config.profile)?;

    let settings = if args.remote {
        match &config.backend {
            BackendSettings::Remote(_) => config.backend.clone(),
            BackendSettings::Local => {
                return Err(SizefitError::Configuration(
                    "--remote needs a remote backend in the configuration file".into(),
                ));
            }
        }
    } else {
        BackendSettings::Local
    };
    let backend = Backend::from_settings(&settings)?;

    let source = std::fs::read(&args.input)?;
    let request = CompressionRequest::new(source, budget)
        .with_profile(profile)
        .with_oversize_policy(config.oversize_policy);

    tracing::info!(backend = backend.name(), %budget, "Compressing");
    let worker = CompressionWorker::new(CompressionOrchestrator::new(backend));
    let outcome = worker.submit(request).wait().await?;

    for warning in &outcome.warnings {
        tracing::warn!(%warning, "Compression warning");
        eprintln!("warning: {warning}");
    }
    tracing::info!(
        source_bytes = outcome.source_size,
        compressed_bytes = outcome.compressed_size,
        files = outcome.artifacts.len(),
        "Compression complete"
    );

    output::place_outcome(&args.input, &args.output_dir(), &outcome)
}
