// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments.

use std::path::{Path, PathBuf};

use clap::{ArgGroup, Parser};
use sizefit_core::config::AppConfig;
use sizefit_core::error::{Result, SizefitError};
use sizefit_core::{CompressionProfile, SizeBudget};

#[derive(Parser, Debug)]
#[command(name = "sizefit")]
#[command(
    author,
    version,
    about = "Compress a PDF and split it so every output file fits a size limit"
)]
#[command(group(ArgGroup::new("limit").required(true).args(["budget", "destination"])))]
pub struct Args {
    /// Input PDF file path
    #[arg(required = true)]
    pub input: PathBuf,

    /// Size limit per output file (e.g. 5000000, 5MB, 4.5MiB)
    #[arg(short, long)]
    pub budget: Option<SizeBudget>,

    /// Named destination from the configuration file whose limit applies
    #[arg(short, long)]
    pub destination: Option<String>,

    /// Target image resolution
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..), conflicts_with = "no_resize")]
    pub dpi: Option<u32>,

    /// Keep original image dimensions, only re-encode
    #[arg(long)]
    pub no_resize: bool,

    /// JPEG quality (1-100)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,

    /// Configuration file (defaults to the user config location)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output directory (defaults to the input file's directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Use the remote compression service from the configuration
    #[arg(long)]
    pub remote: bool,
}

impl Args {
    /// The budget given directly, or the limit of the named destination.
    pub fn resolve_budget(&self, config: &AppConfig) -> Result<SizeBudget> {
        match (&self.budget, &self.destination) {
            (Some(budget), _) => Ok(*budget),
            (None, Some(destination)) => config.budget_for(destination),
            (None, None) => Err(SizefitError::Configuration(
                "either --budget or --destination is required".into(),
            )),
        }
    }

    /// The configured profile with command-line overrides applied.
    pub fn resolve_profile(&self, base: CompressionProfile) -> Result<CompressionProfile> {
        let mut profile = base;
        if self.no_resize {
            profile.target_dpi = None;
        } else if let Some(dpi) = self.dpi {
            profile.target_dpi = Some(dpi);
        }
        if let Some(quality) = self.quality {
            profile.quality = quality;
        }
        profile.validate()?;
        Ok(profile)
    }

    pub fn output_dir(&self) -> PathBuf {
        match &self.output {
            Some(dir) => dir.clone(),
            None => self
                .input
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}
