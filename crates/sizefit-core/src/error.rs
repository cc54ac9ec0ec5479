// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Sizefit.

use thiserror::Error;

use crate::types::{RemotePhase, ResourceId};

/// Top-level error type for all Sizefit operations.
#[derive(Debug, Error)]
pub enum SizefitError {
    // -- Document errors --
    #[error("image {resource} could not be decoded: {reason}")]
    ImageDecode { resource: ResourceId, reason: String },

    #[error("PDF operation failed: {0}")]
    Pdf(String),

    #[error("PDF serialization failed: {0}")]
    Serialization(String),

    #[error("page {page} alone is {size} bytes, over the {budget} byte budget")]
    OversizedPage { page: usize, size: u64, budget: u64 },

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Configuration(String),

    // -- Remote backend --
    #[error("compression service failed during {phase}: {detail}")]
    Backend { phase: RemotePhase, detail: String },

    #[error("background worker failed: {0}")]
    Worker(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SizefitError {
    /// Shorthand for a backend failure in the given phase.
    pub fn backend(phase: RemotePhase, detail: impl Into<String>) -> Self {
        Self::Backend {
            phase,
            detail: detail.into(),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SizefitError>;
