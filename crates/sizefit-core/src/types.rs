// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Sizefit budget engine.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Result, SizefitError};

/// Unique identifier for a compression job submitted to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable key of an embedded image within one document.
///
/// Mirrors the PDF indirect reference (object number + generation) of the
/// image stream, so every page that shares the image shares the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub number: u32,
    pub generation: u16,
}

impl ResourceId {
    pub fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

// ---------------------------------------------------------------------------
// Compression profile
// ---------------------------------------------------------------------------

/// DPI the source images are assumed to be authored at.
pub const REFERENCE_DPI: u32 = 300;

/// How aggressively raster images are recompressed. Immutable per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionProfile {
    /// Target resolution; `None` keeps the original pixel dimensions.
    pub target_dpi: Option<u32>,
    /// Resolution the scale factor is computed against.
    pub reference_dpi: u32,
    /// JPEG quality, 1..=100.
    pub quality: u8,
}

impl CompressionProfile {
    pub fn new(target_dpi: Option<u32>, quality: u8) -> Result<Self> {
        let profile = Self {
            target_dpi,
            reference_dpi: REFERENCE_DPI,
            quality,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Reject profiles that cannot drive the recompressor.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.quality) {
            return Err(SizefitError::Configuration(format!(
                "quality must be between 1 and 100, got {}",
                self.quality
            )));
        }
        if self.reference_dpi == 0 {
            return Err(SizefitError::Configuration(
                "reference DPI must be positive".into(),
            ));
        }
        if self.target_dpi == Some(0) {
            return Err(SizefitError::Configuration(
                "target DPI must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Resize factor applied to both image dimensions, if resizing is enabled.
    pub fn scale(&self) -> Option<f64> {
        self.target_dpi
            .map(|dpi| f64::from(dpi) / f64::from(self.reference_dpi))
    }

    /// Pixel dimensions after applying [`scale`](Self::scale), never below 1x1.
    pub fn scaled_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        match self.scale() {
            Some(scale) => (
                ((f64::from(width) * scale) as u32).max(1),
                ((f64::from(height) * scale) as u32).max(1),
            ),
            None => (width, height),
        }
    }
}

impl Default for CompressionProfile {
    fn default() -> Self {
        Self {
            target_dpi: Some(150),
            reference_dpi: REFERENCE_DPI,
            quality: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// Size budget
// ---------------------------------------------------------------------------

/// Maximum byte size of one output artifact. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct SizeBudget(u64);

impl SizeBudget {
    pub fn new(bytes: u64) -> Result<Self> {
        if bytes == 0 {
            return Err(SizefitError::Configuration(
                "size budget must be a positive number of bytes".into(),
            ));
        }
        Ok(Self(bytes))
    }

    pub fn bytes(&self) -> u64 {
        self.0
    }

    /// Whether a payload of `len` bytes fits within the budget.
    pub fn fits(&self, len: usize) -> bool {
        len as u64 <= self.0
    }
}

impl TryFrom<u64> for SizeBudget {
    type Error = SizefitError;

    fn try_from(bytes: u64) -> Result<Self> {
        Self::new(bytes)
    }
}

impl TryFrom<i64> for SizeBudget {
    type Error = SizefitError;

    fn try_from(bytes: i64) -> Result<Self> {
        if bytes <= 0 {
            return Err(SizefitError::Configuration(format!(
                "size budget must be positive, got {bytes}"
            )));
        }
        Self::new(bytes as u64)
    }
}

impl From<SizeBudget> for u64 {
    fn from(budget: SizeBudget) -> Self {
        budget.0
    }
}

impl fmt::Display for SizeBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

impl FromStr for SizeBudget {
    type Err = SizefitError;

    /// Parse `"5000000"`, `"5MB"`, `"4.5 MiB"`, `"500kb"` and similar.
    ///
    /// Decimal units are powers of 1000, binary units powers of 1024.
    fn from_str(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let split = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);

        let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
            "" | "b" => 1,
            "k" | "kb" => 1_000,
            "m" | "mb" => 1_000_000,
            "g" | "gb" => 1_000_000_000,
            "kib" => 1 << 10,
            "mib" => 1 << 20,
            "gib" => 1 << 30,
            other => {
                return Err(SizefitError::Configuration(format!(
                    "unknown size unit '{other}' in '{input}'"
                )));
            }
        };

        let value: f64 = number.parse().map_err(|_| {
            SizefitError::Configuration(format!("'{input}' is not a valid size"))
        })?;
        if !value.is_finite() || value <= 0.0 {
            return Err(SizefitError::Configuration(format!(
                "size budget must be positive, got '{input}'"
            )));
        }

        Self::new((value * multiplier as f64).round() as u64)
    }
}

/// What to do when a single page cannot fit the budget on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizePolicy {
    /// Emit the page as its own oversized partition and record a warning.
    #[default]
    Emit,
    /// Abort with [`SizefitError::OversizedPage`].
    Fail,
}

// ---------------------------------------------------------------------------
// Partitioning results
// ---------------------------------------------------------------------------

/// A contiguous, ordered run of page indices (0-based, end exclusive) plus
/// the serialized size of the sub-document built from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub pages: Range<usize>,
    pub size: u64,
    /// Set when the partition is a single page that exceeds the budget.
    pub oversized: bool,
}

impl Partition {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// One output file: serialized PDF bytes plus its place in the output set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// 1-based position; ordinal order matches page order.
    pub ordinal: usize,
    /// Source page indices covered (0-based, end exclusive).
    pub pages: Range<usize>,
    pub bytes: Vec<u8>,
    /// Lowercase hex SHA-256 of `bytes`.
    pub sha256: String,
}

impl Artifact {
    pub fn new(ordinal: usize, pages: Range<usize>, bytes: Vec<u8>) -> Self {
        let sha256 = hex::encode(Sha256::digest(&bytes));
        Self {
            ordinal,
            pages,
            bytes,
            sha256,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Non-fatal conditions collected while producing an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressionWarning {
    /// An embedded image could not be decoded and was left untouched.
    ImageSkipped { resource: ResourceId, reason: String },
    /// A single page exceeds the budget on its own and was emitted anyway.
    OversizedSingleton { page: usize, size: u64, budget: u64 },
}

impl fmt::Display for CompressionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageSkipped { resource, reason } => {
                write!(f, "image {resource} left unchanged: {reason}")
            }
            Self::OversizedSingleton { page, size, budget } => write!(
                f,
                "page {} is {size} bytes on its own, over the {budget} byte budget",
                page + 1
            ),
        }
    }
}

/// Everything the orchestrator hands back to its caller.
#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    /// Ordered output files; exactly one when no split was needed.
    pub artifacts: Vec<Artifact>,
    pub source_size: u64,
    /// Size of the backend's compressed document before any split.
    pub compressed_size: u64,
    pub page_count: usize,
    pub warnings: Vec<CompressionWarning>,
}

impl CompressionOutcome {
    pub fn is_partitioned(&self) -> bool {
        self.artifacts.len() > 1
    }
}

// ---------------------------------------------------------------------------
// Remote service
// ---------------------------------------------------------------------------

/// The discrete network calls of the remote compression protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemotePhase {
    Authenticate,
    Start,
    Upload,
    Process,
    Download,
}

impl RemotePhase {
    /// Whether repeating the call can create duplicate server-side work.
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, Self::Start)
    }
}

impl fmt::Display for RemotePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Authenticate => "authentication",
            Self::Start => "task creation",
            Self::Upload => "upload",
            Self::Process => "processing",
            Self::Download => "download",
        };
        f.write_str(name)
    }
}

/// Classification of errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Network blip, timeout, busy server — safe to retry automatically.
    Transient,
    /// User must take action (fix credentials, choose another budget).
    UserAction,
    /// Permanent failure — malformed document, rejected request, etc.
    Permanent,
}
