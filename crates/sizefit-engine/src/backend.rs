// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compression backends — turn source PDF bytes into compressed PDF bytes.
//
// The local backend recompresses images and compacts the document on this
// machine; the remote backend delegates to a compression service. Which one
// runs is decided by configuration through the `Backend` enum.

use std::future::Future;

use sizefit_core::config::BackendSettings;
use sizefit_core::error::Result;
use sizefit_core::{CompressionProfile, CompressionWarning};
use sizefit_document::{DocumentSerializer, PdfDocument, RasterRecompressor};
use tracing::{debug, instrument};

use crate::remote::RemoteBackend;

/// Output of one backend call: complete compressed bytes, never partial.
#[derive(Debug, Clone)]
pub struct CompressedDocument {
    pub bytes: Vec<u8>,
    /// Non-fatal conditions hit while compressing (e.g. skipped images).
    pub warnings: Vec<CompressionWarning>,
}

/// The single operation every backend provides.
pub trait CompressionBackend: Send + Sync {
    fn compress(
        &self,
        source: &[u8],
        profile: &CompressionProfile,
    ) -> impl Future<Output = Result<CompressedDocument>> + Send;
}

/// Raster recompression followed by structural compaction, all in-process.
#[derive(Debug, Clone, Default)]
pub struct LocalBackend {
    serializer: DocumentSerializer,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_serializer(serializer: DocumentSerializer) -> Self {
        Self { serializer }
    }

    /// Synchronous body of [`CompressionBackend::compress`].
    #[instrument(skip_all, fields(source_bytes = source.len()))]
    pub fn compress_blocking(
        &self,
        source: &[u8],
        profile: &CompressionProfile,
    ) -> Result<CompressedDocument> {
        let recompressor = RasterRecompressor::new(*profile)?;
        let mut document = PdfDocument::from_bytes(source)?;
        let report = recompressor.recompress(&mut document)?;
        let bytes = self.serializer.serialize_owned(document)?;

        debug!(
            output_bytes = bytes.len(),
            skipped = report.skipped.len(),
            "Local compression finished"
        );
        Ok(CompressedDocument {
            bytes,
            warnings: report.skipped,
        })
    }
}

impl CompressionBackend for LocalBackend {
    async fn compress(
        &self,
        source: &[u8],
        profile: &CompressionProfile,
    ) -> Result<CompressedDocument> {
        self.compress_blocking(source, profile)
    }
}

/// Backend chosen from [`BackendSettings`].
#[derive(Debug, Clone)]
pub enum Backend {
    Local(LocalBackend),
    Remote(RemoteBackend),
}

impl Backend {
    pub fn from_settings(settings: &BackendSettings) -> Result<Self> {
        match settings {
            BackendSettings::Local => Ok(Self::Local(LocalBackend::new())),
            BackendSettings::Remote(remote) => Ok(Self::Remote(RemoteBackend::new(remote.clone())?)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Remote(_) => "remote",
        }
    }
}

impl CompressionBackend for Backend {
    async fn compress(
        &self,
        source: &[u8],
        profile: &CompressionProfile,
    ) -> Result<CompressedDocument> {
        match self {
            Self::Local(local) => local.compress(source, profile).await,
            Self::Remote(remote) => remote.compress(source, profile).await,
        }
    }
}
