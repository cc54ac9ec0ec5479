// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compression orchestrator — compress once, then either hand back the single
// result or split it into budget-sized parts.

use sizefit_core::error::Result;
use sizefit_core::{
    Artifact, CompressionOutcome, CompressionProfile, OversizePolicy, SizeBudget,
};
use sizefit_document::{BudgetPartitioner, DocumentSerializer, PdfDocument, PdfPageSource};
use tracing::{info, instrument};

use crate::backend::CompressionBackend;

/// Everything one compression run needs. Owned, so it can be moved to a worker.
#[derive(Debug, Clone)]
pub struct CompressionRequest {
    pub source: Vec<u8>,
    pub budget: SizeBudget,
    pub profile: CompressionProfile,
    pub oversize_policy: OversizePolicy,
}

impl CompressionRequest {
    pub fn new(source: Vec<u8>, budget: SizeBudget) -> Self {
        Self {
            source,
            budget,
            profile: CompressionProfile::default(),
            oversize_policy: OversizePolicy::default(),
        }
    }

    pub fn with_profile(mut self, profile: CompressionProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_oversize_policy(mut self, policy: OversizePolicy) -> Self {
        self.oversize_policy = policy;
        self
    }
}

/// Runs a request against a backend. Performs no file I/O.
#[derive(Debug, Clone)]
pub struct CompressionOrchestrator<B> {
    backend: B,
    serializer: DocumentSerializer,
}

impl<B: CompressionBackend> CompressionOrchestrator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            serializer: DocumentSerializer::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Compress `request.source` and fit the result into `request.budget`.
    ///
    /// Returns one artifact when the compressed document already fits,
    /// otherwise the ordered parts produced by a single partitioning pass
    /// over the compressed document. Ordinals start at 1.
    #[instrument(skip_all, fields(
        source_bytes = request.source.len(),
        budget = request.budget.bytes(),
    ))]
    pub async fn compress_and_partition(
        &self,
        request: &CompressionRequest,
    ) -> Result<CompressionOutcome> {
        request.profile.validate()?;

        let compressed = self
            .backend
            .compress(&request.source, &request.profile)
            .await?;
        let mut warnings = compressed.warnings;
        let compressed_size = compressed.bytes.len() as u64;
        let document = PdfDocument::from_bytes(&compressed.bytes)?;
        let page_count = document.page_count();

        info!(
            source_bytes = request.source.len(),
            compressed_bytes = compressed_size,
            pages = page_count,
            "Compression finished"
        );

        let artifacts = if request.budget.fits(compressed.bytes.len()) {
            vec![Artifact::new(1, 0..page_count, compressed.bytes)]
        } else {
            info!("Compressed document exceeds budget, partitioning");
            let source = PdfPageSource::new(&document, &self.serializer);
            let plan = BudgetPartitioner::new(request.budget)
                .with_policy(request.oversize_policy)
                .partition(&source)?;
            warnings.extend(plan.warnings);
            plan.parts
                .into_iter()
                .enumerate()
                .map(|(index, part)| Artifact::new(index + 1, part.partition.pages, part.bytes))
                .collect()
        };

        info!(artifacts = artifacts.len(), warnings = warnings.len(), "Outcome ready");
        Ok(CompressionOutcome {
            artifacts,
            source_size: request.source.len() as u64,
            compressed_size,
            page_count,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use sizefit_core::{CompressionWarning, RemotePhase, SizefitError};
    use sizefit_document::testing::{FixtureImage, PdfFixture, fixture_labels};

    use super::*;
    use crate::backend::{CompressedDocument, LocalBackend};

    /// Returns the source unchanged and counts calls.
    #[derive(Default)]
    struct PassThrough {
        calls: AtomicUsize,
    }

    impl CompressionBackend for PassThrough {
        async fn compress(
            &self,
            source: &[u8],
            _profile: &CompressionProfile,
        ) -> Result<CompressedDocument> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CompressedDocument {
                bytes: source.to_vec(),
                warnings: Vec::new(),
            })
        }
    }

    struct Unreachable;

    impl CompressionBackend for Unreachable {
        async fn compress(
            &self,
            _source: &[u8],
            _profile: &CompressionProfile,
        ) -> Result<CompressedDocument> {
            Err(SizefitError::backend(RemotePhase::Upload, "connection failed"))
        }
    }

    fn fixture_bytes(pages: usize, side: u32) -> Vec<u8> {
        let mut fixture = PdfFixture::new();
        fixture.distinct_pages(pages, side);
        fixture.build()
    }

    fn budget(bytes: u64) -> SizeBudget {
        SizeBudget::new(bytes).unwrap()
    }

    #[tokio::test]
    async fn result_within_budget_is_a_single_artifact() {
        let source = fixture_bytes(3, 64);
        let orchestrator = CompressionOrchestrator::new(LocalBackend::new());
        let request = CompressionRequest::new(source.clone(), budget(source.len() as u64 * 4));

        let outcome = orchestrator.compress_and_partition(&request).await.unwrap();

        assert!(!outcome.is_partitioned());
        let artifact = &outcome.artifacts[0];
        assert_eq!(artifact.ordinal, 1);
        assert_eq!(artifact.pages, 0..3);
        assert_eq!(artifact.len() as u64, outcome.compressed_size);
        assert_eq!(outcome.page_count, 3);
        assert_eq!(outcome.source_size, source.len() as u64);
        assert_eq!(fixture_labels(&artifact.bytes), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn oversized_result_is_split_into_ordered_parts() {
        let source = fixture_bytes(6, 96);
        let orchestrator = CompressionOrchestrator::new(PassThrough::default());
        let limit = budget(source.len() as u64 / 2);
        let request = CompressionRequest::new(source, limit);

        let outcome = orchestrator.compress_and_partition(&request).await.unwrap();

        assert!(outcome.is_partitioned());
        assert_eq!(orchestrator.backend().calls.load(Ordering::SeqCst), 1);
        let mut labels = Vec::new();
        for (index, artifact) in outcome.artifacts.iter().enumerate() {
            assert_eq!(artifact.ordinal, index + 1);
            assert!(limit.fits(artifact.len()));
            labels.extend(fixture_labels(&artifact.bytes));
        }
        assert_eq!(labels, vec![0, 1, 2, 3, 4, 5]);
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn same_request_gives_identical_artifacts() {
        let source = fixture_bytes(5, 80);
        let orchestrator = CompressionOrchestrator::new(PassThrough::default());
        let request = CompressionRequest::new(source.clone(), budget(source.len() as u64 / 3));

        let first = orchestrator.compress_and_partition(&request).await.unwrap();
        let second = orchestrator.compress_and_partition(&request).await.unwrap();

        let digests = |outcome: &CompressionOutcome| {
            outcome
                .artifacts
                .iter()
                .map(|a| a.sha256.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(digests(&first), digests(&second));
    }

    #[tokio::test]
    async fn page_over_budget_is_emitted_with_a_warning() {
        let source = fixture_bytes(2, 128);
        let orchestrator = CompressionOrchestrator::new(PassThrough::default());
        let request = CompressionRequest::new(source, budget(1_000));

        let outcome = orchestrator.compress_and_partition(&request).await.unwrap();

        assert_eq!(outcome.artifacts.len(), 2);
        assert_eq!(outcome.warnings.len(), 2);
        assert!(
            outcome
                .warnings
                .iter()
                .all(|w| matches!(w, CompressionWarning::OversizedSingleton { .. }))
        );
    }

    #[tokio::test]
    async fn strict_policy_fails_on_a_page_over_budget() {
        let source = fixture_bytes(2, 128);
        let orchestrator = CompressionOrchestrator::new(PassThrough::default());
        let request = CompressionRequest::new(source, budget(1_000))
            .with_oversize_policy(OversizePolicy::Fail);

        let err = orchestrator.compress_and_partition(&request).await.unwrap_err();
        assert!(matches!(err, SizefitError::OversizedPage { page: 0, .. }));
    }

    #[tokio::test]
    async fn skipped_images_surface_as_warnings() {
        let mut fixture = PdfFixture::new();
        let broken = fixture.image(FixtureImage::Corrupt);
        let good = fixture.image(FixtureImage::noise(48, 48, 3));
        fixture.page(&[broken]).page(&[good]);
        let source = fixture.build();

        let orchestrator = CompressionOrchestrator::new(LocalBackend::new());
        let request = CompressionRequest::new(source, budget(10_000_000));
        let outcome = orchestrator.compress_and_partition(&request).await.unwrap();

        assert_eq!(outcome.artifacts.len(), 1);
        assert!(matches!(
            outcome.warnings.as_slice(),
            [CompressionWarning::ImageSkipped { .. }]
        ));
    }

    #[tokio::test]
    async fn backend_failure_produces_no_outcome() {
        let orchestrator = CompressionOrchestrator::new(Unreachable);
        let request = CompressionRequest::new(fixture_bytes(1, 16), budget(1_000_000));

        let err = orchestrator.compress_and_partition(&request).await.unwrap_err();
        assert!(matches!(
            err,
            SizefitError::Backend {
                phase: RemotePhase::Upload,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn invalid_profile_is_rejected_before_compressing() {
        let orchestrator = CompressionOrchestrator::new(PassThrough::default());
        let request = CompressionRequest::new(fixture_bytes(1, 16), budget(1_000_000))
            .with_profile(CompressionProfile {
                quality: 101,
                ..CompressionProfile::default()
            });

        let err = orchestrator.compress_and_partition(&request).await.unwrap_err();
        assert!(matches!(err, SizefitError::Configuration(_)));
        assert_eq!(orchestrator.backend().calls.load(Ordering::SeqCst), 0);
    }
}
