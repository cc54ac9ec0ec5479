// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Budget partitioner — splits a document's pages into the fewest ordered,
// contiguous groups whose serialized size fits a byte budget.
//
// Greedy accumulation with a single-step backtrack: pages are added one at a
// time and the growing group is re-serialized after each addition. When a
// group overflows, the last page is moved to a fresh group. Each addition
// costs a full serialization, so an n-page document needs O(n) of them per
// group and O(n^2) in the one-page-per-group worst case.

use std::ops::Range;

use sizefit_core::error::{Result, SizefitError};
use sizefit_core::{CompressionWarning, OversizePolicy, Partition, SizeBudget};
use tracing::{debug, info, instrument, warn};

use crate::pdf::document::PdfDocument;
use crate::pdf::serializer::DocumentSerializer;

/// Anything that can serialize a contiguous page range as a standalone file.
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Bytes of a document holding exactly `pages` (0-based, end exclusive).
    fn render(&self, pages: Range<usize>) -> Result<Vec<u8>>;
}

/// [`PageSource`] over a loaded PDF, measured with a [`DocumentSerializer`].
pub struct PdfPageSource<'a> {
    document: &'a PdfDocument,
    serializer: &'a DocumentSerializer,
}

impl<'a> PdfPageSource<'a> {
    pub fn new(document: &'a PdfDocument, serializer: &'a DocumentSerializer) -> Self {
        Self {
            document,
            serializer,
        }
    }
}

impl PageSource for PdfPageSource<'_> {
    fn page_count(&self) -> usize {
        self.document.page_count()
    }

    fn render(&self, pages: Range<usize>) -> Result<Vec<u8>> {
        self.serializer.serialize_owned(self.document.subset(pages)?)
    }
}

/// A finished partition together with its serialized sub-document.
#[derive(Debug, Clone)]
pub struct PlannedPartition {
    pub partition: Partition,
    pub bytes: Vec<u8>,
}

/// Ordered partitions covering every page exactly once.
#[derive(Debug, Clone, Default)]
pub struct PartitionPlan {
    pub parts: Vec<PlannedPartition>,
    pub warnings: Vec<CompressionWarning>,
    /// How many times a page range was serialized to measure it.
    pub serializations: usize,
}

impl PartitionPlan {
    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.parts.iter().map(|part| &part.partition)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Splits pages into budget-respecting, order-preserving groups.
#[derive(Debug, Clone, Copy)]
pub struct BudgetPartitioner {
    budget: SizeBudget,
    policy: OversizePolicy,
}

impl BudgetPartitioner {
    pub fn new(budget: SizeBudget) -> Self {
        Self {
            budget,
            policy: OversizePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: OversizePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn budget(&self) -> SizeBudget {
        self.budget
    }

    /// Partition `source`. Deterministic for a given source and budget.
    ///
    /// Every partition fits the budget except a single page that is over
    /// budget on its own: under [`OversizePolicy::Emit`] it becomes its own
    /// partition and a warning is recorded, under [`OversizePolicy::Fail`]
    /// the call returns [`SizefitError::OversizedPage`].
    #[instrument(skip_all, fields(pages = source.page_count(), budget = self.budget.bytes()))]
    pub fn partition<S: PageSource + ?Sized>(&self, source: &S) -> Result<PartitionPlan> {
        let total = source.page_count();
        let mut plan = PartitionPlan::default();

        // Pages [start, cursor) form the accumulating group; `fitted` holds
        // its bytes and is `Some` exactly when that range is non-empty.
        let mut start = 0;
        let mut cursor = 0;
        let mut fitted: Option<Vec<u8>> = None;

        while cursor < total {
            let candidate = source.render(start..cursor + 1)?;
            plan.serializations += 1;

            if self.budget.fits(candidate.len()) {
                fitted = Some(candidate);
                cursor += 1;
                continue;
            }

            match fitted.take() {
                Some(bytes) => {
                    // Backtrack: close the group without the page at `cursor`
                    // and retry that page as the first of a new group.
                    self.finish(&mut plan, start..cursor, bytes, false);
                    start = cursor;
                }
                None => {
                    let size = candidate.len() as u64;
                    match self.policy {
                        OversizePolicy::Fail => {
                            return Err(SizefitError::OversizedPage {
                                page: cursor,
                                size,
                                budget: self.budget.bytes(),
                            });
                        }
                        OversizePolicy::Emit => {
                            warn!(
                                page = cursor,
                                size,
                                budget = self.budget.bytes(),
                                "Single page exceeds budget, emitting it on its own"
                            );
                            plan.warnings.push(CompressionWarning::OversizedSingleton {
                                page: cursor,
                                size,
                                budget: self.budget.bytes(),
                            });
                            self.finish(&mut plan, cursor..cursor + 1, candidate, true);
                            cursor += 1;
                            start = cursor;
                        }
                    }
                }
            }
        }

        if let Some(bytes) = fitted {
            self.finish(&mut plan, start..cursor, bytes, false);
        }

        info!(
            partitions = plan.len(),
            serializations = plan.serializations,
            oversized = plan.warnings.len(),
            "Partitioning finished"
        );
        Ok(plan)
    }

    fn finish(&self, plan: &mut PartitionPlan, pages: Range<usize>, bytes: Vec<u8>, oversized: bool) {
        debug!(
            first = pages.start,
            last = pages.end - 1,
            size = bytes.len(),
            oversized,
            "Partition closed"
        );
        plan.parts.push(PlannedPartition {
            partition: Partition {
                pages,
                size: bytes.len() as u64,
                oversized,
            },
            bytes,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::testing::{PdfFixture, fixture_labels};

    /// Pages with fixed weights; a range renders to the sum of its weights
    /// plus a per-file overhead.
    struct WeightedPages {
        weights: Vec<usize>,
        overhead: usize,
        renders: Cell<usize>,
    }

    impl WeightedPages {
        fn new(weights: Vec<usize>, overhead: usize) -> Self {
            Self {
                weights,
                overhead,
                renders: Cell::new(0),
            }
        }
    }

    impl PageSource for WeightedPages {
        fn page_count(&self) -> usize {
            self.weights.len()
        }

        fn render(&self, pages: Range<usize>) -> Result<Vec<u8>> {
            self.renders.set(self.renders.get() + 1);
            let size = self.overhead + self.weights[pages].iter().sum::<usize>();
            Ok(vec![0; size])
        }
    }

    fn ranges(plan: &PartitionPlan) -> Vec<Range<usize>> {
        plan.partitions().map(|p| p.pages.clone()).collect()
    }

    fn assert_covers(plan: &PartitionPlan, total: usize) {
        let pages: Vec<usize> = plan.partitions().flat_map(|p| p.pages.clone()).collect();
        assert_eq!(pages, (0..total).collect::<Vec<_>>());
    }

    #[test]
    fn ten_pages_over_budget_split_in_two() {
        // 10 pages, 6 MB in total, 5 MB budget.
        let source = WeightedPages::new(vec![600_000; 10], 0);
        let budget = SizeBudget::new(5_000_000).unwrap();
        let plan = BudgetPartitioner::new(budget).partition(&source).unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(ranges(&plan), vec![0..8, 8..10]);
        assert!(plan.partitions().all(|p| p.size <= budget.bytes()));
        assert_covers(&plan, 10);
        assert!(plan.warnings.is_empty());
    }

    #[test]
    fn everything_fits_in_one_partition() {
        let source = WeightedPages::new(vec![10; 5], 5);
        let plan = BudgetPartitioner::new(SizeBudget::new(100).unwrap())
            .partition(&source)
            .unwrap();
        assert_eq!(ranges(&plan), vec![0..5]);
        assert_eq!(plan.serializations, 5);
    }

    #[test]
    fn backtrack_restarts_with_the_overflowing_page() {
        let source = WeightedPages::new(vec![40, 40, 40, 10, 90], 0);
        let plan = BudgetPartitioner::new(SizeBudget::new(100).unwrap())
            .partition(&source)
            .unwrap();
        assert_eq!(ranges(&plan), vec![0..2, 2..4, 4..5]);
        assert_covers(&plan, 5);
    }

    #[test]
    fn exact_budget_fit_is_accepted() {
        let source = WeightedPages::new(vec![50, 50], 0);
        let plan = BudgetPartitioner::new(SizeBudget::new(100).unwrap())
            .partition(&source)
            .unwrap();
        assert_eq!(ranges(&plan), vec![0..2]);
    }

    #[test]
    fn oversized_page_is_emitted_alone_by_default() {
        let source = WeightedPages::new(vec![30, 250, 30, 30], 0);
        let plan = BudgetPartitioner::new(SizeBudget::new(100).unwrap())
            .partition(&source)
            .unwrap();

        assert_eq!(ranges(&plan), vec![0..1, 1..2, 2..4]);
        let oversized: Vec<bool> = plan.partitions().map(|p| p.oversized).collect();
        assert_eq!(oversized, vec![false, true, false]);
        assert_eq!(
            plan.warnings,
            vec![CompressionWarning::OversizedSingleton {
                page: 1,
                size: 250,
                budget: 100
            }]
        );
    }

    #[test]
    fn oversized_page_fails_under_strict_policy() {
        let source = WeightedPages::new(vec![30, 250, 30], 0);
        let err = BudgetPartitioner::new(SizeBudget::new(100).unwrap())
            .with_policy(OversizePolicy::Fail)
            .partition(&source)
            .unwrap_err();
        assert!(matches!(
            err,
            SizefitError::OversizedPage {
                page: 1,
                size: 250,
                budget: 100
            }
        ));
    }

    #[test]
    fn worst_case_is_one_page_per_partition() {
        let source = WeightedPages::new(vec![60; 6], 0);
        let plan = BudgetPartitioner::new(SizeBudget::new(100).unwrap())
            .partition(&source)
            .unwrap();
        assert_eq!(plan.len(), 6);
        // Each page is measured alone and once more paired with its successor.
        assert_eq!(source.renders.get(), 11);
        assert_eq!(plan.serializations, 11);
    }

    #[test]
    fn partitioning_is_deterministic() {
        let weights = vec![17, 83, 5, 44, 61, 9, 99, 12, 70, 33];
        let budget = SizeBudget::new(120).unwrap();
        let first = BudgetPartitioner::new(budget)
            .partition(&WeightedPages::new(weights.clone(), 3))
            .unwrap();
        let second = BudgetPartitioner::new(budget)
            .partition(&WeightedPages::new(weights, 3))
            .unwrap();
        assert_eq!(ranges(&first), ranges(&second));
        assert_covers(&first, 10);
    }

    #[test]
    fn real_pdf_partitions_fit_and_preserve_order() {
        let mut fixture = PdfFixture::new();
        fixture.distinct_pages(6, 96);
        let doc = fixture.build_document();
        let serializer = DocumentSerializer::new();

        let whole = serializer.serialize(&doc).unwrap();
        let budget = SizeBudget::new(whole.len() as u64 / 2).unwrap();
        let source = PdfPageSource::new(&doc, &serializer);
        let plan = BudgetPartitioner::new(budget).partition(&source).unwrap();

        assert!(plan.len() >= 2);
        assert_covers(&plan, 6);
        let mut labels = Vec::new();
        for part in &plan.parts {
            assert!(budget.fits(part.bytes.len()));
            assert_eq!(part.partition.size, part.bytes.len() as u64);
            labels.extend(fixture_labels(&part.bytes));
        }
        assert_eq!(labels, vec![0, 1, 2, 3, 4, 5]);
    }
}
