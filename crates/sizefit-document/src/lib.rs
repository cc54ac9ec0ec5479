// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// sizefit-document — Document processing for the Sizefit budget engine.
//
// Provides PDF loading and page subsetting, structural compaction on save,
// raster image recompression with per-resource deduplication, and the
// page-accumulation partitioner that splits a document into budget-sized
// sub-documents.

pub mod image;
pub mod partition;
pub mod pdf;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export the primary structs so callers can use `sizefit_document::PdfDocument` etc.
pub use image::recompressor::{RasterRecompressor, RecompressionReport};
pub use image::store::{ImageResource, ImageResourceStore};
pub use partition::{BudgetPartitioner, PageSource, PartitionPlan, PdfPageSource};
pub use pdf::document::PdfDocument;
pub use pdf::serializer::DocumentSerializer;
