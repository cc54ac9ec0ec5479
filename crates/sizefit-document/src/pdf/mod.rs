// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — loading, page subsetting, and compacting serialization.

pub mod document;
pub mod serializer;

pub use document::PdfDocument;
pub use serializer::DocumentSerializer;
