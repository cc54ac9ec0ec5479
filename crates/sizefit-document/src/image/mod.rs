// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module — registry of embedded raster resources and their lossy
// recompression.

pub mod recompressor;
pub mod store;

pub use recompressor::RasterRecompressor;
pub use store::ImageResourceStore;
