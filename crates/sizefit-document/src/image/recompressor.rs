// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster recompressor — rewrites every distinct embedded image as an
// optimized progressive JPEG, optionally downsampled to a target DPI.
// Vector graphics and text streams are never touched.

use std::collections::HashSet;

use ::image::DynamicImage;
use ::image::imageops::FilterType;
use jpeg_encoder::{ColorType, Encoder};
use sizefit_core::error::{Result, SizefitError};
use sizefit_core::{CompressionProfile, CompressionWarning, ResourceId};
use tracing::{debug, info, instrument, warn};

use crate::image::store::{EncodedImage, ImageResource, ImageResourceStore};
use crate::pdf::document::PdfDocument;

/// Summary of one recompression pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecompressionReport {
    /// Distinct images found on the document's pages.
    pub images_seen: usize,
    /// Images rewritten, in the order they were processed.
    pub recompressed: Vec<ResourceId>,
    /// Images left untouched, with the reason.
    pub skipped: Vec<CompressionWarning>,
    /// Stored size of the rewritten images before and after.
    pub bytes_before: usize,
    pub bytes_after: usize,
}

/// Lossy image recompression driven by a [`CompressionProfile`].
#[derive(Debug, Clone)]
pub struct RasterRecompressor {
    profile: CompressionProfile,
}

impl RasterRecompressor {
    pub fn new(profile: CompressionProfile) -> Result<Self> {
        profile.validate()?;
        Ok(Self { profile })
    }

    pub fn profile(&self) -> &CompressionProfile {
        &self.profile
    }

    /// Recompress every distinct image in place.
    ///
    /// Each resource id is processed at most once no matter how many pages
    /// draw it. An image that cannot be decoded or re-encoded is skipped and
    /// reported; the rest of the document is still processed.
    #[instrument(skip_all, fields(
        pages = document.page_count(),
        target_dpi = ?self.profile.target_dpi,
        quality = self.profile.quality,
    ))]
    pub fn recompress(&self, document: &mut PdfDocument) -> Result<RecompressionReport> {
        let store = ImageResourceStore::scan(document);
        let mut report = RecompressionReport {
            images_seen: store.len(),
            ..Default::default()
        };
        let mut processed: HashSet<ResourceId> = HashSet::new();

        for page in 0..store.page_count() {
            for &id in store.page_images(page) {
                if !processed.insert(id) {
                    continue;
                }

                let outcome = store
                    .load(document, id)
                    .and_then(|resource| self.reencode(&resource).map(|encoded| (resource, encoded)));

                match outcome {
                    Ok((resource, encoded)) => {
                        debug!(
                            resource = %id,
                            before = resource.stored_len,
                            after = encoded.jpeg.len(),
                            width = encoded.width,
                            height = encoded.height,
                            "Image recompressed"
                        );
                        report.bytes_before += resource.stored_len;
                        report.bytes_after += encoded.jpeg.len();
                        store.replace(document, id, encoded)?;
                        report.recompressed.push(id);
                    }
                    Err(SizefitError::ImageDecode { resource, reason }) => {
                        warn!(%resource, %reason, "Skipping image that cannot be decoded");
                        report
                            .skipped
                            .push(CompressionWarning::ImageSkipped { resource, reason });
                    }
                    Err(other) => return Err(other),
                }
            }
        }

        info!(
            seen = report.images_seen,
            recompressed = report.recompressed.len(),
            skipped = report.skipped.len(),
            bytes_before = report.bytes_before,
            bytes_after = report.bytes_after,
            "Recompression finished"
        );
        Ok(report)
    }

    /// Decode, optionally resize, and encode one image as JPEG.
    pub fn reencode(&self, resource: &ImageResource) -> Result<EncodedImage> {
        let decoded = resource.decode()?;
        let (width, height) = self
            .profile
            .scaled_dimensions(decoded.width(), decoded.height());

        let resized = if (width, height) == (decoded.width(), decoded.height()) {
            decoded
        } else {
            decoded.resize_exact(width, height, FilterType::Lanczos3)
        };

        self.encode_jpeg(&resized).map_err(|reason| SizefitError::ImageDecode {
            resource: resource.id,
            reason,
        })
    }

    fn encode_jpeg(&self, image: &DynamicImage) -> std::result::Result<EncodedImage, String> {
        let (width, height) = (image.width(), image.height());
        let too_large = |value: u32| u16::try_from(value).map_err(|_| {
            format!("{width}x{height} exceeds the JPEG dimension limit")
        });
        let (w16, h16) = (too_large(width)?, too_large(height)?);

        let grayscale = !image.color().has_color();
        let mut jpeg = Vec::new();
        let mut encoder = Encoder::new(&mut jpeg, self.profile.quality);
        encoder.set_progressive(true);
        encoder.set_optimized_huffman_tables(true);

        let encoded = if grayscale {
            encoder.encode(image.to_luma8().as_raw(), w16, h16, ColorType::Luma)
        } else {
            encoder.encode(image.to_rgb8().as_raw(), w16, h16, ColorType::Rgb)
        };
        encoded.map_err(|err| format!("JPEG encoding failed: {err}"))?;

        Ok(EncodedImage {
            width,
            height,
            grayscale,
            jpeg,
        })
    }
}
