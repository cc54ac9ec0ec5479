// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document serializer — structurally compacted PDF output: unreachable
// objects pruned, empty streams dropped, objects renumbered, content streams
// deflated, and (by default) objects packed into compressed object streams.

use lopdf::{Document, SaveOptions};
use sizefit_core::error::{Result, SizefitError};
use tracing::{debug, instrument};

use crate::pdf::document::PdfDocument;

/// Produces canonical, compacted bytes for a document.
///
/// Never mutates the document it is given; [`serialize`](Self::serialize)
/// works on a clone, [`serialize_owned`](Self::serialize_owned) consumes it.
#[derive(Debug, Clone)]
pub struct DocumentSerializer {
    /// Pack objects into compressed object streams with an xref stream.
    object_streams: bool,
}

impl Default for DocumentSerializer {
    fn default() -> Self {
        Self {
            object_streams: true,
        }
    }
}

impl DocumentSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classic xref table output, for consumers that reject PDF 1.5 object streams.
    pub fn without_object_streams() -> Self {
        Self {
            object_streams: false,
        }
    }

    pub fn serialize(&self, document: &PdfDocument) -> Result<Vec<u8>> {
        self.serialize_owned(document.clone())
    }

    #[instrument(skip_all, fields(object_streams = self.object_streams))]
    pub fn serialize_owned(&self, document: PdfDocument) -> Result<Vec<u8>> {
        let mut doc = document.into_inner();
        let objects_before = doc.objects.len();
        compact(&mut doc);

        let mut output = Vec::new();
        if self.object_streams {
            // Object streams need PDF 1.5 or later.
            if doc.version.as_str() < "1.5" {
                doc.version = "1.5".to_string();
            }
            let options = SaveOptions::builder()
                .use_object_streams(true)
                .use_xref_streams(true)
                .build();
            doc.save_with_options(&mut output, options).map_err(|err| {
                SizefitError::Serialization(format!("failed to write PDF: {}", err))
            })?;
        } else {
            doc.save_to(&mut output).map_err(|err| {
                SizefitError::Serialization(format!("failed to write PDF: {}", err))
            })?;
        }

        debug!(
            objects_before,
            objects_after = doc.objects.len(),
            output_bytes = output.len(),
            "Document serialized"
        );
        Ok(output)
    }
}

/// Lossless structural compaction applied before every save.
fn compact(doc: &mut Document) {
    doc.prune_objects();
    doc.delete_zero_length_streams();
    doc.renumber_objects();
    doc.compress();
}
