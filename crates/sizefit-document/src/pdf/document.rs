// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF document — load a source PDF with `lopdf` and carve contiguous page
// ranges out of it as standalone documents.

use std::collections::HashSet;
use std::ops::Range;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};
use sizefit_core::ResourceId;
use sizefit_core::error::{Result, SizefitError};
use tracing::{debug, info, instrument};

/// Upper bound on page-tree depth; deeper trees are treated as cyclic.
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// An ordered sequence of pages plus the objects they reference.
///
/// Wraps `lopdf::Document`. Pages are addressed by 0-based index in document
/// order; that order is never altered by any operation on this type.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    /// The underlying lopdf document.
    document: Document,
    /// Source path, if opened from a file (useful for diagnostics).
    source_path: Option<String>,
}

impl PdfDocument {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let document = Document::load(path_ref).map_err(|err| {
            SizefitError::Pdf(format!("failed to open {}: {}", path_ref.display(), err))
        })?;

        let mut loaded = Self::from_document(document)?;
        loaded.source_path = Some(path_ref.display().to_string());
        Ok(loaded)
    }

    /// Create a document from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            SizefitError::Pdf(format!("failed to load PDF from memory: {}", err))
        })?;
        Self::from_document(document)
    }

    /// Wrap an already-parsed lopdf document.
    pub fn from_document(document: Document) -> Result<Self> {
        if document.is_encrypted() {
            return Err(SizefitError::Pdf(
                "encrypted documents are not supported".into(),
            ));
        }

        let pages = document.get_pages().len();
        if pages == 0 {
            return Err(SizefitError::Pdf("document has no pages".into()));
        }

        debug!(pages, objects = document.objects.len(), "PDF loaded");

        Ok(Self {
            document,
            source_path: None,
        })
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Page object ids in document order.
    pub fn page_ids(&self) -> Vec<ObjectId> {
        // lopdf keys pages by 1-based page number; BTreeMap iteration keeps order.
        self.document.get_pages().into_values().collect()
    }

    /// Return the source path if the document was created via [`PdfDocument::open`].
    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    pub fn inner(&self) -> &Document {
        &self.document
    }

    pub(crate) fn inner_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn into_inner(self) -> Document {
        self.document
    }

    // -- Subsetting -----------------------------------------------------------

    /// Build a standalone document holding only `pages` (0-based, end
    /// exclusive), in their original order and with the resources they use.
    ///
    /// Every reference to a dropped page is removed from the object graph and
    /// page-tree counts are recomputed; unreachable objects are left for the
    /// serializer to prune.
    #[instrument(skip(self), fields(total = self.page_count()))]
    pub fn subset(&self, pages: Range<usize>) -> Result<PdfDocument> {
        let page_ids = self.page_ids();
        if pages.is_empty() || pages.end > page_ids.len() {
            return Err(SizefitError::Pdf(format!(
                "page range {}..{} invalid for {} page document",
                pages.start,
                pages.end,
                page_ids.len()
            )));
        }

        let mut subset = self.clone();
        if pages.len() == page_ids.len() {
            return Ok(subset);
        }

        let dropped: HashSet<ObjectId> = page_ids
            .iter()
            .enumerate()
            .filter(|(index, _)| !pages.contains(index))
            .map(|(_, id)| *id)
            .collect();

        let doc = subset.inner_mut();
        for (id, object) in doc.objects.iter_mut() {
            if dropped.contains(id) {
                continue;
            }
            if is_dead_destination(object, &dropped) {
                *object = Object::Null;
                continue;
            }
            strip_references(object, &dropped);
        }

        let root = pages_root(doc)?;
        recount_page_tree(doc, root, 0)?;

        debug!(
            kept = pages.len(),
            dropped = dropped.len(),
            "Page subset built"
        );
        Ok(subset)
    }
}

// -- Id conversion ------------------------------------------------------------

pub(crate) fn resource_id(id: ObjectId) -> ResourceId {
    ResourceId::new(id.0, id.1)
}

pub(crate) fn object_id(id: ResourceId) -> ObjectId {
    (id.number, id.generation)
}

// -- Page-tree helpers ---------------------------------------------------------

/// Object id of the catalog's `/Pages` node.
fn pages_root(doc: &Document) -> Result<ObjectId> {
    let catalog = doc
        .catalog()
        .map_err(|err| SizefitError::Pdf(format!("no catalog: {}", err)))?;
    match catalog.get(b"Pages") {
        Ok(Object::Reference(id)) => Ok(*id),
        Ok(_) => Err(SizefitError::Pdf("/Pages is not a reference".to_string())),
        Err(err) => Err(SizefitError::Pdf(format!("no /Pages: {}", err))),
    }
}

/// Recompute `/Count` for `node` and every `/Pages` node beneath it,
/// returning the number of leaf pages.
fn recount_page_tree(doc: &mut Document, node: ObjectId, depth: usize) -> Result<i64> {
    if depth > MAX_PAGE_TREE_DEPTH {
        return Err(SizefitError::Pdf("page tree is too deep or cyclic".into()));
    }

    let kids: Vec<ObjectId> = match doc.get_object(node) {
        Ok(Object::Dictionary(dict)) => match dict.get(b"Kids") {
            Ok(Object::Array(kids)) => kids
                .iter()
                .filter_map(|kid| match kid {
                    Object::Reference(id) => Some(*id),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        },
        _ => return Ok(0),
    };

    let mut count = 0;
    for kid in kids {
        if is_pages_node(doc, kid) {
            count += recount_page_tree(doc, kid, depth + 1)?;
        } else {
            count += 1;
        }
    }

    if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(node) {
        dict.set("Count", Object::Integer(count));
    }
    Ok(count)
}

fn is_pages_node(doc: &Document, id: ObjectId) -> bool {
    matches!(
        doc.get_object(id),
        Ok(Object::Dictionary(dict)) if matches!(dict.get(b"Type"), Ok(Object::Name(name)) if name == b"Pages")
    )
}

/// An explicit destination (`[page /Fit ...]`) whose target page was dropped.
fn is_dead_destination(object: &Object, dropped: &HashSet<ObjectId>) -> bool {
    match object {
        Object::Array(items) => matches!(
            items.as_slice(),
            [Object::Reference(page), Object::Name(_), ..] if dropped.contains(page)
        ),
        _ => false,
    }
}

/// Remove every direct reference to a dropped page from `object`.
///
/// Arrays lose the matching element, dictionaries lose the matching entry.
/// Destinations pointing at a dropped page are removed whole: as a dictionary
/// entry the key goes, inside an array the destination becomes `null` so
/// name-tree pairs stay aligned.
fn strip_references(object: &mut Object, dropped: &HashSet<ObjectId>) {
    match object {
        Object::Array(items) => {
            for item in items.iter_mut() {
                if is_dead_destination(item, dropped) {
                    *item = Object::Null;
                }
            }
            items.retain(|item| !matches!(item, Object::Reference(id) if dropped.contains(id)));
            for item in items.iter_mut() {
                strip_references(item, dropped);
            }
        }
        Object::Dictionary(dict) => strip_dictionary(dict, dropped),
        Object::Stream(stream) => strip_dictionary(&mut stream.dict, dropped),
        _ => {}
    }
}

fn strip_dictionary(dict: &mut Dictionary, dropped: &HashSet<ObjectId>) {
    let doomed: Vec<Vec<u8>> = dict
        .iter()
        .filter_map(|(key, value)| match value {
            Object::Reference(id) if dropped.contains(id) => Some(key.clone()),
            value if is_dead_destination(value, dropped) => Some(key.clone()),
            _ => None,
        })
        .collect();
    for key in doomed {
        dict.remove(&key);
    }
    for (_, value) in dict.iter_mut() {
        strip_references(value, dropped);
    }
}

#[cfg(test)]
mod tests {
    use lopdf::dictionary;

    use super::*;
    use crate::testing::{FixtureImage, PdfFixture, fixture_index};

    fn five_pages() -> PdfDocument {
        let mut fixture = PdfFixture::new();
        let shared = fixture.image(FixtureImage::noise(32, 32, 1));
        for _ in 0..5 {
            fixture.page(&[shared]);
        }
        fixture.build_document()
    }

    #[test]
    fn rejects_garbage_bytes() {
        assert!(matches!(
            PdfDocument::from_bytes(b"this is not a pdf"),
            Err(SizefitError::Pdf(_))
        ));
    }

    #[test]
    fn subset_keeps_requested_pages_in_order() {
        let doc = five_pages();
        let subset = doc.subset(1..4).unwrap();
        assert_eq!(subset.page_count(), 3);

        let labels: Vec<i64> = subset
            .page_ids()
            .into_iter()
            .map(|id| fixture_index(subset.inner(), id))
            .collect();
        assert_eq!(labels, vec![1, 2, 3]);
    }

    #[test]
    fn subset_updates_page_count_entry() {
        let doc = five_pages();
        let subset = doc.subset(0..2).unwrap();
        let root = pages_root(subset.inner()).unwrap();
        let count = match subset.inner().get_object(root) {
            Ok(Object::Dictionary(dict)) => match dict.get(b"Count") {
                Ok(Object::Integer(count)) => *count,
                _ => -1,
            },
            _ => -1,
        };
        assert_eq!(count, 2);
    }

    #[test]
    fn subset_rejects_empty_or_out_of_range() {
        let doc = five_pages();
        assert!(doc.subset(2..2).is_err());
        assert!(doc.subset(3..6).is_err());
    }

    #[test]
    fn links_to_dropped_pages_lose_their_destination() {
        let mut fixture = PdfFixture::new();
        fixture.page(&[]).page(&[]).page(&[]);
        let mut lopdf_doc = fixture.build_lopdf();
        let pages: Vec<ObjectId> = lopdf_doc.get_pages().into_values().collect();

        let outward = lopdf_doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => vec![0.into(), 0.into(), 10.into(), 10.into()],
            "Dest" => vec![Object::Reference(pages[2]), "Fit".into()],
        });
        let inward = lopdf_doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => vec![0.into(), 20.into(), 10.into(), 30.into()],
            "Dest" => vec![Object::Reference(pages[0]), "Fit".into()],
        });
        let named_dest = lopdf_doc.add_object(vec![Object::Reference(pages[1]), "Fit".into()]);
        if let Ok(Object::Dictionary(page)) = lopdf_doc.get_object_mut(pages[0]) {
            page.set("Annots", vec![outward.into(), inward.into(), named_dest.into()]);
        }

        let doc = PdfDocument::from_document(lopdf_doc).unwrap();
        let subset = doc.subset(0..1).unwrap();
        let inner = subset.inner();

        let outward = inner.get_dictionary(outward).unwrap();
        assert!(outward.get(b"Dest").is_err());
        let inward = inner.get_dictionary(inward).unwrap();
        assert!(matches!(
            inward.get(b"Dest"),
            Ok(Object::Array(dest)) if dest.len() == 2
        ));
        assert!(matches!(inner.get_object(named_dest), Ok(Object::Null)));
    }

    #[test]
    fn full_range_subset_is_identical() {
        let doc = five_pages();
        let subset = doc.subset(0..5).unwrap();
        assert_eq!(subset.page_ids(), doc.page_ids());
    }
}
