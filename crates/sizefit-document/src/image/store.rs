// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image resource store — registry of the raster images a document's pages
// draw, keyed by the image stream's object id. A page never owns image
// bytes; it names the shared stream, so replacing the stream once updates
// every page that draws it.

use std::collections::{BTreeMap, HashSet};

use ::image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use sizefit_core::ResourceId;
use sizefit_core::error::{Result, SizefitError};
use tracing::{debug, instrument};

use crate::pdf::document::{PdfDocument, object_id, resource_id};

/// How the image samples are stored in the PDF stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEncoding {
    /// DCTDecode — the stream is a JPEG file.
    Dct,
    /// FlateDecode over raw samples.
    Flate,
    /// No filter; raw samples.
    Raw,
    /// Any other filter chain (JPX, JBIG2, CCITT, ...), by filter name.
    Other(String),
}

/// Colour model of raw samples, resolved from `/ColorSpace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorModel {
    Gray,
    Rgb,
    Cmyk,
}

impl ColorModel {
    fn components(&self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
            Self::Cmyk => 4,
        }
    }
}

/// One embedded image, loaded from its stream.
#[derive(Debug, Clone)]
pub struct ImageResource {
    pub id: ResourceId,
    pub width: u32,
    pub height: u32,
    pub encoding: SourceEncoding,
    /// `None` when the colour space is not one we can decode.
    pub color: Option<ColorModel>,
    pub bits_per_component: i64,
    pub image_mask: bool,
    /// The JPEG file for DCT images, the unfiltered samples otherwise.
    pub bytes: Vec<u8>,
    /// Size of the stream as stored in the PDF.
    pub stored_len: usize,
}

impl ImageResource {
    /// Decode to a raster image.
    pub fn decode(&self) -> Result<DynamicImage> {
        if self.image_mask {
            return Err(self.decode_error("stencil masks are not recompressed"));
        }

        match &self.encoding {
            SourceEncoding::Dct => {
                ::image::load_from_memory_with_format(&self.bytes, ImageFormat::Jpeg)
                    .map_err(|err| self.decode_error(format!("invalid JPEG data: {err}")))
            }
            SourceEncoding::Flate | SourceEncoding::Raw => self.decode_samples(),
            SourceEncoding::Other(filter) => {
                Err(self.decode_error(format!("unsupported filter {filter}")))
            }
        }
    }

    fn decode_samples(&self) -> Result<DynamicImage> {
        let color = self
            .color
            .ok_or_else(|| self.decode_error("unsupported colour space"))?;
        if self.bits_per_component != 8 {
            return Err(self.decode_error(format!(
                "{} bits per component is not supported",
                self.bits_per_component
            )));
        }

        let expected = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|pixels| pixels.checked_mul(color.components()))
            .ok_or_else(|| self.decode_error("image dimensions overflow"))?;
        if self.bytes.len() < expected {
            return Err(self.decode_error(format!(
                "expected {expected} sample bytes, found {}",
                self.bytes.len()
            )));
        }
        let samples = &self.bytes[..expected];

        let decoded = match color {
            ColorModel::Gray => GrayImage::from_raw(self.width, self.height, samples.to_vec())
                .map(DynamicImage::ImageLuma8),
            ColorModel::Rgb => RgbImage::from_raw(self.width, self.height, samples.to_vec())
                .map(DynamicImage::ImageRgb8),
            ColorModel::Cmyk => {
                let rgb: Vec<u8> = samples.chunks_exact(4).flat_map(cmyk_to_rgb).collect();
                RgbImage::from_raw(self.width, self.height, rgb).map(DynamicImage::ImageRgb8)
            }
        };
        decoded.ok_or_else(|| self.decode_error("sample buffer does not match dimensions"))
    }

    fn decode_error(&self, reason: impl Into<String>) -> SizefitError {
        SizefitError::ImageDecode {
            resource: self.id,
            reason: reason.into(),
        }
    }
}

fn cmyk_to_rgb(cmyk: &[u8]) -> [u8; 3] {
    let k = 255 - u16::from(cmyk[3]);
    let channel = |v: u8| ((255 - u16::from(v)) * k / 255) as u8;
    [channel(cmyk[0]), channel(cmyk[1]), channel(cmyk[2])]
}

/// Re-encoded replacement for an image stream.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub width: u32,
    pub height: u32,
    pub grayscale: bool,
    /// JPEG file bytes.
    pub jpeg: Vec<u8>,
}

/// Dedup-aware registry of the images drawn by each page.
#[derive(Debug, Clone, Default)]
pub struct ImageResourceStore {
    /// Image ids drawn by each page, in page order.
    page_images: Vec<Vec<ResourceId>>,
    /// Pages (0-based) drawing each image.
    referrers: BTreeMap<ResourceId, Vec<usize>>,
}

impl ImageResourceStore {
    /// Enumerate every image XObject reachable from each page's resources,
    /// including images nested inside form XObjects.
    #[instrument(skip_all, fields(pages = document.page_count()))]
    pub fn scan(document: &PdfDocument) -> Self {
        let doc = document.inner();
        let mut store = Self::default();

        for (index, page_id) in document.page_ids().into_iter().enumerate() {
            let mut images = Vec::new();
            let mut seen = HashSet::new();
            if let Some(resources) = page_resources(doc, page_id) {
                collect_images(doc, resources, &mut images, &mut seen);
            }

            for id in &images {
                store.referrers.entry(*id).or_default().push(index);
            }
            store.page_images.push(images);
        }

        debug!(unique_images = store.referrers.len(), "Image resources scanned");
        store
    }

    /// Number of distinct images.
    pub fn len(&self) -> usize {
        self.referrers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.referrers.is_empty()
    }

    /// Distinct image ids in ascending id order.
    pub fn ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.referrers.keys().copied()
    }

    /// Images drawn by page `index`, without duplicates.
    pub fn page_images(&self, index: usize) -> &[ResourceId] {
        self.page_images.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn page_count(&self) -> usize {
        self.page_images.len()
    }

    /// Pages (0-based) that draw `id`.
    pub fn pages_referencing(&self, id: ResourceId) -> &[usize] {
        self.referrers.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Load the image's stream into an [`ImageResource`].
    pub fn load(&self, document: &PdfDocument, id: ResourceId) -> Result<ImageResource> {
        let doc = document.inner();
        let stream = image_stream(doc, id)?;
        let dict = &stream.dict;

        let width = dimension(dict, b"Width", id)?;
        let height = dimension(dict, b"Height", id)?;
        let filters = filter_names(doc, dict);
        let encoding = match filters.as_slice() {
            [] => SourceEncoding::Raw,
            [only] if only == "DCTDecode" => SourceEncoding::Dct,
            [only] if only == "FlateDecode" => SourceEncoding::Flate,
            chain => SourceEncoding::Other(chain.join("+")),
        };

        let bytes = match encoding {
            SourceEncoding::Flate => {
                stream
                    .decompressed_content()
                    .map_err(|err| SizefitError::ImageDecode {
                        resource: id,
                        reason: format!("failed to inflate samples: {err}"),
                    })?
            }
            _ => stream.content.clone(),
        };

        let color = dict
            .get(b"ColorSpace")
            .ok()
            .and_then(|space| color_model(doc, space));
        let bits_per_component = match resolve(doc, dict.get(b"BitsPerComponent").ok()) {
            Some(Object::Integer(bits)) => *bits,
            _ => 8,
        };
        let image_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));

        Ok(ImageResource {
            id,
            width,
            height,
            encoding,
            color,
            bits_per_component,
            image_mask,
            bytes,
            stored_len: stream.content.len(),
        })
    }

    /// Replace the image stream's samples under the same object id.
    ///
    /// Every page drawing `id` observes the new bytes; no page dictionary is
    /// touched. A soft mask stays attached to the image.
    pub fn replace(
        &self,
        document: &mut PdfDocument,
        id: ResourceId,
        replacement: EncodedImage,
    ) -> Result<()> {
        let object = document
            .inner_mut()
            .get_object_mut(object_id(id))
            .map_err(|err| SizefitError::Pdf(format!("image {id} vanished: {err}")))?;
        let Object::Stream(stream) = object else {
            return Err(SizefitError::Pdf(format!("image {id} is not a stream")));
        };

        let color_space: &[u8] = if replacement.grayscale {
            b"DeviceGray"
        } else {
            b"DeviceRGB"
        };
        let dict = &mut stream.dict;
        dict.set("Width", Object::Integer(i64::from(replacement.width)));
        dict.set("Height", Object::Integer(i64::from(replacement.height)));
        dict.set("ColorSpace", Object::Name(color_space.to_vec()));
        dict.set("BitsPerComponent", Object::Integer(8));
        dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
        dict.remove(b"DecodeParms");
        dict.remove(b"Decode");

        stream.set_content(replacement.jpeg);
        stream.allows_compression = false;
        Ok(())
    }
}

// -- Resource traversal ----------------------------------------------------------

/// Follow a reference (one level is all PDF allows for direct values).
fn resolve<'a>(doc: &'a Document, object: Option<&'a Object>) -> Option<&'a Object> {
    match object {
        Some(Object::Reference(id)) => doc.get_object(*id).ok(),
        other => other,
    }
}

fn as_dictionary<'a>(doc: &'a Document, object: Option<&'a Object>) -> Option<&'a Dictionary> {
    match resolve(doc, object) {
        Some(Object::Dictionary(dict)) => Some(dict),
        Some(Object::Stream(stream)) => Some(&stream.dict),
        _ => None,
    }
}

/// A page's `/Resources`, inherited from ancestor `/Pages` nodes if absent.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_object(page_id).ok();
    let mut visited = HashSet::new();
    while let Some(Object::Dictionary(dict)) = node {
        if let Some(resources) = as_dictionary(doc, dict.get(b"Resources").ok()) {
            return Some(resources);
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) if visited.insert(*parent) => {
                node = doc.get_object(*parent).ok();
            }
            _ => break,
        }
    }
    None
}

fn collect_images(
    doc: &Document,
    resources: &Dictionary,
    images: &mut Vec<ResourceId>,
    seen: &mut HashSet<ObjectId>,
) {
    let Some(xobjects) = as_dictionary(doc, resources.get(b"XObject").ok()) else {
        return;
    };

    for (_, value) in xobjects.iter() {
        let Object::Reference(id) = value else {
            continue;
        };
        if !seen.insert(*id) {
            continue;
        }
        let Ok(Object::Stream(stream)) = doc.get_object(*id) else {
            continue;
        };

        match stream.dict.get(b"Subtype") {
            Ok(Object::Name(subtype)) if subtype == b"Image" => images.push(resource_id(*id)),
            Ok(Object::Name(subtype)) if subtype == b"Form" => {
                if let Some(form_resources) = as_dictionary(doc, stream.dict.get(b"Resources").ok())
                {
                    collect_images(doc, form_resources, images, seen);
                }
            }
            _ => {}
        }
    }
}

fn image_stream(doc: &Document, id: ResourceId) -> Result<&Stream> {
    match doc.get_object(object_id(id)) {
        Ok(Object::Stream(stream)) => Ok(stream),
        Ok(_) => Err(SizefitError::Pdf(format!("image {id} is not a stream"))),
        Err(err) => Err(SizefitError::Pdf(format!("image {id} not found: {err}"))),
    }
}

fn dimension(dict: &Dictionary, key: &[u8], id: ResourceId) -> Result<u32> {
    match dict.get(key) {
        Ok(Object::Integer(value)) if *value > 0 => u32::try_from(*value).map_err(|_| {
            SizefitError::ImageDecode {
                resource: id,
                reason: format!("dimension {value} is out of range"),
            }
        }),
        _ => Err(SizefitError::ImageDecode {
            resource: id,
            reason: format!("missing or invalid /{}", String::from_utf8_lossy(key)),
        }),
    }
}

fn filter_names(doc: &Document, dict: &Dictionary) -> Vec<String> {
    match resolve(doc, dict.get(b"Filter").ok()) {
        Some(Object::Name(name)) => vec![String::from_utf8_lossy(name).into_owned()],
        Some(Object::Array(filters)) => filters
            .iter()
            .filter_map(|filter| match filter {
                Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn color_model(doc: &Document, space: &Object) -> Option<ColorModel> {
    match resolve(doc, Some(space))? {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" => Some(ColorModel::Gray),
            b"DeviceRGB" | b"CalRGB" => Some(ColorModel::Rgb),
            b"DeviceCMYK" => Some(ColorModel::Cmyk),
            _ => None,
        },
        Object::Array(parts) => match parts.first() {
            Some(Object::Name(family)) if family == b"ICCBased" => {
                let profile = as_dictionary(doc, parts.get(1))?;
                match profile.get(b"N") {
                    Ok(Object::Integer(1)) => Some(ColorModel::Gray),
                    Ok(Object::Integer(3)) => Some(ColorModel::Rgb),
                    Ok(Object::Integer(4)) => Some(ColorModel::Cmyk),
                    _ => None,
                }
            }
            Some(Object::Name(family)) if family == b"CalGray" => Some(ColorModel::Gray),
            Some(Object::Name(family)) if family == b"CalRGB" => Some(ColorModel::Rgb),
            _ => None,
        },
        _ => None,
    }
}
