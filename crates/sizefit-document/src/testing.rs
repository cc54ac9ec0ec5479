// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Deterministic PDF fixtures for tests and benchmarks.
//
// Builds small but real documents with `lopdf`: text-labelled pages that
// reference JPEG, raw RGB, raw grayscale or deliberately corrupt image
// XObjects, optionally shared between pages.

use ::image::codecs::jpeg::JpegEncoder;
use ::image::{GrayImage, Luma, Rgb, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

use crate::pdf::document::PdfDocument;

/// Page dictionary key carrying the fixture's 0-based page label.
pub const FIXTURE_INDEX_KEY: &[u8] = b"FixtureIndex";

/// An image XObject to embed in a fixture.
#[derive(Debug, Clone)]
pub enum FixtureImage {
    /// Pseudo-random RGB noise stored as a high-quality JPEG (DCTDecode).
    Noise { width: u32, height: u32, seed: u64 },
    /// Pseudo-random RGB samples stored unfiltered.
    RawRgb { width: u32, height: u32, seed: u64 },
    /// Horizontal gradient stored as unfiltered 8-bit DeviceGray.
    Gray { width: u32, height: u32 },
    /// A DCTDecode stream whose bytes are not a JPEG.
    Corrupt,
}

impl FixtureImage {
    pub fn noise(width: u32, height: u32, seed: u64) -> Self {
        Self::Noise {
            width,
            height,
            seed,
        }
    }

    fn to_stream(&self) -> Stream {
        match self {
            Self::Noise {
                width,
                height,
                seed,
            } => {
                let jpeg = noise_jpeg(*width, *height, *seed);
                Stream::new(image_dict(*width, *height, "DeviceRGB", Some("DCTDecode")), jpeg)
                    .with_compression(false)
            }
            Self::RawRgb {
                width,
                height,
                seed,
            } => Stream::new(
                image_dict(*width, *height, "DeviceRGB", None),
                noise_rgb(*width, *height, *seed).into_raw(),
            )
            .with_compression(false),
            Self::Gray { width, height } => {
                let gray = GrayImage::from_fn(*width, *height, |x, _| {
                    Luma([((x * 255) / (*width).max(1)) as u8])
                });
                Stream::new(
                    image_dict(*width, *height, "DeviceGray", None),
                    gray.into_raw(),
                )
                .with_compression(false)
            }
            Self::Corrupt => Stream::new(
                image_dict(16, 16, "DeviceRGB", Some("DCTDecode")),
                b"definitely not a jpeg stream".to_vec(),
            )
            .with_compression(false),
        }
    }
}

/// Builder for a multi-page fixture document.
#[derive(Debug, Clone, Default)]
pub struct PdfFixture {
    images: Vec<FixtureImage>,
    pages: Vec<Vec<usize>>,
}

impl PdfFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image and return its handle for [`page`](Self::page).
    pub fn image(&mut self, image: FixtureImage) -> usize {
        self.images.push(image);
        self.images.len() - 1
    }

    /// Append a page drawing the given images.
    pub fn page(&mut self, images: &[usize]) -> &mut Self {
        self.pages.push(images.to_vec());
        self
    }

    /// Append `count` pages that each draw their own noise image.
    pub fn distinct_pages(&mut self, count: usize, side: u32) -> &mut Self {
        for index in 0..count {
            let handle = self.image(FixtureImage::noise(side, side, 1000 + index as u64));
            self.page(&[handle]);
        }
        self
    }

    pub fn build_lopdf(&self) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let image_ids: Vec<ObjectId> = self
            .images
            .iter()
            .map(|image| doc.add_object(image.to_stream()))
            .collect();

        let mut kids: Vec<Object> = Vec::with_capacity(self.pages.len());
        for (index, images) in self.pages.iter().enumerate() {
            let mut xobjects = Dictionary::new();
            let mut ops = format!("BT /F1 18 Tf 72 780 Td (Page {}) Tj ET\n", index + 1);
            for (slot, &image) in images.iter().enumerate() {
                let name = format!("Im{slot}");
                xobjects.set(name.clone(), Object::Reference(image_ids[image]));
                let x = 72 + (slot % 2) * 250;
                let y = 500 - (slot / 2) * 250;
                ops.push_str(&format!("q 200 0 0 200 {x} {y} cm /{name} Do Q\n"));
            }

            let content_id = doc.add_object(Stream::new(Dictionary::new(), ops.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                    "XObject" => xobjects,
                },
                "FixtureIndex" => index as i64,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    /// Serialize the fixture to PDF bytes.
    pub fn build(&self) -> Vec<u8> {
        let mut doc = self.build_lopdf();
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("fixture serializes");
        bytes
    }

    /// Serialize and reload, so the document looks like one read from disk.
    pub fn build_document(&self) -> PdfDocument {
        PdfDocument::from_bytes(&self.build()).expect("fixture reloads")
    }
}

/// The `FixtureIndex` label of a page, or -1 when missing.
pub fn fixture_index(doc: &Document, page_id: ObjectId) -> i64 {
    match doc.get_object(page_id) {
        Ok(Object::Dictionary(dict)) => match dict.get(FIXTURE_INDEX_KEY) {
            Ok(Object::Integer(index)) => *index,
            _ => -1,
        },
        _ => -1,
    }
}

/// Object id of the image a page draws in `slot` (its `/Im<slot>` entry).
pub fn fixture_image_id(doc: &Document, page_id: ObjectId, slot: usize) -> Option<ObjectId> {
    let page = doc.get_dictionary(page_id).ok()?;
    let resources = page.get(b"Resources").and_then(Object::as_dict).ok()?;
    let xobjects = resources.get(b"XObject").and_then(Object::as_dict).ok()?;
    xobjects
        .get(format!("Im{slot}").as_bytes())
        .and_then(Object::as_reference)
        .ok()
}

/// Fixture labels of every page of a serialized PDF, in page order.
pub fn fixture_labels(bytes: &[u8]) -> Vec<i64> {
    let doc = Document::load_mem(bytes).expect("artifact loads");
    doc.get_pages()
        .into_values()
        .map(|id| fixture_index(&doc, id))
        .collect()
}

fn image_dict(width: u32, height: u32, color_space: &str, filter: Option<&str>) -> Dictionary {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => i64::from(width),
        "Height" => i64::from(height),
        "ColorSpace" => Object::Name(color_space.as_bytes().to_vec()),
        "BitsPerComponent" => 8,
    };
    if let Some(filter) = filter {
        dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
    }
    dict
}

/// Deterministic RGB noise from a 64-bit LCG.
pub fn noise_rgb(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    RgbImage::from_fn(width, height, |_, _| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let bytes = (state >> 24).to_le_bytes();
        Rgb([bytes[0], bytes[1], bytes[2]])
    })
}

/// Noise encoded as a quality-95 baseline JPEG.
pub fn noise_jpeg(width: u32, height: u32, seed: u64) -> Vec<u8> {
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, 95)
        .encode_image(&noise_rgb(width, height, seed))
        .expect("noise encodes as JPEG");
    jpeg
}
