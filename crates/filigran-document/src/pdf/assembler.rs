// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document assembler — fold processed pages back into the source document
// in page order and write the result.
//
// Raster pages become a single full-page image XObject (RGB, Flate-compressed,
// with a soft mask when the fill is transparent). Filtered pages get a new
// content stream and keep their resources. Pages that were never pushed are
// carried over untouched.

use std::io::Write;
use std::path::Path;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::RgbaImage;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tracing::{debug, info, instrument};

use filigran_core::error::{FiligranError, Result};

use crate::batch::{PageContent, ProcessedPage};
use crate::pdf::source::{self, PdfSource};

/// Resource name of the page image on rasterised pages.
const PAGE_IMAGE_NAME: &str = "FiligranPage";

/// Page boxes that no longer apply once the page is redrawn from origin.
const STALE_PAGE_KEYS: [&[u8]; 5] = [b"CropBox", b"BleedBox", b"TrimBox", b"ArtBox", b"Rotate"];

/// Builds the output document one page at a time, strictly in order.
pub struct DocumentAssembler {
    document: Document,
    page_ids: Vec<ObjectId>,
    last_index: Option<u32>,
    rasterised: usize,
    filtered: usize,
}

impl DocumentAssembler {
    /// Start from a copy of the source document.
    pub fn new(source: &PdfSource) -> Self {
        Self::from_document(source.document().clone())
    }

    pub fn from_document(document: Document) -> Self {
        let page_ids = source::page_ids(&document);
        Self {
            document,
            page_ids,
            last_index: None,
            rasterised: 0,
            filtered: 0,
        }
    }

    pub fn page_count(&self) -> u32 {
        self.page_ids.len() as u32
    }

    /// Index of the most recently accepted page.
    pub fn last_index(&self) -> Option<u32> {
        self.last_index
    }

    /// Accept the next processed page. Indices must strictly increase.
    #[instrument(skip_all, fields(page = page.index, changes = page.changes))]
    pub fn push(&mut self, page: ProcessedPage) -> Result<()> {
        match self.last_index {
            Some(previous) if page.index <= previous => {
                return Err(FiligranError::OrderViolation {
                    previous,
                    got: page.index,
                });
            }
            _ => {}
        }
        let page_id = self.page_ids.get(page.index as usize).copied().ok_or_else(|| {
            FiligranError::Pdf(format!(
                "page {} out of range (document has {} pages)",
                page.index,
                self.page_ids.len()
            ))
        })?;

        match page.content {
            PageContent::Raster(image) => {
                self.replace_with_image(page_id, &image)?;
                self.rasterised += 1;
            }
            PageContent::Filtered(stream) => {
                self.replace_content(page_id, stream)?;
                self.filtered += 1;
            }
            PageContent::Unchanged => {}
        }

        self.last_index = Some(page.index);
        Ok(())
    }

    /// Push every page of `pages`, stopping at the first error.
    pub fn extend(&mut self, pages: impl IntoIterator<Item = ProcessedPage>) -> Result<()> {
        pages.into_iter().try_for_each(|page| self.push(page))
    }

    /// Drop unreachable objects and hand back the finished document.
    pub fn finish(mut self) -> Document {
        let pruned = self.document.prune_objects();
        self.document.compress();
        debug!(
            rasterised = self.rasterised,
            filtered = self.filtered,
            pruned = pruned.len(),
            "Document assembled"
        );
        self.document
    }

    /// Finish and serialise to bytes.
    pub fn to_bytes(self) -> Result<Vec<u8>> {
        let mut document = self.finish();
        let mut output = Vec::new();
        document
            .save_to(&mut output)
            .map_err(|err| FiligranError::Pdf(format!("failed to serialise PDF: {}", err)))?;
        Ok(output)
    }

    /// Finish and write to `path`.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path.as_ref(), &bytes)?;
        info!("Saved PDF ({} bytes) to {}", bytes.len(), path.as_ref().display());
        Ok(())
    }

    // -- Page replacement -----------------------------------------------------

    fn page_dict(&mut self, page_id: ObjectId) -> Result<&mut Dictionary> {
        self.document
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|err| FiligranError::Pdf(format!("page object {:?}: {}", page_id, err)))
    }

    fn replace_content(&mut self, page_id: ObjectId, stream: Vec<u8>) -> Result<()> {
        let content_id = self.document.add_object(Stream::new(dictionary! {}, stream));
        self.page_dict(page_id)?.set("Contents", content_id);
        Ok(())
    }

    fn replace_with_image(&mut self, page_id: ObjectId, image: &RgbaImage) -> Result<()> {
        // The render shows the visible box as displayed, rotation applied.
        let visible = source::visible_box(&self.document, page_id);
        let (width, height) = match source::rotation(&self.document, page_id) {
            90 | 270 => (visible.height(), visible.width()),
            _ => (visible.width(), visible.height()),
        };

        let image_id = self.add_image(image)?;
        let content = format!("q {} 0 0 {} 0 0 cm /{} Do Q", width, height, PAGE_IMAGE_NAME);
        let content_id = self
            .document
            .add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let page = self.page_dict(page_id)?;
        for key in STALE_PAGE_KEYS {
            page.remove(key);
        }
        page.set(
            "MediaBox",
            vec![0.into(), 0.into(), Object::Real(width as f32), Object::Real(height as f32)],
        );
        page.set(
            "Resources",
            dictionary! { "XObject" => dictionary! { PAGE_IMAGE_NAME => image_id } },
        );
        page.set("Contents", content_id);

        debug!(
            width_pt = width,
            height_pt = height,
            pixels_w = image.width(),
            pixels_h = image.height(),
            "Page replaced by image"
        );
        Ok(())
    }

    /// Embed `image` as an RGB XObject, with a soft mask if any pixel is not
    /// fully opaque.
    fn add_image(&mut self, image: &RgbaImage) -> Result<ObjectId> {
        let pixel_count = image.width() as usize * image.height() as usize;
        let mut rgb = Vec::with_capacity(pixel_count * 3);
        let mut alpha = Vec::with_capacity(pixel_count);
        for pixel in image.pixels() {
            let [r, g, b, a] = pixel.0;
            rgb.extend_from_slice(&[r, g, b]);
            alpha.push(a);
        }

        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width() as i64,
            "Height" => image.height() as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        };

        if alpha.iter().any(|&a| a < u8::MAX) {
            let mask = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => image.width() as i64,
                    "Height" => image.height() as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                    "Filter" => "FlateDecode",
                },
                deflate(&alpha)?,
            )
            .with_compression(false);
            let mask_id = self.document.add_object(mask);
            dict.set("SMask", mask_id);
        }

        let stream = Stream::new(dict, deflate(&rgb)?).with_compression(false);
        Ok(self.document.add_object(stream))
    }
}

/// zlib-wrapped deflate, as `/FlateDecode` expects.
fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_pdf;
    use filigran_core::types::BBox;
    use image::Rgba;

    fn raster(index: u32, width: u32, height: u32, rgba: [u8; 4]) -> ProcessedPage {
        ProcessedPage {
            index,
            content: PageContent::Raster(RgbaImage::from_pixel(width, height, Rgba(rgba))),
            changes: 1,
        }
    }

    fn unchanged(index: u32) -> ProcessedPage {
        ProcessedPage {
            index,
            content: PageContent::Unchanged,
            changes: 0,
        }
    }

    fn image_of(document: &Document, page_id: ObjectId) -> Dictionary {
        let page = document.get_dictionary(page_id).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        let image_id = xobjects.get(PAGE_IMAGE_NAME.as_bytes()).unwrap().as_reference().unwrap();
        document.get_object(image_id).unwrap().as_stream().unwrap().dict.clone()
    }

    #[test]
    fn rejects_out_of_order_and_repeated_pages() {
        let mut assembler = DocumentAssembler::from_document(sample_pdf(&["", "", ""]));
        assembler.push(unchanged(1)).unwrap();
        assert!(matches!(
            assembler.push(unchanged(0)),
            Err(FiligranError::OrderViolation { previous: 1, got: 0 })
        ));
        assert!(matches!(
            assembler.push(unchanged(1)),
            Err(FiligranError::OrderViolation { previous: 1, got: 1 })
        ));
        assembler.push(unchanged(2)).unwrap();
        assert_eq!(assembler.last_index(), Some(2));
    }

    #[test]
    fn raster_page_replaces_content_and_keeps_size() {
        let mut assembler = DocumentAssembler::from_document(sample_pdf(&["BT (a) Tj ET", "BT (b) Tj ET"]));
        assembler.push(raster(0, 4, 6, [255, 255, 255, 255])).unwrap();
        let document = assembler.finish();

        let ids = source::page_ids(&document);
        assert_eq!(ids.len(), 2);
        let media = source::media_box(&document, ids[0]);
        assert!(media.approx_eq(&BBox::new(0.0, 0.0, 200.0, 300.0), 1e-3));

        let image = image_of(&document, ids[0]);
        assert_eq!(image.get(b"Width").unwrap().as_i64().unwrap(), 4);
        assert_eq!(image.get(b"Height").unwrap().as_i64().unwrap(), 6);
        assert!(image.get(b"SMask").is_err());

        let untouched = document.get_page_content(ids[1]).unwrap();
        assert_eq!(untouched, b"BT (b) Tj ET");
    }

    #[test]
    fn transparent_pixels_add_a_soft_mask() {
        let mut assembler = DocumentAssembler::from_document(sample_pdf(&[""]));
        assembler.push(raster(0, 2, 2, [255, 255, 255, 0])).unwrap();
        let document = assembler.finish();
        let ids = source::page_ids(&document);
        assert!(image_of(&document, ids[0]).get(b"SMask").is_ok());
    }

    #[test]
    fn rotated_page_is_flattened_upright() {
        let mut document = sample_pdf(&[""]);
        let page_id = source::page_ids(&document)[0];
        document
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .unwrap()
            .set("Rotate", 90);

        let mut assembler = DocumentAssembler::from_document(document);
        assembler.push(raster(0, 3, 2, [0, 0, 0, 255])).unwrap();
        let document = assembler.finish();

        assert_eq!(source::rotation(&document, page_id), 0);
        let media = source::media_box(&document, page_id);
        assert!(media.approx_eq(&BBox::new(0.0, 0.0, 300.0, 200.0), 1e-3));
    }

    #[test]
    fn filtered_page_gets_new_content_stream() {
        let mut assembler = DocumentAssembler::from_document(sample_pdf(&["BT (DRAFT) Tj ET /Im1 Do"]));
        assembler
            .push(ProcessedPage {
                index: 0,
                content: PageContent::Filtered(b"/Im1 Do".to_vec()),
                changes: 1,
            })
            .unwrap();
        let document = assembler.finish();
        let ids = source::page_ids(&document);
        assert_eq!(document.get_page_content(ids[0]).unwrap(), b"/Im1 Do");
    }

    #[test]
    fn saved_output_reopens() {
        let mut assembler = DocumentAssembler::from_document(sample_pdf(&["", ""]));
        assembler.push(raster(0, 5, 5, [10, 20, 30, 255])).unwrap();
        let bytes = assembler.to_bytes().unwrap();
        let reopened = PdfSource::from_bytes(&bytes).unwrap();
        assert_eq!(reopened.page_count(), 2);
    }
}
