// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Test fixtures: in-memory renderer, synthetic page buffers, small PDFs.

use std::cell::Cell;

use image::{Rgba, RgbaImage};
use lopdf::{Document, Object, Stream, dictionary};

use filigran_core::error::{FiligranError, Result};
use filigran_core::types::Color;

use crate::pdf::render::PageRenderer;

/// Serves pre-built buffers; `None` entries fail to render.
pub(crate) struct StaticRenderer {
    pages: Vec<Option<RgbaImage>>,
    last_dpi: Cell<Option<u32>>,
}

impl StaticRenderer {
    pub(crate) fn new(pages: Vec<Option<RgbaImage>>) -> Self {
        Self {
            pages,
            last_dpi: Cell::new(None),
        }
    }

    pub(crate) fn last_dpi(&self) -> Option<u32> {
        self.last_dpi.get()
    }
}

impl PageRenderer for StaticRenderer {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn render(&self, page: u32, dpi: u32) -> Result<RgbaImage> {
        self.last_dpi.set(Some(dpi));
        match self.pages.get(page as usize) {
            Some(Some(image)) => Ok(image.clone()),
            Some(None) => Err(FiligranError::PageRender {
                page,
                reason: "corrupt page".into(),
            }),
            None => Err(FiligranError::PageRender {
                page,
                reason: "no such page".into(),
            }),
        }
    }
}

/// Opaque `width`x`height` page made of consecutive colour bands, each
/// covering its share of the pixels in row-major order.
pub(crate) fn banded_page(width: u32, height: u32, bands: &[(Color, f64)]) -> RgbaImage {
    let total = width as usize * height as usize;
    let mut boundaries = Vec::with_capacity(bands.len());
    let mut cumulative = 0.0;
    for (color, share) in bands {
        cumulative += share;
        boundaries.push(((cumulative * total as f64).round() as usize, *color));
    }

    let mut image = RgbaImage::new(width, height);
    for (i, pixel) in image.pixels_mut().enumerate() {
        let color = boundaries
            .iter()
            .find(|(end, _)| i < *end)
            .or(boundaries.last())
            .map_or(Color::WHITE, |(_, color)| *color);
        *pixel = Rgba([color.r, color.g, color.b, 255]);
    }
    image
}

/// A 200x300pt document with one page per content stream. Resources and
/// `/MediaBox` sit on the page tree node: font `F1`, image `Im1`, form `Fx1`.
pub(crate) fn sample_pdf(streams: &[&str]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 1,
            "Height" => 1,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![0],
    ));
    let form_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), 10.into(), 10.into()],
        },
        b"0 0 10 10 re f".to_vec(),
    ));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
        "XObject" => dictionary! { "Im1" => image_id, "Fx1" => form_id },
    });

    let kids: Vec<Object> = streams
        .iter()
        .map(|stream| {
            let content_id = doc.add_object(Stream::new(dictionary! {}, stream.as_bytes().to_vec()));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            })
            .into()
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => streams.len() as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 200.into(), 300.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}
