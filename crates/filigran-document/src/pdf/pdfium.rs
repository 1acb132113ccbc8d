// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDFium-backed page renderer (requires the `pdfium` feature and a libpdfium
// shared library at runtime).
//
// PDFium is not thread-safe; a renderer is used from one thread only.

use std::path::Path;

use image::RgbaImage;
use pdfium_render::prelude::*;
use tracing::{debug, info, instrument};

use filigran_core::config::POINTS_PER_INCH;
use filigran_core::error::{FiligranError, Result};

use crate::pdf::render::PageRenderer;

/// Bind to libpdfium.
///
/// Searches, in order: the current directory, `./vendor/pdfium/lib/`, then
/// the system library paths.
pub fn bind_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "./vendor/pdfium/lib/",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|err| {
            FiligranError::Pdf(format!("failed to load the PDFium library: {:?}", err))
        })?;

    Ok(Pdfium::new(bindings))
}

/// Renders pages of one open document.
pub struct PdfiumRenderer<'a> {
    document: PdfDocument<'a>,
}

impl<'a> PdfiumRenderer<'a> {
    #[instrument(skip(pdfium), fields(path = %path.display()))]
    pub fn open(pdfium: &'a Pdfium, path: &Path) -> Result<Self> {
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|err| FiligranError::InputFile(format!("{}: {:?}", path.display(), err)))?;
        info!(pages = document.pages().len(), "PDF opened for rendering");
        Ok(Self { document })
    }
}

impl PageRenderer for PdfiumRenderer<'_> {
    fn page_count(&self) -> u32 {
        self.document.pages().len() as u32
    }

    fn render(&self, page: u32, dpi: u32) -> Result<RgbaImage> {
        let page_error = |reason: String| FiligranError::PageRender { page, reason };

        let index = page
            .try_into()
            .map_err(|_| page_error(format!("page index {} unsupported", page)))?;
        let pdf_page = self
            .document
            .pages()
            .get(index)
            .map_err(|err| page_error(format!("{:?}", err)))?;

        let scale = dpi as f32 / POINTS_PER_INCH as f32;
        let width = (pdf_page.width().value * scale).round() as i32;
        let height = (pdf_page.height().value * scale).round() as i32;
        if width <= 0 || height <= 0 {
            return Err(page_error("page has no area".into()));
        }

        let bitmap = pdf_page
            .render_with_config(
                &PdfRenderConfig::new()
                    .set_target_width(width)
                    .set_target_height(height)
                    .render_form_data(true)
                    .render_annotations(true),
            )
            .map_err(|err| page_error(format!("{:?}", err)))?;

        let (w, h) = (bitmap.width() as u32, bitmap.height() as u32);
        debug!(page, dpi, w, h, "Page rendered");
        RgbaImage::from_raw(w, h, bitmap.as_rgba_bytes())
            .ok_or_else(|| page_error("bitmap size does not match its dimensions".into()))
    }
}
