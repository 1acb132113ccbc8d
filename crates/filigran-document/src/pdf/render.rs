// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rasterisation seam. The raster pipeline only needs "page N at D dpi
// as an RGBA buffer"; the PDFium-backed implementation lives in `pdfium.rs`.

use image::RgbaImage;

use filigran_core::error::Result;

/// Renders document pages to pixel buffers.
///
/// Implementations report an unrenderable page (corrupt, unsupported, zero
/// size) as [`FiligranError::PageRender`](filigran_core::FiligranError::PageRender)
/// so the batch scheduler can skip it. Any other error aborts the batch.
pub trait PageRenderer {
    /// Number of pages in the document.
    fn page_count(&self) -> u32;

    /// Render the 0-indexed `page` at `dpi`. The returned buffer is owned by
    /// the caller.
    fn render(&self, page: u32, dpi: u32) -> Result<RgbaImage>;
}

impl<R: PageRenderer + ?Sized> PageRenderer for &R {
    fn page_count(&self) -> u32 {
        (**self).page_count()
    }

    fn render(&self, page: u32, dpi: u32) -> Result<RgbaImage> {
        (**self).render(page, dpi)
    }
}
