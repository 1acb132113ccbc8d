// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// filigran-document — Watermark removal engine for Filigran.
//
// Provides colour-based removal on rendered pages (matching, substitution,
// histograms), pattern-based removal on page content streams (registry,
// element filter), batched page scheduling with cancellation, and assembly
// of the output PDF.

pub mod batch;
pub mod pattern;
pub mod pdf;
pub mod pipeline;
pub mod raster;

#[cfg(test)]
pub(crate) mod testing;

// Re-export the primary types so callers can use `filigran_document::PdfSource` etc.
pub use batch::{BatchScheduler, CancelToken, PageContent, PageTransform, ProcessedPage};
pub use pattern::PatternRegistry;
pub use pdf::{DocumentAssembler, PageRenderer, PdfSource};
pub use pipeline::{PatternRemoval, RunSummary, execute};
pub use raster::{ColorMatcher, ColorRemoval, PageAnalyzer, RasterPageProcessor};

#[cfg(feature = "pdfium")]
pub use pdf::pdfium::{PdfiumRenderer, bind_pdfium};
