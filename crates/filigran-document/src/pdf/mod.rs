// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — reading pages and their content elements, rendering, and
// assembling the output document.

pub mod assembler;
pub mod elements;
pub mod render;
pub mod source;

#[cfg(feature = "pdfium")]
pub mod pdfium;

pub use assembler::DocumentAssembler;
pub use elements::{PageContents, PageElement};
pub use render::PageRenderer;
pub use source::PdfSource;
