// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Filigran.

use thiserror::Error;

/// Top-level error type for all Filigran operations.
#[derive(Debug, Error)]
pub enum FiligranError {
    // -- Input validation --
    #[error("cannot read input document: {0}")]
    InputFile(String),

    #[error("invalid page range {start}..={end} for a document with {page_count} pages")]
    PageRange {
        start: u32,
        end: u32,
        page_count: u32,
    },

    #[error("invalid colour '{0}': expected R,G,B with components in 0..=255")]
    InvalidColor(String),

    #[error("invalid tolerance {0}: must lie within 0.0..=1.0")]
    InvalidTolerance(f64),

    #[error("invalid DPI {0}: must be greater than zero")]
    InvalidDpi(u32),

    #[error("invalid batch size {0}: must be greater than zero")]
    InvalidBatchSize(usize),

    #[error("colour mode needs at least one target colour")]
    NoTargetColors,

    // -- Page processing --
    #[error("page {page} could not be rendered: {reason}")]
    PageRender { page: u32, reason: String },

    #[error("batch {batch} failed after completing pages {completed:?}; resume from page {resume_from}: {reason}")]
    BatchFailed {
        batch: usize,
        completed: Vec<u32>,
        resume_from: u32,
        reason: String,
    },

    #[error("run cancelled; resume from page {resume_from}")]
    Cancelled { resume_from: u32 },

    #[error("page {got} arrived after page {previous}; pages must be assembled in increasing order")]
    OrderViolation { previous: u32, got: u32 },

    // -- Patterns --
    #[error(
        "pattern definitions need matching counts: {indices} element indices, {texts} texts, {descriptions} descriptions"
    )]
    PatternArity {
        indices: usize,
        texts: usize,
        descriptions: usize,
    },

    #[error("malformed pattern file: {0}")]
    MalformedPatternFile(String),

    #[error("a pattern with id {0} already exists")]
    DuplicateId(u32),

    #[error("no pattern with id {0}")]
    UnknownPattern(u32),

    #[error("element {index} does not exist on page {page} ({available} elements)")]
    UnknownElement {
        page: u32,
        index: usize,
        available: usize,
    },

    #[error("no watermark patterns defined")]
    NoPatterns,

    // -- Document backends --
    #[error("PDF operation failed: {0}")]
    Pdf(String),

    #[error("image processing failed: {0}")]
    Image(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FiligranError {
    /// Whether the run can continue past this error by skipping one page.
    pub fn is_page_level(&self) -> bool {
        matches!(self, Self::PageRender { .. })
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FiligranError>;
