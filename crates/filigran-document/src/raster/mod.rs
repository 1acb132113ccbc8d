// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster module — colour matching, per-page colour substitution and colour
// histograms.

pub mod analyzer;
pub mod matcher;
pub mod processor;

pub use analyzer::PageAnalyzer;
pub use matcher::{ColorMatcher, matches};
pub use processor::{ColorRemoval, RasterPageProcessor, Substitution};
