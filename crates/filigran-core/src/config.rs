// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Run configuration. Built once at the command-line boundary and handed to
// each component as an immutable value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FiligranError, Result};
use crate::types::{Color, Tolerance};

/// PDF user space is 72 points per inch.
pub const POINTS_PER_INCH: f64 = 72.0;

/// What replaces a pixel classified as watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundFill {
    /// Opaque white, the usual paper colour.
    #[default]
    White,
    /// Fully transparent; the output page gets a soft mask.
    Transparent,
    /// Any opaque colour.
    Solid(Color),
}

impl BackgroundFill {
    /// RGBA value written over matched pixels.
    pub fn rgba(self) -> [u8; 4] {
        match self {
            Self::White => [255, 255, 255, 255],
            Self::Transparent => [255, 255, 255, 0],
            Self::Solid(color) => [color.r, color.g, color.b, 255],
        }
    }
}

impl FromStr for BackgroundFill {
    type Err = FiligranError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" => Ok(Self::White),
            "transparent" | "none" => Ok(Self::Transparent),
            other => other.parse::<Color>().map(Self::Solid),
        }
    }
}

impl fmt::Display for BackgroundFill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::White => f.write_str("white"),
            Self::Transparent => f.write_str("transparent"),
            Self::Solid(color) => write!(f, "{color}"),
        }
    }
}

/// Settings for the colour-substitution pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalConfig {
    /// Raster resolution. Buffer memory grows with its square.
    pub dpi: u32,
    /// Maximum normalised colour distance counted as a match.
    pub tolerance: Tolerance,
    /// Pages held in memory at once.
    pub batch_size: usize,
    /// Replacement for matched pixels.
    pub background: BackgroundFill,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            tolerance: Tolerance::default(),
            batch_size: 10,
            background: BackgroundFill::White,
        }
    }
}

impl RemovalConfig {
    /// Reject settings no run could start with.
    pub fn validate(&self) -> Result<()> {
        if self.dpi == 0 {
            return Err(FiligranError::InvalidDpi(self.dpi));
        }
        if self.batch_size == 0 {
            return Err(FiligranError::InvalidBatchSize(self.batch_size));
        }
        Ok(())
    }

    /// Pixel dimensions of a page of `width_pt` x `height_pt` points.
    pub fn pixel_size(&self, width_pt: f64, height_pt: f64) -> (u32, u32) {
        let scale = self.dpi as f64 / POINTS_PER_INCH;
        (
            (width_pt * scale).round().max(0.0) as u32,
            (height_pt * scale).round().max(0.0) as u32,
        )
    }

    /// RGBA buffer bytes for one page of the given size.
    pub fn buffer_bytes(&self, width_pt: f64, height_pt: f64) -> u64 {
        let (w, h) = self.pixel_size(width_pt, height_pt);
        w as u64 * h as u64 * 4
    }
}

/// Settings for the page colour histogram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Raster resolution used for analysis.
    pub dpi: u32,
    /// Per-channel distance (fraction of 255) under which colours share a bucket.
    pub merge_tolerance: f64,
    /// Colours seen fewer times than this are ignored.
    pub min_pixels: usize,
    /// Buckets below this share of the page are dropped.
    pub min_frequency: f64,
    /// Keep only the most frequent buckets.
    pub top_k: Option<usize>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            merge_tolerance: 0.05,
            min_pixels: 100,
            min_frequency: 0.001,
            top_k: None,
        }
    }
}
