// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page analyzer — colour-frequency histogram of a rendered page, used to pick
// target colours before running removal. Read-only.

use std::collections::HashMap;

use image::RgbaImage;
use tracing::{debug, instrument};

use filigran_core::config::AnalyzerConfig;
use filigran_core::error::Result;
use filigran_core::types::{Color, ColorHistogramEntry};

use crate::pdf::render::PageRenderer;

/// Builds colour histograms for single pages.
#[derive(Debug, Clone, Default)]
pub struct PageAnalyzer {
    config: AnalyzerConfig,
}

impl PageAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Render `page` at the configured DPI and histogram it.
    #[instrument(skip(self, renderer), fields(dpi = self.config.dpi))]
    pub fn analyze<R: PageRenderer + ?Sized>(
        &self,
        renderer: &R,
        page: u32,
    ) -> Result<Vec<ColorHistogramEntry>> {
        let image = renderer.render(page, self.config.dpi)?;
        Ok(self.analyze_image(&image))
    }

    /// Histogram of `image`, most frequent bucket first.
    ///
    /// Colours are counted exactly, then folded into buckets: colours seen
    /// fewer than `min_pixels` times are ignored, and each remaining colour
    /// (most frequent first) joins the first bucket whose representative is
    /// within `merge_tolerance * 255` on every channel. Buckets under
    /// `min_frequency` are dropped. Frequencies are shares of all pixels, so
    /// they sum to at most 1.0.
    pub fn analyze_image(&self, image: &RgbaImage) -> Vec<ColorHistogramEntry> {
        let total = image.width() as usize * image.height() as usize;
        if total == 0 {
            return Vec::new();
        }

        let mut counts: HashMap<Color, usize> = HashMap::new();
        for pixel in image.pixels() {
            let [r, g, b, _] = pixel.0;
            *counts.entry(Color::new(r, g, b)).or_insert(0) += 1;
        }

        let mut ordered: Vec<(Color, usize)> = counts.into_iter().collect();
        ordered.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let max_delta = self.config.merge_tolerance * 255.0;
        let mut buckets: Vec<(Color, usize)> = Vec::new();
        for (color, count) in ordered {
            if count < self.config.min_pixels {
                continue;
            }
            match buckets
                .iter_mut()
                .find(|(representative, _)| representative.within_channel_delta(color, max_delta))
            {
                Some(bucket) => bucket.1 += count,
                None => buckets.push((color, count)),
            }
        }

        let mut entries: Vec<ColorHistogramEntry> = buckets
            .into_iter()
            .map(|(color, count)| ColorHistogramEntry {
                color,
                frequency: count as f64 / total as f64,
            })
            .filter(|entry| entry.frequency >= self.config.min_frequency)
            .collect();
        entries.sort_by(|a, b| b.frequency.total_cmp(&a.frequency));

        if let Some(k) = self.config.top_k {
            entries.truncate(k);
        }

        debug!(buckets = entries.len(), total_pixels = total, "Histogram built");
        entries
    }
}
