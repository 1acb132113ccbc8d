// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster page processor — render a page, overwrite every watermark-coloured
// pixel with the background fill, hand back the modified buffer.

use image::{Rgba, RgbaImage};
use tracing::{debug, instrument};

use filigran_core::config::{BackgroundFill, RemovalConfig};
use filigran_core::error::{FiligranError, Result};
use filigran_core::types::{Color, TargetColorSet};

use crate::batch::{PageContent, PageTransform, ProcessedPage};
use crate::pdf::render::PageRenderer;
use crate::raster::matcher::ColorMatcher;

/// Result of one substitution pass.
#[derive(Debug)]
pub struct Substitution {
    pub image: RgbaImage,
    /// Pixels whose value actually changed.
    pub replaced: usize,
}

/// Colour-substitution transform for a single page buffer.
///
/// Buffers are moved in and handed back: the processor has exclusive
/// ownership for the duration of the transform, so the caller can never
/// observe a half-modified render. Keep a clone beforehand if the original
/// is needed for diagnostics.
#[derive(Debug, Clone)]
pub struct RasterPageProcessor {
    matcher: ColorMatcher,
    fill: BackgroundFill,
    dpi: u32,
}

impl RasterPageProcessor {
    pub fn new(targets: &TargetColorSet, config: &RemovalConfig) -> Self {
        Self {
            matcher: ColorMatcher::new(targets, config.tolerance),
            fill: config.background,
            dpi: config.dpi,
        }
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    /// Overwrite matching pixels with the fill. Full overwrite, no blending,
    /// so a partially transparent watermark cannot bleed through.
    pub fn substitute(&self, mut image: RgbaImage) -> Substitution {
        let fill = Rgba(self.fill.rgba());
        let mut replaced = 0usize;

        if self.matcher.matches_everything() {
            for pixel in image.pixels_mut() {
                if *pixel != fill {
                    *pixel = fill;
                    replaced += 1;
                }
            }
            return Substitution { image, replaced };
        }

        for pixel in image.pixels_mut() {
            if *pixel == fill {
                continue;
            }
            let Rgba([r, g, b, _]) = *pixel;
            if self.matcher.matches(Color::new(r, g, b)) {
                *pixel = fill;
                replaced += 1;
            }
        }

        Substitution { image, replaced }
    }

    /// Render `page` through `renderer` and substitute its watermark pixels.
    #[instrument(skip(self, renderer), fields(dpi = self.dpi))]
    pub fn process<R: PageRenderer + ?Sized>(&self, renderer: &R, page: u32) -> Result<Substitution> {
        let rendered = renderer.render(page, self.dpi)?;
        if rendered.width() == 0 || rendered.height() == 0 {
            return Err(FiligranError::PageRender {
                page,
                reason: "page rendered to an empty buffer".into(),
            });
        }

        let result = self.substitute(rendered);
        debug!(
            width = result.image.width(),
            height = result.image.height(),
            replaced = result.replaced,
            "Page substituted"
        );
        Ok(result)
    }
}

/// Colour-mode page transform: renderer plus processor, driven by the
/// batch scheduler.
pub struct ColorRemoval<'r, R: PageRenderer + ?Sized> {
    renderer: &'r R,
    processor: RasterPageProcessor,
}

impl<'r, R: PageRenderer + ?Sized> ColorRemoval<'r, R> {
    pub fn new(renderer: &'r R, processor: RasterPageProcessor) -> Self {
        Self {
            renderer,
            processor,
        }
    }
}

impl<R: PageRenderer + ?Sized> PageTransform for ColorRemoval<'_, R> {
    fn transform(&mut self, page: u32) -> Result<ProcessedPage> {
        let Substitution { image, replaced } = self.processor.process(self.renderer, page)?;
        Ok(ProcessedPage {
            index: page,
            content: PageContent::Raster(image),
            changes: replaced,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::analyzer::PageAnalyzer;
    use crate::testing::{StaticRenderer, banded_page};
    use filigran_core::config::AnalyzerConfig;
    use filigran_core::types::Tolerance;

    const RED: Color = Color::new(255, 0, 0);

    fn processor(targets: &[Color], tolerance: f64, background: BackgroundFill) -> RasterPageProcessor {
        let config = RemovalConfig {
            tolerance: Tolerance::new(tolerance).unwrap(),
            background,
            ..RemovalConfig::default()
        };
        RasterPageProcessor::new(&TargetColorSet::new(targets.to_vec()).unwrap(), &config)
    }

    #[test]
    fn red_watermark_removed_black_text_untouched() {
        let page = banded_page(100, 100, &[(Color::BLACK, 0.95), (RED, 0.05)]);
        let result = processor(&[RED], 0.1, BackgroundFill::White).substitute(page);
        assert_eq!(result.replaced, 500);

        let analyzer = PageAnalyzer::new(AnalyzerConfig::default());
        let histogram = analyzer.analyze_image(&result.image);
        assert!(histogram.iter().all(|entry| entry.color != RED));
        let black = histogram.iter().find(|e| e.color == Color::BLACK).unwrap();
        assert!((black.frequency - 0.95).abs() < 1e-9);
    }

    #[test]
    fn substitution_is_a_fixed_point() {
        let page = banded_page(
            60,
            40,
            &[
                (Color::BLACK, 0.5),
                (Color::new(250, 10, 10), 0.25),
                (Color::new(200, 200, 200), 0.25),
            ],
        );
        for fill in [
            BackgroundFill::White,
            BackgroundFill::Transparent,
            BackgroundFill::Solid(Color::new(250, 0, 0)),
        ] {
            let processor = processor(&[RED, Color::new(205, 205, 205)], 0.1, fill);
            let once = processor.substitute(page.clone());
            assert!(once.replaced > 0);
            let twice = processor.substitute(once.image.clone());
            assert_eq!(twice.replaced, 0, "{fill}");
            assert_eq!(twice.image, once.image, "{fill}");
        }
    }

    #[test]
    fn transparent_fill_clears_alpha() {
        let page = banded_page(10, 10, &[(RED, 1.0)]);
        let result = processor(&[RED], 0.0, BackgroundFill::Transparent).substitute(page);
        assert!(result.image.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn full_tolerance_blanks_page() {
        let page = banded_page(8, 8, &[(Color::BLACK, 0.5), (RED, 0.5)]);
        let result = processor(&[Color::WHITE], 1.0, BackgroundFill::White).substitute(page);
        assert_eq!(result.replaced, 64);
        assert!(result.image.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn process_renders_at_configured_dpi() {
        let renderer = StaticRenderer::new(vec![Some(banded_page(4, 4, &[(RED, 1.0)]))]);
        let result = processor(&[RED], 0.1, BackgroundFill::White)
            .process(&renderer, 0)
            .unwrap();
        assert_eq!(result.replaced, 16);
        assert_eq!(renderer.last_dpi(), Some(200));
    }

    #[test]
    fn empty_render_is_a_page_error() {
        let renderer = StaticRenderer::new(vec![Some(RgbaImage::new(0, 0))]);
        let err = processor(&[RED], 0.1, BackgroundFill::White)
            .process(&renderer, 0)
            .unwrap_err();
        assert!(err.is_page_level());
    }
}
