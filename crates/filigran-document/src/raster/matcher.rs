// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Colour matcher — decides whether a pixel belongs to a watermark palette.

use filigran_core::types::{Color, MAX_DISTANCE_SQUARED, TargetColorSet, Tolerance};

/// Absorbs float rounding when a distance sits exactly on the tolerance.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// `true` when `pixel` lies within `tolerance` (normalised Euclidean
/// distance, boundary inclusive) of any colour in `targets`.
pub fn matches(pixel: Color, targets: &TargetColorSet, tolerance: Tolerance) -> bool {
    ColorMatcher::new(targets, tolerance).matches(pixel)
}

/// A target set and tolerance compiled into an integer squared-distance bound,
/// for use inside per-pixel loops.
#[derive(Debug, Clone)]
pub struct ColorMatcher {
    targets: Vec<Color>,
    max_distance_squared: u32,
    everything: bool,
}

impl ColorMatcher {
    pub fn new(targets: &TargetColorSet, tolerance: Tolerance) -> Self {
        let t = tolerance.value();
        // Squared distances are integers, so flooring the bound is exact.
        let bound = t * t * MAX_DISTANCE_SQUARED as f64 + BOUNDARY_EPSILON;
        Self {
            targets: targets.as_slice().to_vec(),
            max_distance_squared: bound.floor() as u32,
            everything: tolerance.matches_everything(),
        }
    }

    /// Tolerance 1.0: every pixel matches without computing distances.
    pub fn matches_everything(&self) -> bool {
        self.everything
    }

    #[inline]
    pub fn matches(&self, pixel: Color) -> bool {
        self.everything
            || self
                .targets
                .iter()
                .any(|&target| pixel.distance_squared(target) <= self.max_distance_squared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(colors: &[Color]) -> TargetColorSet {
        TargetColorSet::new(colors.to_vec()).unwrap()
    }

    #[test]
    fn zero_tolerance_is_exact_equality() {
        let targets = set(&[Color::new(200, 10, 10), Color::new(0, 0, 255)]);
        for pixel in [
            Color::new(200, 10, 10),
            Color::new(201, 10, 10),
            Color::new(200, 10, 11),
            Color::new(0, 0, 255),
            Color::new(0, 0, 254),
            Color::BLACK,
        ] {
            let exact = targets.iter().any(|&t| t == pixel);
            assert_eq!(matches(pixel, &targets, Tolerance::EXACT), exact, "{pixel}");
        }
    }

    #[test]
    fn full_tolerance_matches_every_pixel() {
        let targets = set(&[Color::BLACK]);
        let matcher = ColorMatcher::new(&targets, Tolerance::ANY);
        assert!(matcher.matches_everything());
        for v in (0..=255u8).step_by(15) {
            assert!(matcher.matches(Color::new(v, 255 - v, v / 2)));
        }
        assert!(matches(Color::WHITE, &targets, Tolerance::ANY));
    }

    #[test]
    fn any_target_in_set_suffices() {
        let targets = set(&[Color::new(255, 0, 0), Color::new(0, 255, 0)]);
        let tolerance = Tolerance::new(0.05).unwrap();
        assert!(matches(Color::new(250, 5, 0), &targets, tolerance));
        assert!(matches(Color::new(3, 250, 3), &targets, tolerance));
        assert!(!matches(Color::new(0, 0, 250), &targets, tolerance));
    }

    #[test]
    fn boundary_is_inclusive() {
        // Distance black -> (255,255,255) is the maximum, so 1.0 normalised.
        // Pick a pixel at distance exactly 255 from black: normalised 1/sqrt(3).
        let targets = set(&[Color::BLACK]);
        let pixel = Color::new(255, 0, 0);
        let exact = pixel.normalized_distance(Color::BLACK);
        assert!(matches(pixel, &targets, Tolerance::new(exact).unwrap()));
        assert!(!matches(pixel, &targets, Tolerance::new(exact - 1e-6).unwrap()));
    }

    #[test]
    fn tolerance_scales_with_normalised_distance() {
        let targets = set(&[Color::new(128, 128, 128)]);
        let near = Color::new(138, 128, 128); // distance 10 / 441.67 ≈ 0.0226
        assert!(!matches(near, &targets, Tolerance::new(0.02).unwrap()));
        assert!(matches(near, &targets, Tolerance::new(0.03).unwrap()));
    }
}
