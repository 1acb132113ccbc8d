// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Filigran watermark remover.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FiligranError, Result};

/// Squared Euclidean distance between black and white in RGB space.
pub const MAX_DISTANCE_SQUARED: u32 = 3 * 255 * 255;

/// An RGB colour. Compared by value, never by identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Squared Euclidean distance to `other`, exact in integer arithmetic.
    pub fn distance_squared(self, other: Color) -> u32 {
        let dr = self.r as i32 - other.r as i32;
        let dg = self.g as i32 - other.g as i32;
        let db = self.b as i32 - other.b as i32;
        (dr * dr + dg * dg + db * db) as u32
    }

    /// Euclidean distance scaled into 0.0..=1.0, where 1.0 is black-to-white.
    pub fn normalized_distance(self, other: Color) -> f64 {
        (self.distance_squared(other) as f64 / MAX_DISTANCE_SQUARED as f64).sqrt()
    }

    /// Per-channel closeness: every channel differs by at most `max_delta`.
    pub fn within_channel_delta(self, other: Color, max_delta: f64) -> bool {
        [
            (self.r, other.r),
            (self.g, other.g),
            (self.b, other.b),
        ]
        .iter()
        .all(|&(a, b)| (a as f64 - b as f64).abs() <= max_delta)
    }

    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<[u8; 3]> for Color {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self::new(r, g, b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RGB({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Parses the command-line form `R,G,B`.
impl FromStr for Color {
    type Err = FiligranError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [r, g, b] = parts.as_slice() else {
            return Err(FiligranError::InvalidColor(s.to_string()));
        };
        let channel = |v: &str| {
            v.parse::<u8>()
                .map_err(|_| FiligranError::InvalidColor(s.to_string()))
        };
        Ok(Self::new(channel(*r)?, channel(*g)?, channel(*b)?))
    }
}

/// Normalised maximum colour distance for a match: 0.0 exact, 1.0 anything.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Tolerance(f64);

impl Tolerance {
    pub const EXACT: Tolerance = Tolerance(0.0);
    pub const ANY: Tolerance = Tolerance(1.0);

    pub fn new(value: f64) -> Result<Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(FiligranError::InvalidTolerance(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn matches_everything(self) -> bool {
        self.0 >= 1.0
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self(0.1)
    }
}

impl TryFrom<f64> for Tolerance {
    type Error = FiligranError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Tolerance> for f64 {
    fn from(tolerance: Tolerance) -> Self {
        tolerance.0
    }
}

/// Ordered, non-empty set of watermark colours. A pixel matching any member
/// is a watermark pixel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetColorSet(Vec<Color>);

impl TargetColorSet {
    pub fn new(colors: Vec<Color>) -> Result<Self> {
        if colors.is_empty() {
            return Err(FiligranError::NoTargetColors);
        }
        Ok(Self(colors))
    }

    pub fn as_slice(&self) -> &[Color] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Color> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TargetColorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.0.iter().map(Color::to_string).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Inclusive, 0-indexed page range validated against a document's length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRange {
    start: u32,
    end: u32,
}

impl PageRange {
    /// Validate `start..=end` against `page_count`.
    pub fn new(start: u32, end: u32, page_count: u32) -> Result<Self> {
        if page_count == 0 || start > end || end >= page_count {
            return Err(FiligranError::PageRange {
                start,
                end,
                page_count,
            });
        }
        Ok(Self { start, end })
    }

    /// Every page of a `page_count`-page document.
    pub fn whole(page_count: u32) -> Result<Self> {
        Self::new(0, page_count.saturating_sub(1), page_count)
    }

    /// Build a range from optional bounds; a missing bound defaults to the
    /// document's first or last page.
    pub fn from_bounds(start: Option<u32>, end: Option<u32>, page_count: u32) -> Result<Self> {
        let start = start.unwrap_or(0);
        let end = end.unwrap_or(page_count.saturating_sub(1));
        Self::new(start, end, page_count)
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    /// Always false: a validated range holds at least one page.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, page: u32) -> bool {
        (self.start..=self.end).contains(&page)
    }

    pub fn pages(&self) -> std::ops::RangeInclusive<u32> {
        self.start..=self.end
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// A contiguous slice of a [`PageRange`] processed as one memory-bounded unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    /// 0-based position of this batch in its run.
    pub ordinal: usize,
    pub start: u32,
    pub end: u32,
}

impl Batch {
    pub fn len(&self) -> usize {
        (self.end - self.start + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn pages(&self) -> std::ops::RangeInclusive<u32> {
        self.start..=self.end
    }
}

/// One colour bucket of a page's colour histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorHistogramEntry {
    pub color: Color,
    /// Share of the page's pixels, 0.0..=1.0.
    pub frequency: f64,
}

/// Kind of a content element on a PDF page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Text,
    Image,
    /// A form XObject (reusable content group).
    Form,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Form => "form",
        })
    }
}

/// Axis-aligned bounding box in PDF user-space points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Smallest box containing all `points`.
    pub fn enclosing(points: &[(f64, f64)]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bbox = Self::new(first.0, first.1, first.0, first.1);
        for &(x, y) in rest {
            bbox.x0 = bbox.x0.min(x);
            bbox.y0 = bbox.y0.min(y);
            bbox.x1 = bbox.x1.max(x);
            bbox.y1 = bbox.y1.max(y);
        }
        Some(bbox)
    }

    pub fn union(self, other: BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Every coordinate within `slack` points of `other`'s.
    pub fn approx_eq(&self, other: &BBox, slack: f64) -> bool {
        (self.x0 - other.x0).abs() < slack
            && (self.y0 - other.y0).abs() < slack
            && (self.x1 - other.x1).abs() < slack
            && (self.y1 - other.y1).abs() < slack
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }
}

/// How a pattern recognises an element by structure rather than text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum StructuralDescriptor {
    /// The element at this 0-based position in the page's element list.
    ElementIndex { index: usize },
    /// An element of this kind whose bounding box lies within 1pt of `bbox`.
    Shape { kind: ElementKind, bbox: BBox },
}

/// A named, persisted description of a watermark element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatermarkPattern {
    pub id: u32,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub structural_descriptor: Option<StructuralDescriptor>,
    pub description: String,
}

/// One requested pattern, built once from the command line's parallel lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternDefinition {
    /// 0-based index of the source element on the analysed page.
    pub element: usize,
    pub text: String,
    pub description: String,
}

impl PatternDefinition {
    /// Zip positional lists into records; all three must be the same length.
    pub fn from_parallel(
        elements: &[usize],
        texts: &[String],
        descriptions: &[String],
    ) -> Result<Vec<Self>> {
        if elements.len() != texts.len() || elements.len() != descriptions.len() {
            return Err(FiligranError::PatternArity {
                indices: elements.len(),
                texts: texts.len(),
                descriptions: descriptions.len(),
            });
        }
        Ok(elements
            .iter()
            .zip(texts)
            .zip(descriptions)
            .map(|((&element, text), description)| Self {
                element,
                text: text.clone(),
                description: description.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_parses_command_line_form() {
        assert_eq!("255,0,0".parse::<Color>().unwrap(), Color::new(255, 0, 0));
        assert_eq!(" 12, 34 ,56 ".parse::<Color>().unwrap(), Color::new(12, 34, 56));
    }

    #[test]
    fn color_rejects_out_of_range_and_wrong_arity() {
        for bad in ["256,0,0", "-1,0,0", "1,2", "1,2,3,4", "red", ""] {
            assert!(
                matches!(bad.parse::<Color>(), Err(FiligranError::InvalidColor(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn normalized_distance_spans_zero_to_one() {
        assert_eq!(Color::BLACK.normalized_distance(Color::BLACK), 0.0);
        assert!((Color::BLACK.normalized_distance(Color::WHITE) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn tolerance_bounds() {
        assert!(Tolerance::new(0.0).is_ok());
        assert!(Tolerance::new(1.0).is_ok());
        assert!(Tolerance::new(1.01).is_err());
        assert!(Tolerance::new(-0.1).is_err());
        assert!(Tolerance::new(f64::NAN).is_err());
    }

    #[test]
    fn tolerance_deserialisation_is_validated() {
        assert!(serde_json::from_str::<Tolerance>("0.25").is_ok());
        assert!(serde_json::from_str::<Tolerance>("2.0").is_err());
    }

    #[test]
    fn empty_target_set_rejected() {
        assert!(matches!(
            TargetColorSet::new(Vec::new()),
            Err(FiligranError::NoTargetColors)
        ));
    }

    #[test]
    fn page_range_validation() {
        assert!(PageRange::new(0, 9, 10).is_ok());
        assert!(PageRange::new(5, 4, 10).is_err());
        assert!(PageRange::new(0, 10, 10).is_err());
        assert!(PageRange::whole(0).is_err());

        let range = PageRange::from_bounds(Some(3), None, 10).unwrap();
        assert_eq!((range.start(), range.end(), range.len()), (3, 9, 7));
    }

    #[test]
    fn pattern_definitions_require_equal_lengths() {
        let texts = vec!["DRAFT".to_string(), "CONFIDENTIAL".into(), "COPY".into()];
        let descriptions = vec!["stamp".to_string(), "banner".into()];
        let err = PatternDefinition::from_parallel(&[0, 1, 2], &texts, &descriptions).unwrap_err();
        assert!(matches!(
            err,
            FiligranError::PatternArity {
                indices: 3,
                texts: 3,
                descriptions: 2
            }
        ));
    }

    #[test]
    fn pattern_json_shape() {
        let pattern = WatermarkPattern {
            id: 7,
            text: Some("DRAFT".into()),
            structural_descriptor: Some(StructuralDescriptor::Shape {
                kind: ElementKind::Image,
                bbox: BBox::new(10.0, 20.0, 110.0, 220.0),
            }),
            description: "diagonal stamp".into(),
        };
        let json = serde_json::to_value(&pattern).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["structural_descriptor"]["type"], "shape");
        assert_eq!(json["structural_descriptor"]["kind"], "image");
    }

    #[test]
    fn bbox_slack_comparison() {
        let a = BBox::new(0.0, 0.0, 100.0, 50.0);
        let b = BBox::new(0.5, -0.5, 100.9, 50.2);
        assert!(a.approx_eq(&b, 1.0));
        assert!(!a.approx_eq(&BBox::new(0.0, 0.0, 101.5, 50.0), 1.0));
    }
}
