// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Element filter — split a page's elements into kept and removed according
// to the registered watermark patterns.

use tracing::debug;

use filigran_core::types::{StructuralDescriptor, WatermarkPattern};

use crate::pattern::registry::PatternRegistry;
use crate::pdf::elements::PageElement;

/// Shape descriptors match boxes whose edges are all closer than this (pt).
pub const SHAPE_SLACK: f64 = 1.0;

/// An element removed by the filter and the pattern that claimed it.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedElement<'e> {
    pub element: &'e PageElement,
    pub pattern_id: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOutcome<'e> {
    /// Surviving elements, in page order.
    pub kept: Vec<&'e PageElement>,
    pub removed: Vec<RemovedElement<'e>>,
}

impl FilterOutcome<'_> {
    /// Indices of the removed elements.
    pub fn removed_indices(&self) -> Vec<usize> {
        self.removed.iter().map(|r| r.element.index).collect()
    }
}

/// Whether `pattern` claims `element`: its text is contained in the
/// element's text, or its structural descriptor fits. An empty pattern text
/// matches nothing.
pub fn pattern_matches(pattern: &WatermarkPattern, element: &PageElement) -> bool {
    let text_match = match (pattern.text.as_deref(), element.text.as_deref()) {
        (Some(needle), Some(haystack)) if !needle.is_empty() => haystack.contains(needle),
        _ => false,
    };

    text_match
        || pattern
            .structural_descriptor
            .as_ref()
            .is_some_and(|descriptor| descriptor_matches(descriptor, element))
}

fn descriptor_matches(descriptor: &StructuralDescriptor, element: &PageElement) -> bool {
    match descriptor {
        StructuralDescriptor::ElementIndex { index } => element.index == *index,
        StructuralDescriptor::Shape { kind, bbox } => {
            element.kind == *kind
                && element
                    .bbox
                    .is_some_and(|own| own.approx_eq(bbox, SHAPE_SLACK))
        }
    }
}

/// Partition `elements` against every pattern in `registry`. The lowest
/// matching pattern id is recorded for each removed element.
pub fn filter<'e>(elements: &'e [PageElement], registry: &PatternRegistry) -> FilterOutcome<'e> {
    let mut outcome = FilterOutcome::default();
    for element in elements {
        match registry.iter().find(|pattern| pattern_matches(pattern, element)) {
            Some(pattern) => outcome.removed.push(RemovedElement {
                element,
                pattern_id: pattern.id,
            }),
            None => outcome.kept.push(element),
        }
    }
    debug!(
        kept = outcome.kept.len(),
        removed = outcome.removed.len(),
        "Elements filtered"
    );
    outcome
}
