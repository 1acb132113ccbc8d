// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pattern registry — the set of known watermark patterns, keyed by id, with
// JSON persistence.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info, instrument};

use filigran_core::error::{FiligranError, Result};
use filigran_core::types::{ElementKind, PatternDefinition, StructuralDescriptor, WatermarkPattern};

use crate::pdf::elements::PageElement;

/// Watermark patterns in ascending id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternRegistry {
    patterns: BTreeMap<u32, WatermarkPattern>,
}

impl PatternRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&WatermarkPattern> {
        self.patterns.get(&id)
    }

    /// Patterns in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &WatermarkPattern> {
        self.patterns.values()
    }

    /// One past the highest id in use (1 when empty).
    pub fn next_id(&self) -> u32 {
        self.patterns.keys().next_back().map_or(1, |id| id + 1)
    }

    pub fn add(&mut self, pattern: WatermarkPattern) -> Result<()> {
        if self.patterns.contains_key(&pattern.id) {
            return Err(FiligranError::DuplicateId(pattern.id));
        }
        debug!(id = pattern.id, description = %pattern.description, "Pattern added");
        self.patterns.insert(pattern.id, pattern);
        Ok(())
    }

    pub fn remove(&mut self, id: u32) -> Result<WatermarkPattern> {
        self.patterns
            .remove(&id)
            .ok_or(FiligranError::UnknownPattern(id))
    }

    /// Create one pattern per definition from the elements of `page`.
    ///
    /// Each pattern takes the definition's text (empty means none). A text
    /// element given text is matched by that text alone; otherwise the
    /// pattern takes the element's shape: kind plus bounding box, or its
    /// position when the box is unknown. Either every definition is added
    /// or none is.
    /// Returns the new ids.
    #[instrument(skip(self, elements, definitions), fields(count = definitions.len()))]
    pub fn add_definitions(
        &mut self,
        page: u32,
        elements: &[PageElement],
        definitions: &[PatternDefinition],
    ) -> Result<Vec<u32>> {
        let first_id = self.next_id();
        let mut staged = Vec::with_capacity(definitions.len());

        for (offset, definition) in definitions.iter().enumerate() {
            let element =
                elements
                    .get(definition.element)
                    .ok_or(FiligranError::UnknownElement {
                        page,
                        index: definition.element,
                        available: elements.len(),
                    })?;

            let text = Some(definition.text.clone()).filter(|text| !text.is_empty());
            let structural_descriptor = if text.is_some() && element.kind == ElementKind::Text {
                None
            } else {
                Some(match element.bbox {
                    Some(bbox) => StructuralDescriptor::Shape {
                        kind: element.kind,
                        bbox,
                    },
                    None => StructuralDescriptor::ElementIndex {
                        index: element.index,
                    },
                })
            };

            staged.push(WatermarkPattern {
                id: first_id + offset as u32,
                text,
                structural_descriptor,
                description: definition.description.clone(),
            });
        }

        let ids = staged.iter().map(|pattern| pattern.id).collect();
        for pattern in staged {
            self.patterns.insert(pattern.id, pattern);
        }
        info!(?ids, "Patterns defined");
        Ok(ids)
    }

    // -- Persistence ----------------------------------------------------------

    /// Pretty-printed JSON array, ascending by id.
    pub fn to_json(&self) -> Result<String> {
        let patterns: Vec<&WatermarkPattern> = self.iter().collect();
        Ok(serde_json::to_string_pretty(&patterns)?)
    }

    /// Parse a pattern file. Schema violations and repeated ids are
    /// `MalformedPatternFile`.
    pub fn from_json(json: &str) -> Result<Self> {
        let patterns: Vec<WatermarkPattern> = serde_json::from_str(json)
            .map_err(|err| FiligranError::MalformedPatternFile(err.to_string()))?;

        let mut registry = Self::new();
        for pattern in patterns {
            let id = pattern.id;
            registry.add(pattern).map_err(|_| {
                FiligranError::MalformedPatternFile(format!("id {} appears more than once", id))
            })?;
        }
        Ok(registry)
    }

    #[instrument(skip(self), fields(path = %path.as_ref().display(), patterns = self.len()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        info!("Saved {} patterns to {}", self.len(), path.as_ref().display());
        Ok(())
    }

    /// Read a registry from `path`. Returns a fresh registry, so a failed
    /// load leaves any existing one as it was.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let registry = Self::from_json(&json)?;
        info!("Loaded {} patterns from {}", registry.len(), path.as_ref().display());
        Ok(registry)
    }
}
