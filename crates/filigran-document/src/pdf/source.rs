// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF source — open an input document with `lopdf` and answer page-level
// questions: page count, page boxes, content operators and XObject kinds.

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, info, instrument};

use filigran_core::error::{FiligranError, Result};
use filigran_core::types::{BBox, ElementKind};

use crate::pdf::elements::{self, PageContents};

/// US Letter, the PDF default when no page box is present anywhere.
const DEFAULT_MEDIA_BOX: BBox = BBox {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

/// Page tree attributes are inherited at most this many levels up.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Read access to an input PDF.
pub struct PdfSource {
    document: Document,
    /// Page object ids in page order.
    page_ids: Vec<ObjectId>,
    /// Source path, if opened from a file (useful for diagnostics).
    source_path: Option<String>,
}

impl PdfSource {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let document = Document::load(path_ref).map_err(|err| {
            FiligranError::InputFile(format!("{}: {}", path_ref.display(), err))
        })?;

        let mut source = Self::from_document(document);
        source.source_path = Some(path_ref.display().to_string());
        Ok(source)
    }

    /// Load a PDF already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data)
            .map_err(|err| FiligranError::InputFile(format!("in-memory PDF: {}", err)))?;
        Ok(Self::from_document(document))
    }

    /// Wrap an already-parsed document.
    pub fn from_document(document: Document) -> Self {
        let page_ids = page_ids(&document);
        debug!(pages = page_ids.len(), "PDF loaded");
        Self {
            document,
            page_ids,
            source_path: None,
        }
    }

    // -- Inspection -----------------------------------------------------------

    pub fn page_count(&self) -> u32 {
        self.page_ids.len() as u32
    }

    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    /// Object id of the 0-indexed `page`.
    pub fn page_id(&self, page: u32) -> Result<ObjectId> {
        self.page_ids.get(page as usize).copied().ok_or_else(|| {
            FiligranError::Pdf(format!(
                "page {} out of range (document has {} pages)",
                page,
                self.page_ids.len()
            ))
        })
    }

    pub fn media_box(&self, page: u32) -> Result<BBox> {
        Ok(media_box(&self.document, self.page_id(page)?))
    }

    // -- Content --------------------------------------------------------------

    /// Decoded content-stream operators of `page`.
    ///
    /// An unreadable content stream is a page-level failure.
    pub fn operations(&self, page: u32) -> Result<Vec<Operation>> {
        let page_id = self.page_id(page)?;
        let raw = self
            .document
            .get_page_content(page_id)
            .map_err(|err| FiligranError::PageRender {
                page,
                reason: format!("cannot read content stream: {}", err),
            })?;
        let content = Content::decode(&raw).map_err(|err| FiligranError::PageRender {
            page,
            reason: format!("cannot parse content stream: {}", err),
        })?;
        Ok(content.operations)
    }

    /// Content elements of `page` (text objects and XObject placements).
    #[instrument(skip(self))]
    pub fn page_contents(&self, page: u32) -> Result<PageContents> {
        let page_id = self.page_id(page)?;
        let operations = self.operations(page)?;
        let xobjects = xobject_kinds(&self.document, page_id);
        let contents = elements::extract(operations, |name| {
            xobjects
                .iter()
                .find(|(candidate, _)| candidate.as_slice() == name)
                .map(|(_, kind)| *kind)
        });
        debug!(elements = contents.elements.len(), "Page elements extracted");
        Ok(contents)
    }
}

/// Page object ids in page order.
pub(crate) fn page_ids(document: &Document) -> Vec<ObjectId> {
    // `get_pages` is keyed by 1-indexed page number, in order.
    document.get_pages().into_values().collect()
}

/// Follow a reference, if `object` is one.
fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(document, object)? {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

/// Look up an inheritable page attribute, walking `/Parent` links.
pub(crate) fn inherited<'a>(
    document: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut node = document.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(value) = node.get(key) {
            return resolve(document, value);
        }
        node = resolve_dict(document, node.get(b"Parent").ok()?)?;
    }
    None
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn rect(document: &Document, object: &Object) -> Option<BBox> {
    let Object::Array(values) = resolve(document, object)? else {
        return None;
    };
    let coords: Vec<f64> = values
        .iter()
        .filter_map(|v| resolve(document, v).and_then(number))
        .collect();
    match coords.as_slice() {
        [x0, y0, x1, y1] => Some(BBox::new(*x0, *y0, *x1, *y1)),
        _ => None,
    }
}

/// `/MediaBox` of a page, inherited if needed.
pub(crate) fn media_box(document: &Document, page_id: ObjectId) -> BBox {
    inherited(document, page_id, b"MediaBox")
        .and_then(|obj| rect(document, obj))
        .unwrap_or(DEFAULT_MEDIA_BOX)
}

/// The visible page area: `/CropBox` if present, else `/MediaBox`.
pub(crate) fn visible_box(document: &Document, page_id: ObjectId) -> BBox {
    inherited(document, page_id, b"CropBox")
        .and_then(|obj| rect(document, obj))
        .unwrap_or_else(|| media_box(document, page_id))
}

/// `/Rotate` normalised to 0, 90, 180 or 270.
pub(crate) fn rotation(document: &Document, page_id: ObjectId) -> i64 {
    inherited(document, page_id, b"Rotate")
        .and_then(|obj| obj.as_i64().ok())
        .unwrap_or(0)
        .rem_euclid(360)
}

/// Names of the XObjects in a page's resources, with their kind.
fn xobject_kinds(document: &Document, page_id: ObjectId) -> Vec<(Vec<u8>, ElementKind)> {
    let Some(resources) = inherited(document, page_id, b"Resources")
        .and_then(|obj| resolve_dict(document, obj))
    else {
        return Vec::new();
    };
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|obj| resolve_dict(document, obj))
    else {
        return Vec::new();
    };

    xobjects
        .iter()
        .filter_map(|(name, value)| {
            let dict = resolve_dict(document, value)?;
            let kind = match dict.get(b"Subtype").ok()?.as_name().ok()? {
                b"Image" => ElementKind::Image,
                b"Form" => ElementKind::Form,
                _ => return None,
            };
            Some((name.clone(), kind))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_pdf;

    #[test]
    fn counts_pages_and_reads_boxes() {
        let source = PdfSource::from_document(sample_pdf(&["", ""]));
        assert_eq!(source.page_count(), 2);
        let media = source.media_box(0).unwrap();
        assert_eq!((media.width(), media.height()), (200.0, 300.0));
        assert!(source.page_id(2).is_err());
    }

    #[test]
    fn garbage_bytes_are_an_input_error() {
        assert!(matches!(
            PdfSource::from_bytes(b"definitely not a pdf"),
            Err(FiligranError::InputFile(_))
        ));
    }

    #[test]
    fn media_box_is_inherited_from_page_tree() {
        let document = sample_pdf(&[""]);
        let source = PdfSource::from_document(document);
        // The sample puts /MediaBox on the /Pages node only.
        let page = source.document().get_dictionary(source.page_id(0).unwrap()).unwrap();
        assert!(page.get(b"MediaBox").is_err());
        assert_eq!(source.media_box(0).unwrap().y1, 300.0);
    }

    #[test]
    fn xobjects_classified_by_subtype() {
        let source = PdfSource::from_document(sample_pdf(&["q 50 0 0 50 10 10 cm /Im1 Do Q /Fx1 Do"]));
        let contents = source.page_contents(0).unwrap();
        let kinds: Vec<ElementKind> = contents.elements.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ElementKind::Image, ElementKind::Form]);
    }
}
