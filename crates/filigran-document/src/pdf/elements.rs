// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page elements — split a decoded content stream into addressable elements
// (text objects and XObject placements) and re-encode it without some of them.

use std::collections::HashSet;

use lopdf::Object;
use lopdf::content::{Content, Operation};

use filigran_core::error::{FiligranError, Result};
use filigran_core::types::{BBox, ElementKind};

/// Average glyph advance as a fraction of the font size. Glyph metrics are
/// not consulted; this is the usual Helvetica estimate.
const AVG_GLYPH_WIDTH: f64 = 0.5;

/// Affine transform `[a b c d e f]` as written in content streams.
type Matrix = [f64; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `m` applied first, then `n`.
fn multiply(m: &Matrix, n: &Matrix) -> Matrix {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

fn translation(tx: f64, ty: f64) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

fn apply(m: &Matrix, x: f64, y: f64) -> (f64, f64) {
    (x * m[0] + y * m[2] + m[4], x * m[1] + y * m[3] + m[5])
}

/// Bounding box of the rectangle `(0,0)-(w,h)` under `m`.
fn transformed_rect(m: &Matrix, w: f64, h: f64) -> Option<BBox> {
    BBox::enclosing(&[apply(m, 0.0, 0.0), apply(m, w, 0.0), apply(m, 0.0, h), apply(m, w, h)])
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn numbers<const N: usize>(operands: &[Object]) -> Option<[f64; N]> {
    if operands.len() < N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, operand) in out.iter_mut().zip(&operands[operands.len() - N..]) {
        *slot = number(operand)?;
    }
    Some(out)
}

/// Decode a PDF string operand: UTF-16BE with BOM, else byte-per-char.
fn decode_text(bytes: &[u8]) -> String {
    if let Some(body) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// One removable unit of page content.
#[derive(Debug, Clone, PartialEq)]
pub struct PageElement {
    /// 0-based position in the page's element list.
    pub index: usize,
    pub kind: ElementKind,
    /// Shown text, for text elements.
    pub text: Option<String>,
    /// Approximate placement in user space.
    pub bbox: Option<BBox>,
    /// XObject resource name, for image and form elements.
    pub name: Option<String>,
    /// Operators that paint the element: the `Do` of a placement, the
    /// show operators of a text object.
    pub(crate) ops: Vec<usize>,
}

/// Decoded page content plus the elements found in it.
#[derive(Debug, Clone)]
pub struct PageContents {
    operations: Vec<Operation>,
    pub elements: Vec<PageElement>,
}

impl PageContents {
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn get(&self, index: usize) -> Option<&PageElement> {
        self.elements.get(index)
    }

    /// Re-encode the content stream with the elements at `removed` dropped.
    ///
    /// Only painting operators go. A removed text object keeps its `BT`/`ET`
    /// and every state operator inside it, since font, leading and colour
    /// carry over to later text objects.
    pub fn without(&self, removed: &[usize]) -> Result<Vec<u8>> {
        let dropped: HashSet<usize> = self
            .elements
            .iter()
            .filter(|element| removed.contains(&element.index))
            .flat_map(|element| element.ops.iter().copied())
            .collect();

        let operations: Vec<Operation> = self
            .operations
            .iter()
            .enumerate()
            .flat_map(|(i, op)| {
                if dropped.contains(&i) {
                    unpainted(op)
                } else {
                    vec![op.clone()]
                }
            })
            .collect();

        Content { operations }
            .encode()
            .map_err(|err| FiligranError::Pdf(format!("cannot encode content stream: {}", err)))
    }
}

/// State-setting remainder of a dropped painting operator. `'` moves to the
/// next line and `"` also sets word and character spacing.
fn unpainted(op: &Operation) -> Vec<Operation> {
    match op.operator.as_str() {
        "'" => vec![Operation::new("T*", vec![])],
        "\"" => match op.operands.as_slice() {
            [word, character, _] => vec![
                Operation::new("Tw", vec![word.clone()]),
                Operation::new("Tc", vec![character.clone()]),
                Operation::new("T*", vec![]),
            ],
            _ => vec![Operation::new("T*", vec![])],
        },
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Copy)]
struct GraphicsState {
    ctm: Matrix,
    font_size: f64,
    leading: f64,
}

/// Text object being collected between `BT` and `ET`.
struct OpenText {
    shows: Vec<usize>,
    text: String,
    bbox: Option<BBox>,
    matrix: Matrix,
    line_matrix: Matrix,
}

impl OpenText {
    fn new() -> Self {
        Self {
            shows: Vec::new(),
            text: String::new(),
            bbox: None,
            matrix: IDENTITY,
            line_matrix: IDENTITY,
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = multiply(&translation(tx, ty), &self.line_matrix);
        self.matrix = self.line_matrix;
    }

    /// Record a shown string and advance the text position past it.
    fn show(&mut self, bytes: &[u8], state: &GraphicsState) {
        let decoded = decode_text(bytes);
        let advance = decoded.chars().count() as f64 * AVG_GLYPH_WIDTH * state.font_size;
        let placement = multiply(&self.matrix, &state.ctm);
        if let Some(run) = transformed_rect(&placement, advance, state.font_size) {
            self.bbox = Some(self.bbox.map_or(run, |b| b.union(run)));
        }
        self.text.push_str(&decoded);
        self.shift(advance);
    }

    fn shift(&mut self, tx: f64) {
        self.matrix = multiply(&translation(tx, 0.0), &self.matrix);
    }

    /// The finished element, or `None` when the object showed nothing.
    fn close(self, index: usize) -> Option<PageElement> {
        if self.shows.is_empty() {
            return None;
        }
        Some(PageElement {
            index,
            kind: ElementKind::Text,
            text: Some(self.text),
            bbox: self.bbox,
            name: None,
            ops: self.shows,
        })
    }
}

fn close_text(open: &mut Option<OpenText>, elements: &mut Vec<PageElement>) {
    let index = elements.len();
    if let Some(element) = open.take().and_then(|text| text.close(index)) {
        elements.push(element);
    }
}

/// Walk `operations` and collect elements. `xobject_kind` resolves a `Do`
/// operand to the kind of XObject it names; unknown names are not elements,
/// nor are text objects that show nothing.
pub fn extract(
    operations: Vec<Operation>,
    xobject_kind: impl Fn(&[u8]) -> Option<ElementKind>,
) -> PageContents {
    let mut elements = Vec::new();
    let mut state = GraphicsState {
        ctm: IDENTITY,
        font_size: 0.0,
        leading: 0.0,
    };
    let mut stack: Vec<GraphicsState> = Vec::new();
    let mut open: Option<OpenText> = None;

    for (i, op) in operations.iter().enumerate() {
        let operands = op.operands.as_slice();
        match op.operator.as_str() {
            "q" => stack.push(state),
            "Q" => {
                if let Some(saved) = stack.pop() {
                    state = saved;
                }
            }
            "cm" => {
                if let Some(m) = numbers::<6>(operands) {
                    state.ctm = multiply(&m, &state.ctm);
                }
            }
            "Tf" => {
                if let Some([size]) = numbers::<1>(operands) {
                    state.font_size = size;
                }
            }
            "TL" => {
                if let Some([leading]) = numbers::<1>(operands) {
                    state.leading = leading;
                }
            }
            "BT" => {
                close_text(&mut open, &mut elements);
                open = Some(OpenText::new());
            }
            "ET" => close_text(&mut open, &mut elements),
            "Do" => {
                let Some(name) = operands.first().and_then(|o| o.as_name().ok()) else {
                    continue;
                };
                let Some(kind) = xobject_kind(name) else {
                    continue;
                };
                elements.push(PageElement {
                    index: elements.len(),
                    kind,
                    text: None,
                    bbox: transformed_rect(&state.ctm, 1.0, 1.0),
                    name: Some(String::from_utf8_lossy(name).into_owned()),
                    ops: vec![i],
                });
            }
            _ => {}
        }

        let Some(text) = open.as_mut() else {
            continue;
        };
        match op.operator.as_str() {
            "Td" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    text.move_line(tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    state.leading = -ty;
                    text.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = numbers::<6>(operands) {
                    text.line_matrix = m;
                    text.matrix = m;
                }
            }
            "T*" => text.move_line(0.0, -state.leading),
            "Tj" => {
                text.shows.push(i);
                if let Some(Object::String(bytes, _)) = operands.first() {
                    text.show(bytes, &state);
                }
            }
            "'" | "\"" => {
                text.shows.push(i);
                text.move_line(0.0, -state.leading);
                if let Some(Object::String(bytes, _)) = operands.last() {
                    text.show(bytes, &state);
                }
            }
            "TJ" => {
                text.shows.push(i);
                let Some(Object::Array(items)) = operands.first() else {
                    continue;
                };
                for item in items {
                    match item {
                        Object::String(bytes, _) => text.show(bytes, &state),
                        other => {
                            if let Some(adjust) = number(other) {
                                text.shift(-adjust / 1000.0 * state.font_size);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    // Unterminated text object runs to the end of the stream.
    close_text(&mut open, &mut elements);

    PageContents {
        operations,
        elements,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(stream: &[u8]) -> PageContents {
        let content = Content::decode(stream).unwrap();
        extract(content.operations, |name| match name {
            b"Im1" => Some(ElementKind::Image),
            b"Fx1" => Some(ElementKind::Form),
            _ => None,
        })
    }

    #[test]
    fn text_object_becomes_one_element() {
        let page = contents(b"BT /F1 12 Tf 100 700 Td (DRAFT) Tj ET");
        assert_eq!(page.elements.len(), 1);
        let element = &page.elements[0];
        assert_eq!(element.kind, ElementKind::Text);
        assert_eq!(element.text.as_deref(), Some("DRAFT"));
        let bbox = element.bbox.unwrap();
        assert!(bbox.approx_eq(&BBox::new(100.0, 700.0, 130.0, 712.0), 1e-6));
    }

    #[test]
    fn tj_arrays_and_utf16_are_joined() {
        let page = contents(b"BT /F1 10 Tf [(CONFI) -20 (DENTIAL)] TJ <FEFF004F004B> Tj ET");
        assert_eq!(page.elements[0].text.as_deref(), Some("CONFIDENTIALOK"));
    }

    #[test]
    fn xobject_placement_uses_current_matrix() {
        let page = contents(b"q 50 0 0 40 10 20 cm /Im1 Do Q /Fx1 Do /Unknown Do");
        assert_eq!(page.elements.len(), 2);
        assert_eq!(page.elements[0].kind, ElementKind::Image);
        assert_eq!(page.elements[0].name.as_deref(), Some("Im1"));
        assert!(
            page.elements[0]
                .bbox
                .unwrap()
                .approx_eq(&BBox::new(10.0, 20.0, 60.0, 60.0), 1e-6)
        );
        // Q restored the identity matrix.
        assert!(
            page.elements[1]
                .bbox
                .unwrap()
                .approx_eq(&BBox::new(0.0, 0.0, 1.0, 1.0), 1e-6)
        );
    }

    #[test]
    fn rotated_text_box_follows_ctm() {
        let page = contents(b"q 0 1 -1 0 300 0 cm BT /F1 10 Tf (AB) Tj ET Q");
        let bbox = page.elements[0].bbox.unwrap();
        // 10pt wide run, 10pt tall, turned a quarter.
        assert!(bbox.approx_eq(&BBox::new(290.0, 0.0, 300.0, 10.0), 1e-6));
    }

    #[test]
    fn indices_follow_stream_order() {
        let page = contents(b"/Im1 Do BT /F1 8 Tf (a) Tj ET BT (b) Tj ET");
        let indices: Vec<usize> = page.elements.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(page.elements[2].text.as_deref(), Some("b"));
    }

    fn operators(page: &PageContents) -> Vec<&str> {
        page.operations().iter().map(|o| o.operator.as_str()).collect()
    }

    #[test]
    fn without_drops_only_selected_elements() {
        let page = contents(b"q 1 0 0 1 5 5 cm BT /F1 12 Tf (SECRET) Tj ET Q BT /F1 12 Tf (body) Tj ET");
        let stream = page.without(&[0]).unwrap();

        let reparsed = contents(&stream);
        assert_eq!(reparsed.elements.len(), 1);
        assert_eq!(reparsed.elements[0].text.as_deref(), Some("body"));
        assert_eq!(
            &operators(&reparsed)[..6],
            &["q", "cm", "BT", "Tf", "ET", "Q"]
        );
    }

    #[test]
    fn later_text_keeps_font_of_removed_object() {
        let page = contents(b"BT /F1 12 Tf 0 0 1 rg (WATERMARK) Tj ET BT 10 10 Td (body) Tj ET");
        let reparsed = contents(&page.without(&[0]).unwrap());

        let ops = operators(&reparsed);
        assert!(ops.contains(&"Tf") && ops.contains(&"rg"));
        assert_eq!(ops.iter().filter(|op| **op == "Tj").count(), 1);
        assert_eq!(reparsed.elements.len(), 1);
        let body = &reparsed.elements[0];
        assert_eq!(body.text.as_deref(), Some("body"));
        assert!(body.bbox.unwrap().approx_eq(&BBox::new(10.0, 10.0, 34.0, 22.0), 1e-6));
    }

    #[test]
    fn removed_quote_operators_keep_line_and_spacing() {
        let page = contents(b"BT /F1 10 Tf 12 TL 0 100 Td (a) ' 2 1 (b) \" ET");
        let reparsed = contents(&page.without(&[0]).unwrap());
        assert!(reparsed.elements.is_empty());
        assert_eq!(
            operators(&reparsed),
            vec!["BT", "Tf", "TL", "Td", "T*", "Tw", "Tc", "T*", "ET"]
        );
    }

    #[test]
    fn text_object_without_shows_is_not_an_element() {
        let page = contents(b"BT /F1 12 Tf ET BT (x) Tj ET");
        assert_eq!(page.elements.len(), 1);
        assert_eq!(page.elements[0].index, 0);
        assert_eq!(page.elements[0].text.as_deref(), Some("x"));
    }

    #[test]
    fn removing_nothing_keeps_every_operator() {
        let page = contents(b"BT (x) Tj ET /Im1 Do");
        let reparsed = contents(&page.without(&[]).unwrap());
        assert_eq!(reparsed.operations().len(), page.operations().len());
    }

    #[test]
    fn unterminated_text_object_runs_to_end() {
        let page = contents(b"BT /F1 12 Tf (tail) Tj");
        assert_eq!(page.elements[0].text.as_deref(), Some("tail"));
        assert_eq!(page.elements[0].ops, vec![2]);
    }
}
