//! Page text extraction using lopdf
//!
//! Converted spreadsheets are laid out as a grid of short cells, so the
//! extractor decodes each text-showing operator with its position and then
//! rebuilds lines from top to bottom. The classifier only looks at the first
//! words of a page, which makes the line order matter more than spacing.

use crate::PackError;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;

/// Kerning adjustment (thousandths of an em) treated as a word break inside TJ arrays
const TJ_SPACE_THRESHOLD: f32 = -200.0;

/// Vertical distance under which two items belong to the same line
const LINE_Y_TOLERANCE: f32 = 3.0;

/// A text item with position information
#[derive(Debug, Clone)]
pub struct TextItem {
    /// The text content
    pub text: String,
    /// X position on page
    pub x: f32,
    /// Y position on page (PDF coordinates, origin at bottom-left)
    pub y: f32,
    /// Page number (1-indexed)
    pub page: u32,
}

/// A line of text (grouped text items)
#[derive(Debug, Clone)]
pub struct TextLine {
    pub items: Vec<TextItem>,
    pub y: f32,
    pub page: u32,
}

impl TextLine {
    pub fn text(&self) -> String {
        self.items
            .iter()
            .map(|i| i.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Extract the text of one page as newline-separated lines in reading order
pub fn extract_page_text(
    doc: &Document,
    page_id: ObjectId,
    page_num: u32,
) -> Result<String, PackError> {
    let items = extract_page_text_items(doc, page_id, page_num)?;

    Ok(group_into_lines(items)
        .iter()
        .map(TextLine::text)
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Extract the text lines of every page in a document, keyed by page number
///
/// Pages whose content cannot be decoded carry their error instead of text.
pub fn extract_pages(doc: &Document) -> BTreeMap<u32, Result<Vec<TextLine>, PackError>> {
    doc.get_pages()
        .into_iter()
        .map(|(page_num, page_id)| {
            let lines = extract_page_text_items(doc, page_id, page_num).map(group_into_lines);
            (page_num, lines)
        })
        .collect()
}

/// Multiply two 2D transformation matrices
/// Matrix format: [a, b, c, d, e, f] representing:
/// | a  b  0 |
/// | c  d  0 |
/// | e  f  1 |
fn multiply_matrices(m1: &[f32; 6], m2: &[f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

/// Text positioning state while walking a content stream
struct TextState {
    ctm: [f32; 6],
    ctm_stack: Vec<[f32; 6]>,
    font: String,
    font_size: f32,
    leading: f32,
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    in_text_block: bool,
}

impl TextState {
    fn new() -> Self {
        Self {
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            font: String::new(),
            font_size: 12.0,
            leading: 0.0,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            in_text_block: false,
        }
    }

    fn next_line(&mut self) {
        let leading = if self.leading != 0.0 {
            self.leading
        } else {
            self.font_size * 1.2
        };
        self.move_line(0.0, -leading);
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        let translation = [1.0, 0.0, 0.0, 1.0, tx, ty];
        self.line_matrix = multiply_matrices(&translation, &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn item(&self, text: String, page: u32) -> TextItem {
        let combined = multiply_matrices(&self.text_matrix, &self.ctm);
        TextItem {
            text,
            x: combined[4],
            y: combined[5],
            page,
        }
    }
}

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Extract text items from a single page
pub fn extract_page_text_items(
    doc: &Document,
    page_id: ObjectId,
    page_num: u32,
) -> Result<Vec<TextItem>, PackError> {
    let page_error = |reason: String| PackError::PageText {
        page: page_num,
        reason,
    };

    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();

    let content_data = doc
        .get_page_content(page_id)
        .map_err(|e| page_error(e.to_string()))?;
    let content = Content::decode(&content_data).map_err(|e| page_error(e.to_string()))?;

    let mut items = Vec::new();
    let mut state = TextState::new();

    for op in &content.operations {
        match op.operator.as_str() {
            "q" => state.ctm_stack.push(state.ctm),
            "Q" => {
                if let Some(saved) = state.ctm_stack.pop() {
                    state.ctm = saved;
                }
            }
            "cm" => {
                if let Some(matrix) = matrix_operands(&op.operands) {
                    state.ctm = multiply_matrices(&matrix, &state.ctm);
                }
            }
            "BT" => {
                state.in_text_block = true;
                state.text_matrix = IDENTITY;
                state.line_matrix = IDENTITY;
            }
            "ET" => state.in_text_block = false,
            "Tf" => {
                if op.operands.len() >= 2 {
                    if let Ok(name) = op.operands[0].as_name() {
                        state.font = String::from_utf8_lossy(name).to_string();
                    }
                    if let Some(size) = get_number(&op.operands[1]) {
                        state.font_size = size;
                    }
                }
            }
            "TL" => {
                if let Some(leading) = op.operands.first().and_then(get_number) {
                    state.leading = leading;
                }
            }
            "Td" | "TD" => {
                if op.operands.len() >= 2 {
                    let tx = get_number(&op.operands[0]).unwrap_or(0.0);
                    let ty = get_number(&op.operands[1]).unwrap_or(0.0);
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    state.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(matrix) = matrix_operands(&op.operands) {
                    state.text_matrix = matrix;
                    state.line_matrix = matrix;
                }
            }
            "T*" => state.next_line(),
            "Tj" | "'" | "\"" => {
                if op.operator != "Tj" {
                    state.next_line();
                }
                // The string is the last operand for all three operators
                if state.in_text_block {
                    if let Some(text) = op
                        .operands
                        .last()
                        .and_then(|o| decode_operand(o, doc, &fonts, &state.font))
                    {
                        if !text.trim().is_empty() {
                            items.push(state.item(text, page_num));
                        }
                    }
                }
            }
            "TJ" => {
                if state.in_text_block {
                    if let Some(Ok(array)) = op.operands.first().map(Object::as_array) {
                        let text = decode_tj_array(array, doc, &fonts, &state.font);
                        if !text.trim().is_empty() {
                            items.push(state.item(text, page_num));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    Ok(items)
}

fn decode_tj_array(
    array: &[Object],
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, &Dictionary>,
    current_font: &str,
) -> String {
    let mut combined = String::new();
    for element in array {
        if let Some(adjustment) = get_number(element) {
            if adjustment < TJ_SPACE_THRESHOLD && !combined.ends_with(' ') {
                combined.push(' ');
            }
        } else if let Some(text) = decode_operand(element, doc, fonts, current_font) {
            combined.push_str(&text);
        }
    }
    combined
}

fn matrix_operands(operands: &[Object]) -> Option<[f32; 6]> {
    if operands.len() < 6 {
        return None;
    }
    let mut matrix = IDENTITY;
    for (i, operand) in operands.iter().take(6).enumerate() {
        matrix[i] = get_number(operand)?;
    }
    Some(matrix)
}

/// Helper to get f32 from Object
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Decode a string operand with the current font's encoding
fn decode_operand(
    obj: &Object,
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, &Dictionary>,
    current_font: &str,
) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };

    if let Some(font_dict) = fonts.get(current_font.as_bytes()) {
        if let Ok(encoding) = font_dict.get_font_encoding(doc) {
            if let Ok(text) = Document::decode_text(&encoding, bytes) {
                return Some(text);
            }
        }
    }

    // Fallback: UTF-16BE with BOM, then Latin-1
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&utf16));
    }

    Some(bytes.iter().map(|&b| b as char).collect())
}

/// Group text items into lines, top of the page first
pub fn group_into_lines(mut items: Vec<TextItem>) -> Vec<TextLine> {
    // Stable sort: items on the same baseline keep their stream order until
    // the per-line x sort below
    items.sort_by(|a, b| {
        a.page
            .cmp(&b.page)
            .then(b.y.partial_cmp(&a.y).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut lines: Vec<TextLine> = Vec::new();
    for item in items {
        let should_merge = lines.last().is_some_and(|last_line| {
            last_line.page == item.page && (last_line.y - item.y).abs() < LINE_Y_TOLERANCE
        });

        if should_merge {
            if let Some(line) = lines.last_mut() {
                line.items.push(item);
                continue;
            }
        }

        let (y, page) = (item.y, item.page);
        lines.push(TextLine {
            items: vec![item],
            y,
            page,
        });
    }

    for line in &mut lines {
        line.items
            .sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(text: &str, x: f32, y: f32) -> TextItem {
        TextItem {
            text: text.into(),
            x,
            y,
            page: 1,
        }
    }

    #[test]
    fn test_group_into_lines_orders_top_down() {
        let items = vec![
            item("Total", 100.0, 500.0),
            item("SLIP", 160.0, 700.0),
            item("PACKING", 100.0, 701.0),
            item("PO 42", 100.0, 680.0),
        ];

        let lines = group_into_lines(items);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].text(), "PACKING SLIP");
        assert_eq!(lines[1].text(), "PO 42");
        assert_eq!(lines[2].text(), "Total");
    }

    #[test]
    fn test_group_into_lines_empty() {
        assert!(group_into_lines(Vec::new()).is_empty());
    }

    #[test]
    fn test_tj_array_inserts_word_breaks() {
        let doc = Document::with_version("1.5");
        let fonts = BTreeMap::new();
        let array = vec![
            Object::string_literal("PACKING"),
            Object::Integer(-250),
            Object::string_literal("SL"),
            Object::Integer(-20),
            Object::string_literal("IP"),
        ];
        assert_eq!(decode_tj_array(&array, &doc, &fonts, "F1"), "PACKING SLIP");
    }

    #[test]
    fn test_matrix_operands_rejects_short_arrays() {
        assert!(matrix_operands(&[Object::Integer(1)]).is_none());
        let m = matrix_operands(&[
            Object::Integer(1),
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(1),
            Object::Real(10.0),
            Object::Real(20.0),
        ])
        .unwrap();
        assert_eq!(m, [1.0, 0.0, 0.0, 1.0, 10.0, 20.0]);
    }
}
