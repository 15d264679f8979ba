//! Structural data model shared by the analyzer and the assembler.

use serde::{Deserialize, Serialize};

/// A classified unit of page content in reading order.
///
/// The analyzer emits these; the assembler maps each variant to the
/// corresponding Word construct. Text is carried inline — by the time an
/// element exists, its geometry has served its purpose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructureElement {
    /// A block of body text.
    Paragraph {
        text: String,
        /// Estimated font size in page pixels (style hint).
        font_size: f32,
    },
    /// A heading; `level` 1 is the largest band.
    Heading {
        level: u8,
        text: String,
        font_size: f32,
    },
    /// One bulleted or numbered entry. Consecutive items stay separate
    /// elements; the assembler groups them into list runs.
    ListItem { text: String, marker: ListMarker },
    /// One cell of a detected grid, 0-based coordinates.
    TableCell { row: u32, col: u32, text: String },
    /// Boundary between two detected columns of a multi-column page.
    ColumnBreak,
}

impl StructureElement {
    /// The element's text, if it carries any.
    pub fn text(&self) -> Option<&str> {
        match self {
            StructureElement::Paragraph { text, .. }
            | StructureElement::Heading { text, .. }
            | StructureElement::ListItem { text, .. }
            | StructureElement::TableCell { text, .. } => Some(text),
            StructureElement::ColumnBreak => None,
        }
    }
}

/// Kind of list marker a [`StructureElement::ListItem`] was recognized with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListMarker {
    /// `•`, `-`, `*`, `○`, …
    Bullet,
    /// `1.`, `a)`, `IV.`, …
    Numbered,
}

/// The ordered structural elements of one source page.
///
/// An empty element list is a valid result: a blank page analyzed cleanly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentStructure {
    /// 1-based source page number.
    pub page_number: u32,
    /// Elements in final reading order (columns, then lines within each).
    pub elements: Vec<StructureElement>,
}

impl DocumentStructure {
    /// A structure with no content, used for blank and for failed pages.
    pub fn empty(page_number: u32) -> Self {
        Self {
            page_number,
            elements: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
