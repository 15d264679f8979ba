//! Structure analysis: from a flat, positional word list to a structural
//! model, using layout geometry alone — no language understanding.
//!
//! The pass order matters and resolves classification ambiguity:
//!
//! 1. words group into lines by vertical-centre proximity;
//! 2. column detection partitions the lines at a tall gutter;
//! 3. table grids claim their lines first;
//! 4. remaining lines classify as heading, then list item, then paragraph —
//!    a short isolated line that could be either resolves in that order.
//!
//! Clustering ties break toward merging: fewer, larger groups beat
//! fragmented prose.

mod columns;
mod tables;

use crate::model::{DocumentStructure, ListMarker, StructureElement};
use crate::pipeline::recognize::{RecognitionOutput, RecognizedWord};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Line-height multiple above which a vertical gap starts a new paragraph.
const PARAGRAPH_GAP_FACTOR: f32 = 1.5;
/// Height ratio over the body size at which a line becomes a heading.
const HEADING_RATIO: f32 = 1.14;
/// Height ratios for heading level banding (largest band = level 1).
const HEADING_LEVEL_1: f32 = 1.8;
const HEADING_LEVEL_2: f32 = 1.5;
/// Left-edge shift (in line heights) that breaks a paragraph.
const INDENT_SHIFT_FACTOR: f32 = 1.5;
/// Fraction of the median word height used as the line-grouping tolerance.
const LINE_TOLERANCE_FACTOR: f32 = 0.5;

static BULLET_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[•\-*○■□▪▫‣·\u{2022}\u{2023}\u{2043}\u{204C}\u{204D}\u{2219}\u{25AA}\u{25AB}\u{25CF}\u{25E6}]\s+",
    )
    .expect("bullet marker regex")
});

static NUMBERED_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\d+|[A-Za-z]|[ivxlcdm]+|[IVXLCDM]+)[.)]\s+").expect("numbered marker regex")
});

/// One visual line: words sharing a vertical band, sorted left to right.
#[derive(Debug, Clone)]
pub(crate) struct Line {
    pub(crate) words: Vec<RecognizedWord>,
    /// Top of the tallest word.
    pub(crate) top: f32,
    /// Bottom of the deepest word.
    pub(crate) bottom: f32,
    /// Left edge of the first word.
    pub(crate) left: f32,
    /// Right edge of the last word.
    pub(crate) right: f32,
    /// Tallest word height; stands in for the line's font size.
    pub(crate) height: f32,
}

impl Line {
    pub(crate) fn from_words(mut words: Vec<RecognizedWord>) -> Self {
        words.sort_by(|a, b| a.x.total_cmp(&b.x));
        let top = words.iter().map(|w| w.y).fold(f32::INFINITY, f32::min);
        let bottom = words
            .iter()
            .map(|w| w.bottom())
            .fold(f32::NEG_INFINITY, f32::max);
        let left = words.first().map(|w| w.x).unwrap_or(0.0);
        let right = words.iter().map(|w| w.right()).fold(0.0, f32::max);
        let height = words.iter().map(|w| w.height).fold(0.0, f32::max);
        Self {
            words,
            top,
            bottom,
            left,
            right,
            height,
        }
    }

    /// The line's text with single spaces between words.
    pub(crate) fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn center_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }

    pub(crate) fn center_x(&self) -> f32 {
        (self.left + self.right) / 2.0
    }
}

/// Classify a line's leading token as a list marker, if any.
pub(crate) fn detect_list_marker(text: &str) -> Option<ListMarker> {
    let text = text.trim_start();
    if BULLET_MARKER.is_match(text) {
        Some(ListMarker::Bullet)
    } else if NUMBERED_MARKER.is_match(text) {
        Some(ListMarker::Numbered)
    } else {
        None
    }
}

/// Strip a recognized list marker from the front of the text.
fn strip_list_marker(text: &str, marker: ListMarker) -> String {
    let text = text.trim_start();
    let stripped = match marker {
        ListMarker::Bullet => BULLET_MARKER.replace(text, ""),
        ListMarker::Numbered => NUMBERED_MARKER.replace(text, ""),
    };
    stripped.into_owned()
}

/// Turns one page's recognized words into ordered structural elements.
///
/// Stateless: thresholds are module constants, tuned against the kinds of
/// clearly-separated cases the tests pin down. Exact boundary values are a
/// tuning concern, not part of the contract.
#[derive(Debug, Default)]
pub struct StructureAnalyzer;

impl StructureAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyze one page. A page with zero words yields an empty structure —
    /// that is a successful result, not an error.
    pub fn analyze(&self, page_number: u32, output: &RecognitionOutput) -> DocumentStructure {
        if output.words.is_empty() {
            return DocumentStructure::empty(page_number);
        }

        let lines = group_into_lines(output.words.clone());
        let column_groups = columns::split_into_columns(lines);
        let multi_column = column_groups.len() > 1;

        let mut elements = Vec::new();
        for (index, column_lines) in column_groups.into_iter().enumerate() {
            if index > 0 {
                elements.push(StructureElement::ColumnBreak);
            }
            classify_lines(&column_lines, &mut elements);
        }

        debug!(
            "page {}: {} words → {} elements{}",
            page_number,
            output.words.len(),
            elements.len(),
            if multi_column { " (two columns)" } else { "" }
        );

        DocumentStructure {
            page_number,
            elements,
        }
    }
}

/// Group a column's words into lines by vertical-centre proximity.
///
/// The tolerance derives from the median word height on the page, so dense
/// small print and sparse large print both group correctly.
pub(crate) fn group_into_lines(mut words: Vec<RecognizedWord>) -> Vec<Line> {
    if words.is_empty() {
        return Vec::new();
    }

    let mut heights: Vec<f32> = words.iter().map(|w| w.height).collect();
    heights.sort_by(f32::total_cmp);
    let median_height = heights[heights.len() / 2];
    let tolerance = (median_height * LINE_TOLERANCE_FACTOR).max(1.0);

    words.sort_by(|a, b| a.center_y().total_cmp(&b.center_y()).then(a.x.total_cmp(&b.x)));

    let mut lines = Vec::new();
    let mut current: Vec<RecognizedWord> = Vec::new();
    let mut current_center = 0.0f32;

    for word in words {
        if current.is_empty() {
            current_center = word.center_y();
            current.push(word);
        } else if (word.center_y() - current_center).abs() <= tolerance {
            current.push(word);
        } else {
            current_center = word.center_y();
            lines.push(Line::from_words(std::mem::take(&mut current)));
            current.push(word);
        }
    }
    if !current.is_empty() {
        lines.push(Line::from_words(current));
    }

    lines
}

/// Walk a column's lines top to bottom, emitting elements in reading order.
fn classify_lines(lines: &[Line], elements: &mut Vec<StructureElement>) {
    if lines.is_empty() {
        return;
    }

    // Tables claim their line ranges before anything else looks at them.
    let regions = tables::detect_table_regions(lines);

    // Dominant body size: the average of line heights on this column.
    let body_height =
        lines.iter().map(|l| l.height).sum::<f32>() / lines.len() as f32;
    let heading_cutoff = body_height * HEADING_RATIO;

    let mut i = 0;
    while i < lines.len() {
        if let Some(region) = regions.iter().find(|r| r.start == i) {
            elements.extend(tables::extract_cells(lines, region));
            i = region.end;
            continue;
        }

        let line = &lines[i];
        let text = line.text();

        // Heading first, list second, paragraph as fallback.
        if line.height >= heading_cutoff && lines.len() > 1 {
            let level = if line.height >= body_height * HEADING_LEVEL_1 {
                1
            } else if line.height >= body_height * HEADING_LEVEL_2 {
                2
            } else {
                3
            };
            elements.push(StructureElement::Heading {
                level,
                text,
                font_size: line.height,
            });
            i += 1;
            continue;
        }

        if let Some(marker) = detect_list_marker(&text) {
            elements.push(StructureElement::ListItem {
                text: strip_list_marker(&text, marker),
                marker,
            });
            i += 1;
            continue;
        }

        // Paragraph: absorb following lines until a structural break.
        let mut parts = vec![text];
        let mut block_height = line.height;
        let mut last = i;
        i += 1;
        while i < lines.len() {
            if regions.iter().any(|r| r.start == i) {
                break;
            }
            let next = &lines[i];
            if next.height >= heading_cutoff && lines.len() > 1 {
                break;
            }
            if detect_list_marker(&next.text()).is_some() {
                break;
            }
            let gap = next.top - lines[last].bottom;
            if gap > body_height * PARAGRAPH_GAP_FACTOR {
                break;
            }
            if (next.left - lines[last].left).abs() > body_height * INDENT_SHIFT_FACTOR {
                break;
            }
            parts.push(next.text());
            block_height = block_height.max(next.height);
            last = i;
            i += 1;
        }

        elements.push(StructureElement::Paragraph {
            text: parts.join(" "),
            font_size: block_height,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x: f32, y: f32, width: f32, height: f32) -> RecognizedWord {
        RecognizedWord {
            text: text.to_string(),
            x,
            y,
            width,
            height,
            confidence: 0.9,
        }
    }

    fn output(words: Vec<RecognizedWord>) -> RecognitionOutput {
        RecognitionOutput::from_words(words)
    }

    #[test]
    fn blank_page_yields_empty_structure() {
        let analyzer = StructureAnalyzer::new();
        let structure = analyzer.analyze(4, &output(vec![]));
        assert_eq!(structure.page_number, 4);
        assert!(structure.is_empty());
    }

    #[test]
    fn lines_group_by_vertical_center() {
        let words = vec![
            word("world", 120.0, 100.0, 90.0, 20.0),
            word("hello", 10.0, 102.0, 90.0, 20.0),
            word("below", 10.0, 140.0, 90.0, 20.0),
        ];
        let lines = group_into_lines(words);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "hello world");
        assert_eq!(lines[1].text(), "below");
    }

    #[test]
    fn large_line_becomes_heading() {
        // One 1.5×-sized line over several body lines. Word x positions
        // jitter per row the way real prose does, so nothing reads as a grid.
        let mut words = vec![word("Introduction", 10.0, 10.0, 300.0, 36.0)];
        for row in 0..4 {
            let y = 70.0 + row as f32 * 30.0;
            let drift = row as f32 * 22.0;
            words.push(word("body", 10.0, y, 80.0, 20.0));
            words.push(word("text", 100.0 + drift, y, 80.0, 20.0));
            words.push(word("here", 260.0 + drift * 1.5, y, 80.0, 20.0));
        }
        let structure = StructureAnalyzer::new().analyze(1, &output(words));

        match &structure.elements[0] {
            StructureElement::Heading { level, text, .. } => {
                assert_eq!(text, "Introduction");
                assert!(*level <= 2, "1.5x body size is at most level 2");
            }
            other => panic!("expected Heading first, got {other:?}"),
        }
        assert!(matches!(
            structure.elements[1],
            StructureElement::Paragraph { .. }
        ));
    }

    #[test]
    fn paragraphs_split_on_large_gaps() {
        let mut words = Vec::new();
        // Block one: three tight lines, prose-like x jitter.
        for row in 0..3 {
            let y = 10.0 + row as f32 * 26.0;
            words.push(word("alpha", 10.0, y, 80.0, 20.0));
            words.push(word("beta", 100.0 + row as f32 * 24.0, y, 80.0, 20.0));
        }
        // Block two after a 60 px gap (> 1.5 × body height).
        for row in 0..2 {
            let y = 130.0 + row as f32 * 26.0;
            words.push(word("gamma", 10.0, y, 80.0, 20.0));
            words.push(word("delta", 150.0 + row as f32 * 24.0, y, 80.0, 20.0));
        }
        let structure = StructureAnalyzer::new().analyze(1, &output(words));

        let paragraphs: Vec<&StructureElement> = structure
            .elements
            .iter()
            .filter(|e| matches!(e, StructureElement::Paragraph { .. }))
            .collect();
        assert_eq!(paragraphs.len(), 2, "elements: {:?}", structure.elements);
    }

    #[test]
    fn bullet_lines_become_separate_list_items() {
        let mut words = Vec::new();
        for (row, item) in ["first", "second", "third"].iter().enumerate() {
            let y = 10.0 + row as f32 * 30.0;
            words.push(word("•", 10.0, y, 12.0, 20.0));
            words.push(word(item, 30.0, y, 90.0, 20.0));
        }
        let structure = StructureAnalyzer::new().analyze(1, &output(words));

        let items: Vec<&StructureElement> = structure
            .elements
            .iter()
            .filter(|e| matches!(e, StructureElement::ListItem { .. }))
            .collect();
        assert_eq!(items.len(), 3, "elements: {:?}", structure.elements);
        match items[0] {
            StructureElement::ListItem { text, marker } => {
                assert_eq!(text, "first");
                assert_eq!(*marker, ListMarker::Bullet);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn numbered_markers_detected_and_stripped() {
        assert_eq!(detect_list_marker("1. item"), Some(ListMarker::Numbered));
        assert_eq!(detect_list_marker("a) item"), Some(ListMarker::Numbered));
        assert_eq!(detect_list_marker("iv. item"), Some(ListMarker::Numbered));
        assert_eq!(detect_list_marker("plain text"), None);
        assert_eq!(
            strip_list_marker("2) second item", ListMarker::Numbered),
            "second item"
        );
    }

    #[test]
    fn two_columns_emit_left_before_right() {
        // Independent text blocks: right-column baselines sit between the
        // left-column ones, as they do in real scans.
        let mut words = Vec::new();
        for row in 0..6 {
            let y = 10.0 + row as f32 * 30.0;
            let drift = row as f32 * 20.0;
            words.push(word("left", 10.0, y, 100.0, 20.0));
            words.push(word(&format!("l{row}"), 120.0 + drift, y, 80.0, 20.0));
            words.push(word("right", 600.0, y + 13.0, 100.0, 20.0));
            words.push(word(&format!("r{row}"), 710.0 + drift, y + 13.0, 80.0, 20.0));
        }
        let structure = StructureAnalyzer::new().analyze(1, &output(words));

        let break_pos = structure
            .elements
            .iter()
            .position(|e| matches!(e, StructureElement::ColumnBreak))
            .expect("two columns must yield a ColumnBreak");

        let text_of = |e: &StructureElement| e.text().unwrap_or("").to_string();
        let before: String = structure.elements[..break_pos]
            .iter()
            .map(|e| text_of(e))
            .collect();
        let after: String = structure.elements[break_pos + 1..]
            .iter()
            .map(|e| text_of(e))
            .collect();
        assert!(before.contains("l0") && before.contains("l5"));
        assert!(!before.contains("r0"));
        assert!(after.contains("r0") && after.contains("r5"));
    }

    #[test]
    fn grid_lines_become_table_cells() {
        let mut words = Vec::new();
        for row in 0..4 {
            let y = 10.0 + row as f32 * 30.0;
            words.push(word(&format!("a{row}"), 50.0, y, 60.0, 20.0));
            words.push(word(&format!("b{row}"), 300.0, y, 60.0, 20.0));
            words.push(word(&format!("c{row}"), 550.0, y, 60.0, 20.0));
        }
        let structure = StructureAnalyzer::new().analyze(1, &output(words));

        let cells: Vec<&StructureElement> = structure
            .elements
            .iter()
            .filter(|e| matches!(e, StructureElement::TableCell { .. }))
            .collect();
        assert_eq!(cells.len(), 12, "elements: {:?}", structure.elements);
        match cells[0] {
            StructureElement::TableCell { row, col, text } => {
                assert_eq!((*row, *col), (0, 0));
                assert_eq!(text, "a0");
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn single_line_page_is_a_paragraph() {
        // No reference body size on a one-line page, so no heading.
        let words = vec![word("LONELY", 10.0, 10.0, 200.0, 48.0)];
        let structure = StructureAnalyzer::new().analyze(1, &output(words));
        assert_eq!(structure.elements.len(), 1);
        assert!(matches!(
            structure.elements[0],
            StructureElement::Paragraph { .. }
        ));
    }
}
