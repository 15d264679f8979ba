//! Document assembly: fold per-page structures into one Word document.
//!
//! Mapping rules:
//! * `Heading{level}` → paragraph styled `Heading1..3`
//! * `Paragraph` → plain body paragraph
//! * `ListItem` → numbering-backed paragraph; consecutive items of one
//!   marker kind share a list run, and each numbered run gets its own
//!   numbering instance so it restarts at 1
//! * a run of `TableCell`s → one table sized to the maximum (row, col)
//!   extent seen in the run
//! * `ColumnBreak` → nothing; the analyzer already linearised columns into
//!   reading order, and a literal Word column break would paginate wrongly
//!   in a single-column section
//!
//! An explicit page break separates consecutive source pages, empty pages
//! included, so output pagination mirrors the scan.

use crate::config::ConflictPolicy;
use crate::error::ConvertError;
use crate::model::{DocumentStructure, ListMarker, StructureElement};
use docx_rs::{
    AbstractNumbering, BreakType, Docx, IndentLevel, Level, LevelJc, LevelText, NumberFormat,
    Numbering, NumberingId, Paragraph, Run, Start, Style, StyleType, Table, TableCell, TableRow,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Shared numbering instance for every bulleted run.
const BULLET_NUMBERING: usize = 1;
/// Abstract definition backing numbered runs; instances are allocated
/// per run starting at [`FIRST_NUMBERED_INSTANCE`].
const NUMBERED_ABSTRACT: usize = 2;
const FIRST_NUMBERED_INSTANCE: usize = 2;

/// Builds and saves the output .docx from analyzed page structures.
pub struct DocumentAssembler {
    on_conflict: ConflictPolicy,
}

impl DocumentAssembler {
    pub fn new(on_conflict: ConflictPolicy) -> Self {
        Self { on_conflict }
    }

    /// Assemble all pages, in order, into one document.
    pub fn assemble(&self, pages: &[DocumentStructure]) -> Result<Docx, ConvertError> {
        let mut docx = base_document();
        let mut next_numbered_instance = FIRST_NUMBERED_INSTANCE;

        for (index, page) in pages.iter().enumerate() {
            if index > 0 {
                docx = docx.add_paragraph(
                    Paragraph::new().add_run(Run::new().add_break(BreakType::Page)),
                );
            }
            docx = append_page(docx, page, &mut next_numbered_instance);
        }

        debug!(
            "assembled {} pages, {} numbered list runs",
            pages.len(),
            next_numbered_instance - FIRST_NUMBERED_INSTANCE
        );
        Ok(docx)
    }

    /// Write the document to `path`, validating the destination directory
    /// and resolving name conflicts per the configured policy.
    ///
    /// Returns the path actually written (it differs from `path` under
    /// [`ConflictPolicy::UniqueSuffix`]).
    pub fn save(&self, docx: Docx, path: &Path) -> Result<PathBuf, ConvertError> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !dir.is_dir() {
            return Err(ConvertError::OutputDirMissing { dir });
        }

        let final_path = match self.on_conflict {
            ConflictPolicy::Overwrite => path.to_path_buf(),
            ConflictPolicy::UniqueSuffix => disambiguate(path),
        };

        let file = std::fs::File::create(&final_path).map_err(|e| ConvertError::SaveFailed {
            path: final_path.clone(),
            detail: e.to_string(),
        })?;
        docx.build()
            .pack(file)
            .map_err(|e| ConvertError::SaveFailed {
                path: final_path.clone(),
                detail: e.to_string(),
            })?;

        info!("saved output document to {}", final_path.display());
        Ok(final_path)
    }
}

/// New document with heading styles and list numbering registered.
fn base_document() -> Docx {
    Docx::new()
        .add_style(
            Style::new("Heading1", StyleType::Paragraph)
                .name("Heading 1")
                .size(36)
                .bold(),
        )
        .add_style(
            Style::new("Heading2", StyleType::Paragraph)
                .name("Heading 2")
                .size(30)
                .bold(),
        )
        .add_style(
            Style::new("Heading3", StyleType::Paragraph)
                .name("Heading 3")
                .size(26)
                .bold(),
        )
        .add_abstract_numbering(
            AbstractNumbering::new(BULLET_NUMBERING).add_level(Level::new(
                0,
                Start::new(1),
                NumberFormat::new("bullet"),
                LevelText::new("•"),
                LevelJc::new("left"),
            )),
        )
        .add_abstract_numbering(
            AbstractNumbering::new(NUMBERED_ABSTRACT).add_level(Level::new(
                0,
                Start::new(1),
                NumberFormat::new("decimal"),
                LevelText::new("%1."),
                LevelJc::new("left"),
            )),
        )
        .add_numbering(Numbering::new(BULLET_NUMBERING, BULLET_NUMBERING))
}

/// Append one page's elements, grouping table-cell and list runs.
fn append_page(mut docx: Docx, page: &DocumentStructure, next_numbered_instance: &mut usize) -> Docx {
    let elements = &page.elements;
    let mut i = 0;

    while i < elements.len() {
        match &elements[i] {
            StructureElement::Heading { level, text, .. } => {
                let style = format!("Heading{}", (*level).clamp(1, 3));
                docx = docx.add_paragraph(
                    Paragraph::new()
                        .add_run(Run::new().add_text(text.as_str()))
                        .style(&style),
                );
                i += 1;
            }
            StructureElement::Paragraph { text, .. } => {
                docx = docx
                    .add_paragraph(Paragraph::new().add_run(Run::new().add_text(text.as_str())));
                i += 1;
            }
            StructureElement::ListItem { marker, .. } => {
                let run_end = end_of_list_run(elements, i, *marker);
                let numbering_id = match marker {
                    ListMarker::Bullet => BULLET_NUMBERING,
                    ListMarker::Numbered => {
                        let id = *next_numbered_instance;
                        *next_numbered_instance += 1;
                        docx = docx.add_numbering(Numbering::new(id, NUMBERED_ABSTRACT));
                        id
                    }
                };
                for element in &elements[i..run_end] {
                    if let StructureElement::ListItem { text, .. } = element {
                        docx = docx.add_paragraph(
                            Paragraph::new()
                                .add_run(Run::new().add_text(text.as_str()))
                                .numbering(NumberingId::new(numbering_id), IndentLevel::new(0)),
                        );
                    }
                }
                i = run_end;
            }
            StructureElement::TableCell { .. } => {
                let run_end = end_of_table_run(elements, i);
                docx = docx.add_table(build_table(&elements[i..run_end]));
                i = run_end;
            }
            StructureElement::ColumnBreak => {
                i += 1;
            }
        }
    }
    docx
}

/// Index just past the run of list items sharing `marker` at `start`.
fn end_of_list_run(elements: &[StructureElement], start: usize, marker: ListMarker) -> usize {
    let mut end = start;
    while end < elements.len() {
        match &elements[end] {
            StructureElement::ListItem { marker: m, .. } if *m == marker => end += 1,
            _ => break,
        }
    }
    end
}

/// Index just past the run of table cells at `start`.
fn end_of_table_run(elements: &[StructureElement], start: usize) -> usize {
    let mut end = start;
    while end < elements.len() {
        match &elements[end] {
            StructureElement::TableCell { .. } => end += 1,
            _ => break,
        }
    }
    end
}

/// Build a grid sized to the run's maximum row/column extent; cells the
/// analyzer never emitted stay empty.
fn build_table(cells: &[StructureElement]) -> Table {
    let mut rows = 0u32;
    let mut cols = 0u32;
    for cell in cells {
        if let StructureElement::TableCell { row, col, .. } = cell {
            rows = rows.max(row + 1);
            cols = cols.max(col + 1);
        }
    }

    let mut grid: Vec<Vec<String>> = vec![vec![String::new(); cols as usize]; rows as usize];
    for cell in cells {
        if let StructureElement::TableCell { row, col, text } = cell {
            grid[*row as usize][*col as usize] = text.clone();
        }
    }

    let table_rows: Vec<TableRow> = grid
        .into_iter()
        .map(|row| {
            TableRow::new(
                row.into_iter()
                    .map(|text| {
                        TableCell::new().add_paragraph(
                            Paragraph::new().add_run(Run::new().add_text(text.as_str())),
                        )
                    })
                    .collect(),
            )
        })
        .collect();

    Table::new(table_rows)
}

/// First free `name_1.docx`, `name_2.docx`, … next to `path`.
fn disambiguate(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut counter = 1;
    loop {
        let candidate = if extension.is_empty() {
            path.with_file_name(format!("{stem}_{counter}"))
        } else {
            path.with_file_name(format!("{stem}_{counter}.{extension}"))
        };
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::DocumentChild;

    fn structure(page: u32, elements: Vec<StructureElement>) -> DocumentStructure {
        DocumentStructure {
            page_number: page,
            elements,
        }
    }

    fn paragraph_text(p: &Paragraph) -> String {
        let mut out = String::new();
        for child in &p.children {
            if let docx_rs::ParagraphChild::Run(run) = child {
                for rc in &run.children {
                    if let docx_rs::RunChild::Text(t) = rc {
                        out.push_str(&t.text);
                    }
                }
            }
        }
        out
    }

    fn has_page_break(p: &Paragraph) -> bool {
        p.children.iter().any(|child| {
            if let docx_rs::ParagraphChild::Run(run) = child {
                run.children.iter().any(|rc| {
                    matches!(
                        rc,
                        docx_rs::RunChild::Break(b) if matches!(b.break_type, BreakType::Page)
                    )
                })
            } else {
                false
            }
        })
    }

    #[test]
    fn page_breaks_separate_all_pages_including_empty_ones() {
        let assembler = DocumentAssembler::new(ConflictPolicy::Overwrite);
        let pages = vec![
            structure(
                1,
                vec![StructureElement::Paragraph {
                    text: "one".into(),
                    font_size: 20.0,
                }],
            ),
            structure(2, vec![]), // blank page keeps its break
            structure(
                3,
                vec![StructureElement::Paragraph {
                    text: "three".into(),
                    font_size: 20.0,
                }],
            ),
        ];
        let docx = assembler.assemble(&pages).unwrap();

        let breaks = docx
            .document
            .children
            .iter()
            .filter(|c| matches!(c, DocumentChild::Paragraph(p) if has_page_break(p)))
            .count();
        assert_eq!(breaks, 2, "3 pages need 2 page breaks");
    }

    #[test]
    fn heading_paragraph_table_round_trip() {
        let assembler = DocumentAssembler::new(ConflictPolicy::Overwrite);
        let pages = vec![structure(
            1,
            vec![
                StructureElement::Heading {
                    level: 1,
                    text: "Title".into(),
                    font_size: 40.0,
                },
                StructureElement::Paragraph {
                    text: "Body text".into(),
                    font_size: 20.0,
                },
                StructureElement::TableCell {
                    row: 0,
                    col: 0,
                    text: "a".into(),
                },
                StructureElement::TableCell {
                    row: 0,
                    col: 1,
                    text: "b".into(),
                },
                StructureElement::TableCell {
                    row: 1,
                    col: 0,
                    text: "c".into(),
                },
                StructureElement::TableCell {
                    row: 1,
                    col: 1,
                    text: "d".into(),
                },
            ],
        )];
        let docx = assembler.assemble(&pages).unwrap();
        let children = &docx.document.children;

        // Order and count are preserved: heading, paragraph, table.
        assert_eq!(children.len(), 3);
        match &children[0] {
            DocumentChild::Paragraph(p) => {
                assert_eq!(paragraph_text(p), "Title");
                assert_eq!(
                    p.property.style.as_ref().map(|s| s.val.as_str()),
                    Some("Heading1")
                );
            }
            other => panic!("expected styled heading paragraph, got {other:?}"),
        }
        match &children[1] {
            DocumentChild::Paragraph(p) => {
                assert_eq!(paragraph_text(p), "Body text");
                assert!(p.property.style.is_none());
            }
            other => panic!("expected body paragraph, got {other:?}"),
        }
        match &children[2] {
            DocumentChild::Table(table) => {
                assert_eq!(table.rows.len(), 2);
            }
            other => panic!("expected 2x2 table, got {other:?}"),
        }
    }

    #[test]
    fn heading_levels_clamp_to_known_styles() {
        let assembler = DocumentAssembler::new(ConflictPolicy::Overwrite);
        let pages = vec![structure(
            1,
            vec![StructureElement::Heading {
                level: 6,
                text: "Deep".into(),
                font_size: 22.0,
            }],
        )];
        let docx = assembler.assemble(&pages).unwrap();
        match &docx.document.children[0] {
            DocumentChild::Paragraph(p) => {
                assert_eq!(
                    p.property.style.as_ref().map(|s| s.val.as_str()),
                    Some("Heading3")
                );
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn list_items_get_numbering() {
        let assembler = DocumentAssembler::new(ConflictPolicy::Overwrite);
        let pages = vec![structure(
            1,
            vec![
                StructureElement::ListItem {
                    text: "first".into(),
                    marker: ListMarker::Bullet,
                },
                StructureElement::ListItem {
                    text: "second".into(),
                    marker: ListMarker::Bullet,
                },
            ],
        )];
        let docx = assembler.assemble(&pages).unwrap();

        for child in &docx.document.children {
            match child {
                DocumentChild::Paragraph(p) => {
                    assert!(
                        p.property.numbering_property.is_some(),
                        "list paragraphs carry numbering"
                    );
                }
                other => panic!("expected list paragraphs, got {other:?}"),
            }
        }
    }

    #[test]
    fn sparse_table_pads_missing_cells() {
        let assembler = DocumentAssembler::new(ConflictPolicy::Overwrite);
        let pages = vec![structure(
            1,
            vec![
                StructureElement::TableCell {
                    row: 0,
                    col: 0,
                    text: "only".into(),
                },
                StructureElement::TableCell {
                    row: 2,
                    col: 1,
                    text: "corner".into(),
                },
            ],
        )];
        let docx = assembler.assemble(&pages).unwrap();
        match &docx.document.children[0] {
            DocumentChild::Table(table) => assert_eq!(table.rows.len(), 3),
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn column_break_emits_nothing() {
        let assembler = DocumentAssembler::new(ConflictPolicy::Overwrite);
        let pages = vec![structure(
            1,
            vec![
                StructureElement::Paragraph {
                    text: "left".into(),
                    font_size: 20.0,
                },
                StructureElement::ColumnBreak,
                StructureElement::Paragraph {
                    text: "right".into(),
                    font_size: 20.0,
                },
            ],
        )];
        let docx = assembler.assemble(&pages).unwrap();
        assert_eq!(docx.document.children.len(), 2);
    }

    #[test]
    fn save_rejects_missing_directory() {
        let assembler = DocumentAssembler::new(ConflictPolicy::Overwrite);
        let docx = assembler.assemble(&[structure(1, vec![])]).unwrap();
        let err = assembler
            .save(docx, Path::new("/no/such/dir/out.docx"))
            .unwrap_err();
        assert!(matches!(err, ConvertError::OutputDirMissing { .. }));
    }

    #[test]
    fn save_writes_file_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.docx");
        let assembler = DocumentAssembler::new(ConflictPolicy::Overwrite);

        let docx = assembler
            .assemble(&[structure(
                1,
                vec![StructureElement::Paragraph {
                    text: "hello".into(),
                    font_size: 20.0,
                }],
            )])
            .unwrap();
        let written = assembler.save(docx, &path).unwrap();
        assert_eq!(written, path);
        assert!(path.exists());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);

        // Overwrite keeps the same path.
        let docx = assembler.assemble(&[structure(1, vec![])]).unwrap();
        let written = assembler.save(docx, &path).unwrap();
        assert_eq!(written, path);
    }

    #[test]
    fn unique_suffix_allocates_new_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.docx");
        let assembler = DocumentAssembler::new(ConflictPolicy::UniqueSuffix);

        let first = assembler
            .save(assembler.assemble(&[structure(1, vec![])]).unwrap(), &path)
            .unwrap();
        assert_eq!(first, path);

        let second = assembler
            .save(assembler.assemble(&[structure(1, vec![])]).unwrap(), &path)
            .unwrap();
        assert_eq!(second, dir.path().join("scan_1.docx"));

        let third = assembler
            .save(assembler.assemble(&[structure(1, vec![])]).unwrap(), &path)
            .unwrap();
        assert_eq!(third, dir.path().join("scan_2.docx"));
    }
}
