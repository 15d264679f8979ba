//! Table detection from recurring x-coordinate grid patterns.
//!
//! A run of lines whose words keep starting at the same small set of
//! x positions is a table; each word maps to a (row, column) cell by
//! nearest grid line. The checks are deliberately conservative — a
//! malformed or partial grid falls through and its lines are emitted as
//! plain paragraphs instead of a broken table.

use super::{detect_list_marker, Line};
use crate::model::StructureElement;
use tracing::debug;

/// Horizontal tolerance (page pixels) when matching a word to a grid column.
const ALIGN_TOLERANCE: f32 = 15.0;
/// Fraction of rows in which a grid column must appear.
const MIN_COLUMN_USAGE: f32 = 0.8;
/// Fraction of a line's words that must sit on grid columns.
const MIN_WORD_ALIGNMENT: f32 = 0.7;
/// Minimum rows for a region to count as a table.
const MIN_ROWS: usize = 3;
/// Maximum grid columns; more than this is usually word-level noise,
/// not a real table.
const MAX_COLUMNS: usize = 6;
/// How far ahead of a candidate start row the scan looks.
const LOOKAHEAD: usize = 10;

/// A detected table: a half-open row range into the line list plus the
/// x centres of its grid columns.
#[derive(Debug, Clone)]
pub(crate) struct TableRegion {
    pub start: usize,
    pub end: usize,
    pub columns: Vec<f32>,
}

/// Scan a column's lines for table regions.
pub(crate) fn detect_table_regions(lines: &[Line]) -> Vec<TableRegion> {
    if lines.len() < MIN_ROWS {
        return Vec::new();
    }

    let mut regions = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        // List items never open a table; their markers align vertically and
        // would otherwise look like a two-column grid.
        if detect_list_marker(&lines[i].text()).is_some() {
            i += 1;
            continue;
        }

        match find_table_end(lines, i) {
            Some(region) if region.end > i + MIN_ROWS - 1 => {
                debug!(
                    "table region rows {}..{} with {} columns",
                    region.start,
                    region.end,
                    region.columns.len()
                );
                i = region.end;
                regions.push(region);
            }
            _ => i += 1,
        }
    }
    regions
}

/// Try to grow a table starting at `start`; `None` when the grid evidence
/// is too weak.
///
/// A seed of [`MIN_ROWS`] rows establishes the grid; following rows join
/// while they stay on it. Columns come from the seed only, so one ragged
/// line after a clean table cannot poison the cluster.
fn find_table_end(lines: &[Line], start: usize) -> Option<TableRegion> {
    if start + MIN_ROWS > lines.len() {
        return None;
    }

    // Seed rows, each with at least two words (a one-word line cannot
    // be a table row).
    let mut seed_xs: Vec<Vec<f32>> = Vec::new();
    for line in &lines[start..start + MIN_ROWS] {
        let mut xs: Vec<f32> = line.words.iter().map(|w| w.x).collect();
        if xs.len() < 2 {
            return None;
        }
        xs.sort_by(f32::total_cmp);
        seed_xs.push(xs);
    }

    let all_x: Vec<f32> = seed_xs.iter().flatten().copied().collect();
    let columns = cluster_positions(all_x, ALIGN_TOLERANCE);
    if columns.len() < 2 || columns.len() > MAX_COLUMNS {
        return None;
    }

    // Every seed row must sit mostly on the grid…
    if seed_xs
        .iter()
        .any(|xs| aligned_fraction(xs, &columns) < MIN_WORD_ALIGNMENT)
    {
        return None;
    }
    // …and (nearly) every grid column must appear in (nearly) every seed row.
    let min_usage = (seed_xs.len() as f32 * MIN_COLUMN_USAGE).ceil() as usize;
    let well_used = columns
        .iter()
        .filter(|&&col| {
            seed_xs
                .iter()
                .filter(|xs| xs.iter().any(|&x| (x - col).abs() <= ALIGN_TOLERANCE))
                .count()
                >= min_usage
        })
        .count();
    if (well_used as f32) < columns.len() as f32 * MIN_COLUMN_USAGE {
        return None;
    }

    // Extend downward while rows keep aligning to the seed grid.
    let mut accepted: Vec<Vec<f32>> = seed_xs;
    while start + accepted.len() < lines.len() && accepted.len() < LOOKAHEAD {
        let line = &lines[start + accepted.len()];
        let mut xs: Vec<f32> = line.words.iter().map(|w| w.x).collect();
        if xs.len() < 2 || aligned_fraction(&xs, &columns) < MIN_WORD_ALIGNMENT {
            break;
        }
        xs.sort_by(f32::total_cmp);
        accepted.push(xs);
    }

    // Rows of one table hold similar word counts; a heading followed by a
    // dense paragraph fails this even when a few x positions line up.
    let avg = accepted.iter().map(Vec::len).sum::<usize>() as f32 / accepted.len() as f32;
    let consistent = accepted
        .iter()
        .filter(|xs| (xs.len() as f32 - avg).abs() <= avg * 0.5)
        .count();
    if (consistent as f32) < accepted.len() as f32 * MIN_WORD_ALIGNMENT {
        return None;
    }

    // Final grid from all accepted rows.
    let end = start + accepted.len();
    let region_x: Vec<f32> = accepted.into_iter().flatten().collect();
    let columns = cluster_positions(region_x, ALIGN_TOLERANCE);

    Some(TableRegion {
        start,
        end,
        columns,
    })
}

fn aligned_fraction(xs: &[f32], columns: &[f32]) -> f32 {
    if xs.is_empty() {
        return 0.0;
    }
    let aligned = xs
        .iter()
        .filter(|&&x| columns.iter().any(|&col| (x - col).abs() <= ALIGN_TOLERANCE))
        .count();
    aligned as f32 / xs.len() as f32
}

/// Emit one `TableCell` per occupied cell, row-major, words merged per cell.
pub(crate) fn extract_cells(lines: &[Line], region: &TableRegion) -> Vec<StructureElement> {
    let cols = region.columns.len();
    let mut elements = Vec::new();

    for (row_idx, line) in lines[region.start..region.end].iter().enumerate() {
        // cell texts for this row, indexed by grid column
        let mut cells: Vec<String> = vec![String::new(); cols];
        for word in &line.words {
            let col = nearest_column(&region.columns, word.x);
            if !cells[col].is_empty() {
                cells[col].push(' ');
            }
            cells[col].push_str(&word.text);
        }
        for (col_idx, text) in cells.into_iter().enumerate() {
            if !text.is_empty() {
                elements.push(StructureElement::TableCell {
                    row: row_idx as u32,
                    col: col_idx as u32,
                    text,
                });
            }
        }
    }
    elements
}

fn nearest_column(columns: &[f32], x: f32) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (i, &col) in columns.iter().enumerate() {
        let dist = (x - col).abs();
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

/// Cluster sorted 1-D positions; neighbours within `tolerance` merge into
/// one cluster whose centre is the member average.
pub(crate) fn cluster_positions(mut positions: Vec<f32>, tolerance: f32) -> Vec<f32> {
    if positions.is_empty() {
        return Vec::new();
    }
    positions.sort_by(f32::total_cmp);

    let mut clusters: Vec<Vec<f32>> = vec![vec![positions[0]]];
    for &pos in &positions[1..] {
        let last = clusters.last_mut().unwrap();
        if pos - *last.last().unwrap() <= tolerance {
            last.push(pos);
        } else {
            clusters.push(vec![pos]);
        }
    }
    clusters
        .into_iter()
        .map(|c| c.iter().sum::<f32>() / c.len() as f32)
        .collect()
}
