//! Multi-column layout detection.
//!
//! Scans the horizontal coverage of whole lines for a tall empty gutter.
//! Coverage is measured over line extents, not individual words: a table
//! row or a full-width heading spans its gutter candidates and correctly
//! suppresses them, while true column gaps are crossed by (almost) no line.
//!
//! A page splits only when the evidence is strong — a wide gap near the
//! middle with real text on both sides. Everything else stays a single
//! column: fragmenting prose is worse than missing an occasional narrow
//! gutter.

use super::Line;
use tracing::debug;

/// Number of vertical slices the text width is divided into for the
/// coverage scan.
const SLICE_COUNT: usize = 200;
/// Minimum gutter width as a fraction of the text width.
const MIN_GAP_FRACTION: f32 = 0.10;
/// The gutter must fall inside the central band of the page.
const SEARCH_BAND: (f32, f32) = (0.15, 0.85);
/// A slice counts as a gap when fewer than this fraction of lines cross it.
const MAX_GAP_COVERAGE: f32 = 0.2;
/// Pages with fewer lines than this are never split.
const MIN_LINES_FOR_SPLIT: usize = 4;
/// Each side of the gutter must hold at least this many lines.
const MIN_SIDE_LINES: usize = 2;

/// Partition a page's lines into columns, left to right.
///
/// Returns one entry per column; a single-column page (or any page where
/// the split evidence is weak) comes back as one group containing all
/// lines. Line order within a group is unchanged (top to bottom).
pub(crate) fn split_into_columns(lines: Vec<Line>) -> Vec<Vec<Line>> {
    if lines.len() < MIN_LINES_FOR_SPLIT {
        return vec![lines];
    }

    let min_x = lines.iter().map(|l| l.left).fold(f32::INFINITY, f32::min);
    let max_x = lines.iter().map(|l| l.right).fold(f32::NEG_INFINITY, f32::max);
    let text_width = max_x - min_x;
    if text_width <= 0.0 {
        return vec![lines];
    }

    // Coverage per slice: how many lines span each vertical strip.
    let slice_width = text_width / SLICE_COUNT as f32;
    let mut coverage = vec![0usize; SLICE_COUNT];
    for line in &lines {
        let start = (((line.left - min_x) / slice_width) as usize).min(SLICE_COUNT - 1);
        let end = (((line.right - min_x) / slice_width) as usize).min(SLICE_COUNT - 1);
        for slot in &mut coverage[start..=end] {
            *slot += 1;
        }
    }

    // Longest run of low-coverage slices within the central band; ties
    // break toward the run closest to the page centre.
    let gap_limit = (lines.len() as f32 * MAX_GAP_COVERAGE).floor() as usize;
    let band_start = (SLICE_COUNT as f32 * SEARCH_BAND.0) as usize;
    let band_end = (SLICE_COUNT as f32 * SEARCH_BAND.1) as usize;
    let centre = SLICE_COUNT / 2;

    let mut best: Option<(usize, usize)> = None; // (start, len)
    let mut run_start = 0usize;
    let mut run_len = 0usize;
    for i in band_start..band_end {
        if coverage[i] <= gap_limit {
            if run_len == 0 {
                run_start = i;
            }
            run_len += 1;
        } else {
            consider_run(&mut best, run_start, run_len, centre);
            run_len = 0;
        }
    }
    consider_run(&mut best, run_start, run_len, centre);

    let Some((gap_start, gap_len)) = best else {
        return vec![lines];
    };

    let gap_width = gap_len as f32 * slice_width;
    if gap_width < text_width * MIN_GAP_FRACTION {
        debug!(
            "column gap too narrow ({:.1}px of {:.1}px text width), keeping single column",
            gap_width, text_width
        );
        return vec![lines];
    }

    let gutter = min_x + (gap_start as f32 + gap_len as f32 / 2.0) * slice_width;

    // Both sides must carry real content.
    let left_count = lines.iter().filter(|l| l.center_x() < gutter).count();
    let right_count = lines.len() - left_count;
    if left_count < MIN_SIDE_LINES || right_count < MIN_SIDE_LINES {
        debug!(
            "column split too imbalanced ({left_count}/{right_count} lines), keeping single column"
        );
        return vec![lines];
    }

    debug!(
        "two columns detected, gutter at x={gutter:.1} ({left_count} / {right_count} lines)"
    );

    let mut left = Vec::with_capacity(left_count);
    let mut right = Vec::with_capacity(right_count);
    for line in lines {
        if line.center_x() < gutter {
            left.push(line);
        } else {
            right.push(line);
        }
    }
    vec![left, right]
}

fn consider_run(best: &mut Option<(usize, usize)>, start: usize, len: usize, centre: usize) {
    if len == 0 {
        return;
    }
    let replace = match best {
        None => true,
        Some((best_start, best_len)) => {
            let dist = (start + len / 2).abs_diff(centre);
            let best_dist = (*best_start + *best_len / 2).abs_diff(centre);
            len > *best_len || (len == *best_len && dist < best_dist)
        }
    };
    if replace {
        *best = Some((start, len));
    }
}
