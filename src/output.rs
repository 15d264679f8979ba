//! Result types produced by a conversion run.

use crate::error::PageError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Final outcome of one conversion, produced once by
/// [`crate::convert::convert`] and immutable thereafter.
///
/// `success` is true whenever an output document was written — including
/// runs where individual pages failed (their numbers are in
/// `pages_failed`). A run only fails outright, with `Err(ConvertError)`,
/// on document-level problems: unreadable input or unwritable output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Whether an output document was produced.
    pub success: bool,
    /// Where the .docx was written (after conflict resolution).
    pub output_path: PathBuf,
    /// Total pages in the source document.
    pub total_pages: u32,
    /// Pages that made it through the pipeline (blank pages count as
    /// processed — an empty page is success, not failure).
    pub pages_processed: u32,
    /// 1-based numbers of pages that failed, in ascending order.
    pub pages_failed: Vec<u32>,
    /// One descriptor per failed page, stating the stage and cause.
    pub errors: Vec<PageError>,
    /// Wall-clock duration of the whole run in milliseconds.
    pub duration_ms: u64,
}

impl ConversionResult {
    /// True when every page converted cleanly.
    pub fn is_complete(&self) -> bool {
        self.success && self.pages_failed.is_empty()
    }
}
