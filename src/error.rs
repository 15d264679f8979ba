//! Error types for the ocr2docx library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvertError`] — **Fatal**: the conversion cannot proceed at all
//!   (bad input file, empty document, output cannot be written). Returned as
//!   `Err(ConvertError)` from the top-level `convert*` functions and marks
//!   the job Failed.
//!
//! * [`PageError`] — **Non-fatal**: a single page failed (render glitch,
//!   OCR fault, timeout) but all other pages are fine. Recorded inside
//!   [`crate::output::ConversionResult`] so callers can inspect partial
//!   success rather than losing the whole document to one bad page.
//!
//! The separation lets callers decide their own tolerance: abort on the first
//! page failure, log and continue, or collect all errors for a post-run report.
//!
//! [`LedgerError`] is the third, much smaller family: job-store lookups and
//! illegal writes to jobs that already reached a terminal state.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the ocr2docx library.
///
/// Page-level failures use [`PageError`] and are recorded in
/// [`crate::output::ConversionResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// The PDF parsed but contains zero pages.
    ///
    /// Distinct from [`ConvertError::CorruptPdf`] so callers can surface a
    /// clear "empty document" message instead of a generic I/O failure.
    #[error("PDF '{path}' contains no pages")]
    EmptyDocument { path: PathBuf },

    // ── Recognition back-end errors ───────────────────────────────────────
    /// The selected recognition engine could not be initialised
    /// (missing tesseract language data, missing ONNX model files, …).
    #[error("Recognition engine '{engine}' failed to initialise: {detail}")]
    EngineInit { engine: String, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The output document could not be constructed from the page structures.
    #[error("Failed to assemble output document: {0}")]
    AssemblyFailed(String),

    /// The destination directory for the output file does not exist.
    #[error("Output directory does not exist: '{dir}'")]
    OutputDirMissing { dir: PathBuf },

    /// Could not create or write the output .docx file.
    #[error("Failed to write output file '{path}': {detail}")]
    SaveFailed { path: PathBuf, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Recorded in [`crate::output::ConversionResult::errors`] when a page
/// fails. The overall conversion continues; the affected page contributes an
/// empty structural block to the output.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: u32, detail: String },

    /// Text recognition failed on the page image.
    #[error("Page {page}: recognition failed: {detail}")]
    RecognitionFailed { page: u32, detail: String },

    /// Layout analysis failed on the recognized words.
    #[error("Page {page}: layout analysis failed: {detail}")]
    AnalysisFailed { page: u32, detail: String },

    /// Page processing exceeded the configured per-page timeout.
    #[error("Page {page}: processing timed out after {secs}s")]
    Timeout { page: u32, secs: u64 },
}

impl PageError {
    /// The 1-based number of the page this error belongs to.
    pub fn page(&self) -> u32 {
        match self {
            PageError::RenderFailed { page, .. }
            | PageError::RecognitionFailed { page, .. }
            | PageError::AnalysisFailed { page, .. }
            | PageError::Timeout { page, .. } => *page,
        }
    }
}

/// Errors from the job ledger.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum LedgerError {
    /// The queried job identifier does not exist.
    #[error("Job not found: {job_id}")]
    NotFound { job_id: String },

    /// A write was attempted on a job already in Completed or Failed state.
    ///
    /// Terminal jobs are immutable. Hitting this indicates a bug in the
    /// caller (the single-writer orchestrator), not a user-facing fault.
    #[error("Job {job_id} is already {status} and cannot be modified")]
    TerminalState { job_id: String, status: String },
}
