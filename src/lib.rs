//! # ocr2docx
//!
//! Convert scanned, image-based PDF documents into editable Word (.docx)
//! files.
//!
//! ## Why this crate?
//!
//! Text-based PDF tools have nothing to work with on a scanned document —
//! every page is just a picture. This crate rasterises each page, runs a
//! text-recognition back end over it, re-interprets the positioned words as
//! document structure (paragraphs, headings, lists, tables, multi-column
//! text), and re-assembles everything into a paginated Word document.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Extract    validate + rasterise pages via pdfium (spawn_blocking)
//!  ├─ 2. Recognize  tesseract (fast) or ONNX models (accurate) → words
//!  ├─ 3. Analyze    geometry-only structure: headings / lists / tables / columns
//!  ├─ 4. Assemble   docx with page breaks mirroring the source pagination
//!  └─ 5. Track      job ledger: status, page progress, terminal outcome
//! ```
//!
//! A failed page never aborts the run: it is recorded in the
//! [`ConversionResult`] and contributes an empty block, so a 200-page job
//! survives one bad scan. Only document-level faults (unreadable input,
//! unwritable output) fail the conversion.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr2docx::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let result = convert("scan.pdf", &config).await?;
//!     println!("written: {}", result.output_path.display());
//!     if !result.pages_failed.is_empty() {
//!         eprintln!("pages failed: {:?}", result.pages_failed);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Job tracking
//!
//! Long conversions are observable through the [`JobLedger`]: an API layer
//! creates a job, spawns [`convert_job`], and polls
//! [`JobLedger::get_status`] for status, page progress, and the output
//! location once the job completes.
//!
//! ```rust,no_run
//! use ocr2docx::{convert_job, ConversionConfig, JobLedger};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let ledger = JobLedger::new();
//! let job_id = ledger.create();
//!
//! let worker_ledger = ledger.clone();
//! tokio::spawn(async move {
//!     let config = ConversionConfig::default();
//!     let _ = convert_job("scan.pdf", None, &config, &worker_ledger, job_id).await;
//! });
//!
//! // ...meanwhile, any task can poll:
//! let job = ledger.get_status(job_id).unwrap();
//! println!("{} {}%", job.status, job.progress.percentage);
//! # }
//! ```
//!
//! ## Choosing a recognition back end
//!
//! | Engine | Speed | Accuracy | Requires |
//! |--------|-------|----------|----------|
//! | `tesseract` (default) | fast | good on clean scans | tesseract + language data |
//! | `neural` | slower | better on noisy pages | ONNX model files |
//!
//! Select per job via [`ConversionConfig::engine`]; the choice is read once
//! at job start and never changes mid-job.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr2docx` binary (clap + anyhow + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! ocr2docx = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod job;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConflictPolicy, ConversionConfig, ConversionConfigBuilder, EngineKind};
pub use convert::{convert, convert_job, convert_sync, convert_to_file};
pub use error::{ConvertError, LedgerError, PageError};
pub use job::{Job, JobId, JobLedger, JobProgress, JobStatus, LedgerProgress};
pub use model::{DocumentStructure, ListMarker, StructureElement};
pub use output::ConversionResult;
pub use pipeline::analyze::StructureAnalyzer;
pub use pipeline::assemble::DocumentAssembler;
pub use pipeline::extract::{PageExtractor, PageImage};
pub use pipeline::recognize::{RecognitionEngine, RecognitionOutput, RecognizedWord};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
