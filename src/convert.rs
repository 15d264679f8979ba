//! Conversion orchestration: drive the pipeline page by page.
//!
//! ## Failure isolation
//!
//! The pipeline runs a two-tier error model. Page-level faults (render,
//! recognition, analysis, timeout) are caught here, recorded in the
//! [`ConversionResult`], and replaced with an empty structural block —
//! processing continues with the next page. Only document-level faults
//! (unreadable input, engine initialisation, unwritable output) abort the
//! run with `Err(ConvertError)`.
//!
//! Pages are processed strictly sequentially: assembly needs page order and
//! progress reporting is sequential by design. Distinct jobs run
//! concurrently on their own tasks without sharing any pipeline state.

use crate::config::ConversionConfig;
use crate::error::{ConvertError, PageError};
use crate::job::{JobId, JobLedger, LedgerProgress};
use crate::model::DocumentStructure;
use crate::output::ConversionResult;
use crate::pipeline::analyze::StructureAnalyzer;
use crate::pipeline::assemble::DocumentAssembler;
use crate::pipeline::extract::PageExtractor;
use crate::pipeline::recognize::{self, RecognitionEngine};
use crate::progress::{ConversionProgressCallback, ProgressCallback};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{info, warn};

/// Convert a scanned PDF to a Word document next to the input
/// (`report.pdf` → `report.docx`).
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ConversionResult)` on success, even if some pages failed
/// (check `result.pages_failed`).
///
/// # Errors
/// Returns `Err(ConvertError)` only for fatal errors:
/// - file missing / not a PDF / zero pages
/// - recognition engine cannot initialise
/// - output cannot be assembled or saved
pub async fn convert(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionResult, ConvertError> {
    let input = input.as_ref();
    let output = default_output_path(input);
    convert_to_file(input, output, config).await
}

/// Convert a scanned PDF to a Word document at an explicit output path.
pub async fn convert_to_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionResult, ConvertError> {
    let total_start = Instant::now();
    let input = input.as_ref();
    let output = output.as_ref();
    info!("Starting conversion: {}", input.display());

    // ── Step 1: Open and validate the document ───────────────────────────
    let extractor = PageExtractor::open(input).await?;
    let total_pages = extractor.page_count();

    // ── Step 2: Select the recognition back end (once per job) ───────────
    let engine = recognize::create_engine(config)?;
    info!(
        "Using '{}' recognition engine for {} pages",
        engine.name(),
        total_pages
    );

    if let Some(cb) = &config.progress_callback {
        cb.on_conversion_start(total_pages);
    }

    // ── Step 3: Per-page pipeline with failure isolation ─────────────────
    let analyzer = StructureAnalyzer::new();
    let page_deadline = Duration::from_secs(config.page_timeout_secs);
    let mut structures: Vec<DocumentStructure> = Vec::with_capacity(total_pages as usize);
    let mut errors: Vec<PageError> = Vec::new();

    for page in 1..=total_pages {
        if let Some(cb) = &config.progress_callback {
            cb.on_page_start(page, total_pages);
        }

        let outcome = timeout(
            page_deadline,
            process_page(&extractor, &engine, &analyzer, page, config),
        )
        .await
        .unwrap_or_else(|_| {
            Err(PageError::Timeout {
                page,
                secs: config.page_timeout_secs,
            })
        });

        match outcome {
            Ok((structure, word_count)) => {
                if let Some(cb) = &config.progress_callback {
                    cb.on_page_complete(page, total_pages, word_count);
                }
                structures.push(structure);
            }
            Err(error) => {
                warn!("{error}");
                if let Some(cb) = &config.progress_callback {
                    cb.on_page_error(page, total_pages, error.to_string());
                }
                // The failed page still occupies its slot so pagination
                // and page breaks stay faithful to the source.
                structures.push(DocumentStructure::empty(page));
                errors.push(error);
            }
        }
    }

    // ── Step 4: Assemble and save the output document ────────────────────
    let assembler = DocumentAssembler::new(config.on_conflict);
    let docx = assembler.assemble(&structures)?;
    let final_path = assembler.save(docx, output)?;

    let mut pages_failed: Vec<u32> = errors.iter().map(PageError::page).collect();
    pages_failed.sort_unstable();
    let pages_processed = total_pages - pages_failed.len() as u32;

    if let Some(cb) = &config.progress_callback {
        cb.on_conversion_complete(total_pages, pages_processed);
    }

    info!(
        "Conversion complete: {}/{} pages, {}ms",
        pages_processed,
        total_pages,
        total_start.elapsed().as_millis()
    );

    Ok(ConversionResult {
        success: true,
        output_path: final_path,
        total_pages,
        pages_processed,
        pages_failed,
        errors,
        duration_ms: total_start.elapsed().as_millis() as u64,
    })
}

/// Convert under a [`JobLedger`] entry: the job is marked Processing up
/// front, page progress is mirrored into the ledger, and the terminal state
/// (Completed with the output location, or Failed with the error) is written
/// when the run finishes.
///
/// `output` of `None` uses the default path next to the input.
pub async fn convert_job(
    input: impl AsRef<Path>,
    output: Option<PathBuf>,
    config: &ConversionConfig,
    ledger: &JobLedger,
    job_id: JobId,
) -> Result<ConversionResult, ConvertError> {
    let input = input.as_ref();
    let output = output.unwrap_or_else(|| default_output_path(input));

    ledger
        .mark_processing(job_id)
        .map_err(|e| ConvertError::Internal(format!("job ledger rejected start: {e}")))?;

    // The orchestrator never touches the Job record directly; it only emits
    // progress events, and the ledger sink turns them into updates.
    let ledger_sink: ProgressCallback = Arc::new(LedgerProgress::new(ledger.clone(), job_id));
    let mut job_config = config.clone();
    job_config.progress_callback = Some(match config.progress_callback.clone() {
        Some(user) => Arc::new(FanoutProgress {
            sinks: vec![user, ledger_sink],
        }) as ProgressCallback,
        None => ledger_sink,
    });

    match convert_to_file(input, &output, &job_config).await {
        Ok(result) => {
            ledger
                .mark_completed(job_id, result.output_path.clone())
                .map_err(|e| ConvertError::Internal(format!("job ledger rejected completion: {e}")))?;
            Ok(result)
        }
        Err(error) => {
            if let Err(e) = ledger.mark_failed(job_id, error.to_string()) {
                warn!("failed to record job failure: {e}");
            }
            Err(error)
        }
    }
}

/// Synchronous wrapper around [`convert_to_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionResult, ConvertError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ConvertError::Internal(format!("failed to create tokio runtime: {e}")))?
        .block_on(convert_to_file(input, output, config))
}

/// One page through render → recognize → analyze.
async fn process_page(
    extractor: &PageExtractor,
    engine: &Arc<dyn RecognitionEngine>,
    analyzer: &StructureAnalyzer,
    page: u32,
    config: &ConversionConfig,
) -> Result<(DocumentStructure, usize), PageError> {
    let image = extractor
        .render_page(page, config.dpi, config.max_render_pixels)
        .await?;

    // OCR is CPU-bound; keep it off the async workers. The page raster is
    // consumed here and dropped with the closure.
    let engine = Arc::clone(engine);
    let recognized = tokio::task::spawn_blocking(move || engine.recognize(&image))
        .await
        .map_err(|e| PageError::RecognitionFailed {
            page,
            detail: format!("recognition task panicked: {e}"),
        })??;

    let word_count = recognized.words.len();

    // The analyzer is pure arithmetic over word boxes; a panic here means a
    // heuristic hit pathological input, which must stay a page-level fault.
    let structure = std::panic::catch_unwind(AssertUnwindSafe(|| {
        analyzer.analyze(page, &recognized)
    }))
    .map_err(|_| PageError::AnalysisFailed {
        page,
        detail: "layout analysis panicked".to_string(),
    })?;

    Ok((structure, word_count))
}

/// `scan.pdf` → `scan.docx` in the same directory.
fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("docx")
}

/// Fans progress events out to several sinks (user callback + job ledger).
struct FanoutProgress {
    sinks: Vec<ProgressCallback>,
}

impl ConversionProgressCallback for FanoutProgress {
    fn on_conversion_start(&self, total_pages: u32) {
        for sink in &self.sinks {
            sink.on_conversion_start(total_pages);
        }
    }

    fn on_page_start(&self, page: u32, total_pages: u32) {
        for sink in &self.sinks {
            sink.on_page_start(page, total_pages);
        }
    }

    fn on_page_complete(&self, page: u32, total_pages: u32, word_count: usize) {
        for sink in &self.sinks {
            sink.on_page_complete(page, total_pages, word_count);
        }
    }

    fn on_page_error(&self, page: u32, total_pages: u32, error: String) {
        for sink in &self.sinks {
            sink.on_page_error(page, total_pages, error.clone());
        }
    }

    fn on_conversion_complete(&self, total_pages: u32, success_count: u32) {
        for sink in &self.sinks {
            sink.on_conversion_complete(total_pages, success_count);
        }
    }
}
