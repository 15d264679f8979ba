//! Integration tests for the conversion pipeline.
//!
//! Tests that need the pdfium shared library are gated on it being
//! loadable and skip with a message otherwise, so the suite passes on
//! machines without pdfium installed. Recognition is driven through a
//! scripted engine injected via `ConversionConfig::engine_instance` —
//! no OCR binaries are required anywhere here.

use ocr2docx::{
    convert_job, convert_to_file, ConversionConfig, ConversionProgressCallback, DocumentAssembler,
    DocumentStructure, JobLedger, JobStatus, PageError, PageImage, ProgressCallback,
    RecognitionEngine, RecognitionOutput, RecognizedWord, StructureAnalyzer, StructureElement,
    ConflictPolicy,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn pdfium_available() -> bool {
    pdfium_render::prelude::Pdfium::bind_to_system_library().is_ok()
}

macro_rules! skip_without_pdfium {
    () => {
        if !pdfium_available() {
            eprintln!("SKIP — pdfium shared library not available");
            return;
        }
    };
}

/// Build a minimal but structurally valid PDF with `page_count` empty
/// US-letter pages, including a correct xref table.
fn minimal_pdf(page_count: usize) -> Vec<u8> {
    let mut objects: Vec<String> = Vec::new();
    let kids: Vec<String> = (0..page_count).map(|i| format!("{} 0 R", 3 + i)).collect();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        page_count
    ));
    for _ in 0..page_count {
        objects.push("<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>".to_string());
    }

    let mut pdf = Vec::new();
    pdf.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }
    let xref_offset = pdf.len();
    let total = objects.len() + 1;
    pdf.extend_from_slice(format!("xref\n0 {total}\n").as_bytes());
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        pdf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    pdf.extend_from_slice(
        format!("trailer\n<< /Size {total} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n")
            .as_bytes(),
    );
    pdf
}

fn write_pdf(dir: &tempfile::TempDir, name: &str, page_count: usize) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, minimal_pdf(page_count)).unwrap();
    path
}

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

/// A short prose block with per-row x jitter so nothing reads as a grid.
fn prose_words(label: &str, rows: usize) -> Vec<RecognizedWord> {
    let mut words = Vec::new();
    for row in 0..rows {
        let y = 40.0 + row as f32 * 30.0;
        let drift = row as f32 * 21.0;
        words.push(word(label, 40.0, y, 90.0, 20.0));
        words.push(word("lorem", 140.0 + drift, y, 90.0, 20.0));
        words.push(word("ipsum", 260.0 + drift * 1.4, y, 90.0, 20.0));
    }
    words
}

/// What the scripted engine should do for one page.
enum PageScript {
    Words(Vec<RecognizedWord>),
    Blank,
    Fail(&'static str),
    SleepSecs(u64),
}

/// Recognition test double, scripted per page number.
struct ScriptedEngine {
    scripts: HashMap<u32, PageScript>,
}

impl ScriptedEngine {
    fn new(scripts: HashMap<u32, PageScript>) -> Arc<Self> {
        Arc::new(Self { scripts })
    }
}

impl RecognitionEngine for ScriptedEngine {
    fn recognize(&self, page: &PageImage) -> Result<RecognitionOutput, PageError> {
        match self.scripts.get(&page.page_number) {
            Some(PageScript::Words(words)) => Ok(RecognitionOutput::from_words(words.clone())),
            Some(PageScript::Blank) | None => Ok(RecognitionOutput::from_words(Vec::new())),
            Some(PageScript::Fail(detail)) => Err(PageError::RecognitionFailed {
                page: page.page_number,
                detail: (*detail).to_string(),
            }),
            Some(PageScript::SleepSecs(secs)) => {
                std::thread::sleep(std::time::Duration::from_secs(*secs));
                Ok(RecognitionOutput::from_words(Vec::new()))
            }
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn scripted_config(engine: Arc<ScriptedEngine>) -> ConversionConfig {
    ConversionConfig::builder()
        .engine_instance(engine as Arc<dyn RecognitionEngine>)
        .dpi(96) // blank pages, no need for OCR-grade resolution
        .build()
        .unwrap()
}

// ── PageExtractor properties ─────────────────────────────────────────────────

#[tokio::test]
async fn rendered_pages_are_numbered_one_to_n_in_order() {
    skip_without_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(&dir, "four.pdf", 4);

    let extractor = ocr2docx::PageExtractor::open(&path).await.unwrap();
    assert_eq!(extractor.page_count(), 4);

    for page in 1..=4u32 {
        let image = extractor.render_page(page, 96, 2048).await.unwrap();
        assert_eq!(image.page_number, page);
        assert!(image.width > 0 && image.height > 0);
        assert_eq!(image.dpi, 96);
    }

    // Out-of-range render is a page-level error, not a panic.
    let err = extractor.render_page(5, 96, 2048).await.unwrap_err();
    assert!(matches!(err, PageError::RenderFailed { page: 5, .. }));
}

#[tokio::test]
async fn zero_page_document_is_a_distinct_error() {
    skip_without_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let path = write_pdf(&dir, "empty.pdf", 0);

    let err = ocr2docx::PageExtractor::open(&path).await.unwrap_err();
    assert!(
        matches!(err, ocr2docx::ConvertError::EmptyDocument { .. }),
        "expected EmptyDocument, got {err:?}"
    );
}

// ── Orchestrator: failure isolation ─────────────────────────────────────────

#[tokio::test]
async fn one_failing_page_does_not_fail_the_job() {
    skip_without_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(&dir, "three.pdf", 3);
    let output = dir.path().join("three.docx");

    let engine = ScriptedEngine::new(HashMap::from([
        (1, PageScript::Words(prose_words("one", 3))),
        (2, PageScript::Fail("simulated engine fault")),
        (3, PageScript::Words(prose_words("three", 3))),
    ]));
    let config = scripted_config(engine);

    let result = convert_to_file(&input, &output, &config).await.unwrap();

    assert!(result.success);
    assert_eq!(result.total_pages, 3);
    assert_eq!(result.pages_processed, 2);
    assert_eq!(result.pages_failed, vec![2]);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].to_string().contains("simulated engine fault"));
    assert!(output.exists());

    // The failed page keeps its slot: 3 pages → 2 page breaks in the output.
    let assembler = DocumentAssembler::new(ConflictPolicy::Overwrite);
    let pages = vec![
        DocumentStructure::empty(1),
        DocumentStructure::empty(2),
        DocumentStructure::empty(3),
    ];
    let docx = assembler.assemble(&pages).unwrap();
    assert_eq!(docx.document.children.len(), 2);
}

#[tokio::test]
async fn blank_middle_page_is_success_not_failure() {
    skip_without_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(&dir, "blankmid.pdf", 3);
    let output = dir.path().join("blankmid.docx");

    let engine = ScriptedEngine::new(HashMap::from([
        (1, PageScript::Words(prose_words("one", 3))),
        (2, PageScript::Blank),
        (3, PageScript::Words(prose_words("three", 3))),
    ]));
    let config = scripted_config(engine);

    let result = convert_to_file(&input, &output, &config).await.unwrap();

    assert_eq!(result.pages_processed, 3, "blank page counts as processed");
    assert!(result.pages_failed.is_empty());
    assert!(result.errors.is_empty());
    assert!(result.is_complete());
}

#[tokio::test]
async fn slow_page_times_out_and_job_continues() {
    skip_without_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(&dir, "slow.pdf", 2);
    let output = dir.path().join("slow.docx");

    let engine = ScriptedEngine::new(HashMap::from([
        (1, PageScript::SleepSecs(3)),
        (2, PageScript::Words(prose_words("two", 2))),
    ]));
    let config = ConversionConfig::builder()
        .engine_instance(engine as Arc<dyn RecognitionEngine>)
        .dpi(96)
        .page_timeout_secs(1)
        .build()
        .unwrap();

    let result = convert_to_file(&input, &output, &config).await.unwrap();

    assert_eq!(result.pages_failed, vec![1]);
    assert!(matches!(result.errors[0], PageError::Timeout { page: 1, .. }));
    assert_eq!(result.pages_processed, 1);
    assert!(output.exists());
}

// ── Job ledger integration ──────────────────────────────────────────────────

#[tokio::test]
async fn job_reaches_completed_with_output_location_and_full_progress() {
    skip_without_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(&dir, "job.pdf", 2);
    let output = dir.path().join("job.docx");

    let engine = ScriptedEngine::new(HashMap::from([
        (1, PageScript::Words(prose_words("alpha", 2))),
        (2, PageScript::Words(prose_words("beta", 2))),
    ]));
    let config = scripted_config(engine);

    let ledger = JobLedger::new();
    let job_id = ledger.create();
    assert_eq!(ledger.get_status(job_id).unwrap().status, JobStatus::Pending);

    let result = convert_job(&input, Some(output.clone()), &config, &ledger, job_id)
        .await
        .unwrap();

    let job = ledger.get_status(job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress.current_page, 2);
    assert_eq!(job.progress.total_pages, 2);
    assert_eq!(job.progress.percentage, 100);
    assert_eq!(job.output_path.as_deref(), Some(output.as_path()));
    assert!(job.completed_at.is_some());
    assert_eq!(result.output_path, output);

    // Terminal job rejects further orchestrator writes.
    assert!(ledger.record_progress(job_id, 1, 2).is_err());
}

#[tokio::test]
async fn per_page_failures_do_not_fail_the_job_record() {
    skip_without_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(&dir, "jobfail.pdf", 3);
    let output = dir.path().join("jobfail.docx");

    let engine = ScriptedEngine::new(HashMap::from([
        (1, PageScript::Words(prose_words("a", 2))),
        (2, PageScript::Fail("ocr crashed")),
        (3, PageScript::Words(prose_words("c", 2))),
    ]));
    let config = scripted_config(engine);

    let ledger = JobLedger::new();
    let job_id = ledger.create();
    let result = convert_job(&input, Some(output), &config, &ledger, job_id)
        .await
        .unwrap();

    assert_eq!(result.pages_failed, vec![2]);
    let job = ledger.get_status(job_id).unwrap();
    assert_eq!(
        job.status,
        JobStatus::Completed,
        "page-level faults must not fail the job"
    );
    assert!(job.error.is_none());
}

// ── Progress callback sequencing ─────────────────────────────────────────────

#[tokio::test]
async fn progress_events_arrive_in_page_order() {
    skip_without_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(&dir, "progress.pdf", 3);
    let output = dir.path().join("progress.docx");

    struct Recorder {
        pages: std::sync::Mutex<Vec<u32>>,
    }
    impl ConversionProgressCallback for Recorder {
        fn on_page_complete(&self, page: u32, _total: u32, _words: usize) {
            self.pages.lock().unwrap().push(page);
        }
        fn on_page_error(&self, page: u32, _total: u32, _error: String) {
            self.pages.lock().unwrap().push(page);
        }
    }

    let recorder = Arc::new(Recorder {
        pages: std::sync::Mutex::new(Vec::new()),
    });
    let engine = ScriptedEngine::new(HashMap::from([(2, PageScript::Fail("boom"))]));
    let config = ConversionConfig::builder()
        .engine_instance(engine as Arc<dyn RecognitionEngine>)
        .dpi(96)
        .progress_callback(Arc::clone(&recorder) as ProgressCallback)
        .build()
        .unwrap();

    convert_to_file(&input, &output, &config).await.unwrap();

    let pages = recorder.pages.lock().unwrap().clone();
    assert_eq!(pages, vec![1, 2, 3], "strictly sequential page events");
}

// ── StructureAnalyzer properties (no pdfium needed) ──────────────────────────

#[test]
fn two_separated_columns_read_left_column_first() {
    // Two independent text blocks; their baselines interleave rather than
    // align, as in a real scan.
    let mut words = Vec::new();
    for row in 0..5 {
        let y = 50.0 + row as f32 * 40.0;
        let drift = row as f32 * 19.0;
        words.push(word(&format!("left{row}"), 50.0, y, 100.0, 20.0));
        words.push(word("col", 160.0 + drift, y, 60.0, 20.0));
        words.push(word(&format!("right{row}"), 700.0, y + 17.0, 100.0, 20.0));
        words.push(word("col", 810.0 + drift, y + 17.0, 60.0, 20.0));
    }

    let structure = StructureAnalyzer::new().analyze(1, &RecognitionOutput::from_words(words));

    let flat: Vec<String> = structure
        .elements
        .iter()
        .filter_map(|e| e.text().map(str::to_string))
        .collect();
    let joined = flat.join(" ");
    let left_end = joined.find("left4").expect("left column present");
    let right_start = joined.find("right0").expect("right column present");
    assert!(
        left_end < right_start,
        "left column must be fully emitted before the right column: {joined}"
    );
    assert!(structure
        .elements
        .iter()
        .any(|e| matches!(e, StructureElement::ColumnBreak)));
}

#[test]
fn oversized_line_classifies_as_heading_not_paragraph() {
    // Ten body lines at height 20 and one line at 1.5× the body size.
    let mut words = vec![word("Chapter", 40.0, 10.0, 160.0, 30.0)];
    words.extend(prose_words("body", 10));

    let structure = StructureAnalyzer::new().analyze(1, &RecognitionOutput::from_words(words));

    match structure
        .elements
        .iter()
        .find(|e| matches!(e, StructureElement::Heading { .. }))
    {
        Some(StructureElement::Heading { text, .. }) => assert_eq!(text, "Chapter"),
        _ => panic!("expected a Heading element, got {:?}", structure.elements),
    }
}

#[test]
fn empty_recognition_yields_empty_structure() {
    let structure = StructureAnalyzer::new().analyze(9, &RecognitionOutput::default());
    assert_eq!(structure.page_number, 9);
    assert!(structure.is_empty());
}

// ── Assembler round trip (no pdfium needed) ──────────────────────────────────

#[test]
fn heading_paragraph_table_survive_assembly_in_order() {
    let elements = vec![
        StructureElement::Heading {
            level: 2,
            text: "Results".into(),
            font_size: 34.0,
        },
        StructureElement::Paragraph {
            text: "All samples converged.".into(),
            font_size: 20.0,
        },
        StructureElement::TableCell {
            row: 0,
            col: 0,
            text: "n".into(),
        },
        StructureElement::TableCell {
            row: 0,
            col: 1,
            text: "value".into(),
        },
        StructureElement::TableCell {
            row: 1,
            col: 0,
            text: "1".into(),
        },
        StructureElement::TableCell {
            row: 1,
            col: 1,
            text: "0.99".into(),
        },
    ];
    let page = DocumentStructure {
        page_number: 1,
        elements,
    };

    let assembler = DocumentAssembler::new(ConflictPolicy::Overwrite);
    let docx = assembler.assemble(std::slice::from_ref(&page)).unwrap();

    use docx_rs::DocumentChild;
    let kinds: Vec<&str> = docx
        .document
        .children
        .iter()
        .map(|c| match c {
            DocumentChild::Paragraph(_) => "paragraph",
            DocumentChild::Table(_) => "table",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, vec!["paragraph", "paragraph", "table"]);

    match &docx.document.children[2] {
        DocumentChild::Table(table) => assert_eq!(table.rows.len(), 2),
        _ => unreachable!(),
    }

    // And it packs into a real, non-empty .docx file.
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("roundtrip.docx");
    let written = assembler.save(docx, &out).unwrap();
    let bytes = std::fs::read(written).unwrap();
    assert!(bytes.len() > 500);
    assert_eq!(&bytes[0..2], &b"PK"[..], "docx is a zip container");
}
