//! CLI binary for ocr2docx.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ocr2docx::{
    convert_to_file, ConflictPolicy, ConversionConfig, ConversionProgressCallback, EngineKind,
    ProgressCallback,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one live bar plus a per-page error log line.
struct CliProgress {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_conversion_start
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} [{bar:30.cyan/dim}] page {pos}/{len} {msg}",
            )
            .expect("valid template")
            .progress_chars("=> "),
        );
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl ConversionProgressCallback for CliProgress {
    fn on_conversion_start(&self, total_pages: u32) {
        self.bar.set_length(total_pages as u64);
    }

    fn on_page_complete(&self, page: u32, _total_pages: u32, word_count: usize) {
        self.bar.set_position(page as u64);
        self.bar.set_message(format!("{word_count} words"));
    }

    fn on_page_error(&self, page: u32, _total_pages: u32, error: String) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.bar.set_position(page as u64);
        self.bar.println(format!("{} {error}", red("✗")));
    }

    fn on_conversion_complete(&self, _total_pages: u32, _success_count: u32) {
        self.bar.finish_and_clear();
    }
}

// ── Arguments ────────────────────────────────────────────────────────────────

/// Convert a scanned PDF document into an editable Word (.docx) file.
#[derive(Parser, Debug)]
#[command(name = "ocr2docx", version, about, long_about = None)]
struct Args {
    /// Input PDF file.
    input: PathBuf,

    /// Output .docx path (default: input name with .docx extension).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Recognition back end: "tesseract" (fast) or "neural" (accurate).
    #[arg(long, default_value = "tesseract")]
    engine: String,

    /// Rendering resolution in DPI (72–600).
    #[arg(long, default_value_t = 300)]
    dpi: u32,

    /// Tesseract language code(s), e.g. "eng" or "eng+deu".
    #[arg(long, default_value = "eng")]
    language: String,

    /// Directory with the neural engine's ONNX models.
    #[arg(long, env = "OCR2DOCX_MODELS")]
    model_dir: Option<PathBuf>,

    /// Per-page processing timeout in seconds.
    #[arg(long, default_value_t = 120)]
    page_timeout: u64,

    /// Keep an existing output file and write to a `_1`/`_2` suffixed name
    /// instead of overwriting.
    #[arg(long)]
    keep_existing: bool,

    /// Skip image preprocessing (grayscale / upscale / contrast).
    #[arg(long)]
    no_preprocessing: bool,

    /// Verbose logging (repeat for more: -v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = match args.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("ocr2docx=info"),
        _ => EnvFilter::new("ocr2docx=debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let engine = EngineKind::parse(&args.engine)
        .with_context(|| format!("unknown engine '{}' (tesseract | neural)", args.engine))?;

    let progress = CliProgress::new();
    let mut builder = ConversionConfig::builder()
        .engine(engine)
        .dpi(args.dpi)
        .language(args.language.as_str())
        .page_timeout_secs(args.page_timeout)
        .preprocessing(!args.no_preprocessing)
        .on_conflict(if args.keep_existing {
            ConflictPolicy::UniqueSuffix
        } else {
            ConflictPolicy::Overwrite
        })
        .progress_callback(Arc::clone(&progress) as ProgressCallback);
    if let Some(dir) = &args.model_dir {
        builder = builder.model_dir(dir.clone());
    }
    let config = builder.build().context("invalid configuration")?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("docx"));

    eprintln!(
        "{} {} {} {}",
        bold("ocr2docx"),
        args.input.display(),
        dim("→"),
        output.display()
    );

    let result = convert_to_file(&args.input, &output, &config)
        .await
        .context("conversion failed")?;

    if result.pages_failed.is_empty() {
        eprintln!(
            "{} {} pages converted in {:.1}s",
            green("✓"),
            result.pages_processed,
            result.duration_ms as f64 / 1000.0
        );
    } else {
        eprintln!(
            "{} {}/{} pages converted, {} failed: {:?}",
            red("!"),
            result.pages_processed,
            result.total_pages,
            result.pages_failed.len(),
            result.pages_failed
        );
        for error in &result.errors {
            eprintln!("  {}", dim(&error.to_string()));
        }
    }
    println!("{}", result.output_path.display());

    Ok(())
}
