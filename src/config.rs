//! Configuration types for scanned-PDF-to-Word conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across threads, serialise them for logging, and
//! diff two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::ConvertError;
use crate::pipeline::recognize::RecognitionEngine;
use crate::progress::ConversionProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a PDF-to-Word conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use ocr2docx::{ConversionConfig, EngineKind};
///
/// let config = ConversionConfig::builder()
///     .dpi(300)
///     .engine(EngineKind::Tesseract)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Rendering DPI used when rasterising each PDF page. Range: 72–600. Default: 300.
    ///
    /// 300 DPI is the classic OCR working resolution: glyph strokes survive
    /// binarisation and small fonts stay legible. Drop to 150–200 to halve
    /// memory on very large pages; raise to 400+ only for tiny print.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 4096.
    ///
    /// A safety cap independent of DPI. A 300-DPI render of an A0 poster
    /// would produce a 14 000 × 20 000 px image and exhaust memory. This
    /// field caps either dimension, scaling the other proportionally.
    pub max_render_pixels: u32,

    /// Which recognition back end to use. Default: [`EngineKind::Tesseract`].
    ///
    /// Read once when the job starts; it does not change mid-job.
    pub engine: EngineKind,

    /// Pre-constructed recognition engine. Takes precedence over `engine`.
    ///
    /// Useful in tests and for callers that need custom middleware around
    /// recognition (caching, fault injection, instrumentation).
    pub engine_instance: Option<Arc<dyn RecognitionEngine>>,

    /// Tesseract language code(s), e.g. "eng" or "eng+deu". Default: "eng".
    ///
    /// Only meaningful for the tesseract engine; the neural engine's
    /// character set is fixed by its recognition model.
    pub language: String,

    /// Minimum per-word confidence in [0, 1]; words below it are dropped.
    /// Default: 0.0 (keep everything the engine returns).
    pub min_confidence: f32,

    /// Apply image preprocessing (grayscale, upscale, contrast stretch)
    /// before recognition when quality heuristics trigger it. Default: true.
    pub preprocessing: bool,

    /// Directory holding the neural engine's ONNX models
    /// (`det_model.onnx`, `rec_model.onnx`, `charset.txt`).
    /// If `None`, the `OCR2DOCX_MODELS` environment variable is consulted.
    pub model_dir: Option<PathBuf>,

    /// Upper bound on one page's render + recognize + analyze time, in
    /// seconds. A page that exceeds it is recorded as failed and the job
    /// moves on. Default: 120.
    pub page_timeout_secs: u64,

    /// How to resolve an existing file at the output path. Default: Overwrite.
    pub on_conflict: ConflictPolicy,

    /// Progress callback invoked after each page. Default: None.
    pub progress_callback: Option<Arc<dyn ConversionProgressCallback>>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_render_pixels: 4096,
            engine: EngineKind::default(),
            engine_instance: None,
            language: "eng".to_string(),
            min_confidence: 0.0,
            preprocessing: true,
            model_dir: None,
            page_timeout_secs: 120,
            on_conflict: ConflictPolicy::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("dpi", &self.dpi)
            .field("max_render_pixels", &self.max_render_pixels)
            .field("engine", &self.engine)
            .field(
                "engine_instance",
                &self.engine_instance.as_ref().map(|e| e.name()),
            )
            .field("language", &self.language)
            .field("min_confidence", &self.min_confidence)
            .field("preprocessing", &self.preprocessing)
            .field("model_dir", &self.model_dir)
            .field("page_timeout_secs", &self.page_timeout_secs)
            .field("on_conflict", &self.on_conflict)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_render_pixels(mut self, px: u32) -> Self {
        self.config.max_render_pixels = px.max(256);
        self
    }

    pub fn engine(mut self, engine: EngineKind) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn engine_instance(mut self, engine: Arc<dyn RecognitionEngine>) -> Self {
        self.config.engine_instance = Some(engine);
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn min_confidence(mut self, c: f32) -> Self {
        self.config.min_confidence = c.clamp(0.0, 1.0);
        self
    }

    pub fn preprocessing(mut self, v: bool) -> Self {
        self.config.preprocessing = v;
        self
    }

    pub fn model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.model_dir = Some(dir.into());
        self
    }

    pub fn page_timeout_secs(mut self, secs: u64) -> Self {
        self.config.page_timeout_secs = secs.max(1);
        self
    }

    pub fn on_conflict(mut self, policy: ConflictPolicy) -> Self {
        self.config.on_conflict = policy;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn ConversionProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(ConvertError::Internal(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.language.is_empty() {
            return Err(ConvertError::Internal(
                "Language code must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which recognition back end converts a page image into positioned words.
///
/// Both variants satisfy the same contract (see
/// [`crate::pipeline::recognize::RecognitionEngine`]); the difference is the
/// speed/accuracy trade-off:
///
/// | Variant | Speed | Accuracy | Needs |
/// |---------|-------|----------|-------|
/// | `Tesseract` | fast | good on clean scans | tesseract + language data |
/// | `Neural`    | slower | better on noisy/complex pages | ONNX model files |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Tesseract word-level OCR (fast, default).
    #[default]
    Tesseract,
    /// ONNX detection + recognition models (slower, higher accuracy).
    Neural,
}

impl EngineKind {
    /// Parse from a configuration string ("tesseract" | "neural").
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tesseract" | "fast" => Some(EngineKind::Tesseract),
            "neural" | "accurate" => Some(EngineKind::Neural),
            _ => None,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Tesseract => write!(f, "tesseract"),
            EngineKind::Neural => write!(f, "neural"),
        }
    }
}

/// How to resolve a name collision at the output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Replace any existing file (default).
    #[default]
    Overwrite,
    /// Keep the existing file and write to `name_1.docx`, `name_2.docx`, …
    UniqueSuffix,
}
