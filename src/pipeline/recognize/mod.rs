//! Text recognition: turn a page raster into positioned words.
//!
//! Two interchangeable back ends implement the single-method
//! [`RecognitionEngine`] contract:
//!
//! * [`tesseract::TesseractEngine`] — fast, word-level boxes straight from
//!   Tesseract; good on clean scans.
//! * [`neural::NeuralEngine`] — ONNX detection + recognition models; slower
//!   but noticeably better on noisy or complex pages.
//!
//! Selection happens once per job through [`create_engine`], driven by
//! [`EngineKind`] in the configuration — callers never name a concrete type.
//!
//! Confidence scores are a monotone quality indicator only. The two back
//! ends do not share a calibration, so downstream code must not compare
//! confidences across engines.

pub mod neural;
pub mod tesseract;

use crate::config::{ConversionConfig, EngineKind};
use crate::error::{ConvertError, PageError};
use crate::pipeline::extract::PageImage;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// A single word recognized on a page, with its bounding box in page pixel
/// space and a confidence in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedWord {
    pub text: String,
    /// Left edge, page pixels.
    pub x: f32,
    /// Top edge, page pixels.
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl RecognizedWord {
    /// Right edge.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge.
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Vertical centre, used for line grouping.
    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

/// Everything an engine recognized on one page.
///
/// An empty word list is a valid result (blank page), never an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecognitionOutput {
    /// Words in the engine's discovery order.
    pub words: Vec<RecognizedWord>,
    /// Average word confidence; 0.0 for a blank page.
    pub confidence: f32,
}

impl RecognitionOutput {
    /// Build an output from words, computing the aggregate confidence.
    pub fn from_words(words: Vec<RecognizedWord>) -> Self {
        let confidence = if words.is_empty() {
            0.0
        } else {
            words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32
        };
        Self { words, confidence }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Capability contract shared by both recognition back ends.
///
/// Implementations must be `Send + Sync` so one engine instance can serve a
/// whole job from blocking worker threads. Blank pages return `Ok` with an
/// empty word list; errors are reserved for genuine engine faults.
pub trait RecognitionEngine: Send + Sync {
    /// Recognize all words on a page image.
    fn recognize(&self, page: &PageImage) -> Result<RecognitionOutput, PageError>;

    /// Short back-end name for logs ("tesseract" / "neural").
    fn name(&self) -> &'static str;
}

/// Instantiate the engine selected by the configuration.
///
/// Read once per job: the returned engine is used for every page. A
/// caller-supplied `engine_instance` takes precedence over the named kind.
pub fn create_engine(
    config: &ConversionConfig,
) -> Result<Arc<dyn RecognitionEngine>, ConvertError> {
    if let Some(engine) = &config.engine_instance {
        return Ok(Arc::clone(engine));
    }
    match config.engine {
        EngineKind::Tesseract => Ok(Arc::new(tesseract::TesseractEngine::new(config)?)),
        EngineKind::Neural => Ok(Arc::new(neural::NeuralEngine::new(config)?)),
    }
}

// ── Preprocessing ────────────────────────────────────────────────────────

/// Upscaling target: the shortest raster edge after preprocessing.
/// OCR accuracy drops sharply below roughly this size for a full page.
const MIN_WORKING_EDGE: u32 = 1800;

/// Luma standard deviation below which a page counts as low-contrast.
const LOW_CONTRAST_STDDEV: f32 = 40.0;

/// A page raster prepared for recognition, with the scale factor needed to
/// map box coordinates back into the original page pixel space.
pub struct PreparedImage {
    pub image: DynamicImage,
    /// prepared-pixels per page-pixel; divide detected coordinates by this.
    pub scale: f32,
}

/// Apply quality-gated preprocessing before recognition.
///
/// Grayscale conversion, upscaling of small rasters, and a contrast boost
/// for washed-out scans. Aspect ratio is always preserved and the returned
/// `scale` maps detected boxes back to page space, so downstream geometry
/// stays consistent with [`PageImage`] dimensions.
pub fn prepare_image(page: &PageImage, enabled: bool) -> PreparedImage {
    if !enabled {
        return PreparedImage {
            image: page.image.clone(),
            scale: 1.0,
        };
    }

    let shortest = page.width.min(page.height).max(1);
    let stddev = luma_stddev(&page.image);
    let small = shortest < MIN_WORKING_EDGE;
    let washed_out = stddev < LOW_CONTRAST_STDDEV;

    if !small && !washed_out {
        return PreparedImage {
            image: page.image.clone(),
            scale: 1.0,
        };
    }

    debug!(
        "Preprocessing page {} (shortest edge {}, luma stddev {:.1})",
        page.page_number, shortest, stddev
    );

    let mut image = DynamicImage::ImageLuma8(page.image.to_luma8());
    let mut scale = 1.0f32;

    if small {
        scale = MIN_WORKING_EDGE as f32 / shortest as f32;
        let new_w = (page.width as f32 * scale).round() as u32;
        let new_h = (page.height as f32 * scale).round() as u32;
        image = image.resize_exact(new_w, new_h, image::imageops::FilterType::Lanczos3);
    }

    if washed_out {
        image = image.adjust_contrast(30.0);
    }

    PreparedImage { image, scale }
}

/// Standard deviation of the luma channel, sampled on a coarse grid to stay
/// cheap on large rasters.
fn luma_stddev(image: &DynamicImage) -> f32 {
    let gray = image.to_luma8();
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return 0.0;
    }
    let step = ((w.max(h) / 256).max(1)) as usize;

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut n = 0u64;
    for y in (0..h).step_by(step) {
        for x in (0..w).step_by(step) {
            let v = gray.get_pixel(x, y)[0] as f64;
            sum += v;
            sum_sq += v * v;
            n += 1;
        }
    }
    if n == 0 {
        return 0.0;
    }
    let mean = sum / n as f64;
    ((sum_sq / n as f64 - mean * mean).max(0.0)).sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    fn page_from(image: DynamicImage, dpi: u32) -> PageImage {
        PageImage {
            page_number: 1,
            width: image.width(),
            height: image.height(),
            dpi,
            image,
        }
    }

    #[test]
    fn output_confidence_averages_words() {
        let words = vec![
            RecognizedWord {
                text: "a".into(),
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 12.0,
                confidence: 0.8,
            },
            RecognizedWord {
                text: "b".into(),
                x: 14.0,
                y: 0.0,
                width: 10.0,
                height: 12.0,
                confidence: 0.6,
            },
        ];
        let output = RecognitionOutput::from_words(words);
        assert!((output.confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn empty_output_has_zero_confidence() {
        let output = RecognitionOutput::from_words(vec![]);
        assert!(output.is_empty());
        assert_eq!(output.confidence, 0.0);
    }

    #[test]
    fn word_geometry_helpers() {
        let w = RecognizedWord {
            text: "x".into(),
            x: 10.0,
            y: 20.0,
            width: 30.0,
            height: 8.0,
            confidence: 1.0,
        };
        assert_eq!(w.right(), 40.0);
        assert_eq!(w.bottom(), 28.0);
        assert_eq!(w.center_y(), 24.0);
    }

    #[test]
    fn small_raster_is_upscaled() {
        let img = DynamicImage::ImageLuma8(image::ImageBuffer::from_pixel(
            400,
            600,
            Luma([128u8]),
        ));
        let page = page_from(img, 72);
        let prepared = prepare_image(&page, true);
        assert!(prepared.scale > 1.0);
        assert_eq!(prepared.image.width(), (400.0 * prepared.scale).round() as u32);
        assert!(prepared.image.width().min(prepared.image.height()) >= MIN_WORKING_EDGE);
    }

    #[test]
    fn large_contrasty_raster_passes_through() {
        // Checkerboard: plenty of contrast, big enough to skip upscaling.
        let img = image::ImageBuffer::from_fn(2000, 2000, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Rgb([255u8, 255, 255])
            } else {
                Rgb([0u8, 0, 0])
            }
        });
        let page = page_from(DynamicImage::ImageRgb8(img), 300);
        let prepared = prepare_image(&page, true);
        assert_eq!(prepared.scale, 1.0);
        assert_eq!(prepared.image.width(), 2000);
    }

    #[test]
    fn preprocessing_disabled_is_identity() {
        let img = DynamicImage::ImageLuma8(image::ImageBuffer::from_pixel(
            100,
            100,
            Luma([200u8]),
        ));
        let page = page_from(img, 72);
        let prepared = prepare_image(&page, false);
        assert_eq!(prepared.scale, 1.0);
        assert_eq!(prepared.image.width(), 100);
    }
}
