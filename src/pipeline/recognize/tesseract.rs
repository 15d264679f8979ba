//! Fast recognition back end: Tesseract via `leptess`.
//!
//! Tesseract is single-stage (detection and recognition combined) and ships
//! word-level boxes directly, which is exactly the granularity the layout
//! analyzer wants. A fresh `LepTess` handle is created per page — the handle
//! is neither `Sync` nor cheap to reset, and per-page initialisation is
//! microseconds next to the OCR pass itself.

use crate::config::ConversionConfig;
use crate::error::{ConvertError, PageError};
use crate::pipeline::extract::PageImage;
use crate::pipeline::recognize::{
    prepare_image, RecognitionEngine, RecognitionOutput, RecognizedWord,
};
use leptess::{LepTess, Variable};
use tracing::debug;

/// Page segmentation mode 1: automatic segmentation with orientation and
/// script detection. Best default for whole scanned pages.
const PAGE_SEG_MODE: &str = "1";

/// Tesseract-backed [`RecognitionEngine`] (the fast variant).
pub struct TesseractEngine {
    language: String,
    min_confidence: f32,
    preprocessing: bool,
}

impl TesseractEngine {
    /// Create the engine, verifying Tesseract can initialise with the
    /// configured language data.
    pub fn new(config: &ConversionConfig) -> Result<Self, ConvertError> {
        // Trial initialisation up front so a missing traineddata file fails
        // the job before any page work, not on page 1.
        LepTess::new(None, &config.language).map_err(|e| ConvertError::EngineInit {
            engine: "tesseract".to_string(),
            detail: format!(
                "language '{}' unavailable: {e}. Install the tesseract language data.",
                config.language
            ),
        })?;

        Ok(Self {
            language: config.language.clone(),
            min_confidence: config.min_confidence,
            preprocessing: config.preprocessing,
        })
    }
}

impl RecognitionEngine for TesseractEngine {
    fn recognize(&self, page: &PageImage) -> Result<RecognitionOutput, PageError> {
        let fail = |detail: String| PageError::RecognitionFailed {
            page: page.page_number,
            detail,
        };

        let prepared = prepare_image(page, self.preprocessing);

        // leptess wants an encoded image; PNG round-trips the raster losslessly.
        let mut png = std::io::Cursor::new(Vec::new());
        prepared
            .image
            .write_to(&mut png, image::ImageFormat::Png)
            .map_err(|e| fail(format!("PNG encoding failed: {e}")))?;

        let mut lt = LepTess::new(None, &self.language)
            .map_err(|e| fail(format!("tesseract init failed: {e}")))?;
        lt.set_variable(Variable::TesseditPagesegMode, PAGE_SEG_MODE)
            .map_err(|e| fail(format!("failed to set segmentation mode: {e}")))?;
        lt.set_image_from_mem(png.get_ref())
            .map_err(|e| fail(format!("failed to set image: {e}")))?;

        // None means no text at all (blank page) — a valid empty result.
        let boxes = match lt.get_component_boxes(leptess::capi::TessPageIteratorLevel_RIL_WORD, true)
        {
            Some(boxes) => boxes,
            None => return Ok(RecognitionOutput::from_words(Vec::new())),
        };

        let mut words = Vec::new();
        for word_box in &boxes {
            let geometry = word_box.get_geometry();
            lt.set_rectangle(geometry.x, geometry.y, geometry.w, geometry.h);

            let text = lt.get_utf8_text().unwrap_or_default().trim().to_string();
            if text.is_empty() {
                continue;
            }

            let confidence = (lt.mean_text_conf() as f32 / 100.0).clamp(0.0, 1.0);
            if confidence < self.min_confidence {
                continue;
            }

            // Boxes come from the prepared raster; divide by the prepare
            // scale to land back in page pixel space.
            words.push(RecognizedWord {
                text,
                x: geometry.x as f32 / prepared.scale,
                y: geometry.y as f32 / prepared.scale,
                width: geometry.w as f32 / prepared.scale,
                height: geometry.h as f32 / prepared.scale,
                confidence,
            });
        }

        debug!(
            "tesseract: page {} → {} words",
            page.page_number,
            words.len()
        );
        Ok(RecognitionOutput::from_words(words))
    }

    fn name(&self) -> &'static str {
        "tesseract"
    }
}
