//! High-accuracy recognition back end: ONNX detection + recognition models
//! driven through ONNX Runtime.
//!
//! Two-stage pipeline:
//! 1. **Detection** — a DB-style segmentation model marks text regions; the
//!    probability map is thresholded, dilated, and contoured into line boxes.
//! 2. **Recognition** — a CRNN model reads each line crop; the output is
//!    CTC-decoded against the character set file.
//!
//! The models emit line-level boxes, while the layout analyzer wants words.
//! Each recognized line is split on whitespace and its box divided evenly
//! across the words — an estimate, but accurate enough for line grouping and
//! column detection, which only need word centres.
//!
//! Model files are looked up in `ConversionConfig::model_dir`, falling back
//! to the `OCR2DOCX_MODELS` environment variable:
//! `det_model.onnx`, `rec_model.onnx`, `charset.txt`.

use crate::config::ConversionConfig;
use crate::error::{ConvertError, PageError};
use crate::pipeline::extract::PageImage;
use crate::pipeline::recognize::{
    prepare_image, RecognitionEngine, RecognitionOutput, RecognizedWord,
};
use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use imageproc::contours::find_contours;
use imageproc::morphology::dilate;
use ndarray::{Array3, Array4, Axis};
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Binary mask threshold on the detection probability map.
const DET_THRESH: f32 = 0.3;
/// Minimum mean probability for a detected box to survive.
const DET_BOX_THRESH: f32 = 0.5;
/// Expansion ratio applied to detected boxes (text tends to be tight-cropped).
const DET_UNCLIP_RATIO: f32 = 1.6;
/// Detection input normalisation (ImageNet statistics).
const DET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const DET_STD: [f32; 3] = [0.229, 0.224, 0.225];
/// Recognition input height; width is dynamic per crop aspect ratio.
const REC_HEIGHT: u32 = 48;
const REC_MAX_WIDTH: u32 = 960;

/// ONNX-backed [`RecognitionEngine`] (the high-accuracy variant).
///
/// Sessions sit behind a `Mutex` because ONNX Runtime inference takes
/// `&mut Session`; pages within a job run sequentially so there is no
/// contention in practice.
pub struct NeuralEngine {
    det_session: Mutex<Session>,
    rec_session: Mutex<Session>,
    charset: Vec<String>,
    min_confidence: f32,
    preprocessing: bool,
}

impl NeuralEngine {
    /// Load detection and recognition models plus the character set.
    pub fn new(config: &ConversionConfig) -> Result<Self, ConvertError> {
        let dir = resolve_model_dir(config)?;
        let det_path = dir.join("det_model.onnx");
        let rec_path = dir.join("rec_model.onnx");
        let charset_path = dir.join("charset.txt");

        for path in [&det_path, &rec_path, &charset_path] {
            if !path.exists() {
                return Err(ConvertError::EngineInit {
                    engine: "neural".to_string(),
                    detail: format!(
                        "model file missing: {}. Set --model-dir or OCR2DOCX_MODELS.",
                        path.display()
                    ),
                });
            }
        }

        let det_session = load_session(&det_path)?;
        let rec_session = load_session(&rec_path)?;
        let charset = load_charset(&charset_path)?;

        Ok(Self {
            det_session: Mutex::new(det_session),
            rec_session: Mutex::new(rec_session),
            charset,
            min_confidence: config.min_confidence,
            preprocessing: config.preprocessing,
        })
    }

    /// Detection stage: text-line boxes in prepared-image coordinates,
    /// sorted into reading order.
    fn detect(&self, image: &DynamicImage, page: u32) -> Result<Vec<LineBox>, PageError> {
        let fail = |detail: String| PageError::RecognitionFailed { page, detail };

        let (input, resized_w, resized_h) = preprocess_detection(image);
        let input_ref: TensorRef<f32> = TensorRef::from_array_view(&input)
            .map_err(|e| fail(format!("detection input: {e}")))?;

        let prob_map = {
            let mut session = self.det_session.lock().expect("det session lock poisoned");
            let outputs = session
                .run(inputs![input_ref])
                .map_err(|e| fail(format!("detection inference: {e}")))?;
            let tensor = outputs[0]
                .try_extract_array::<f32>()
                .map_err(|e| fail(format!("detection output: {e}")))?;
            tensor
                .into_owned()
                .into_dimensionality::<ndarray::Ix4>()
                .map_err(|e| fail(format!("detection output shape: {e}")))?
        };

        let pred = prob_map.index_axis(Axis(0), 0);
        let pred = pred.index_axis(Axis(0), 0);

        // Threshold to a binary mask, dilate to close glyph gaps, contour.
        let mut mask = GrayImage::new(resized_w, resized_h);
        for y in 0..resized_h as usize {
            for x in 0..resized_w as usize {
                let on = pred[[y, x]] > DET_THRESH;
                mask.put_pixel(x as u32, y as u32, Luma([if on { 255 } else { 0 }]));
            }
        }
        let mask = dilate(&mask, imageproc::distance_transform::Norm::L1, 1);
        let contours = find_contours::<u32>(&mask);

        let scale_x = image.width() as f32 / resized_w as f32;
        let scale_y = image.height() as f32 / resized_h as f32;

        let mut boxes = Vec::new();
        for contour in &contours {
            if contour.points.is_empty() {
                continue;
            }
            let min_x = contour.points.iter().map(|p| p.x).min().unwrap() as f32;
            let max_x = contour.points.iter().map(|p| p.x).max().unwrap() as f32;
            let min_y = contour.points.iter().map(|p| p.y).min().unwrap() as f32;
            let max_y = contour.points.iter().map(|p| p.y).max().unwrap() as f32;
            let (w, h) = (max_x - min_x, max_y - min_y);
            if w.min(h) < 3.0 {
                continue;
            }

            let score = region_mean(&pred, min_x, min_y, max_x, max_y);
            if score < DET_BOX_THRESH {
                continue;
            }

            // Expand the tight contour rect outward; offset derived from
            // area/perimeter the way DB postprocessing does it.
            let offset = (w * h) * DET_UNCLIP_RATIO / (2.0 * (w + h));
            let x0 = ((min_x - offset) * scale_x).max(0.0);
            let y0 = ((min_y - offset) * scale_y).max(0.0);
            let x1 = ((max_x + offset) * scale_x).min(image.width() as f32);
            let y1 = ((max_y + offset) * scale_y).min(image.height() as f32);
            if x1 - x0 < 3.0 || y1 - y0 < 3.0 {
                continue;
            }

            boxes.push(LineBox {
                x: x0,
                y: y0,
                width: x1 - x0,
                height: y1 - y0,
            });
        }

        Ok(sort_reading_order(boxes))
    }

    /// Recognition stage: CTC-decode one line crop.
    fn read_line(&self, crop: &DynamicImage, page: u32) -> Result<(String, f32), PageError> {
        let fail = |detail: String| PageError::RecognitionFailed { page, detail };

        let input = preprocess_recognition(crop);
        let input_ref: TensorRef<f32> = TensorRef::from_array_view(&input)
            .map_err(|e| fail(format!("recognition input: {e}")))?;

        let logits = {
            let mut session = self.rec_session.lock().expect("rec session lock poisoned");
            let outputs = session
                .run(inputs![input_ref])
                .map_err(|e| fail(format!("recognition inference: {e}")))?;
            let tensor = outputs[0]
                .try_extract_array::<f32>()
                .map_err(|e| fail(format!("recognition output: {e}")))?;
            tensor
                .into_owned()
                .into_dimensionality::<ndarray::Ix3>()
                .map_err(|e| fail(format!("recognition output shape: {e}")))?
        };

        Ok(ctc_decode(logits.index_axis(Axis(0), 0), &self.charset))
    }
}

impl RecognitionEngine for NeuralEngine {
    fn recognize(&self, page: &PageImage) -> Result<RecognitionOutput, PageError> {
        let prepared = prepare_image(page, self.preprocessing);
        let line_boxes = self.detect(&prepared.image, page.page_number)?;
        if line_boxes.is_empty() {
            return Ok(RecognitionOutput::from_words(Vec::new()));
        }

        let mut words = Vec::new();
        for line in &line_boxes {
            let crop = prepared.image.crop_imm(
                line.x as u32,
                line.y as u32,
                (line.width as u32).max(1),
                (line.height as u32).max(1),
            );
            let (text, confidence) = self.read_line(&crop, page.page_number)?;
            let text = text.trim();
            if text.is_empty() || confidence < self.min_confidence {
                continue;
            }

            // Line box → estimated word boxes, divided evenly across the
            // whitespace-separated words; coordinates back in page space.
            let pieces: Vec<&str> = text.split_whitespace().collect();
            let word_width = line.width / pieces.len() as f32;
            for (i, piece) in pieces.iter().enumerate() {
                words.push(RecognizedWord {
                    text: (*piece).to_string(),
                    x: (line.x + i as f32 * word_width) / prepared.scale,
                    y: line.y / prepared.scale,
                    width: word_width / prepared.scale,
                    height: line.height / prepared.scale,
                    confidence,
                });
            }
        }

        debug!(
            "neural: page {} → {} lines, {} words",
            page.page_number,
            line_boxes.len(),
            words.len()
        );
        Ok(RecognitionOutput::from_words(words))
    }

    fn name(&self) -> &'static str {
        "neural"
    }
}

/// A detected text line in prepared-image pixel coordinates.
#[derive(Debug, Clone, Copy)]
struct LineBox {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

fn resolve_model_dir(config: &ConversionConfig) -> Result<PathBuf, ConvertError> {
    if let Some(dir) = &config.model_dir {
        return Ok(dir.clone());
    }
    if let Ok(dir) = std::env::var("OCR2DOCX_MODELS") {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    Err(ConvertError::EngineInit {
        engine: "neural".to_string(),
        detail: "no model directory configured (set model_dir or OCR2DOCX_MODELS)".to_string(),
    })
}

fn load_session(path: &Path) -> Result<Session, ConvertError> {
    Session::builder()
        .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level1))
        .and_then(|b| b.with_intra_threads(4))
        .and_then(|b| b.commit_from_file(path))
        .map_err(|e| ConvertError::EngineInit {
            engine: "neural".to_string(),
            detail: format!("failed to load {}: {e}", path.display()),
        })
}

/// Character set for CTC decoding: index 0 is the blank token, a space is
/// appended at the end, dictionary entries fill the middle.
fn load_charset(path: &Path) -> Result<Vec<String>, ConvertError> {
    let file = std::fs::File::open(path).map_err(|e| ConvertError::EngineInit {
        engine: "neural".to_string(),
        detail: format!("failed to open {}: {e}", path.display()),
    })?;

    let mut charset = vec!["blank".to_string()];
    for line in std::io::BufReader::new(file).lines() {
        let line = line.map_err(|e| ConvertError::EngineInit {
            engine: "neural".to_string(),
            detail: format!("failed to read charset: {e}"),
        })?;
        let ch = line.trim_end_matches(['\r', '\n']).to_string();
        if !ch.is_empty() {
            charset.push(ch);
        }
    }
    charset.push(" ".to_string());
    Ok(charset)
}

/// Resize to a multiple of 32 within the model's side limit and normalise
/// with ImageNet statistics. Returns the NCHW tensor plus mask dimensions.
fn preprocess_detection(image: &DynamicImage) -> (Array4<f32>, u32, u32) {
    let (width, height) = image.dimensions();
    let max_side = width.max(height) as f32;
    let limit = if max_side < 960.0 {
        960.0
    } else if max_side < 1500.0 {
        1500.0
    } else {
        2000.0
    };
    let ratio = if max_side > limit { limit / max_side } else { 1.0 };

    let resize_w = (((width as f32 * ratio) / 32.0).round().max(1.0) as u32) * 32;
    let resize_h = (((height as f32 * ratio) / 32.0).round().max(1.0) as u32) * 32;
    let resized = image.resize_exact(resize_w, resize_h, image::imageops::FilterType::CatmullRom);
    let rgb = resized.to_rgb8();

    let mut array = Array3::<f32>::zeros((3, resize_h as usize, resize_w as usize));
    for y in 0..resize_h {
        for x in 0..resize_w {
            let pixel = rgb.get_pixel(x, y);
            for c in 0..3 {
                array[[c, y as usize, x as usize]] =
                    (pixel[c] as f32 / 255.0 - DET_MEAN[c]) / DET_STD[c];
            }
        }
    }
    (array.insert_axis(Axis(0)), resize_w, resize_h)
}

/// Fixed-height, aspect-preserving resize and [-1, 1] normalisation for the
/// recognition model.
fn preprocess_recognition(crop: &DynamicImage) -> Array4<f32> {
    let (w, h) = crop.dimensions();
    let aspect = w as f32 / h.max(1) as f32;
    let target_w = ((REC_HEIGHT as f32 * aspect).ceil() as u32).clamp(8, REC_MAX_WIDTH);
    let resized = crop.resize_exact(target_w, REC_HEIGHT, image::imageops::FilterType::CatmullRom);
    let rgb = resized.to_rgb8();

    let mut array = Array3::<f32>::zeros((3, REC_HEIGHT as usize, target_w as usize));
    for y in 0..REC_HEIGHT {
        for x in 0..target_w {
            let pixel = rgb.get_pixel(x, y);
            for c in 0..3 {
                array[[c, y as usize, x as usize]] = (pixel[c] as f32 / 255.0 - 0.5) / 0.5;
            }
        }
    }
    array.insert_axis(Axis(0))
}

/// Mean probability inside an axis-aligned region of the prediction map.
fn region_mean(
    pred: &ndarray::ArrayView2<'_, f32>,
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
) -> f32 {
    let (h, w) = (pred.shape()[0], pred.shape()[1]);
    let x0 = (min_x.floor() as usize).min(w - 1);
    let x1 = (max_x.ceil() as usize).min(w - 1);
    let y0 = (min_y.floor() as usize).min(h - 1);
    let y1 = (max_y.ceil() as usize).min(h - 1);

    let mut sum = 0.0f32;
    let mut count = 0u32;
    for y in y0..=y1 {
        for x in x0..=x1 {
            sum += pred[[y, x]];
            count += 1;
        }
    }
    if count > 0 {
        sum / count as f32
    } else {
        0.0
    }
}

/// Greedy CTC decode: argmax per timestep, collapse repeats, drop blanks.
/// Confidence is the mean probability of the emitted characters.
fn ctc_decode(logits: ndarray::ArrayView2<'_, f32>, charset: &[String]) -> (String, f32) {
    let mut text = String::new();
    let mut probs = Vec::new();
    let mut previous = 0usize;

    for step in logits.outer_iter() {
        let (best, score) = step
            .iter()
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |acc, (i, &v)| {
                if v > acc.1 {
                    (i, v)
                } else {
                    acc
                }
            });
        if best != 0 && best != previous {
            if let Some(ch) = charset.get(best) {
                text.push_str(ch);
                probs.push(score);
            }
        }
        previous = best;
    }

    let confidence = if probs.is_empty() {
        0.0
    } else {
        (probs.iter().sum::<f32>() / probs.len() as f32).clamp(0.0, 1.0)
    };
    (text, confidence)
}

/// Sort line boxes top-to-bottom, left-to-right, treating boxes within 10 px
/// vertically as the same visual row.
fn sort_reading_order(mut boxes: Vec<LineBox>) -> Vec<LineBox> {
    if boxes.len() <= 1 {
        return boxes;
    }
    boxes.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));
    let n = boxes.len();
    for i in 0..(n - 1) {
        for j in (0..=i).rev() {
            if j + 1 < n && (boxes[j + 1].y - boxes[j].y).abs() < 10.0 && boxes[j + 1].x < boxes[j].x
            {
                boxes.swap(j, j + 1);
            } else {
                break;
            }
        }
    }
    boxes
}
