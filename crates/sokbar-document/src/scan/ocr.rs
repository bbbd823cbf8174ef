// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `ocrs` text detector backend.
//
// Uses the `ocrs` crate, a pure-Rust OCR engine whose neural network models are
// executed via `rten`, to turn an upright RGB page into line-level detections
// with geometry.
//
// # Feature Gate
//
// This module is only available when the `ocr` feature is enabled:
//
// ```toml
// sokbar-document = { path = "crates/sokbar-document", features = ["ocr"] }
// ```
//
// # Model Setup
//
// Two model files are required:
//
// - **Detection model** (`text-detection.rten`) — locates text regions.
// - **Recognition model** (`text-recognition.rten`) — decodes characters.
//
// Running `ocrs-cli` once downloads both into `$XDG_CACHE_HOME/ocrs`
// (typically `~/.cache/ocrs`), which is the default model directory.
// The language coverage of the output is whatever the models were trained on.

use std::path::{Path, PathBuf};

use image::RgbImage;
use ocrs::{ImageSource, OcrEngine as OcrsEngine, OcrEngineParams, TextItem};
use rten::Model;
use rten_imageproc::RotatedRect;
use sokbar_core::error::{Result, SokbarError};
use sokbar_core::types::{Detection, Point, Quad};
use tracing::{debug, info, instrument};

use super::detect::TextDetector;

/// `ocrs` reports no per-line score, so every detection carries this.
const LINE_CONFIDENCE: f32 = 1.0;

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// Default directory for cached OCR model files.
///
/// `$XDG_CACHE_HOME/ocrs`, falling back to `~/.cache/ocrs`.
fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("model")
    }
}

/// Where to load the two `.rten` models from.
#[derive(Debug, Clone)]
pub struct OcrModelPaths {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
}

impl Default for OcrModelPaths {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrModelPaths {
    /// Expect `text-detection.rten` and `text-recognition.rten` in `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    /// Use `dir` when given, else the ocrs cache directory.
    pub fn resolve(dir: Option<&Path>) -> Self {
        dir.map(Self::from_dir).unwrap_or_default()
    }

    /// Both model files must exist before loading is attempted.
    pub fn validate(&self) -> Result<()> {
        for path in [&self.detection_model_path, &self.recognition_model_path] {
            if !path.exists() {
                return Err(SokbarError::DetectorInit(format!(
                    "OCR model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Line-level text detector backed by `ocrs`.
///
/// Construct once per process; loading the models is the expensive step.
pub struct OcrsDetector {
    engine: OcrsEngine,
}

impl OcrsDetector {
    /// Load both models. Any failure is a [`SokbarError::DetectorInit`].
    ///
    /// Build `ocrs` and `rten` in release mode; debug builds are 10-100x slower.
    #[instrument(skip_all, fields(
        detection = %paths.detection_model_path.display(),
        recognition = %paths.recognition_model_path.display(),
    ))]
    pub fn new(paths: &OcrModelPaths) -> Result<Self> {
        paths.validate()?;

        info!("Loading OCR detection model");
        let detection_model = load_model(&paths.detection_model_path)?;
        info!("Loading OCR recognition model");
        let recognition_model = load_model(&paths.recognition_model_path)?;

        let engine = OcrsEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| {
            SokbarError::DetectorInit(format!("failed to initialise OCR engine: {}", err))
        })?;

        info!("OCR engine initialised");
        Ok(Self { engine })
    }

    /// Load models from `dir`, or the ocrs cache when `None`.
    pub fn from_model_dir(dir: Option<&Path>) -> Result<Self> {
        Self::new(&OcrModelPaths::resolve(dir))
    }
}

fn load_model(path: &Path) -> Result<Model> {
    Model::load_file(path).map_err(|err| {
        SokbarError::DetectorInit(format!("failed to load model from {}: {}", path.display(), err))
    })
}

impl TextDetector for OcrsDetector {
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>> {
        let (width, height) = image.dimensions();
        let source = ImageSource::from_bytes(image.as_raw(), (width, height)).map_err(|err| {
            SokbarError::OcrError(format!(
                "failed to create image source ({}x{}): {}",
                width, height, err
            ))
        })?;

        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| SokbarError::OcrError(format!("OCR preprocessing failed: {}", err)))?;

        let word_rects = self
            .engine
            .detect_words(&input)
            .map_err(|err| SokbarError::OcrError(format!("word detection failed: {}", err)))?;
        debug!(word_count = word_rects.len(), "Words detected");

        let line_rects = self.engine.find_text_lines(&input, &word_rects);
        debug!(line_count = line_rects.len(), "Text lines found");

        let lines = self
            .engine
            .recognize_text(&input, &line_rects)
            .map_err(|err| SokbarError::OcrError(format!("line recognition failed: {}", err)))?;

        let detections: Vec<Detection> = lines
            .iter()
            .flatten()
            .map(|line| {
                Detection::new(quad_from_rotated(&line.rotated_rect()), line.to_string(), LINE_CONFIDENCE)
            })
            .collect();

        info!(recognized_lines = detections.len(), "OCR complete");
        Ok(detections)
    }

    fn backend_name(&self) -> &str {
        "ocrs"
    }
}

/// Axis-aligned quad around a rotated rect, corners in TL, TR, BR, BL order.
fn quad_from_rotated(rect: &RotatedRect) -> Quad {
    let corners = rect.corners();
    let mut min = Point::new(f32::INFINITY, f32::INFINITY);
    let mut max = Point::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
    for corner in corners.iter() {
        min.x = min.x.min(corner.x);
        min.y = min.y.min(corner.y);
        max.x = max.x.max(corner.x);
        max.y = max.y.max(corner.y);
    }
    Quad::from_rect(min.x, min.y, max.x, max.y)
}

/// Whether both model files exist in the default cache location.
pub fn models_available() -> bool {
    OcrModelPaths::default().validate().is_ok()
}
