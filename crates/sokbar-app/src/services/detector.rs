// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Detector construction for the binary.
//
// The returned handle is lazy: models load on the first image, and a load
// failure surfaces there as a fatal `DetectorInit` error.

use std::path::PathBuf;

#[cfg(not(feature = "ocr"))]
use sokbar_core::error::SokbarError;
use sokbar_document::SharedDetector;
#[cfg(feature = "ocr")]
use sokbar_document::TextDetector;

/// The process-wide detector, built from `model_dir` on first use.
#[cfg(feature = "ocr")]
pub fn shared_detector(model_dir: Option<PathBuf>) -> SharedDetector {
    use sokbar_document::OcrsDetector;

    SharedDetector::lazy(move || {
        let detector = OcrsDetector::from_model_dir(model_dir.as_deref())?;
        Ok(Box::new(detector) as Box<dyn TextDetector>)
    })
}

/// Without the `ocr` feature there is no backend; the first image fails.
#[cfg(not(feature = "ocr"))]
pub fn shared_detector(model_dir: Option<PathBuf>) -> SharedDetector {
    SharedDetector::lazy(move || {
        Err(SokbarError::DetectorInit(format!(
            "built without the `ocr` feature; cannot load models{}",
            model_dir
                .as_ref()
                .map(|dir| format!(" from {}", dir.display()))
                .unwrap_or_default()
        )))
    })
}
