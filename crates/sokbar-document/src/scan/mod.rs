// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning pipeline — text detection, key-detail extraction, and the
// per-image pipeline tying them to the PDF compositor.

pub mod detect;
pub mod key_details;
pub mod pipeline;

#[cfg(feature = "ocr")]
pub mod ocr;

pub use detect::{SharedDetector, TextDetector};
pub use key_details::KeyDetailClassifier;
pub use pipeline::{PageOutcome, PagePipeline};

#[cfg(feature = "ocr")]
pub use ocr::OcrsDetector;
