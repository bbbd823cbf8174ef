// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for sökbar.

use thiserror::Error;

/// Top-level error type for all sökbar operations.
#[derive(Debug, Error)]
pub enum SokbarError {
    // -- Input errors --
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("no input images found")]
    NoInputs,

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Recognition errors --
    #[error("text detector could not be constructed: {0}")]
    DetectorInit(String),

    #[error("OCR failed: {0}")]
    OcrError(String),

    // -- Output errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("font could not be loaded: {0}")]
    FontError(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SokbarError {
    /// Whether this error must abort a whole batch instead of only the file
    /// that produced it.
    ///
    /// Only a detector that cannot be built is fatal: every later file would
    /// fail the same way.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DetectorInit(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SokbarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_detector_init_is_fatal() {
        assert!(SokbarError::DetectorInit("missing model".into()).is_fatal());
        assert!(!SokbarError::OcrError("bad line".into()).is_fatal());
        assert!(!SokbarError::ImageError("truncated".into()).is_fatal());
        assert!(!SokbarError::NoInputs.is_fatal());
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SokbarError = io.into();
        assert!(err.to_string().contains("gone"));
    }
}
