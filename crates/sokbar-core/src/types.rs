// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the sökbar pipeline.
//
// All geometry is in image pixel space: origin at the top-left corner, x to the
// right, y increasing downward. Conversion to PDF page space happens only in the
// compositor.

use serde::{Deserialize, Serialize};

/// A point in image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Four-corner polygon around a detected text region.
///
/// Corners are stored as top-left, top-right, bottom-right, bottom-left. The
/// fixed-size array makes a quad with any other number of points unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad(pub [Point; 4]);

impl Quad {
    /// Build a quad from four corners in TL, TR, BR, BL order.
    pub fn new(corners: [Point; 4]) -> Self {
        Self(corners)
    }

    /// Axis-aligned quad covering `[x_min, x_max] x [y_min, y_max]`.
    pub fn from_rect(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self([
            Point::new(x_min, y_min),
            Point::new(x_max, y_min),
            Point::new(x_max, y_max),
            Point::new(x_min, y_max),
        ])
    }

    pub fn corners(&self) -> &[Point; 4] {
        &self.0
    }

    /// The first corner, used as the reading-order key.
    pub fn top_left(&self) -> Point {
        self.0[0]
    }

    /// Axis-aligned bounds from the min/max of all four corners.
    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox {
            x_min: f32::INFINITY,
            y_min: f32::INFINITY,
            x_max: f32::NEG_INFINITY,
            y_max: f32::NEG_INFINITY,
        };
        for p in &self.0 {
            bbox.x_min = bbox.x_min.min(p.x);
            bbox.y_min = bbox.y_min.min(p.y);
            bbox.x_max = bbox.x_max.max(p.x);
            bbox.y_max = bbox.y_max.max(p.y);
        }
        bbox
    }
}

/// Axis-aligned rectangle in image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }
}

/// One OCR hit: where the text is, what it says, and how sure the detector was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub quad: Quad,
    /// Recognised text. May be empty.
    pub text: String,
    /// Detector confidence in `[0, 1]`. Carried through, never used to filter.
    pub confidence: f32,
}

impl Detection {
    pub fn new(quad: Quad, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            quad,
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// One corrected source image and everything the detector found on it.
///
/// A page lives for exactly one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub width_px: u32,
    pub height_px: u32,
    /// Detector emission order until the page has been put in reading order.
    pub detections: Vec<Detection>,
}

impl Page {
    pub fn new(width_px: u32, height_px: u32, detections: Vec<Detection>) -> Self {
        Self {
            width_px,
            height_px,
            detections,
        }
    }

    /// Detection texts in the page's current order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.detections.iter().map(|d| d.text.as_str())
    }
}

/// Which heuristic surfaced a key detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyDetailKind {
    /// Two or more uppercase letters, optionally dotted (`NASA`, `EU.SE`).
    Acronym,
    /// `Capitalised-Capitalised` (`Smith-Jones`).
    HyphenatedName,
    /// A standalone four-digit number.
    Year,
    /// A capitalised word with an otherwise lowercase tail.
    ProperName,
}

impl KeyDetailKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Acronym => "acronym",
            Self::HyphenatedName => "hyphenated name",
            Self::Year => "year",
            Self::ProperName => "proper name",
        }
    }
}

impl std::fmt::Display for KeyDetailKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A transcribed string the classifier considers worth surfacing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDetail {
    pub text: String,
    pub kind: KeyDetailKind,
}

impl std::fmt::Display for KeyDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Which part of the text the proper-name rule requires to be lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProperNameMode {
    /// Everything after the first character of the *raw* text.
    ///
    /// Leading punctuation therefore counts: `"(Smith"` is rejected because
    /// its raw tail `"Smith"` contains an uppercase letter.
    #[default]
    RawTail,
    /// Everything after the first character of the sanitised text.
    SanitizedTail,
}
