// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-image pipeline: normalise → detect → order → classify → compose.
//
// One call handles one image end to end and owns everything it builds. Nothing
// is carried over between images except the shared detector and the writer's
// font.

use std::path::{Path, PathBuf};

use ab_glyph::FontArc;
use sokbar_core::error::Result;
use sokbar_core::types::{KeyDetail, Page};
use tracing::{debug, info, instrument};

use super::detect::SharedDetector;
use super::key_details::KeyDetailClassifier;
use crate::image::orientation::{OrientationPolicy, normalize_in_place};
use crate::image::overlay::write_overlay;
use crate::layout::reading_order::ReadingOrder;
use crate::pdf::writer::SearchablePdfWriter;

/// What one image produced.
#[derive(Debug, Clone)]
pub struct PageOutcome {
    pub source: PathBuf,
    /// The written `<stem>.pdf`.
    pub pdf_path: PathBuf,
    /// Detections in reading order.
    pub page: Page,
    pub key_details: Vec<KeyDetail>,
    /// `<stem>_detect.<ext>` when overlays are enabled.
    pub overlay_path: Option<PathBuf>,
    /// Whether the corrected image was written back over the source.
    pub orientation_persisted: bool,
}

impl PageOutcome {
    /// Transcribed texts in reading order.
    pub fn transcript(&self) -> impl Iterator<Item = &str> {
        self.page.texts()
    }
}

/// Borrowed collaborators for processing images one at a time.
#[derive(Debug)]
pub struct PagePipeline<'a> {
    detector: &'a SharedDetector,
    writer: &'a SearchablePdfWriter,
    classifier: KeyDetailClassifier,
    policy: OrientationPolicy,
    write_overlay: bool,
    overlay_font: Option<FontArc>,
}

impl<'a> PagePipeline<'a> {
    pub fn new(detector: &'a SharedDetector, writer: &'a SearchablePdfWriter) -> Self {
        Self {
            detector,
            writer,
            classifier: KeyDetailClassifier::default(),
            policy: OrientationPolicy::default(),
            write_overlay: false,
            overlay_font: None,
        }
    }

    pub fn with_classifier(mut self, classifier: KeyDetailClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_orientation_policy(mut self, policy: OrientationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_overlay(mut self, enabled: bool) -> Self {
        self.write_overlay = enabled;
        self
    }

    /// Label overlay regions with their text in `font`.
    pub fn with_overlay_font(mut self, font: Option<FontArc>) -> Self {
        self.overlay_font = font;
        self
    }

    /// Run the whole pipeline for `input`, writing outputs into `output_dir`.
    ///
    /// With [`OrientationPolicy::Persist`] the input file may be overwritten
    /// with its upright version.
    #[instrument(skip_all, fields(input = %input.display()))]
    pub fn process(&self, input: &Path, output_dir: &Path) -> Result<PageOutcome> {
        let normalized = normalize_in_place(input, self.policy)?;
        let rgb = normalized.to_detector_input();

        let detections = self.detector.detect(&rgb)?;
        let page = Page::new(rgb.width(), rgb.height(), detections).into_reading_order();
        debug!(detections = page.detections.len(), "Detections ordered");

        let key_details = self.classifier.extract(page.texts());

        let pdf_path = self.writer.write_to_file(&rgb, &page, input, output_dir)?;

        let overlay_path = if self.write_overlay {
            Some(write_overlay(
                &rgb,
                &page.detections,
                self.overlay_font.as_ref(),
                input,
                output_dir,
            )?)
        } else {
            None
        };

        info!(
            pdf = %pdf_path.display(),
            detections = page.detections.len(),
            key_details = key_details.len(),
            "Image processed"
        );

        Ok(PageOutcome {
            source: input.to_path_buf(),
            pdf_path,
            page,
            key_details,
            overlay_path,
            orientation_persisted: normalized.persisted,
        })
    }
}
