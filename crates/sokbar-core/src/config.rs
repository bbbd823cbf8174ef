// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SokbarError};
use crate::types::ProperNameMode;

/// Settings for converting images to searchable PDFs.
///
/// Every field has a default, so a config file only needs to name what it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory receiving PDFs, dumps and overlays.
    pub output_dir: PathBuf,
    /// Unicode TrueType font embedded for the text layer. Helvetica is used
    /// when this is unset or fails to load.
    pub font_path: Option<PathBuf>,
    /// Smallest font size (pt) emitted for a text run.
    pub min_font_size: f32,
    /// Box height to font size ratio.
    pub font_size_factor: f32,
    /// Write orientation-corrected pixels back to the input file.
    pub persist_orientation: bool,
    /// Save a `<stem>_detect.<ext>` image with detection outlines.
    pub write_overlay: bool,
    /// Tail check used by the proper-name rule.
    pub proper_name_mode: ProperNameMode,
    /// Directory holding the `.rten` OCR models. `None` uses the ocrs cache.
    pub model_dir: Option<PathBuf>,
    /// Transcription dump file name inside `output_dir`.
    pub text_dump_file: String,
    /// Key-detail dump file name inside `output_dir`.
    pub key_details_dump_file: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            font_path: Some(PathBuf::from("arial-unicode-ms.ttf")),
            min_font_size: 8.0,
            font_size_factor: 0.8,
            persist_orientation: true,
            write_overlay: false,
            proper_name_mode: ProperNameMode::RawTail,
            model_dir: None,
            text_dump_file: "text.txt".into(),
            key_details_dump_file: "names.txt".into(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|err| {
            SokbarError::Config(format!("cannot read {}: {}", path.display(), err))
        })?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Reject values that would produce unusable output.
    pub fn validate(&self) -> Result<()> {
        if !(self.font_size_factor.is_finite() && self.font_size_factor > 0.0) {
            return Err(SokbarError::Config(format!(
                "font_size_factor must be positive, got {}",
                self.font_size_factor
            )));
        }
        if !(self.min_font_size.is_finite() && self.min_font_size >= 0.0) {
            return Err(SokbarError::Config(format!(
                "min_font_size must not be negative, got {}",
                self.min_font_size
            )));
        }
        if self.text_dump_file.is_empty() || self.key_details_dump_file.is_empty() {
            return Err(SokbarError::Config("dump file names must not be empty".into()));
        }
        Ok(())
    }

    pub fn text_dump_path(&self) -> PathBuf {
        self.output_dir.join(&self.text_dump_file)
    }

    pub fn key_details_dump_path(&self) -> PathBuf {
        self.output_dir.join(&self.key_details_dump_file)
    }
}
