// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-text dumps of a run: every transcribed line, and every key detail.
//
// Both files are truncated when the run opens them and then grow image by
// image, so after a run they hold exactly that run's output in processing
// order.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use sokbar_core::error::Result;
use sokbar_core::types::KeyDetail;
use sokbar_document::PageOutcome;
use tracing::debug;

/// Open handles on the transcript and key-detail files.
pub struct DumpFiles {
    text_path: PathBuf,
    key_details_path: PathBuf,
    text: BufWriter<File>,
    key_details: BufWriter<File>,
}

impl DumpFiles {
    /// Create or truncate both files.
    pub fn create(text_path: &Path, key_details_path: &Path) -> Result<Self> {
        Ok(Self {
            text_path: text_path.to_path_buf(),
            key_details_path: key_details_path.to_path_buf(),
            text: BufWriter::new(truncate(text_path)?),
            key_details: BufWriter::new(truncate(key_details_path)?),
        })
    }

    /// Append one image's transcript and key details, one per line.
    pub fn append(&mut self, outcome: &PageOutcome) -> Result<()> {
        for line in outcome.transcript() {
            writeln!(self.text, "{line}")?;
        }
        self.append_key_details(&outcome.key_details)?;
        self.flush()?;
        debug!(
            lines = outcome.page.detections.len(),
            key_details = outcome.key_details.len(),
            "Dumps appended"
        );
        Ok(())
    }

    fn append_key_details(&mut self, details: &[KeyDetail]) -> Result<()> {
        for detail in details {
            writeln!(self.key_details, "{detail}")?;
        }
        Ok(())
    }

    /// Push buffered lines to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.text.flush()?;
        self.key_details.flush()?;
        Ok(())
    }

    pub fn text_path(&self) -> &Path {
        &self.text_path
    }

    pub fn key_details_path(&self) -> &Path {
        &self.key_details_path
    }
}

fn truncate(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?)
}
