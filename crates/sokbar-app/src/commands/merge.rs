// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `sokbar merge` — concatenate existing PDFs.

use std::path::{Path, PathBuf};

use sokbar_core::error::Result;
use sokbar_document::PdfMerger;

pub fn run(inputs: &[PathBuf], output: &Path) -> Result<()> {
    let pages = PdfMerger::new().merge_files(inputs, output)?;
    eprintln!(
        "Merged {} file(s), {} page(s), into {}",
        inputs.len(),
        pages,
        output.display()
    );
    Ok(())
}
