// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Input discovery. Command-line paths may name image files or directories;
// directories are walked recursively for PNG and JPEG files.

use std::path::{Path, PathBuf};

use sokbar_core::error::{Result, SokbarError};
use tracing::{debug, warn};

/// Extensions accepted as input images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Whether `path` has an accepted image extension.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
}

/// Expand `paths` into the ordered list of images to process.
///
/// Files are kept in the order given. Each directory contributes its images
/// sorted by path. Explicit files with an unsupported extension are an error;
/// unsupported files found inside directories are skipped.
pub fn discover(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found = Vec::new();
            walk(path, &mut found)?;
            found.sort();
            debug!(dir = %path.display(), images = found.len(), "Directory scanned");
            images.extend(found);
        } else if is_supported_image(path) {
            images.push(path.clone());
        } else if !path.exists() {
            return Err(SokbarError::UnsupportedInput(format!(
                "{} does not exist",
                path.display()
            )));
        } else {
            return Err(SokbarError::UnsupportedInput(format!(
                "{} is not a PNG or JPEG image",
                path.display()
            )));
        }
    }

    if images.is_empty() {
        return Err(SokbarError::NoInputs);
    }
    Ok(images)
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(err) => {
                warn!(path = %path.display(), %err, "Skipping unreadable entry");
                continue;
            }
        };
        if file_type.is_dir() {
            walk(&path, found)?;
        } else if is_supported_image(&path) {
            found.push(path);
        }
    }
    Ok(())
}
