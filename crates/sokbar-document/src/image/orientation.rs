// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Orientation normaliser — decode a source image, apply its embedded
// orientation tag so the pixels are upright, and (by default) write the
// corrected pixels back over the input file.
//
// The write-back is destructive: the uncorrected original is gone after the
// first run. It only happens when a correction was applied, which makes a
// second pass over the same file a no-op that leaves its bytes untouched.

use std::path::{Path, PathBuf};

use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader, RgbImage};
use sokbar_core::error::{Result, SokbarError};
use tracing::{debug, info, instrument, warn};

/// What to do with corrected pixels once the orientation tag has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrientationPolicy {
    /// Overwrite the input file with the corrected image.
    #[default]
    Persist,
    /// Keep the correction in memory only.
    InMemory,
}

impl OrientationPolicy {
    pub fn from_persist_flag(persist: bool) -> Self {
        if persist { Self::Persist } else { Self::InMemory }
    }
}

/// An upright source image, ready for detection and composition.
pub struct NormalizedImage {
    /// Path the image was read from (and possibly written back to).
    pub source_path: PathBuf,
    /// Upright pixels in the decoder's native colour model.
    pub image: DynamicImage,
    /// The orientation tag found in the file.
    pub orientation: Orientation,
    /// Whether corrected pixels were written back to `source_path`.
    pub persisted: bool,
}

impl NormalizedImage {
    /// Width in pixels after correction.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels after correction.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// The pixels as 8-bit RGB with no alpha channel — the single colour model
    /// handed to the detector and embedded in the PDF.
    pub fn to_detector_input(&self) -> RgbImage {
        self.image.to_rgb8()
    }
}

/// Decode `path`, make it upright, and apply `policy` to the result.
///
/// Orientation metadata that cannot be read is not an error: the image is used
/// as stored and a warning is logged. Decode failures and failed write-backs
/// are errors.
#[instrument(skip_all, fields(path = %path.as_ref().display(), ?policy))]
pub fn normalize_in_place(
    path: impl AsRef<Path>,
    policy: OrientationPolicy,
) -> Result<NormalizedImage> {
    let path = path.as_ref();

    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|err| {
            SokbarError::ImageError(format!("failed to open {}: {}", path.display(), err))
        })?;
    let format = reader.format();

    let mut decoder = reader.into_decoder().map_err(|err| {
        SokbarError::ImageError(format!("failed to decode {}: {}", path.display(), err))
    })?;

    let orientation = match decoder.orientation() {
        Ok(orientation) => orientation,
        Err(err) => {
            warn!(%err, "Orientation metadata unreadable; using image as stored");
            Orientation::NoTransforms
        }
    };

    let mut image = DynamicImage::from_decoder(decoder).map_err(|err| {
        SokbarError::ImageError(format!("failed to decode {}: {}", path.display(), err))
    })?;

    let corrected = orientation != Orientation::NoTransforms;
    if corrected {
        image.apply_orientation(orientation);
        info!(?orientation, "Orientation corrected");
    } else {
        debug!("No orientation correction needed");
    }

    let persisted = corrected && policy == OrientationPolicy::Persist;
    if persisted {
        write_back(&image, path, format)?;
    }

    debug!(
        width = image.width(),
        height = image.height(),
        persisted,
        "Image normalised"
    );

    Ok(NormalizedImage {
        source_path: path.to_path_buf(),
        image,
        orientation,
        persisted,
    })
}

/// Overwrite `path` with `image`, keeping the format the file was decoded as.
fn write_back(image: &DynamicImage, path: &Path, format: Option<ImageFormat>) -> Result<()> {
    let result = match format {
        Some(format) => image.save_with_format(path, format),
        None => image.save(path),
    };
    result.map_err(|err| {
        SokbarError::ImageError(format!(
            "failed to write corrected image back to {}: {}",
            path.display(),
            err
        ))
    })?;
    info!(
        path = %path.display(),
        "Overwrote original image file with orientation-corrected version"
    );
    Ok(())
}
