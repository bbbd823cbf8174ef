// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Detection overlay — a debugging copy of the page with every detected quad
// outlined and its recognised text written at the quad's top-left corner, for
// checking what the detector saw before trusting the text layer.

use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut};
use sokbar_core::error::{Result, SokbarError};
use sokbar_core::types::Detection;
use tracing::{debug, info, instrument, warn};

/// Outline colour for detected regions.
const OUTLINE: Rgb<u8> = Rgb([255, 0, 0]);

/// Colour of the recognised-text labels.
const LABEL: Rgb<u8> = Rgb([0, 0, 255]);

/// Smallest label height in pixels.
const MIN_LABEL_PX: f32 = 10.0;

/// Load the font used to label overlay regions.
///
/// Overlays are a debugging aid, so a missing or unparsable font only costs
/// the labels: a warning is logged and `None` is returned.
pub fn load_label_font(path: Option<&Path>) -> Option<FontArc> {
    let path = path?;
    let font = std::fs::read(path)
        .map_err(|err| err.to_string())
        .and_then(|bytes| FontArc::try_from_vec(bytes).map_err(|err| err.to_string()));
    match font {
        Ok(font) => Some(font),
        Err(err) => {
            warn!(font = %path.display(), %err, "Overlay labels disabled");
            None
        }
    }
}

/// Return a copy of `image` with each detection's quad drawn as a closed
/// two-pixel outline, labelled with its text when `label_font` is given.
pub fn draw_detections(
    image: &RgbImage,
    detections: &[Detection],
    label_font: Option<&FontArc>,
) -> RgbImage {
    let mut canvas = image.clone();
    for detection in detections {
        let corners = detection.quad.corners();
        for i in 0..corners.len() {
            let a = corners[i];
            let b = corners[(i + 1) % corners.len()];
            draw_line_segment_mut(&mut canvas, (a.x, a.y), (b.x, b.y), OUTLINE);
            draw_line_segment_mut(&mut canvas, (a.x + 1.0, a.y + 1.0), (b.x + 1.0, b.y + 1.0), OUTLINE);
        }

        if let Some(font) = label_font
            && !detection.text.is_empty()
        {
            let bbox = detection.quad.bounding_box();
            let scale = PxScale::from(bbox.height().max(MIN_LABEL_PX));
            draw_text_mut(
                &mut canvas,
                LABEL,
                bbox.x_min as i32,
                bbox.y_min as i32,
                scale,
                font,
                &detection.text,
            );
        }
    }
    debug!(
        regions = detections.len(),
        labelled = label_font.is_some(),
        "Detection overlay drawn"
    );
    canvas
}

/// Path of the overlay image for `source`: `<output_dir>/<stem>_detect.<ext>`.
pub fn overlay_path(source: &Path, output_dir: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".to_string());
    let ext = source
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    output_dir.join(format!("{stem}_detect.{ext}"))
}

/// Draw the overlay and save it next to the other outputs.
#[instrument(skip_all, fields(source = %source.display()))]
pub fn write_overlay(
    image: &RgbImage,
    detections: &[Detection],
    label_font: Option<&FontArc>,
    source: &Path,
    output_dir: &Path,
) -> Result<PathBuf> {
    let path = overlay_path(source, output_dir);
    draw_detections(image, detections, label_font).save(&path).map_err(|err| {
        SokbarError::ImageError(format!(
            "failed to save detection overlay to {}: {}",
            path.display(),
            err
        ))
    })?;
    info!(path = %path.display(), "Detection overlay saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sokbar_core::types::Quad;

    #[test]
    fn outline_is_drawn_on_quad_edges_only() {
        let page = RgbImage::from_pixel(50, 50, Rgb([255, 255, 255]));
        let detection = Detection::new(Quad::from_rect(10.0, 10.0, 30.0, 20.0), "Kvitto", 0.9);

        let overlay = draw_detections(&page, &[detection], None);

        assert_eq!(overlay.get_pixel(10, 10), &OUTLINE);
        assert_eq!(overlay.get_pixel(20, 20), &OUTLINE);
        assert_eq!(overlay.get_pixel(20, 15), &Rgb([255, 255, 255]));
        // The source image is left alone.
        assert_eq!(page.get_pixel(10, 10), &Rgb([255, 255, 255]));
    }

    #[test]
    fn no_label_colour_without_font() {
        let page = RgbImage::from_pixel(60, 40, Rgb([255, 255, 255]));
        let detection = Detection::new(Quad::from_rect(5.0, 5.0, 50.0, 30.0), "Malmö", 0.9);

        let overlay = draw_detections(&page, &[detection], None);

        assert!(overlay.pixels().all(|px| *px != LABEL));
    }

    #[test]
    fn unusable_label_font_disables_labels() {
        let dir = tempfile::tempdir().unwrap();
        let garbage = dir.path().join("trasig.ttf");
        std::fs::write(&garbage, b"inte en font").unwrap();

        assert!(load_label_font(None).is_none());
        assert!(load_label_font(Some(&dir.path().join("saknas.ttf"))).is_none());
        assert!(load_label_font(Some(&garbage)).is_none());
    }

    #[test]
    fn overlay_path_keeps_extension() {
        let path = overlay_path(Path::new("/in/scan 01.JPG"), Path::new("/out"));
        assert_eq!(path, PathBuf::from("/out/scan 01_detect.JPG"));
    }

    #[test]
    fn write_overlay_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let page = RgbImage::from_pixel(20, 20, Rgb([0, 0, 0]));
        let path = write_overlay(&page, &[], None, Path::new("page.png"), dir.path()).unwrap();
        assert!(path.exists());
    }
}
