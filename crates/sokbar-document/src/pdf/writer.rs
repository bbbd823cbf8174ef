// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Searchable-PDF compositor — one page per image, the image as background, and
// one invisible text run per detection on top, built with `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: a page is a `Vec<Op>` and the document
// is serialised via `PdfDocument::save()`.
//
// Page space is the image's pixel grid with 1 pt = 1 px, so the only transform
// needed is the vertical flip: PDF y grows upward from the bottom edge, image y
// grows downward from the top edge.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use image::RgbImage;
use lopdf::{Document, Encoding, Object, StringFormat};
use printpdf::{
    BuiltinFont, FontId, Mm, Op, ParsedFont, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg,
    Point, Pt, RawImage, RawImageData, RawImageFormat, TextItem, TextRenderingMode,
    XObjectTransform,
};
use sokbar_core::error::{Result, SokbarError};
use sokbar_core::types::{Detection, Page};
use tracing::{debug, info, instrument, warn};

/// Millimetres per PostScript point.
const MM_PER_PT: f32 = 25.4 / 72.0;

/// DPI at which one image pixel renders as one point.
const PIXEL_EXACT_DPI: f32 = 72.0;

/// Font used for the invisible text layer.
#[derive(Clone)]
pub enum FontChoice {
    /// A TrueType font parsed from disk and embedded in each PDF.
    Embedded { name: String, font: ParsedFont },
    /// One of the 14 standard PDF fonts. Latin-only coverage.
    Builtin(BuiltinFont),
}

impl FontChoice {
    /// Helvetica, the fallback when no Unicode font is available.
    pub fn fallback() -> Self {
        Self::Builtin(BuiltinFont::Helvetica)
    }

    /// Parse the font at `path`, or fall back to Helvetica.
    ///
    /// Call once at start-up and share the result. A missing or unparsable
    /// font is not an error: a warning is logged and the builtin font is
    /// returned. Characters Helvetica cannot encode may come out wrong in the
    /// selectable text.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            debug!("No text-layer font configured; using Helvetica");
            return Self::fallback();
        };
        match Self::try_load(path) {
            Ok(choice) => {
                info!(font = %path.display(), "Text-layer font registered");
                choice
            }
            Err(err) => {
                warn!(%err, "Font registration failed; using Helvetica");
                Self::fallback()
            }
        }
    }

    /// Parse the font at `path`.
    pub fn try_load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|err| {
            SokbarError::FontError(format!("cannot read {}: {}", path.display(), err))
        })?;
        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let font = ParsedFont::from_bytes(&bytes, 0, &mut warnings).ok_or_else(|| {
            SokbarError::FontError(format!("{} is not a usable TrueType font", path.display()))
        })?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "embedded".to_string());
        Ok(Self::Embedded { name, font })
    }

    /// Whether this is the builtin fallback.
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Builtin(_))
    }
}

impl fmt::Debug for FontChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedded { name, .. } => f.debug_tuple("Embedded").field(name).finish(),
            Self::Builtin(font) => f.debug_tuple("Builtin").field(font).finish(),
        }
    }
}

/// Font resolved against one document.
enum DocFont {
    Embedded(FontId),
    Builtin(BuiltinFont),
}

/// Where and how large a detection's text run is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextPlacement {
    /// Text origin x in points, the box's left edge.
    pub x: f32,
    /// Baseline y in points from the bottom of the page.
    pub baseline_y: f32,
    /// Font size in points.
    pub font_size: f32,
}

/// Font-sizing heuristic for text runs.
///
/// The size approximates cap height from the box height; it is not fitted to
/// font metrics. Since the text is invisible, only the selectable region it
/// covers matters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextLayout {
    /// Floor for the computed font size.
    pub min_font_size: f32,
    /// Box height to font size ratio.
    pub font_size_factor: f32,
}

impl Default for TextLayout {
    fn default() -> Self {
        Self {
            min_font_size: 8.0,
            font_size_factor: 0.8,
        }
    }
}

impl TextLayout {
    pub fn new(min_font_size: f32, font_size_factor: f32) -> Self {
        Self {
            min_font_size,
            font_size_factor,
        }
    }

    /// Place `detection` on a page `page_height` points tall.
    pub fn place(&self, detection: &Detection, page_height: f32) -> TextPlacement {
        let bbox = detection.quad.bounding_box();
        let scaled = (bbox.height() * self.font_size_factor).round();
        TextPlacement {
            x: bbox.x_min,
            baseline_y: page_height - bbox.y_max,
            font_size: scaled.max(self.min_font_size),
        }
    }
}

/// Builds searchable PDFs from an upright image and its ordered detections.
#[derive(Debug, Clone)]
pub struct SearchablePdfWriter {
    font: FontChoice,
    layout: TextLayout,
    /// Title metadata embedded in the PDF /Info dictionary.
    title: Option<String>,
}

impl SearchablePdfWriter {
    pub fn new(font: FontChoice, layout: TextLayout) -> Self {
        Self {
            font,
            layout,
            title: None,
        }
    }

    /// Set a title for the PDF metadata.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    pub fn font(&self) -> &FontChoice {
        &self.font
    }

    pub fn layout(&self) -> TextLayout {
        self.layout
    }

    /// Compose a single-page searchable PDF.
    ///
    /// `page.detections` are emitted in their current order, which should be
    /// reading order. The image must have the page's dimensions.
    #[instrument(skip_all, fields(width = page.width_px, height = page.height_px, runs = page.detections.len()))]
    pub fn compose(&self, image: &RgbImage, page: &Page) -> Result<Vec<u8>> {
        let (width, height) = image.dimensions();
        if (width, height) != (page.width_px, page.height_px) {
            return Err(SokbarError::PdfError(format!(
                "image is {}x{} but page is {}x{}",
                width, height, page.width_px, page.height_px
            )));
        }
        if width == 0 || height == 0 {
            return Err(SokbarError::PdfError("cannot compose an empty image".into()));
        }

        let title = self.title.as_deref().unwrap_or("sökbar scan");
        let mut doc = PdfDocument::new(title);

        let raw = RawImage {
            pixels: RawImageData::U8(image.as_raw().clone()),
            width: width as usize,
            height: height as usize,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };
        let xobject_id = doc.add_image(&raw);

        let font = match &self.font {
            FontChoice::Embedded { font, .. } => DocFont::Embedded(doc.add_font(font)),
            FontChoice::Builtin(builtin) => DocFont::Builtin(*builtin),
        };

        let mut ops: Vec<Op> = Vec::with_capacity(1 + page.detections.len() * 6);
        ops.push(Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(0.0)),
                translate_y: Some(Pt(0.0)),
                scale_x: Some(1.0),
                scale_y: Some(1.0),
                dpi: Some(PIXEL_EXACT_DPI),
                rotate: None,
            },
        });

        let page_height = height as f32;
        for detection in &page.detections {
            let placement = self.layout.place(detection, page_height);
            push_text_run(&mut ops, &placement, &detection.text, &font);
        }

        let pdf_page = PdfPage::new(px_to_mm(width), px_to_mm(height), ops);
        doc.with_pages(vec![pdf_page]);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            debug!(warnings = warnings.len(), "printpdf reported warnings");
        }
        let output = match font {
            DocFont::Builtin(_) => reencode_builtin_text(&output)?,
            DocFont::Embedded(_) => output,
        };

        debug!(bytes = output.len(), "Searchable PDF composed");
        Ok(output)
    }

    /// Compose and write `<output_dir>/<source stem>.pdf`.
    pub fn write_to_file(
        &self,
        image: &RgbImage,
        page: &Page,
        source: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        let bytes = self.compose(image, page)?;
        let path = pdf_output_path(source, output_dir);
        std::fs::write(&path, &bytes)?;
        info!(path = %path.display(), "PDF with invisible text layer saved");
        Ok(path)
    }
}

/// One self-contained text section: invisible render mode, size, origin,
/// a single line of text.
fn push_text_run(ops: &mut Vec<Op>, placement: &TextPlacement, text: &str, font: &DocFont) {
    let size = Pt(placement.font_size);
    let items = vec![TextItem::Text(text.to_string())];

    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextRenderingMode {
        mode: TextRenderingMode::Invisible,
    });
    match font {
        DocFont::Embedded(id) => ops.push(Op::SetFontSize {
            size,
            font: id.clone(),
        }),
        DocFont::Builtin(builtin) => ops.push(Op::SetFontSizeBuiltinFont {
            size,
            font: *builtin,
        }),
    }
    ops.push(Op::SetTextCursor {
        pos: Point {
            x: Pt(placement.x),
            y: Pt(placement.baseline_y),
        },
    });
    match font {
        DocFont::Embedded(id) => ops.push(Op::WriteText {
            items,
            font: id.clone(),
        }),
        DocFont::Builtin(builtin) => ops.push(Op::WriteTextBuiltinFont {
            items,
            font: *builtin,
        }),
    }
    ops.push(Op::EndTextSection);
}

/// Rewrite every text string on every page into its font's declared encoding.
///
/// printpdf emits builtin-font strings as raw UTF-8 under a /WinAnsiEncoding
/// font dictionary, so anything outside ASCII extracts as mojibake. Characters
/// the encoding lacks are dropped.
fn reencode_builtin_text(pdf: &[u8]) -> Result<Vec<u8>> {
    let mut doc = Document::load_mem(pdf).map_err(lopdf_error)?;
    let page_ids: Vec<_> = doc.get_pages().into_values().collect();

    for page_id in page_ids {
        let content = {
            let encodings: BTreeMap<Vec<u8>, Encoding> = doc
                .get_page_fonts(page_id)
                .map_err(lopdf_error)?
                .into_iter()
                .filter_map(|(name, font)| font.get_font_encoding(&doc).ok().map(|e| (name, e)))
                .collect();
            let mut content = doc.get_and_decode_page_content(page_id).map_err(lopdf_error)?;
            let mut current = None;
            for operation in &mut content.operations {
                match operation.operator.as_str() {
                    "Tf" => {
                        current = operation
                            .operands
                            .first()
                            .and_then(|name| name.as_name().ok())
                            .and_then(|name| encodings.get(name));
                    }
                    "Tj" | "TJ" => {
                        if let Some(encoding) = current {
                            for operand in &mut operation.operands {
                                reencode_operand(operand, encoding);
                            }
                        }
                    }
                    _ => {}
                }
            }
            content.encode().map_err(lopdf_error)?
        };
        doc.change_page_content(page_id, content).map_err(lopdf_error)?;
    }

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|err| SokbarError::PdfError(format!("failed to serialise PDF: {}", err)))?;
    Ok(output)
}

fn reencode_operand(operand: &mut Object, encoding: &Encoding) {
    match operand {
        Object::String(bytes, format) => {
            let Ok(text) = std::str::from_utf8(bytes) else {
                return;
            };
            let encoded = Document::encode_text(encoding, text);
            *bytes = encoded;
            *format = StringFormat::Hexadecimal;
        }
        Object::Array(items) => {
            for item in items {
                reencode_operand(item, encoding);
            }
        }
        _ => {}
    }
}

fn lopdf_error(err: lopdf::Error) -> SokbarError {
    SokbarError::PdfError(err.to_string())
}

fn px_to_mm(px: u32) -> Mm {
    Mm(px as f32 * MM_PER_PT)
}

/// `<output_dir>/<stem>.pdf` for an input image path.
pub fn pdf_output_path(source: &Path, output_dir: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "page".to_string());
    output_dir.join(format!("{stem}.pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use lopdf::content::Content;
    use sokbar_core::types::Quad;

    fn detection(x0: f32, y0: f32, x1: f32, y1: f32, text: &str) -> Detection {
        Detection::new(Quad::from_rect(x0, y0, x1, y1), text, 0.9)
    }

    fn page_operators(bytes: &[u8]) -> (Document, Vec<lopdf::content::Operation>) {
        let doc = Document::load_mem(bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let page_id = pages[&1];
        let content = doc.get_page_content(page_id).unwrap();
        let ops = Content::decode(&content).unwrap().operations;
        (doc, ops)
    }

    fn media_box(doc: &Document) -> Vec<f32> {
        let page_id = doc.get_pages()[&1];
        let page = doc.get_dictionary(page_id).unwrap();
        let media_box = match page.get(b"MediaBox") {
            Ok(obj) => obj.clone(),
            Err(_) => {
                let parent = page.get(b"Parent").unwrap().as_reference().unwrap();
                doc.get_dictionary(parent).unwrap().get(b"MediaBox").unwrap().clone()
            }
        };
        let array = match media_box {
            Object::Reference(id) => doc.get_object(id).unwrap().as_array().unwrap().clone(),
            other => other.as_array().unwrap().clone(),
        };
        array.iter().map(|o| o.as_float().unwrap()).collect()
    }

    #[test]
    fn baseline_is_flipped_from_box_bottom() {
        let quad = Quad::new([
            (10.0, 20.0).into(),
            (110.0, 20.0).into(),
            (110.0, 40.0).into(),
            (10.0, 40.0).into(),
        ]);
        let placement = TextLayout::default().place(&Detection::new(quad, "Kvitto", 1.0), 200.0);
        assert_eq!(placement.baseline_y, 160.0);
        assert_eq!(placement.x, 10.0);
        // round(20 * 0.8) = 16
        assert_eq!(placement.font_size, 16.0);
    }

    #[test]
    fn font_size_never_below_floor() {
        let layout = TextLayout::default();
        let small = layout.place(&detection(0.0, 0.0, 30.0, 5.0, "liten"), 100.0);
        assert_eq!(small.font_size, 8.0);
        let tiny = layout.place(&detection(0.0, 0.0, 30.0, 0.0, ""), 100.0);
        assert_eq!(tiny.font_size, 8.0);
    }

    #[test]
    fn font_size_rounds_to_nearest() {
        let layout = TextLayout::default();
        // 13 * 0.8 = 10.4 -> 10, 14 * 0.8 = 11.2 -> 11, 16 * 0.8 = 12.8 -> 13
        assert_eq!(layout.place(&detection(0.0, 0.0, 1.0, 13.0, "a"), 50.0).font_size, 10.0);
        assert_eq!(layout.place(&detection(0.0, 0.0, 1.0, 14.0, "a"), 50.0).font_size, 11.0);
        assert_eq!(layout.place(&detection(0.0, 0.0, 1.0, 16.0, "a"), 50.0).font_size, 13.0);
    }

    #[test]
    fn custom_layout_constants() {
        let layout = TextLayout::new(4.0, 0.5);
        let placement = layout.place(&detection(0.0, 0.0, 10.0, 6.0, "a"), 50.0);
        assert_eq!(placement.font_size, 4.0);
    }

    #[test]
    fn compose_emits_one_invisible_run_per_detection() {
        let image = RgbImage::from_pixel(120, 80, Rgb([255, 255, 255]));
        let page = Page::new(
            120,
            80,
            vec![
                detection(10.0, 10.0, 60.0, 24.0, "Faktura"),
                detection(10.0, 30.0, 90.0, 44.0, "SEB 2023"),
                detection(10.0, 50.0, 20.0, 60.0, ""),
            ],
        );
        let writer = SearchablePdfWriter::new(FontChoice::fallback(), TextLayout::default());
        let bytes = writer.compose(&image, &page).unwrap();

        let (doc, ops) = page_operators(&bytes);
        let text_sections = ops.iter().filter(|op| op.operator == "BT").count();
        assert_eq!(text_sections, 3);

        let invisible = ops
            .iter()
            .filter(|op| op.operator == "Tr")
            .all(|op| op.operands.first().and_then(|o| o.as_i64().ok()) == Some(3));
        assert!(invisible);
        assert_eq!(ops.iter().filter(|op| op.operator == "Tr").count(), 3);

        let media = media_box(&doc);
        assert!((media[2] - 120.0).abs() < 0.05, "width {:?}", media);
        assert!((media[3] - 80.0).abs() < 0.05, "height {:?}", media);
    }

    #[test]
    fn builtin_font_text_extracts_as_written() {
        let image = RgbImage::from_pixel(200, 40, Rgb([255, 255, 255]));
        let page = Page::new(200, 40, vec![detection(5.0, 5.0, 150.0, 30.0, "Malmö Åsa")]);
        let writer = SearchablePdfWriter::new(FontChoice::fallback(), TextLayout::default());
        let bytes = writer.compose(&image, &page).unwrap();

        let (doc, ops) = page_operators(&bytes);
        let shown = ops
            .iter()
            .find(|op| op.operator == "Tj" || op.operator == "TJ")
            .unwrap();
        let raw = match &shown.operands[0] {
            Object::String(bytes, _) => bytes.clone(),
            Object::Array(items) => match &items[0] {
                Object::String(bytes, _) => bytes.clone(),
                other => panic!("unexpected TJ item {other:?}"),
            },
            other => panic!("unexpected operand {other:?}"),
        };
        // WinAnsi: ö = 0xF6, Å = 0xC5
        assert_eq!(raw, b"Malm\xf6 \xc5sa");

        let text = doc.extract_text(&[1]).unwrap();
        assert_eq!(text.trim_end(), "Malmö Åsa");
    }

    #[test]
    fn compose_rejects_mismatched_page() {
        let image = RgbImage::new(10, 10);
        let page = Page::new(20, 10, Vec::new());
        let writer = SearchablePdfWriter::new(FontChoice::fallback(), TextLayout::default());
        assert!(matches!(writer.compose(&image, &page), Err(SokbarError::PdfError(_))));
    }

    #[test]
    fn compose_page_without_detections() {
        let image = RgbImage::from_pixel(30, 40, Rgb([0, 0, 0]));
        let writer = SearchablePdfWriter::new(FontChoice::fallback(), TextLayout::default());
        let bytes = writer.compose(&image, &Page::new(30, 40, Vec::new())).unwrap();
        let (_, ops) = page_operators(&bytes);
        assert_eq!(ops.iter().filter(|op| op.operator == "BT").count(), 0);
        assert!(ops.iter().any(|op| op.operator == "Do"));
    }

    #[test]
    fn missing_font_falls_back_to_builtin() {
        let choice = FontChoice::load(Some(Path::new("/nonexistent/arial-unicode-ms.ttf")));
        assert!(choice.is_builtin());
        assert!(FontChoice::load(None).is_builtin());
    }

    #[test]
    fn garbage_font_is_font_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font at all").unwrap();
        assert!(matches!(FontChoice::try_load(&path), Err(SokbarError::FontError(_))));
    }

    #[test]
    fn output_path_uses_stem() {
        assert_eq!(
            pdf_output_path(Path::new("/scans/brev 1.jpeg"), Path::new("/out")),
            PathBuf::from("/out/brev 1.pdf")
        );
    }

    #[test]
    fn write_to_file_creates_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let image = RgbImage::from_pixel(20, 20, Rgb([200, 200, 200]));
        let page = Page::new(20, 20, vec![detection(1.0, 1.0, 19.0, 10.0, "Hej")]);
        let writer = SearchablePdfWriter::new(FontChoice::fallback(), TextLayout::default());
        let path = writer
            .write_to_file(&image, &page, Path::new("sida.png"), dir.path())
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "sida.pdf");
        assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF"));
    }
}
