// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// sokbar-document — Image-to-searchable-PDF processing.
//
// Provides orientation correction of source images, the text-detector seam
// (with an `ocrs` backend behind the `ocr` feature), reading-order sorting,
// key-detail classification, and composition of PDFs that carry the source image
// plus an invisible text layer.

pub mod image;
pub mod layout;
pub mod pdf;
pub mod scan;

// Re-export the primary structs so callers can use `sokbar_document::PagePipeline` etc.
pub use self::image::orientation::{NormalizedImage, OrientationPolicy, normalize_in_place};
pub use self::image::overlay::load_label_font;
pub use layout::reading_order::{ReadingOrder, order_detections};
pub use pdf::merge::PdfMerger;
pub use pdf::writer::{FontChoice, SearchablePdfWriter, TextLayout};
pub use scan::detect::{SharedDetector, TextDetector};
pub use scan::key_details::KeyDetailClassifier;
pub use scan::pipeline::{PageOutcome, PagePipeline};

#[cfg(feature = "ocr")]
pub use scan::ocr::OcrsDetector;
