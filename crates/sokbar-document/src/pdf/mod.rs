// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — searchable-PDF composition and merging of single-page outputs.

pub mod merge;
pub mod writer;

pub use merge::PdfMerger;
pub use writer::{FontChoice, SearchablePdfWriter, TextLayout, TextPlacement};
