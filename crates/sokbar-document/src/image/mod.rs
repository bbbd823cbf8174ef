// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module — orientation correction and detection overlays.

pub mod orientation;
pub mod overlay;

pub use orientation::{NormalizedImage, OrientationPolicy, normalize_in_place};
pub use overlay::{draw_detections, load_label_font};
