// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Layout module — reading order of detected text regions.

pub mod reading_order;

pub use reading_order::{ReadingOrder, order_detections};
