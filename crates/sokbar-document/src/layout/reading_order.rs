// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reading-order sequencer.
//
// One global stable sort on the top-left corner: y first, then x. This is not a
// row-clustering layout engine; runs whose top edges are a pixel or two apart
// sort by y alone, so adjacent rows of a slightly skewed scan can interleave.

use std::cmp::Ordering;

use sokbar_core::types::{Detection, Page};

/// Sort `detections` top-to-bottom, then left-to-right, by their quads'
/// top-left corners. Equal keys keep their detector emission order.
pub fn order_detections(detections: &mut [Detection]) {
    detections.sort_by(reading_order);
}

/// Comparator behind [`order_detections`].
pub fn reading_order(a: &Detection, b: &Detection) -> Ordering {
    let (pa, pb) = (a.quad.top_left(), b.quad.top_left());
    pa.y.total_cmp(&pb.y).then_with(|| pa.x.total_cmp(&pb.x))
}

/// Put a page's detections in reading order.
pub trait ReadingOrder {
    fn into_reading_order(self) -> Self;
}

impl ReadingOrder for Page {
    fn into_reading_order(mut self) -> Self {
        order_detections(&mut self.detections);
        self
    }
}
