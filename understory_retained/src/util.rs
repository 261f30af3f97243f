// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use kurbo::{Point, Rect};

/// Inclusive containment on all four edges.
///
/// Shared-edge points belong to both neighbors; display order decides the winner.
pub(crate) fn contains_inclusive(rect: Rect, pt: Point) -> bool {
    pt.x >= rect.x0 && pt.x <= rect.x1 && pt.y >= rect.y0 && pt.y <= rect.y1
}

/// Intersection of two rectangles, or `None` when they do not overlap with positive area.
pub(crate) fn intersect(a: Rect, b: Rect) -> Option<Rect> {
    let r = a.intersect(b);
    (r.width() > 0.0 && r.height() > 0.0).then_some(r)
}

pub(crate) fn has_area(rect: Rect) -> bool {
    rect.width() > 0.0 && rect.height() > 0.0
}

/// Closest point inside `rect` to `pt`.
pub(crate) fn clamp_point(rect: Rect, pt: Point) -> Point {
    Point::new(pt.x.clamp(rect.x0, rect.x1), pt.y.clamp(rect.y0, rect.y1))
}

/// Distance rounded to tenths, half away from zero, as an integer for total ordering.
#[expect(
    clippy::cast_possible_truncation,
    reason = "distances are bounded by the search radius"
)]
pub(crate) fn round_tenths(distance: f64) -> i64 {
    (distance * 10.0).round() as i64
}

/// Converts a nesting depth to a stencil reference, saturating at the 8-bit limit.
pub(crate) fn stencil_ref(depth: i32) -> u8 {
    u8::try_from(depth.max(0)).unwrap_or(u8::MAX)
}
