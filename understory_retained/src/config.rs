// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tunable parameters for rasterization and fuzzy hit testing.

use kurbo::Rect;

/// When the children walker opens a fresh layer context for a sibling.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlaneSplit {
    /// Split whenever the display order value changes between consecutive visited siblings,
    /// but only when the sibling range actually spans more than one order value.
    #[default]
    ByDisplayOrder,
    /// Split before every sibling after the first.
    ///
    /// Siblings never share Below/Content/Above surfaces, at the cost of more groups.
    EverySibling,
}

/// Configuration for a [`Rasterizer`](crate::Rasterizer).
#[derive(Clone, Debug, PartialEq)]
pub struct RasterConfig {
    /// Canvas bounds in device pixels. Scratch regions are clamped to this rectangle.
    pub canvas: Rect,
    /// Padding added around a composited element's box to leave room for effects.
    ///
    /// A [`Compositor`](crate::Compositor) may override this per element.
    pub compositor_padding: f64,
    /// Padding added around visible regions before culling against them.
    pub visibility_padding: f64,
    /// Upper bound on pooled scratch targets. Acquires beyond this fail soft.
    pub max_scratch_targets: usize,
    /// Plane-split policy for siblings.
    pub plane_split: PlaneSplit,
    /// Number of occurrences of each recoverable condition logged individually.
    pub log_burst: u32,
    /// After the burst, log only every `log_every`-th occurrence.
    pub log_every: u32,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            canvas: Rect::new(0.0, 0.0, 1920.0, 1080.0),
            compositor_padding: 16.0,
            visibility_padding: 16.0,
            max_scratch_targets: 8,
            plane_split: PlaneSplit::ByDisplayOrder,
            log_burst: 4,
            log_every: 256,
        }
    }
}

impl RasterConfig {
    /// Returns the config with a different canvas rectangle.
    pub fn with_canvas(mut self, canvas: Rect) -> Self {
        self.canvas = canvas;
        self
    }

    /// Visible region used for top-level elements.
    pub fn root_visible_region(&self) -> Rect {
        self.canvas.inflate(self.visibility_padding, self.visibility_padding)
    }
}

/// Configuration for [`FuzzyHitTest`](crate::FuzzyHitTest).
#[derive(Clone, Debug, PartialEq)]
pub struct FuzzyConfig {
    /// Clip rectangle for top-level elements.
    pub canvas: Rect,
    /// Search radius used by [`FuzzyHitTest::run_default`](crate::FuzzyHitTest::run_default).
    pub max_distance: f64,
    /// Candidates at or below this distance (and tangible at their closest point) count as
    /// directly under the query point.
    pub direct_hit_threshold: f64,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            canvas: Rect::new(0.0, 0.0, 1920.0, 1080.0),
            max_distance: 64.0,
            direct_hit_threshold: 0.05,
        }
    }
}
