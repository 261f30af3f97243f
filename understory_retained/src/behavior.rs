// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-kind element strategy.
//!
//! Widgets customize how the walkers treat them by implementing [`ElementBehavior`]
//! instead of overriding walker internals. Every hook has a documented default, so a
//! widget only implements what it changes.

use kurbo::{Point, Rect};

use crate::decor::{DecorationContext, DecorationKind, DecorationSettings, Decorator};
use crate::draw::Renderer;
use crate::element::ElementFlags;
use crate::fuzzy::{FuzzyCandidate, FuzzyQuery, FuzzySink};
use crate::hit::HitTestOptions;
use crate::util;

/// Capability set for one kind of element.
pub trait ElementBehavior {
    /// Decorator family requested from the active provider when the element has no
    /// explicit decorator. Default: none.
    fn decoration_kind(&self) -> Option<DecorationKind> {
        None
    }

    /// Runs once per frame before the Content pass, and also when the element takes the
    /// hidden path (with [`ElementStates::INVISIBLE`](crate::ElementStates::INVISIBLE) set)
    /// so buffered or animated state keeps advancing while culled. Default: nothing.
    fn pre_rasterize(&self, cx: &DecorationContext, settings: &DecorationSettings) {
        let _ = (cx, settings);
    }

    /// Paints one pass. Default: delegate to the resolved decorator, if any.
    fn rasterize(
        &self,
        cx: &DecorationContext,
        renderer: &mut Renderer<'_>,
        settings: &DecorationSettings,
        decorator: Option<&dyn Decorator>,
    ) {
        if let Some(d) = decorator {
            d.rasterize(cx, renderer, settings);
        }
    }

    /// Whether the element must go through a scratch surface.
    ///
    /// `has_opacity` is true when effective opacity is below one, `has_transform` when a
    /// non-identity transform is active. Default: either one. Returning `false` with a
    /// transform renders the subtree under a deferred view transform instead.
    fn needs_composition(&self, has_opacity: bool, has_transform: bool) -> bool {
        has_opacity || has_transform
    }

    /// Geometric test for the element's own shape, in local coordinates.
    /// Default: inclusive box containment.
    fn hit_test_shell(&self, rect: Rect, point: Point) -> bool {
        util::contains_inclusive(rect, point)
    }

    /// Whether a container may claim a hit for itself once its shell contains the point.
    ///
    /// Default: the element's capability flags match every filter that is set.
    fn hit_test_interior(
        &self,
        rect: Rect,
        point: Point,
        options: &HitTestOptions,
        flags: ElementFlags,
    ) -> bool {
        let _ = (rect, point);
        options.matches(flags)
    }

    /// Partial intangibility: `Some(true)` if `point` (local coordinates) falls in a
    /// region that should not be hit. `None` means the element has no such regions.
    fn is_intangible_at(&self, point: Point) -> Option<bool> {
        let _ = point;
        None
    }

    /// Reports fine-grained fuzzy targets instead of (or in addition to) the element
    /// box. Returns the number of candidates pushed; any positive count suppresses the
    /// element's own box entry. Default: none.
    fn fuzzy_hot_spots(
        &self,
        query: &FuzzyQuery<'_>,
        this: &FuzzyCandidate,
        sink: &mut FuzzySink<'_>,
    ) -> usize {
        let _ = (query, this, sink);
        0
    }

    /// Whether the fuzzy walker descends into children. Default: yes.
    fn fuzzy_walk_children(&self) -> bool {
        true
    }

    /// Modal elements stop the fuzzy walker from reaching siblings beneath them.
    fn blocks_hit_tests(&self) -> bool {
        false
    }
}

/// Behavior with every default.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultBehavior;

impl ElementBehavior for DefaultBehavior {}
