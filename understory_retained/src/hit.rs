// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Exact hit testing.
//!
//! Top-level elements are tested in reverse display order and children before their
//! container, so the topmost visual element containing the point wins. Box containment
//! is inclusive on every edge: a point on the shared edge of two siblings goes to the
//! one painted later.
//!
//! Elements that are not visible, or whose eased opacity is not positive, are skipped
//! along with their subtrees, matching what the rasterizer paints.
//!
//! Each element maps the incoming point through the inverse of its transform before
//! testing; the mapped point is what its children receive. A transform that cannot be
//! inverted is reported as [`Recoverable::NonInvertibleTransform`] and the point is used
//! as-is.
//!
//! ## Container precedence
//!
//! 1. The shell is the element's own geometric test, with the capability filters
//!    cleared. A container with [`CONSTRAIN_CHILD_HIT_TESTS`](ElementFlags::CONSTRAIN_CHILD_HIT_TESTS)
//!    whose shell misses rejects the point outright.
//! 2. The container claims the hit for itself if its shell contains the point, self hit
//!    tests are enabled, and [`ElementBehavior::hit_test_interior`](crate::ElementBehavior::hit_test_interior)
//!    agrees.
//! 3. Children are tested in reverse display order; any child hit overrides the claim.

use kurbo::{Affine, Point, Rect};

use crate::diag::{Recoverable, RecoverableLog};
use crate::element::{Element, ElementFlags, ElementId};
use crate::layout::LayoutProvider;
use crate::tree::ElementTree;

/// Capability filters for [`HitTester::hit_test`].
///
/// A filter set to `Some(v)` requires the matching flag to equal `v`. Requiring either
/// capability also requires the element to be enabled.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct HitTestOptions {
    /// Filter on [`ElementFlags::ACCEPTS_MOUSE_INPUT`].
    pub accepts_mouse_input: Option<bool>,
    /// Filter on [`ElementFlags::ACCEPTS_FOCUS`].
    pub accepts_focus: Option<bool>,
    /// Discard a winner that reports itself intangible at the hit point.
    pub reject_intangible: bool,
}

impl HitTestOptions {
    /// Options for pointer routing: only enabled elements that accept mouse input.
    pub const fn mouse() -> Self {
        Self {
            accepts_mouse_input: Some(true),
            accepts_focus: None,
            reject_intangible: true,
        }
    }

    /// Options for focus routing: only enabled elements that accept focus.
    pub const fn focus() -> Self {
        Self {
            accepts_mouse_input: None,
            accepts_focus: Some(true),
            reject_intangible: false,
        }
    }

    /// Returns `true` if `flags` pass every filter that is set.
    pub fn matches(&self, flags: ElementFlags) -> bool {
        let filter_ok = |filter: Option<bool>, flag: ElementFlags| {
            filter.is_none_or(|want| flags.contains(flag) == want)
        };
        if !filter_ok(self.accepts_mouse_input, ElementFlags::ACCEPTS_MOUSE_INPUT)
            || !filter_ok(self.accepts_focus, ElementFlags::ACCEPTS_FOCUS)
        {
            return false;
        }
        let requires_enabled =
            self.accepts_mouse_input == Some(true) || self.accepts_focus == Some(true);
        !requires_enabled || flags.contains(ElementFlags::ENABLED)
    }

    fn cleared(self) -> Self {
        Self {
            accepts_mouse_input: None,
            accepts_focus: None,
            ..self
        }
    }
}

/// Result of a successful hit test.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Hit {
    /// The winning element.
    pub element: ElementId,
    /// The query point in the winner's local coordinates.
    pub local_point: Point,
}

/// Exact hit tester.
///
/// Holds the recoverable-condition log and the frame index used to key cached child
/// orderings. Set the frame index to the rasterizer's so hit tests reuse the ordering
/// computed for the frame on screen.
#[derive(Debug, Default)]
pub struct HitTester {
    log: RecoverableLog,
    frame_index: u64,
}

impl HitTester {
    /// Creates a hit tester.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the frame index used for cached child orderings.
    pub fn set_frame_index(&mut self, frame_index: u64) {
        self.frame_index = frame_index;
    }

    /// Recoverable-condition counters.
    pub fn recoverable(&self) -> &RecoverableLog {
        &self.log
    }

    /// Finds the topmost element containing `point` (canvas coordinates).
    pub fn hit_test(
        &mut self,
        tree: &ElementTree,
        layout: &dyn LayoutProvider,
        point: Point,
        options: &HitTestOptions,
        now: f64,
    ) -> Option<Hit> {
        let (roots, _) = tree.roots_in_display_order();
        roots
            .iter()
            .rev()
            .find_map(|&id| self.hit_test_element(tree, layout, id, point, options, now))
    }

    /// Hit tests the subtree rooted at `id`. `point` is in the coordinates of `id`'s
    /// parent.
    pub fn hit_test_element(
        &mut self,
        tree: &ElementTree,
        layout: &dyn LayoutProvider,
        id: ElementId,
        point: Point,
        options: &HitTestOptions,
        now: f64,
    ) -> Option<Hit> {
        let hit = self.test(tree, layout, id, point, options, now)?;
        let winner = tree.get(hit.element);
        assert!(winner.is_some(), "hit test produced a dead winner");
        if options.reject_intangible
            && winner.is_some_and(|el| el.behavior.is_intangible_at(hit.local_point) == Some(true))
        {
            return None;
        }
        Some(hit)
    }

    /// Maps `point` from canvas coordinates into `id`'s local coordinates by applying
    /// the inverse transforms of its ancestors and itself, outermost first.
    pub fn transform_point_to_local(
        &mut self,
        tree: &ElementTree,
        layout: &dyn LayoutProvider,
        id: ElementId,
        point: Point,
        now: f64,
    ) -> Point {
        let mut chain: Vec<ElementId> = tree.ancestors(id).collect();
        chain.reverse();
        chain.push(id);
        chain.into_iter().fold(point, |p, n| {
            let Some(el) = tree.get(n) else {
                return p;
            };
            match layout.rects(el.layout_key) {
                Some(rects) => self.map_to_local(el, n, rects.rect, p, now),
                None => p,
            }
        })
    }

    fn map_to_local(&mut self, el: &Element, id: ElementId, rect: Rect, point: Point, now: f64) -> Point {
        let Some(transform) = el.transform.as_ref() else {
            return point;
        };
        let matrix = transform.global_matrix(rect, now);
        if matrix == Affine::IDENTITY {
            return point;
        }
        let det = matrix.determinant();
        if det == 0.0 || !det.is_finite() {
            self.log.report(Recoverable::NonInvertibleTransform, id);
            return point;
        }
        matrix.inverse() * point
    }

    fn test(
        &mut self,
        tree: &ElementTree,
        layout: &dyn LayoutProvider,
        id: ElementId,
        point: Point,
        options: &HitTestOptions,
        now: f64,
    ) -> Option<Hit> {
        let el = tree.get(id)?;
        if !el.flags.contains(ElementFlags::VISIBLE) || el.opacity.value(now) <= 0.0 {
            return None;
        }
        let rect = layout.rects(el.layout_key)?.rect;
        let local = self.map_to_local(el, id, rect, point, now);
        if !el.is_container() {
            return leaf_test(el, rect, local, options).then_some(Hit {
                element: id,
                local_point: local,
            });
        }

        let flags = el.flags;
        let shell = leaf_test(el, rect, local, &options.cleared());
        if !shell && flags.contains(ElementFlags::CONSTRAIN_CHILD_HIT_TESTS) {
            return None;
        }
        let claims_self = shell
            && !flags.contains(ElementFlags::DISABLE_SELF_HIT_TESTS)
            && el.behavior.hit_test_interior(rect, local, options, flags);
        if !flags.intersects(ElementFlags::DISABLE_CHILD_HIT_TESTS | ElementFlags::HIDE_CHILDREN) {
            let (ordered, _) = tree.children_in_display_order(id, self.frame_index);
            for &child in ordered.iter().rev() {
                if let Some(hit) = self.test(tree, layout, child, local, options, now) {
                    return Some(hit);
                }
            }
        }
        claims_self.then_some(Hit {
            element: id,
            local_point: local,
        })
    }
}

/// Geometric and capability test for a single element.
fn leaf_test(el: &Element, rect: Rect, local: Point, options: &HitTestOptions) -> bool {
    !el.flags.contains(ElementFlags::INTANGIBLE)
        && options.matches(el.flags)
        && el.behavior.hit_test_shell(rect, local)
}
