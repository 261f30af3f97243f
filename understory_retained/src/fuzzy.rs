// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fuzzy hit testing: every element near a point, ranked.
//!
//! The walk visits siblings in reverse display order, clipping each element's box to
//! the intersection of its ancestors' boxes. Invisible and intangible elements are
//! skipped. Once the point falls inside a sibling, or a sibling reports
//! [`blocks_hit_tests`](crate::ElementBehavior::blocks_hit_tests), the siblings below it
//! are not visited.
//!
//! An element contributes its own clipped box only if nothing nested inside it matched:
//! neither a fine-grained hot spot reported through
//! [`fuzzy_hot_spots`](crate::ElementBehavior::fuzzy_hot_spots) nor a descendant.
//! Elements rejected by the predicate still count as matches for that purpose.
//!
//! ## Ranking
//!
//! Results are sorted by a total order:
//!
//! 1. Candidates directly under the point (distance at or below the direct-hit threshold
//!    and tangible at their closest point) come first, by distance.
//! 2. Other candidates follow, deepest first, then by distance.
//!
//! Distances are rounded to tenths before comparing, and the visit sequence breaks any
//! remaining tie, so the same tree and point always yield the same output.

use core::fmt;

use kurbo::{Point, Rect};

use crate::config::FuzzyConfig;
use crate::element::{Element, ElementFlags, ElementId};
use crate::layout::LayoutProvider;
use crate::tree::ElementTree;
use crate::util;

/// Optional filter applied to candidates before they are reported.
pub type FuzzyPredicate<'a> = &'a dyn Fn(ElementId, &Element) -> bool;

/// One ranked fuzzy hit.
#[derive(Clone, Debug, PartialEq)]
pub struct FuzzyCandidate {
    /// Element the candidate belongs to.
    pub element: ElementId,
    /// Tree depth, zero for top-level elements. Hot spots sit one below their element.
    pub depth: u32,
    /// Distance from the query point to `closest_point`.
    pub distance: f64,
    /// Nearest point of the clipped box to the query point.
    pub closest_point: Point,
    /// The element reported itself intangible at `closest_point`.
    pub intangible_at_closest: bool,
    /// Unclipped box.
    pub rect: Rect,
    /// Box clipped by every ancestor.
    pub clipped_rect: Rect,
    seq: u32,
}

impl FuzzyCandidate {
    /// Visit order, used as the final ranking tie-breaker.
    pub fn sequence(&self) -> u32 {
        self.seq
    }

    /// Returns `true` if this candidate counts as directly under the query point.
    pub fn is_direct(&self, threshold: f64) -> bool {
        self.distance <= threshold && !self.intangible_at_closest
    }

    fn rank_key(&self, threshold: f64) -> (u8, i64, i64, u32) {
        let distance = util::round_tenths(self.distance);
        if self.is_direct(threshold) {
            (0, 0, distance, self.seq)
        } else {
            (1, -i64::from(self.depth), distance, self.seq)
        }
    }
}

/// Inputs of a running fuzzy walk, handed to hot-spot hooks.
pub struct FuzzyQuery<'a> {
    /// Query point in canvas coordinates.
    pub point: Point,
    /// Square of the search radius.
    pub max_distance_sq: f64,
    /// The tree being walked.
    pub tree: &'a ElementTree,
    predicate: Option<FuzzyPredicate<'a>>,
}

impl fmt::Debug for FuzzyQuery<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuzzyQuery")
            .field("point", &self.point)
            .field("max_distance_sq", &self.max_distance_sq)
            .field("has_predicate", &self.predicate.is_some())
            .finish_non_exhaustive()
    }
}

impl FuzzyQuery<'_> {
    /// Distance and closest point from the query point to `rect`, if within range.
    pub fn measure(&self, rect: Rect) -> Option<(f64, Point)> {
        let rect = rect.abs();
        if util::contains_inclusive(rect, self.point) {
            return Some((0.0, self.point));
        }
        let closest = util::clamp_point(rect, self.point);
        let distance_sq = (self.point - closest).hypot2();
        (distance_sq <= self.max_distance_sq).then(|| (distance_sq.sqrt(), closest))
    }

    /// Returns `true` if the predicate (if any) accepts `element`.
    pub fn accepts(&self, id: ElementId, element: &Element) -> bool {
        self.predicate.is_none_or(|p| p(id, element))
    }

    /// Builds a hot-spot candidate for `this` element covering `rect`.
    ///
    /// The rect is clipped to the element's clipped box and placed one level deeper.
    /// Returns `None` if it is clipped away or out of range.
    pub fn hot_spot(&self, this: &FuzzyCandidate, rect: Rect) -> Option<FuzzyCandidate> {
        let clipped = util::intersect(rect.abs(), this.clipped_rect)?;
        let (distance, closest_point) = self.measure(clipped)?;
        Some(FuzzyCandidate {
            element: this.element,
            depth: this.depth + 1,
            distance,
            closest_point,
            intangible_at_closest: false,
            rect,
            clipped_rect: clipped,
            seq: 0,
        })
    }
}

/// Output buffer handed to hot-spot hooks.
#[derive(Debug)]
pub struct FuzzySink<'a> {
    results: &'a mut Vec<FuzzyCandidate>,
    next_seq: u32,
}

impl FuzzySink<'_> {
    /// Adds a candidate, stamping its visit sequence.
    pub fn push(&mut self, mut candidate: FuzzyCandidate) {
        candidate.seq = self.next_seq;
        self.next_seq += 1;
        self.results.push(candidate);
    }
}

/// Reusable fuzzy hit tester.
///
/// Each [`run`](Self::run) clears and repopulates the same result buffer.
#[derive(Debug, Default)]
pub struct FuzzyHitTest {
    config: FuzzyConfig,
    results: Vec<FuzzyCandidate>,
    point: Point,
    frame_index: u64,
}

impl FuzzyHitTest {
    /// Creates a tester.
    pub fn new(config: FuzzyConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Sets the frame index used for cached child orderings.
    pub fn set_frame_index(&mut self, frame_index: u64) {
        self.frame_index = frame_index;
    }

    /// Point of the most recent run.
    pub fn point(&self) -> Point {
        self.point
    }

    /// Ranks every element within `max_distance` of `point`.
    pub fn run(
        &mut self,
        tree: &ElementTree,
        layout: &dyn LayoutProvider,
        point: Point,
        predicate: Option<FuzzyPredicate<'_>>,
        max_distance: f64,
    ) -> &[FuzzyCandidate] {
        self.results.clear();
        self.point = point;
        let query = FuzzyQuery {
            point,
            max_distance_sq: max_distance * max_distance,
            tree,
            predicate,
        };
        let mut sink = FuzzySink {
            results: &mut self.results,
            next_seq: 0,
        };
        let (roots, _) = tree.roots_in_display_order();
        walk(
            &query,
            layout,
            &roots,
            self.config.canvas,
            0,
            self.frame_index,
            &mut sink,
        );
        let threshold = self.config.direct_hit_threshold;
        self.results
            .sort_unstable_by_key(|c| c.rank_key(threshold));
        &self.results
    }

    /// [`run`](Self::run) with no predicate and the configured radius.
    pub fn run_default(
        &mut self,
        tree: &ElementTree,
        layout: &dyn LayoutProvider,
        point: Point,
    ) -> &[FuzzyCandidate] {
        let max = self.config.max_distance;
        self.run(tree, layout, point, None, max)
    }

    /// Results of the most recent run, best first.
    pub fn results(&self) -> &[FuzzyCandidate] {
        &self.results
    }

    /// Best result of the most recent run.
    pub fn best(&self) -> Option<&FuzzyCandidate> {
        self.results.first()
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns `true` if the most recent run found nothing.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

fn walk(
    query: &FuzzyQuery<'_>,
    layout: &dyn LayoutProvider,
    ordered: &[ElementId],
    clip: Rect,
    depth: u32,
    frame_index: u64,
    sink: &mut FuzzySink<'_>,
) -> usize {
    let tree = query.tree;
    let mut total = 0;
    for &id in ordered.iter().rev() {
        let Some(el) = tree.get(id) else {
            continue;
        };
        if !el.flags.contains(ElementFlags::VISIBLE) || el.flags.contains(ElementFlags::INTANGIBLE)
        {
            continue;
        }
        let Some(rect) = layout.rects(el.layout_key).map(|r| r.rect) else {
            continue;
        };
        let Some(clipped_rect) = util::intersect(rect, clip) else {
            continue;
        };
        let inside = util::contains_inclusive(clipped_rect, query.point);
        let stop = inside || el.behavior.blocks_hit_tests();

        let mut this = FuzzyCandidate {
            element: id,
            depth,
            distance: 0.0,
            closest_point: query.point,
            intangible_at_closest: false,
            rect,
            clipped_rect,
            seq: 0,
        };
        let mut local = el.behavior.fuzzy_hot_spots(query, &this, sink);
        if el.behavior.fuzzy_walk_children() && !el.flags.contains(ElementFlags::HIDE_CHILDREN) {
            let (children, _) = tree.children_in_display_order(id, frame_index);
            local += walk(query, layout, &children, clipped_rect, depth + 1, frame_index, sink);
        }

        if local > 0 {
            total += local;
        } else if let Some((distance, closest_point)) = query.measure(clipped_rect) {
            total += 1;
            if query.accepts(id, el) {
                this.distance = distance;
                this.closest_point = closest_point;
                this.intangible_at_closest =
                    el.behavior.is_intangible_at(closest_point) == Some(true);
                sink.push(this);
            }
        }

        if stop {
            break;
        }
    }
    total
}
