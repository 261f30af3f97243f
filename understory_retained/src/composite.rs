// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scratch surface pool and the compositor capability.
//!
//! A composited element renders its subtree into a region of a canvas-sized scratch
//! surface, then blits that region back. Scratch surfaces are pooled across frames.
//! Within a frame one surface can host several composites as long as their regions do
//! not overlap; a region stays reserved until the frame ends, so releasing a lease never
//! lets a later composite overwrite pixels that have not been blitted yet.

use kurbo::Rect;

use crate::draw::{CompositeDraw, RenderBackend, Renderer};
use crate::element::{CompositeRecord, ElementId};
use crate::util;

/// Identifier of a pooled scratch surface.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct ScratchTargetId(pub u32);

/// Exclusive claim on a scratch region, returned by [`ScratchPool::acquire`].
///
/// Must be handed back to [`ScratchPool::release`] in the same frame.
#[derive(Debug, PartialEq)]
pub struct ScratchLease {
    target: ScratchTargetId,
    region: Rect,
}

impl ScratchLease {
    /// Surface holding the region.
    pub fn target(&self) -> ScratchTargetId {
        self.target
    }

    /// Reserved region, in canvas coordinates.
    pub fn region(&self) -> Rect {
        self.region
    }
}

#[derive(Clone, Debug)]
struct ScratchTarget {
    id: ScratchTargetId,
    used: Vec<Rect>,
}

impl ScratchTarget {
    fn has_room_for(&self, region: Rect) -> bool {
        self.used.iter().all(|r| util::intersect(*r, region).is_none())
    }
}

/// Pool of canvas-sized scratch surfaces.
#[derive(Clone, Debug)]
pub struct ScratchPool {
    targets: Vec<ScratchTarget>,
    next_id: u32,
    max_targets: usize,
    outstanding: usize,
    /// `(dependent, dependency)`: the dependency must render before the dependent.
    dependencies: Vec<(ScratchTargetId, ScratchTargetId)>,
}

impl ScratchPool {
    /// Creates a pool holding at most `max_targets` surfaces.
    pub fn new(max_targets: usize) -> Self {
        Self {
            targets: Vec::new(),
            next_id: 0,
            max_targets,
            outstanding: 0,
            dependencies: Vec::new(),
        }
    }

    /// Starts a frame.
    ///
    /// Keeps as many surfaces as the previous frame used (at least one) and frees their
    /// regions.
    pub fn begin_frame(&mut self) {
        assert_eq!(
            self.outstanding, 0,
            "scratch leases outstanding at frame start"
        );
        let used = self.targets.iter().filter(|t| !t.used.is_empty()).count();
        self.targets.sort_by_key(|t| t.used.is_empty());
        self.targets.truncate(used.max(1));
        for t in &mut self.targets {
            t.used.clear();
        }
        self.dependencies.clear();
    }

    /// Reserves `region` on a surface that is not in `busy`.
    ///
    /// `busy` lists surfaces currently being rendered into; sampling from a surface while
    /// drawing to it is never allowed. Returns `None` when the pool is exhausted.
    pub fn acquire(&mut self, region: Rect, busy: &[ScratchTargetId]) -> Option<ScratchLease> {
        let found = self
            .targets
            .iter()
            .position(|t| !busy.contains(&t.id) && t.has_room_for(region));
        let idx = match found {
            Some(idx) => idx,
            None if self.targets.len() < self.max_targets => {
                let id = ScratchTargetId(self.next_id);
                self.next_id += 1;
                self.targets.push(ScratchTarget {
                    id,
                    used: Vec::new(),
                });
                self.targets.len() - 1
            }
            None => return None,
        };
        let target = &mut self.targets[idx];
        target.used.push(region);
        self.outstanding += 1;
        Some(ScratchLease {
            target: target.id,
            region,
        })
    }

    /// Ends a lease. The region stays reserved until the next [`begin_frame`](Self::begin_frame).
    pub fn release(&mut self, lease: ScratchLease) {
        debug_assert!(
            self.targets.iter().any(|t| t.id == lease.target),
            "released a lease from another pool"
        );
        self.outstanding -= 1;
    }

    /// Records that `dependent` samples from `dependency`.
    pub fn add_dependency(&mut self, dependent: ScratchTargetId, dependency: ScratchTargetId) {
        if dependent != dependency && !self.dependencies.contains(&(dependent, dependency)) {
            self.dependencies.push((dependent, dependency));
        }
    }

    /// Number of leases not yet released.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Number of pooled surfaces.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns `true` if the pool holds no surfaces.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Surfaces with reserved regions this frame, dependencies before dependents.
    ///
    /// Ties resolve by surface id so the order is deterministic.
    pub fn render_order(&self) -> Vec<ScratchTargetId> {
        let mut used: Vec<ScratchTargetId> = self
            .targets
            .iter()
            .filter(|t| !t.used.is_empty())
            .map(|t| t.id)
            .collect();
        used.sort_unstable();
        let mut order = Vec::with_capacity(used.len());
        let mut state = vec![0_u8; used.len()];
        for i in 0..used.len() {
            self.visit(i, &used, &mut state, &mut order);
        }
        order
    }

    fn visit(
        &self,
        i: usize,
        used: &[ScratchTargetId],
        state: &mut [u8],
        order: &mut Vec<ScratchTargetId>,
    ) {
        // 0 = unvisited, 1 = on the current path, 2 = emitted.
        if state[i] != 0 {
            return;
        }
        state[i] = 1;
        let id = used[i];
        let mut deps: Vec<usize> = self
            .dependencies
            .iter()
            .filter(|(dependent, _)| *dependent == id)
            .filter_map(|(_, dep)| used.iter().position(|u| u == dep))
            .collect();
        deps.sort_unstable();
        for d in deps {
            self.visit(d, used, state, order);
        }
        state[i] = 2;
        order.push(id);
    }
}

/// Custom composite behavior for an element.
///
/// Declaring a compositor forces the element through a scratch surface whenever
/// [`will_composite`](Self::will_composite) agrees.
pub trait Compositor {
    /// Whether to composite this frame.
    fn will_composite(&self, element: ElementId, opacity: f32) -> bool {
        let _ = (element, opacity);
        true
    }

    /// Padding around the element box, overriding the configured default.
    fn padding(&self) -> Option<f64> {
        None
    }

    /// Issues the final blit. Return `false` to fall back to the default blit.
    fn composite(&self, renderer: &mut Renderer<'_>, blit: &CompositeDraw) -> bool {
        let _ = (renderer, blit);
        false
    }

    /// Called at submission just before the element's blit group is issued.
    fn before_issue(&self, record: &CompositeRecord, backend: &mut dyn RenderBackend) {
        let _ = (record, backend);
    }

    /// Called at submission just after the element's blit group is issued.
    fn after_issue(&self, record: &CompositeRecord, backend: &mut dyn RenderBackend) {
        let _ = (record, backend);
    }
}
