// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_retained_ref --heading-base-level=0

//! Understory Retained Reference Backend.
//!
//! This crate provides a small, stateful implementation of [`RenderBackend`] for
//! **draw recording and stencil tracing**.
//!
//! It is intentionally *not* a reference renderer:
//! - It does **not** produce pixels or blend colors.
//! - It records every submitted [`Draw`] with its view transform and render target.
//! - It simulates the stencil buffer on a coarse integer grid, so tests can assert on
//!   clip masks, and tracks which element last wrote color to each grid cell.
//!
//! A grid cell is covered by a draw when the cell's center lies inside the draw's
//! bounds after the view transform (using the axis-aligned bounding box for rotated or
//! skewed views). Stencil comparisons follow [`StencilMode`].

use kurbo::{Affine, Point, Rect};
use understory_retained::{
    Draw, DrawCommand, ElementId, RenderBackend, RenderTarget, StencilMode,
};

/// Size of the simulated grid.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GridConfig {
    /// Edge length of one cell, in canvas units.
    pub cell: f64,
    /// Number of columns.
    pub columns: usize,
    /// Number of rows.
    pub rows: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell: 4.0,
            columns: 480,
            rows: 270,
        }
    }
}

impl GridConfig {
    /// A grid of `columns` × `rows` cells of edge `cell`.
    pub fn new(cell: f64, columns: usize, rows: usize) -> Self {
        Self {
            cell,
            columns,
            rows,
        }
    }

    fn len(&self) -> usize {
        self.columns * self.rows
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "values are clamped to the grid extent before the cast"
    )]
    fn span(&self, lo: f64, hi: f64, extent: usize) -> (usize, usize) {
        // Cells whose center c = (i + 0.5) * cell satisfies lo <= c < hi.
        let to_index = |v: f64| (v / self.cell - 0.5).ceil().clamp(0.0, extent as f64) as usize;
        (to_index(lo), to_index(hi))
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "non-negative and bounds-checked against the grid extent"
    )]
    fn cell_at(&self, p: Point) -> Option<usize> {
        if p.x < 0.0 || p.y < 0.0 {
            return None;
        }
        let (x, y) = ((p.x / self.cell) as usize, (p.y / self.cell) as usize);
        (x < self.columns && y < self.rows).then(|| y * self.columns + x)
    }
}

/// Simulated buffers of one render target.
#[derive(Clone, Debug)]
pub struct TargetState {
    target: RenderTarget,
    config: GridConfig,
    stencil: Vec<u8>,
    owner: Vec<Option<ElementId>>,
}

impl TargetState {
    fn new(target: RenderTarget, config: GridConfig) -> Self {
        Self {
            target,
            config,
            stencil: vec![0; config.len()],
            owner: vec![None; config.len()],
        }
    }

    /// Which target this is.
    pub fn target(&self) -> RenderTarget {
        self.target
    }

    /// Stencil value of the cell containing `p`.
    pub fn stencil_at(&self, p: Point) -> Option<u8> {
        self.config.cell_at(p).map(|i| self.stencil[i])
    }

    /// Element that last wrote color to the cell containing `p`.
    pub fn owner_at(&self, p: Point) -> Option<ElementId> {
        self.config.cell_at(p).and_then(|i| self.owner[i])
    }

    /// Raw stencil values, row-major.
    pub fn stencil(&self) -> &[u8] {
        &self.stencil
    }

    /// Applies one draw and returns the number of cells that passed the stencil test.
    fn apply(&mut self, draw: &Draw, view: Affine) -> usize {
        let bounds = match &draw.command {
            DrawCommand::ClearStencil(value) => {
                self.stencil.fill(*value);
                return self.stencil.len();
            }
            DrawCommand::FillRect { rect, .. } | DrawCommand::Custom { rect, .. } => *rect,
            DrawCommand::Composite(blit) => blit.dest_rect,
            DrawCommand::Glyphs { origin, .. } => Rect::from_origin_size(*origin, (1.0, 1.0)),
        };
        let bounds = view.transform_rect_bbox(bounds);
        let (x0, x1) = self.config.span(bounds.x0, bounds.x1, self.config.columns);
        let (y0, y1) = self.config.span(bounds.y0, bounds.y1, self.config.rows);
        let mut covered = 0;
        for y in y0..y1 {
            for x in x0..x1 {
                let i = y * self.config.columns + x;
                let (pass, stored) = stencil_op(draw.stencil, self.stencil[i]);
                self.stencil[i] = stored;
                if pass {
                    covered += 1;
                    if draw.color_write {
                        self.owner[i] = draw.element;
                    }
                }
            }
        }
        covered
    }
}

/// Stencil compare and update for one cell: `(passed, new stored value)`.
fn stencil_op(mode: StencilMode, stored: u8) -> (bool, u8) {
    match mode {
        StencilMode::Disabled => (true, stored),
        StencilMode::Test(r) => (r <= stored, stored),
        StencilMode::Write(r) if stored == r => (true, stored.saturating_add(1)),
        StencilMode::Restore(r) if r < stored => (true, r),
        StencilMode::Write(_) | StencilMode::Restore(_) => (false, stored),
    }
}

/// Draw recorded by the reference backend.
#[derive(Clone, Debug)]
pub struct Event {
    /// Target the draw was issued to.
    pub target: RenderTarget,
    /// The draw.
    pub draw: Draw,
    /// View transform it was issued under.
    pub view: Affine,
    /// Grid cells that passed the stencil test.
    pub covered: usize,
}

/// Recording backend with a simulated stencil buffer per target.
///
/// Each [`begin_target`](RenderBackend::begin_target) starts a fresh, cleared target.
/// Draws issued before any target begins go to an implicit frame target.
#[derive(Clone, Debug, Default)]
pub struct RecordingBackend {
    config: GridConfig,
    targets: Vec<TargetState>,
    events: Vec<Event>,
}

impl RecordingBackend {
    /// Creates a backend with the given grid.
    pub fn new(config: GridConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Recorded draws in issue order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Recorded draws for one target, in issue order.
    pub fn events_for(&self, target: RenderTarget) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter().filter(move |e| e.target == target)
    }

    /// Every target begun so far, in order.
    pub fn targets(&self) -> &[TargetState] {
        &self.targets
    }

    /// Most recently begun state of `target`.
    pub fn target(&self, target: RenderTarget) -> Option<&TargetState> {
        self.targets.iter().rev().find(|t| t.target == target)
    }

    /// Most recently begun frame target.
    pub fn frame(&self) -> Option<&TargetState> {
        self.target(RenderTarget::Frame)
    }

    /// Forgets all events and targets.
    pub fn clear(&mut self) {
        self.events.clear();
        self.targets.clear();
    }
}

impl RenderBackend for RecordingBackend {
    fn begin_target(&mut self, target: RenderTarget) {
        self.targets.push(TargetState::new(target, self.config));
    }

    fn draw(&mut self, draw: &Draw, view: Affine) {
        if self.targets.is_empty() {
            self.begin_target(RenderTarget::Frame);
        }
        let Some(state) = self.targets.last_mut() else {
            return;
        };
        let covered = state.apply(draw, view);
        self.events.push(Event {
            target: state.target,
            draw: draw.clone(),
            view,
            covered,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use understory_retained::{DrawList, Surface};

    fn fill(stencil: StencilMode, rect: Rect) -> Draw {
        let mut list = DrawList::new();
        let root = list.root(RenderTarget::Frame);
        let surface = Surface {
            stencil,
            ..Surface::new(root)
        };
        surface.draw(
            &mut list,
            DrawCommand::Custom { tag: 0, rect },
            1.0,
            None,
        );
        list.ordered_draws(RenderTarget::Frame)[0].clone()
    }

    fn small() -> RecordingBackend {
        RecordingBackend::new(GridConfig::new(1.0, 10, 10))
    }

    #[test]
    fn coverage_uses_cell_centers() {
        let mut b = small();
        b.draw(&fill(StencilMode::Disabled, Rect::new(0.0, 0.0, 2.0, 3.0)), Affine::IDENTITY);
        assert_eq!(b.events()[0].covered, 6);
        b.draw(
            &fill(StencilMode::Disabled, Rect::new(0.0, 0.0, 2.0, 3.0)),
            Affine::translate((-20.0, 0.0)),
        );
        assert_eq!(b.events()[1].covered, 0);
    }

    #[test]
    fn write_then_test_confines_coverage() {
        let mut b = small();
        b.begin_target(RenderTarget::Frame);
        b.draw(&fill(StencilMode::Write(0), Rect::new(0.0, 0.0, 5.0, 5.0)), Affine::IDENTITY);
        b.draw(&fill(StencilMode::Test(1), Rect::new(0.0, 0.0, 10.0, 10.0)), Affine::IDENTITY);
        assert_eq!(b.events()[1].covered, 25);
        let frame = b.frame().unwrap();
        assert_eq!(frame.stencil_at(Point::new(1.0, 1.0)), Some(1));
        assert_eq!(frame.stencil_at(Point::new(7.0, 7.0)), Some(0));
    }

    #[test]
    fn restore_erases_deeper_values_only() {
        let mut b = small();
        b.draw(&fill(StencilMode::Write(0), Rect::new(0.0, 0.0, 6.0, 6.0)), Affine::IDENTITY);
        b.draw(&fill(StencilMode::Write(1), Rect::new(0.0, 0.0, 3.0, 3.0)), Affine::IDENTITY);
        b.draw(&fill(StencilMode::Restore(1), Rect::new(0.0, 0.0, 10.0, 10.0)), Affine::IDENTITY);
        assert_eq!(b.events()[2].covered, 9);
        let frame = b.frame().unwrap();
        assert_eq!(frame.stencil_at(Point::new(1.0, 1.0)), Some(1));
        assert_eq!(frame.stencil_at(Point::new(4.0, 4.0)), Some(1));
        assert_eq!(frame.stencil_at(Point::new(8.0, 8.0)), Some(0));
    }
}
