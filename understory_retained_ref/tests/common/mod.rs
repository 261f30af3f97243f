// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared helpers for scenario tests.

#![allow(
    missing_docs,
    reason = "Integration-test helper module; not part of the public API."
)]
#![allow(
    dead_code,
    reason = "Each test binary uses a different subset of the helpers."
)]

use std::sync::Arc;

use kurbo::Rect;
use peniko::Color;
use understory_retained::{
    DecorationContext, DecorationSettings, Decorator, Element, ElementFlags, ElementId,
    ElementTree, FrameStats, LayoutTable, RasterPass, Rasterizer, Renderer,
};
use understory_retained_ref::RecordingBackend;

/// Fills the element box during the listed passes.
#[derive(Debug)]
pub(crate) struct Chrome(pub(crate) &'static [RasterPass]);

impl Decorator for Chrome {
    fn rasterize(&self, _: &DecorationContext, r: &mut Renderer<'_>, s: &DecorationSettings) {
        if self.0.contains(&s.pass) {
            r.fill_rect(s.rect, Color::BLACK);
        }
    }
}

pub(crate) const CONTENT: &[RasterPass] = &[RasterPass::Content];

pub(crate) struct Scene {
    pub(crate) tree: ElementTree,
    pub(crate) layout: LayoutTable,
}

impl Scene {
    pub(crate) fn new() -> Self {
        Self {
            tree: ElementTree::new(),
            layout: LayoutTable::new(),
        }
    }

    /// A top-level container painting its content.
    pub(crate) fn root(&mut self, rect: Rect) -> ElementId {
        let key = self.layout.insert_rect(rect);
        self.tree.insert_root(
            Element::container()
                .with_layout(key)
                .with_decorator(Arc::new(Chrome(CONTENT))),
        )
    }

    /// A child container painting its content.
    pub(crate) fn panel(&mut self, parent: ElementId, rect: Rect) -> ElementId {
        self.child(parent, Element::container(), rect, CONTENT)
    }

    /// A child container that clips its children.
    pub(crate) fn clipper(&mut self, parent: ElementId, rect: Rect) -> ElementId {
        let el = Element::container()
            .with_flags(ElementFlags::default() | ElementFlags::CLIP_CHILDREN);
        self.child(parent, el, rect, CONTENT)
    }

    pub(crate) fn child(
        &mut self,
        parent: ElementId,
        element: Element,
        rect: Rect,
        passes: &'static [RasterPass],
    ) -> ElementId {
        let key = self.layout.insert_rect(rect);
        self.tree
            .insert(
                parent,
                element
                    .with_layout(key)
                    .with_decorator(Arc::new(Chrome(passes))),
            )
            .unwrap()
    }

    /// Rasterizes and submits one frame into a fresh backend.
    pub(crate) fn render(&mut self, r: &mut Rasterizer) -> (FrameStats, RecordingBackend) {
        let stats = r.rasterize_frame(&mut self.tree, &self.layout, 0.0);
        let mut backend = RecordingBackend::default();
        r.submit(&self.tree, &mut backend);
        (stats, backend)
    }
}
