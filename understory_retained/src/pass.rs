// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Below / Content / Above surface triples.

use crate::draw::{DrawList, GroupId, Surface, ViewTransform};

/// One of the passes every element is painted in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RasterPass {
    /// Backgrounds and shadows, under every sibling's content.
    Below,
    /// Element body; children are rasterized during this pass.
    Content,
    /// Overlays such as focus rings, over every sibling's content.
    Above,
    /// Clip mask for an element that clips its children.
    ContentClip,
}

impl RasterPass {
    /// The passes the walker paints, in order.
    pub const ORDERED: [Self; 3] = [Self::Below, Self::Content, Self::Above];
}

/// Three independently layered surfaces plus the nested clip depth they draw at.
///
/// The Below, Content, and Above surfaces live in sibling groups of one container, so
/// everything drawn to Below issues before anything drawn to Content, and so on,
/// regardless of the order in which draws were recorded.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PassSet {
    /// Below surface.
    pub below: Surface,
    /// Content surface.
    pub content: Surface,
    /// Above surface.
    pub above: Surface,
    /// Frame-level overlay group.
    pub overlay: GroupId,
    /// Nested clip depth. Zero at the top level and inside scratch surfaces.
    pub stack_depth: i32,
}

impl PassSet {
    /// Opens three groups in `container` at its current layer and the two after it,
    /// then advances the container past them.
    pub fn within(
        list: &mut DrawList,
        container: &mut Surface,
        stack_depth: i32,
        overlay: GroupId,
    ) -> Self {
        let mut base = container.layer;
        let passes = Self::with_base_layer(list, container, &mut base, stack_depth, overlay);
        container.layer = base;
        passes
    }

    /// Opens three groups in `container` at `*base`, `*base + 1`, and `*base + 2`, and
    /// advances `base` past them.
    pub fn with_base_layer(
        list: &mut DrawList,
        container: &Surface,
        base: &mut i32,
        stack_depth: i32,
        overlay: GroupId,
    ) -> Self {
        let mut cursor = *container;
        cursor.layer = *base;
        let below = cursor.subgroup(list);
        cursor.layer += 1;
        let content = cursor.subgroup(list);
        cursor.layer += 1;
        let above = cursor.subgroup(list);
        *base = cursor.layer + 1;
        Self {
            below,
            content,
            above,
            overlay,
            stack_depth,
        }
    }

    /// Opens a group under `view` in each surface at its current layer, then advances
    /// every surface past it.
    ///
    /// Used for subtrees that render under a transform without compositing: each pass
    /// keeps its place relative to siblings while the whole subtree shares one view.
    pub fn nested_with_view(&mut self, list: &mut DrawList, view: ViewTransform) -> Self {
        let nested = Self {
            below: self.below.subgroup_with(list, Some(view), None),
            content: self.content.subgroup_with(list, Some(view), None),
            above: self.above.subgroup_with(list, Some(view), None),
            overlay: self.overlay,
            stack_depth: self.stack_depth,
        };
        self.adjust_all_layers(1);
        nested
    }

    /// The surface for `pass`. [`RasterPass::ContentClip`] maps to Content.
    pub fn pass_mut(&mut self, pass: RasterPass) -> &mut Surface {
        match pass {
            RasterPass::Below => &mut self.below,
            RasterPass::Content | RasterPass::ContentClip => &mut self.content,
            RasterPass::Above => &mut self.above,
        }
    }

    /// Shifts every surface's layer by `delta`.
    pub fn adjust_all_layers(&mut self, delta: i32) {
        self.below.layer += delta;
        self.content.layer += delta;
        self.above.layer += delta;
    }
}
