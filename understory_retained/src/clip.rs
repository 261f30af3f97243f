// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Nested clipped pass: a sub-context for an element's children backed by a stencil mask.
//!
//! Mask values equal nesting depth. Opening a clipping context at outer depth `d` gives
//! its content `Test(d + 1)`. Once the content is known to be non-empty the mask is
//! written into the same group at negative layers, so it issues before any content:
//!
//! - at `d == 0` the whole stencil is cleared to zero;
//! - at `d > 0` every value above `d` is restored to `d`, erasing the mask a previous
//!   sibling left at depth `d + 1`;
//! - then the element's clip shape increments `d` to `d + 1` where the parent mask holds.
//!
//! Isolation without clipping opens the same sub-context but leaves the stencil alone.

use kurbo::Rect;
use peniko::Color;

use crate::draw::{DrawCommand, DrawList, Renderer, StencilMode, Surface};
use crate::element::ElementId;
use crate::pass::PassSet;
use crate::util::stencil_ref;

const CLEAR_LAYER: i32 = -9999;
const RESTORE_LAYER: i32 = -1000;
const WRITE_LAYER: i32 = -999;

/// Covers any reachable canvas position.
const RESTORE_EXTENT: Rect = Rect::new(-65536.0, -65536.0, 65536.0, 65536.0);

/// An open nested context.
#[derive(Debug)]
pub(crate) struct NestedPass {
    /// Surface for the element's own Content pass.
    pub(crate) content: Surface,
    /// Pass set for the element's children.
    pub(crate) children: PassSet,
    clips: bool,
    outer_depth: i32,
}

/// Opens a nested context in `outer`'s Content surface.
///
/// Bumps the outer Content layer before and after the new group, so two nested groups
/// never share a sort layer.
pub(crate) fn open(list: &mut DrawList, outer: &mut PassSet, clips: bool) -> NestedPass {
    let depth = outer.stack_depth;
    outer.content.layer += 1;
    let mut content = outer.content.subgroup(list);
    let child_depth = if clips { depth + 1 } else { depth };
    content.stencil = if clips {
        StencilMode::Test(stencil_ref(child_depth))
    } else if depth <= 0 {
        StencilMode::Disabled
    } else {
        StencilMode::Test(stencil_ref(depth))
    };
    // Layer 0 holds the element's own content; children start after it.
    let mut cursor = content;
    cursor.layer = 1;
    let children = PassSet::within(list, &mut cursor, child_depth, outer.overlay);
    outer.content.layer += 1;
    NestedPass {
        content,
        children,
        clips,
        outer_depth: depth,
    }
}

/// Writes the clip mask for a context opened with `clips`, if it received any content.
///
/// `rasterize_clip` paints the clip shape; its draws land with color writes disabled and
/// the mask-writing stencil state. Returns `true` if a mask was written.
pub(crate) fn close(
    list: &mut DrawList,
    nested: &NestedPass,
    element: ElementId,
    rasterize_clip: impl FnOnce(&mut Renderer<'_>),
) -> bool {
    if !nested.clips || list.is_empty(nested.content.group) {
        return false;
    }
    let prev = stencil_ref(nested.outer_depth);
    let mut mask = Surface {
        color_write: false,
        ..nested.content
    };
    if nested.outer_depth < 1 {
        mask.stencil = StencilMode::Disabled;
        mask.draw_at(
            list,
            CLEAR_LAYER,
            DrawCommand::ClearStencil(0),
            1.0,
            Some(element),
        );
    } else {
        mask.stencil = StencilMode::Restore(prev);
        mask.draw_at(
            list,
            RESTORE_LAYER,
            DrawCommand::FillRect {
                rect: RESTORE_EXTENT,
                color: Color::TRANSPARENT,
            },
            1.0,
            Some(element),
        );
    }
    mask.stencil = StencilMode::Write(prev);
    mask.layer = WRITE_LAYER;
    let mut renderer = Renderer::new(list, &mut mask, 1.0, Some(element));
    rasterize_clip(&mut renderer);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::RenderTarget;

    fn setup(depth: i32) -> (DrawList, PassSet) {
        let mut list = DrawList::new();
        let root = list.root(RenderTarget::Frame);
        let mut container = Surface::new(root);
        let passes = PassSet::within(&mut list, &mut container, depth, root);
        (list, passes)
    }

    #[test]
    fn empty_context_writes_no_mask() {
        let (mut list, mut outer) = setup(0);
        let nested = open(&mut list, &mut outer, true);
        assert!(!close(&mut list, &nested, ElementId::new(0, 1), |_| {}));
        assert!(list.ordered_draws(RenderTarget::Frame).is_empty());
    }

    #[test]
    fn mask_issues_before_content() {
        let (mut list, mut outer) = setup(2);
        let before = outer.content.layer;
        let mut nested = open(&mut list, &mut outer, true);
        assert_eq!(outer.content.layer, before + 2);
        assert_eq!(nested.children.stack_depth, 3);
        assert_eq!(nested.content.stencil, StencilMode::Test(3));
        let el = ElementId::new(0, 1);
        Renderer::new(&mut list, &mut nested.children.content, 1.0, Some(el))
            .fill_rect(Rect::new(0.0, 0.0, 5.0, 5.0), Color::BLACK);
        let wrote = close(&mut list, &nested, el, |r| {
            r.fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), Color::WHITE);
        });
        assert!(wrote);
        let stencils: Vec<StencilMode> = list
            .ordered_draws(RenderTarget::Frame)
            .iter()
            .map(|d| d.stencil)
            .collect();
        assert_eq!(
            stencils,
            [
                StencilMode::Restore(2),
                StencilMode::Write(2),
                StencilMode::Test(3)
            ]
        );
    }

    #[test]
    fn isolation_keeps_outer_depth() {
        let (mut list, mut outer) = setup(1);
        let nested = open(&mut list, &mut outer, false);
        assert_eq!(nested.children.stack_depth, 1);
        assert_eq!(nested.content.stencil, StencilMode::Test(1));
        let (mut list, mut outer) = setup(0);
        let top = open(&mut list, &mut outer, false);
        assert_eq!(top.content.stencil, StencilMode::Disabled);
    }
}
