// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The multi-pass rasterization walker.
//!
//! ## Per element
//!
//! 1. Combine the element's eased opacity with the caller's. The element is hidden when
//!    that is not positive, when it is not [`VISIBLE`](ElementFlags::VISIBLE), when its
//!    layout cannot be resolved, when its box has no area, or when a non-root,
//!    non-overlay element lies entirely outside the visible region (this last rule is
//!    skipped while any transform is active). Hidden elements still get their
//!    pre-rasterize hook and report `false`.
//! 2. If opacity is below one, a transform is active, or a compositor asks for it, the
//!    subtree renders into a scratch surface and is blitted back (see
//!    [`composite`](crate::composite)).
//! 3. Otherwise Below, Content, and Above are painted in order with the ambient opacity
//!    multiplied in. Children are rasterized during Content: into a nested clipped
//!    context when the element clips or isolates them, or directly into the same pass
//!    set otherwise.
//!
//! ## Layer discipline
//!
//! Every surface bumps its layer after each element pass, so a later sibling's draws
//! always sort after an earlier sibling's draws on the same surface. When siblings carry
//! different display orders the plane is split: the next order bucket gets a fresh pass
//! set opened on the current Above surface, so every pass of the new bucket issues after
//! every pass of the previous one.

use std::sync::Arc;

use kurbo::Rect;
use peniko::Color;

use crate::composite::{Compositor, ScratchLease, ScratchPool, ScratchTargetId};
use crate::config::{PlaneSplit, RasterConfig};
use crate::context::AmbientContext;
use crate::decor::{
    DecorationContext, DecorationProvider, DecorationSettings, Decorator, ElementStates,
    ProviderStack,
};
use crate::diag::{FrameStats, Recoverable, RecoverableLog};
use crate::draw::{
    CompositeDraw, DrawList, GroupId, RenderBackend, RenderTarget, Renderer, Surface,
    ViewTransform,
};
use crate::element::{CompositeRecord, Element, ElementFlags, ElementId};
use crate::layout::{LayoutProvider, LayoutRects};
use crate::pass::{PassSet, RasterPass};
use crate::tree::ElementTree;
use crate::{clip, util};

/// Entry points handed out by [`Rasterizer::begin_frame`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameRoot {
    /// Surface on the frame target that top-level pass sets open in.
    pub surface: Surface,
    /// Overlay group, issued after everything else on the frame target.
    pub overlay: GroupId,
}

/// Persistent rasterization state: draw list, scratch pool, and diagnostics.
///
/// Typical use per frame is [`rasterize_frame`](Self::rasterize_frame) followed by
/// [`submit`](Self::submit). Hosts that manage their own top-level surfaces can call
/// [`begin_frame`](Self::begin_frame), then [`open_pass_set`](Self::open_pass_set) and
/// [`rasterize`](Self::rasterize) per element, and [`end_frame`](Self::end_frame) instead.
#[derive(Debug)]
pub struct Rasterizer {
    config: RasterConfig,
    list: DrawList,
    pool: ScratchPool,
    log: RecoverableLog,
    stats: FrameStats,
    providers: ProviderStack,
    frame_index: u64,
    now: f64,
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new(RasterConfig::default())
    }
}

impl Rasterizer {
    /// Creates a rasterizer.
    pub fn new(config: RasterConfig) -> Self {
        Self {
            pool: ScratchPool::new(config.max_scratch_targets),
            log: RecoverableLog::new(config.log_burst, config.log_every),
            config,
            list: DrawList::new(),
            stats: FrameStats::default(),
            providers: ProviderStack::default(),
            frame_index: 0,
            now: 0.0,
        }
    }

    /// Sets the base decoration provider consulted when no element overrides it.
    pub fn set_decoration_provider(&mut self, provider: Arc<dyn DecorationProvider>) {
        self.providers = ProviderStack::with_base(provider);
    }

    /// Configuration.
    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    /// Draw list of the most recent frame.
    pub fn draw_list(&self) -> &DrawList {
        &self.list
    }

    /// Scratch pool.
    pub fn scratch_pool(&self) -> &ScratchPool {
        &self.pool
    }

    /// Recoverable-condition counters.
    pub fn recoverable(&self) -> &RecoverableLog {
        &self.log
    }

    /// Counters for the most recent frame.
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Number of frames started.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Starts a frame: clears the draw list and resets scratch regions.
    pub fn begin_frame(&mut self, now: f64) -> FrameRoot {
        self.frame_index += 1;
        self.now = now;
        self.stats = FrameStats::default();
        self.list.clear();
        self.pool.begin_frame();
        let main = self.list.root(RenderTarget::Frame);
        let overlay = self.list.subgroup(main, i32::MAX, None, None);
        FrameRoot {
            surface: Surface::new(main),
            overlay,
        }
    }

    /// Fresh ambient context for the current frame.
    pub fn ambient_context(&self) -> AmbientContext {
        AmbientContext::new(
            self.config.root_visible_region(),
            self.now,
            self.frame_index,
            self.providers.clone(),
        )
    }

    /// Opens a top-level pass set on `root`'s frame surface and advances the surface
    /// past it, so pass sets opened later paint after every pass of this one.
    pub fn open_pass_set(&mut self, root: &mut FrameRoot) -> PassSet {
        PassSet::within(&mut self.list, &mut root.surface, 0, root.overlay)
    }

    /// Rasterizes one element and its subtree into `passes`.
    ///
    /// Returns `false` if the element was hidden or culled.
    pub fn rasterize(
        &mut self,
        tree: &mut ElementTree,
        layout: &dyn LayoutProvider,
        cx: &mut AmbientContext,
        passes: &mut PassSet,
        element: ElementId,
        opacity: f32,
    ) -> bool {
        self.walker(tree, layout)
            .rasterize(cx, passes, element, opacity)
    }

    /// Finishes a frame and returns its counters.
    pub fn end_frame(&mut self) -> FrameStats {
        assert_eq!(
            self.pool.outstanding(),
            0,
            "scratch lease outlived its rasterize call"
        );
        log::trace!(
            "frame {}: {} visited, {} hidden, {} composited on {} scratch targets, {} groups",
            self.frame_index,
            self.stats.visited,
            self.stats.hidden,
            self.stats.composited,
            self.pool.render_order().len(),
            self.list.group_count(),
        );
        self.stats
    }

    /// Rasterizes every top-level element, each in its own pass set, in display order.
    pub fn rasterize_frame(
        &mut self,
        tree: &mut ElementTree,
        layout: &dyn LayoutProvider,
        now: f64,
    ) -> FrameStats {
        let mut root = self.begin_frame(now);
        let mut cx = self.ambient_context();
        let (roots, _) = tree.roots_in_display_order();
        for id in roots {
            let mut passes = self.open_pass_set(&mut root);
            self.rasterize(tree, layout, &mut cx, &mut passes, id, 1.0);
        }
        self.end_frame()
    }

    /// Issues the most recent frame to `backend`: scratch targets in dependency order,
    /// then the frame target.
    pub fn submit(&self, tree: &ElementTree, backend: &mut dyn RenderBackend) {
        self.list
            .submit(&self.pool.render_order(), tree, self.now, backend);
    }

    fn walker<'a>(
        &'a mut self,
        tree: &'a mut ElementTree,
        layout: &'a dyn LayoutProvider,
    ) -> Walker<'a> {
        Walker {
            tree,
            layout,
            list: &mut self.list,
            pool: &mut self.pool,
            log: &mut self.log,
            stats: &mut self.stats,
            config: &self.config,
        }
    }
}

struct Walker<'a> {
    tree: &'a mut ElementTree,
    layout: &'a dyn LayoutProvider,
    list: &'a mut DrawList,
    pool: &'a mut ScratchPool,
    log: &'a mut RecoverableLog,
    stats: &'a mut FrameStats,
    config: &'a RasterConfig,
}

fn decoration_context(cx: &AmbientContext, element: ElementId, depth: i32) -> DecorationContext {
    DecorationContext {
        element,
        opacity: cx.opacity,
        now: cx.now,
        stack_depth: depth,
        visible_region: cx.visible_region,
    }
}

fn element_states(el: &Element, compositing: bool) -> ElementStates {
    let mut states = el.state;
    states.set(
        ElementStates::DISABLED,
        !el.flags.contains(ElementFlags::ENABLED),
    );
    states.set(ElementStates::COMPOSITED, compositing);
    states
}

impl Walker<'_> {
    fn resolve_rects(&mut self, id: ElementId) -> Option<LayoutRects> {
        let key = self.tree.get(id)?.layout_key;
        let rects = if key.is_valid() {
            self.layout.rects(key)
        } else {
            None
        };
        if rects.is_none() {
            self.log.report(Recoverable::InvalidLayout, id);
        }
        rects
    }

    fn rasterize(
        &mut self,
        cx: &mut AmbientContext,
        passes: &mut PassSet,
        id: ElementId,
        opacity: f32,
    ) -> bool {
        self.stats.visited += 1;
        let now = cx.now;
        let Some(el) = self.tree.get(id) else {
            return false;
        };
        let opacity = opacity * el.opacity.value(now);
        let mut hidden = opacity <= 0.0 || !el.flags.contains(ElementFlags::VISIBLE);
        let rects = if hidden {
            None
        } else {
            let rects = self.resolve_rects(id);
            hidden = rects.is_none_or(|r| !util::has_area(r.rect));
            rects
        };
        let Some(el) = self.tree.get(id) else {
            return false;
        };
        let rects = rects.unwrap_or(LayoutRects::uniform(Rect::ZERO));
        if !hidden
            && el.parent().is_some()
            && !el.flags.contains(ElementFlags::OVERLAY)
            && cx.transform_count == 0
            && !el.has_active_transform(now)
            && util::intersect(rects.rect, cx.visible_region).is_none()
        {
            hidden = true;
        }

        if hidden {
            self.stats.hidden += 1;
            let settings = DecorationSettings {
                rect: rects.rect,
                content_rect: rects.content_rect,
                state: element_states(el, false) | ElementStates::INVISIBLE,
                pass: RasterPass::Content,
            };
            el.behavior
                .pre_rasterize(&decoration_context(cx, id, passes.stack_depth), &settings);
            return false;
        }

        if let Some(el) = self.tree.get_mut(id) {
            el.auto_clear_transform(now);
        }
        let Some(el) = self.tree.get(id) else {
            return false;
        };
        let compositor = el
            .compositor
            .clone()
            .filter(|c| c.will_composite(id, opacity));
        let has_transform = el.has_active_transform(now);
        let needs_composition =
            el.behavior.needs_composition(opacity < 1.0, has_transform) || compositor.is_some();

        if needs_composition {
            return self.rasterize_composited(cx, passes, id, rects.rect, opacity, compositor);
        }

        let saved = cx.opacity;
        cx.opacity *= opacity;
        if has_transform {
            self.rasterize_all_passes_transformed(cx, passes, id, rects.rect);
        } else {
            self.rasterize_all_passes(cx, passes, id, false);
        }
        cx.opacity = saved;
        true
    }

    fn rasterize_all_passes(
        &mut self,
        cx: &mut AmbientContext,
        passes: &mut PassSet,
        id: ElementId,
        compositing: bool,
    ) {
        let Some(el) = self.tree.get(id) else {
            return;
        };
        let provider = el.decoration_provider.clone();
        let mut cx = cx.scope_provider(provider);
        let Some(el) = self.tree.get(id) else {
            return;
        };
        let decorator = el.decorator.clone().or_else(|| {
            el.behavior
                .decoration_kind()
                .and_then(|kind| cx.providers().resolve(kind))
        });
        let state = element_states(el, compositing);
        let Some(rects) = self.resolve_rects(id) else {
            return;
        };
        let settings = DecorationSettings {
            rect: rects.rect,
            content_rect: rects.content_rect,
            state,
            pass: RasterPass::Below,
        };
        for pass in RasterPass::ORDERED {
            self.rasterize_pass(&mut cx, passes, id, decorator.as_deref(), settings, pass);
        }
    }

    fn rasterize_all_passes_transformed(
        &mut self,
        cx: &mut AmbientContext,
        passes: &mut PassSet,
        id: ElementId,
        rect: Rect,
    ) {
        if let Some(el) = self.tree.get_mut(id) {
            el.composite = Some(CompositeRecord { rect, draw: None });
        }
        let mut nested = passes.nested_with_view(self.list, ViewTransform::ElementLocal(id));
        cx.transform_count += 1;
        self.rasterize_all_passes(cx, &mut nested, id, false);
        cx.transform_count -= 1;
    }

    fn rasterize_pass(
        &mut self,
        cx: &mut AmbientContext,
        passes: &mut PassSet,
        id: ElementId,
        decorator: Option<&dyn Decorator>,
        settings: DecorationSettings,
        pass: RasterPass,
    ) {
        let Some(el) = self.tree.get(id) else {
            return;
        };
        let flags = el.flags;
        let behavior = el.behavior.clone();
        let has_children =
            !el.children().is_empty() && !flags.contains(ElementFlags::HIDE_CHILDREN);
        let clips = flags.contains(ElementFlags::CLIP_CHILDREN);
        let isolates = flags.contains(ElementFlags::ISOLATE_CHILDREN) && has_children;
        let nested = pass == RasterPass::Content && (clips || isolates);
        let settings = DecorationSettings { pass, ..settings };

        if pass == RasterPass::Content {
            behavior.pre_rasterize(&decoration_context(cx, id, passes.stack_depth), &settings);
        }

        if nested {
            assert_eq!(
                cx.clip_depth, passes.stack_depth,
                "clip depth diverged from pass set depth"
            );
            self.stats.nested_passes += 1;
            let saved_region = cx.visible_region;
            let pad = self.config.visibility_padding;
            cx.visible_region =
                util::intersect(saved_region, settings.rect.inflate(pad, pad)).unwrap_or(Rect::ZERO);
            let depth_before = cx.clip_depth;

            let mut nest = clip::open(self.list, passes, clips);
            cx.clip_depth = nest.children.stack_depth;
            let dcx = decoration_context(cx, id, nest.children.stack_depth);
            {
                let mut renderer = Renderer::new(self.list, &mut nest.content, cx.opacity, Some(id));
                behavior.rasterize(&dcx, &mut renderer, &settings, decorator);
            }
            if has_children {
                self.rasterize_children(cx, &mut nest.children, id);
            }
            let clip_settings = DecorationSettings {
                pass: RasterPass::ContentClip,
                state: ElementStates::empty(),
                ..settings
            };
            clip::close(self.list, &nest, id, |renderer| match decorator {
                Some(d) => d.rasterize_clip(&dcx, renderer, &clip_settings),
                None => renderer.fill_rect(clip_settings.rect, Color::WHITE),
            });

            cx.clip_depth = depth_before;
            assert_eq!(
                cx.clip_depth, passes.stack_depth,
                "nested clip stack unbalanced after pass"
            );
            cx.visible_region = saved_region;
        } else {
            let dcx = decoration_context(cx, id, passes.stack_depth);
            {
                let mut renderer =
                    Renderer::new(self.list, passes.pass_mut(pass), cx.opacity, Some(id));
                behavior.rasterize(&dcx, &mut renderer, &settings, decorator);
            }
            if pass == RasterPass::Content && has_children {
                self.rasterize_children(cx, passes, id);
            }
        }

        passes.pass_mut(pass).layer += 1;
    }

    fn rasterize_children(&mut self, cx: &mut AmbientContext, passes: &mut PassSet, id: ElementId) {
        let (ordered, range) = self.tree.children_in_display_order(id, cx.frame_index);
        let mut current: Option<i32> = None;
        let mut split: Option<PassSet> = None;
        for child in ordered {
            let Some(el) = self.tree.get(child) else {
                continue;
            };
            if !el.flags.contains(ElementFlags::VISIBLE) {
                continue;
            }
            let order = el.display_order;
            let needs_split = match self.config.plane_split {
                PlaneSplit::ByDisplayOrder => {
                    range.is_mixed() && current.is_some_and(|c| c != order)
                }
                PlaneSplit::EverySibling => current.is_some(),
            };
            current = Some(order);
            if needs_split {
                self.stats.plane_splits += 1;
                passes.above.layer += 1;
                split = Some(PassSet::within(
                    self.list,
                    &mut passes.above,
                    passes.stack_depth,
                    passes.overlay,
                ));
            }
            let target = match split.as_mut() {
                Some(s) => s,
                None => &mut *passes,
            };
            self.rasterize(cx, target, child, 1.0);
        }
    }

    /// Runs `f` with a scratch lease, releasing it afterwards on every path.
    fn with_scratch<R>(
        &mut self,
        region: Rect,
        busy: &[ScratchTargetId],
        f: impl FnOnce(&mut Self, &ScratchLease) -> R,
    ) -> Option<R> {
        let lease = self.pool.acquire(region, busy)?;
        self.stats.scratch_acquires += 1;
        let out = f(self, &lease);
        self.pool.release(lease);
        self.stats.scratch_releases += 1;
        Some(out)
    }

    fn rasterize_composited(
        &mut self,
        cx: &mut AmbientContext,
        passes: &mut PassSet,
        id: ElementId,
        rect: Rect,
        opacity: f32,
        compositor: Option<Arc<dyn Compositor>>,
    ) -> bool {
        let has_transform = self
            .tree
            .get(id)
            .is_some_and(|el| el.has_active_transform(cx.now));
        let padding = compositor
            .as_ref()
            .and_then(|c| c.padding())
            .unwrap_or(self.config.compositor_padding);
        let padded = rect.inflate(padding, padding).expand();
        let Some(region) = util::intersect(padded, self.config.canvas) else {
            self.log.report(Recoverable::EmptyCompositeRegion, id);
            return false;
        };

        let busy = cx.scratch_stack.clone();
        let overlay = passes.overlay;
        let rendered = self.with_scratch(region, &busy, |this, lease| {
            let target = lease.target();
            if let Some(&outer) = busy.last() {
                this.pool.add_dependency(outer, target);
            }
            this.render_prepass(cx, overlay, id, region, target);
            target
        });
        let Some(source) = rendered else {
            self.log.report(Recoverable::ScratchExhausted, id);
            return false;
        };
        self.stats.composited += 1;

        let Some(el) = self.tree.get_mut(id) else {
            return false;
        };
        let blit = CompositeDraw {
            source,
            source_rect: region,
            dest_rect: region,
            opacity: cx.opacity * opacity,
            blend: el.composite_blend.unwrap_or_default(),
        };
        let is_overlay = el.flags.contains(ElementFlags::OVERLAY);

        if has_transform || compositor.is_some() {
            el.composite = Some(CompositeRecord {
                rect,
                draw: Some(blit),
            });
            let hooks = compositor.as_ref().map(|_| id);
            let mut sub = passes.above.subgroup_with(
                self.list,
                Some(ViewTransform::ElementLocal(id)),
                hooks,
            );
            let mut renderer = Renderer::new(self.list, &mut sub, blit.opacity, Some(id));
            let handled = compositor
                .as_ref()
                .is_some_and(|c| c.composite(&mut renderer, &blit));
            if !handled {
                renderer.composite(blit);
            }
            passes.above.layer += 1;
        } else if is_overlay {
            let mut surface = Surface::new(passes.overlay);
            Renderer::new(self.list, &mut surface, blit.opacity, Some(id)).composite(blit);
        } else {
            Renderer::new(self.list, &mut passes.above, blit.opacity, Some(id)).composite(blit);
            passes.above.layer += 1;
        }
        true
    }

    /// Renders the subtree of `id` into a scratch region at full opacity.
    fn render_prepass(
        &mut self,
        cx: &mut AmbientContext,
        overlay: GroupId,
        id: ElementId,
        region: Rect,
        target: ScratchTargetId,
    ) {
        let group = self.list.root(RenderTarget::Scratch(target));
        let mut container = Surface::new(group);
        let mut prepass = PassSet::within(self.list, &mut container, 0, overlay);

        let saved = (cx.opacity, cx.visible_region, cx.clip_depth);
        cx.opacity = 1.0;
        cx.visible_region = region;
        cx.clip_depth = 0;
        cx.scratch_stack.push(target);
        self.rasterize_all_passes(cx, &mut prepass, id, true);
        cx.scratch_stack.pop();
        (cx.opacity, cx.visible_region, cx.clip_depth) = saved;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LayoutTable;
    use crate::behavior::ElementBehavior;
    use crate::draw::{Draw, DrawCommand, StencilMode};
    use core::cell::Cell;

    #[derive(Debug)]
    struct Fill(Color);

    impl Decorator for Fill {
        fn rasterize(&self, _: &DecorationContext, r: &mut Renderer<'_>, s: &DecorationSettings) {
            if s.pass == RasterPass::Content {
                r.fill_rect(s.rect, self.0);
            }
        }
    }

    #[derive(Default)]
    struct Counting {
        pre: Cell<u32>,
        hidden: Cell<u32>,
    }

    impl ElementBehavior for Counting {
        fn pre_rasterize(&self, _: &DecorationContext, s: &DecorationSettings) {
            self.pre.set(self.pre.get() + 1);
            if s.state.contains(ElementStates::INVISIBLE) {
                self.hidden.set(self.hidden.get() + 1);
            }
        }
    }

    fn boxed(layout: &mut LayoutTable, rect: Rect) -> Element {
        Element::container()
            .with_layout(layout.insert_rect(rect))
            .with_decorator(Arc::new(Fill(Color::BLACK)))
    }

    fn frame_draws(r: &Rasterizer) -> Vec<&Draw> {
        r.draw_list().ordered_draws(RenderTarget::Frame)
    }

    #[test]
    fn zero_opacity_and_invisible_issue_nothing() {
        let mut layout = LayoutTable::new();
        let mut tree = ElementTree::new();
        let behavior = Arc::new(Counting::default());
        let a = tree.insert_root(
            boxed(&mut layout, Rect::new(0.0, 0.0, 10.0, 10.0))
                .with_opacity(0.0)
                .with_behavior(behavior.clone()),
        );
        let b = tree.insert_root(
            boxed(&mut layout, Rect::new(0.0, 0.0, 10.0, 10.0))
                .with_flags(ElementFlags::ENABLED),
        );
        let mut r = Rasterizer::default();
        let mut root = r.begin_frame(0.0);
        let mut cx = r.ambient_context();
        for id in [a, b] {
            let mut passes = r.open_pass_set(&mut root);
            assert!(!r.rasterize(&mut tree, &layout, &mut cx, &mut passes, id, 1.0));
        }
        let stats = r.end_frame();
        assert!(frame_draws(&r).is_empty());
        assert_eq!(stats.hidden, 2);
        assert_eq!(behavior.hidden.get(), 1);
    }

    #[derive(Debug, Default)]
    struct MaskStates {
        content: Cell<ElementStates>,
        clip: Cell<Option<ElementStates>>,
    }

    impl Decorator for MaskStates {
        fn rasterize(&self, _: &DecorationContext, r: &mut Renderer<'_>, s: &DecorationSettings) {
            if s.pass == RasterPass::Content {
                self.content.set(s.state);
                r.fill_rect(s.rect, Color::BLACK);
            }
        }

        fn rasterize_clip(&self, _: &DecorationContext, r: &mut Renderer<'_>, s: &DecorationSettings) {
            self.clip.set(Some(s.state));
            r.fill_rect(s.rect, Color::WHITE);
        }
    }

    #[test]
    fn clip_mask_ignores_interaction_state() {
        let mut layout = LayoutTable::new();
        let mut tree = ElementTree::new();
        let root = tree.insert_root(boxed(&mut layout, Rect::new(0.0, 0.0, 100.0, 100.0)));
        let decorator = Arc::new(MaskStates::default());
        let mut clipper = Element::container()
            .with_layout(layout.insert_rect(Rect::new(10.0, 10.0, 60.0, 60.0)))
            .with_flags(ElementFlags::default() | ElementFlags::CLIP_CHILDREN)
            .with_decorator(decorator.clone());
        clipper.state = ElementStates::HOVERING | ElementStates::PRESSED;
        let clipper = tree.insert(root, clipper).unwrap();
        tree.insert(clipper, boxed(&mut layout, Rect::new(20.0, 20.0, 40.0, 40.0)))
            .unwrap();

        let mut r = Rasterizer::default();
        r.rasterize_frame(&mut tree, &layout, 0.0);
        assert!(
            decorator
                .content
                .get()
                .contains(ElementStates::HOVERING | ElementStates::PRESSED)
        );
        assert_eq!(decorator.clip.get(), Some(ElementStates::empty()));
    }

    #[test]
    fn invalid_layout_is_hidden_and_counted() {
        let mut tree = ElementTree::new();
        let layout = LayoutTable::new();
        tree.insert_root(Element::leaf().with_decorator(Arc::new(Fill(Color::BLACK))));
        let mut r = Rasterizer::default();
        let stats = r.rasterize_frame(&mut tree, &layout, 0.0);
        assert_eq!(stats.hidden, 1);
        assert_eq!(r.recoverable().count(Recoverable::InvalidLayout), 1);
        assert!(frame_draws(&r).is_empty());
    }

    #[test]
    fn offscreen_children_are_culled_but_roots_are_not() {
        let mut layout = LayoutTable::new();
        let mut tree = ElementTree::new();
        let far = Rect::new(5000.0, 5000.0, 5010.0, 5010.0);
        let root = tree.insert_root(boxed(&mut layout, far));
        let kid_behavior = Arc::new(Counting::default());
        tree.insert(
            root,
            boxed(&mut layout, far).with_behavior(kid_behavior.clone()),
        )
        .unwrap();
        let mut r = Rasterizer::default();
        r.rasterize_frame(&mut tree, &layout, 0.0);
        assert_eq!(frame_draws(&r).len(), 1);
        assert_eq!(kid_behavior.hidden.get(), 1);
    }

    #[test]
    fn half_opacity_composites_once() {
        let mut layout = LayoutTable::new();
        let mut tree = ElementTree::new();
        let id = tree.insert_root(
            boxed(&mut layout, Rect::new(100.0, 100.0, 200.0, 200.0)).with_opacity(0.5),
        );
        let mut r = Rasterizer::default();
        let stats = r.rasterize_frame(&mut tree, &layout, 0.0);
        assert_eq!((stats.scratch_acquires, stats.scratch_releases), (1, 1));
        let draws = frame_draws(&r);
        assert_eq!(draws.len(), 1);
        let DrawCommand::Composite(blit) = draws[0].command else {
            panic!("expected a composite blit");
        };
        assert_eq!(blit.opacity, 0.5);
        assert_eq!(blit.dest_rect, Rect::new(84.0, 84.0, 216.0, 216.0));
        let target = RenderTarget::Scratch(blit.source);
        let inner = r.draw_list().ordered_draws(target);
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].opacity, 1.0);
        assert_eq!(inner[0].element, Some(id));
    }

    #[test]
    fn exhausted_pool_culls_softly() {
        let mut layout = LayoutTable::new();
        let mut tree = ElementTree::new();
        for _ in 0..2 {
            tree.insert_root(
                boxed(&mut layout, Rect::new(0.0, 0.0, 50.0, 50.0)).with_opacity(0.5),
            );
        }
        let mut r = Rasterizer::new(RasterConfig {
            max_scratch_targets: 1,
            ..RasterConfig::default()
        });
        let stats = r.rasterize_frame(&mut tree, &layout, 0.0);
        assert_eq!(stats.composited, 1);
        assert_eq!(r.recoverable().count(Recoverable::ScratchExhausted), 1);
        assert_eq!(r.scratch_pool().outstanding(), 0);
    }

    #[test]
    fn stacked_panels_paint_bottom_to_top() {
        let mut layout = LayoutTable::new();
        let mut tree = ElementTree::new();
        let root = tree.insert_root(Element::container().with_layout(
            layout.insert_rect(Rect::new(0.0, 0.0, 300.0, 300.0)),
        ));
        let panels: Vec<ElementId> = (0..3)
            .map(|i| {
                let x = f64::from(i) * 10.0;
                tree.insert(root, boxed(&mut layout, Rect::new(x, x, x + 100.0, x + 100.0)))
                    .unwrap()
            })
            .collect();
        let mut r = Rasterizer::default();
        r.rasterize_frame(&mut tree, &layout, 0.0);
        let order: Vec<Option<ElementId>> = frame_draws(&r).iter().map(|d| d.element).collect();
        assert_eq!(order, panels.iter().copied().map(Some).collect::<Vec<_>>());
    }

    #[test]
    fn clipping_container_writes_mask_before_children() {
        let mut layout = LayoutTable::new();
        let mut tree = ElementTree::new();
        let clipper = tree.insert_root(
            boxed(&mut layout, Rect::new(0.0, 0.0, 50.0, 50.0))
                .with_flags(ElementFlags::default() | ElementFlags::CLIP_CHILDREN),
        );
        tree.insert(clipper, boxed(&mut layout, Rect::new(10.0, 10.0, 90.0, 90.0)))
            .unwrap();
        let mut r = Rasterizer::default();
        let stats = r.rasterize_frame(&mut tree, &layout, 0.0);
        assert_eq!(stats.nested_passes, 1);
        let kinds: Vec<(StencilMode, bool)> = frame_draws(&r)
            .iter()
            .map(|d| (d.stencil, d.color_write))
            .collect();
        assert_eq!(
            kinds,
            [
                (StencilMode::Disabled, false),
                (StencilMode::Write(0), false),
                (StencilMode::Test(1), true),
                (StencilMode::Test(1), true),
            ]
        );
    }

    #[test]
    fn pre_rasterize_runs_once_per_visible_frame() {
        let mut layout = LayoutTable::new();
        let mut tree = ElementTree::new();
        let behavior = Arc::new(Counting::default());
        tree.insert_root(
            boxed(&mut layout, Rect::new(0.0, 0.0, 10.0, 10.0)).with_behavior(behavior.clone()),
        );
        let mut r = Rasterizer::default();
        r.rasterize_frame(&mut tree, &layout, 0.0);
        r.rasterize_frame(&mut tree, &layout, 1.0);
        assert_eq!(behavior.pre.get(), 2);
        assert_eq!(behavior.hidden.get(), 0);
    }
}
