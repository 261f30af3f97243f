// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hierarchical draw list.
//!
//! Draws are recorded into groups. Each group entry carries a sort layer; within a group
//! entries are issued in `(layer, sequence)` order, and a nested group is issued as a unit
//! at its own layer. Layers are not depth: they exist only to make paint order stable
//! when independent surfaces append to the same group out of order.
//!
//! A [`Surface`] is a small copyable cursor (group, current layer, stencil and blend
//! state) that walkers thread through recursion. A [`Renderer`] pairs a surface with the
//! list for decorators.

use kurbo::{Affine, Point, Rect};
use peniko::{BlendMode, Color};

use crate::composite::ScratchTargetId;
use crate::decor::GlyphSource;
use crate::element::ElementId;
use crate::tree::ElementTree;

/// Identifier of a group in a [`DrawList`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupId(u32);

impl GroupId {
    const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Where a root group renders.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    /// The frame's final surface.
    Frame,
    /// A pooled scratch surface.
    Scratch(ScratchTargetId),
}

/// Stencil state attached to a draw.
///
/// Comparisons read as `reference OP stored`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum StencilMode {
    /// No stencil test or write.
    #[default]
    Disabled,
    /// Draw where `r <= stored`; stencil unchanged. Used for clipped content.
    Test(u8),
    /// Draw where `stored == r`; increment stored (saturating). Used to write a clip mask
    /// one level deeper than `r`.
    Write(u8),
    /// Draw where `r < stored`; replace stored with `r`. Erases masks deeper than `r`.
    Restore(u8),
}

/// A view transform attached to a group.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ViewTransform {
    /// Fixed matrix.
    Fixed(Affine),
    /// Resolved at submission from the element's transform and its most recent
    /// [`CompositeRecord`](crate::CompositeRecord).
    ElementLocal(ElementId),
}

/// Blit of a scratch region back onto a destination surface.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CompositeDraw {
    /// Scratch surface holding the rendered subtree.
    pub source: ScratchTargetId,
    /// Region of the scratch surface to sample.
    pub source_rect: Rect,
    /// Destination rectangle, before any view transform.
    pub dest_rect: Rect,
    /// Effective opacity: ambient opacity times element opacity.
    pub opacity: f32,
    /// Blend state for the blit.
    pub blend: BlendMode,
}

/// What a draw does.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    /// Solid rectangle.
    FillRect {
        /// Rectangle to fill.
        rect: Rect,
        /// Fill color, before opacity.
        color: Color,
    },
    /// Text run from a host glyph source.
    Glyphs {
        /// Glyph source.
        source: GlyphSource,
        /// Baseline origin.
        origin: Point,
        /// Text color, before opacity.
        color: Color,
    },
    /// Host-defined primitive, identified by tag.
    Custom {
        /// Host tag.
        tag: u32,
        /// Bounds of the primitive.
        rect: Rect,
    },
    /// Reset every stencil value on the target.
    ClearStencil(u8),
    /// Scratch surface blit.
    Composite(CompositeDraw),
}

/// One recorded draw with the state it is issued under.
#[derive(Clone, Debug, PartialEq)]
pub struct Draw {
    /// The primitive.
    pub command: DrawCommand,
    /// Stencil state.
    pub stencil: StencilMode,
    /// Blend state.
    pub blend: BlendMode,
    /// Opacity multiplier.
    pub opacity: f32,
    /// Whether the draw writes color. Mask draws only touch the stencil.
    pub color_write: bool,
    /// Element that issued the draw.
    pub element: Option<ElementId>,
}

#[derive(Clone, Debug)]
enum Item {
    Draw(Draw),
    Group(GroupId),
}

#[derive(Clone, Debug)]
struct Entry {
    layer: i32,
    seq: u32,
    item: Item,
}

#[derive(Clone, Debug)]
struct Group {
    target: RenderTarget,
    entries: Vec<Entry>,
    view: Option<ViewTransform>,
    hooks: Option<ElementId>,
}

/// Sink for submitted draws.
pub trait RenderBackend {
    /// All following draws go to `target`, which starts cleared.
    fn begin_target(&mut self, target: RenderTarget);
    /// Issues one draw under `view`.
    fn draw(&mut self, draw: &Draw, view: Affine);
}

/// Hierarchy of draw groups for one frame.
#[derive(Clone, Debug, Default)]
pub struct DrawList {
    groups: Vec<Group>,
    roots: Vec<GroupId>,
}

impl DrawList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every group.
    pub fn clear(&mut self) {
        self.groups.clear();
        self.roots.clear();
    }

    fn alloc(&mut self, group: Group) -> GroupId {
        let id = GroupId(u32::try_from(self.groups.len()).unwrap_or(u32::MAX));
        self.groups.push(group);
        id
    }

    /// Creates a root group rendering to `target`.
    pub fn root(&mut self, target: RenderTarget) -> GroupId {
        let id = self.alloc(Group {
            target,
            entries: Vec::new(),
            view: None,
            hooks: None,
        });
        self.roots.push(id);
        id
    }

    /// Creates a group nested in `parent` at `layer`.
    ///
    /// `hooks` names an element whose [`Compositor`](crate::Compositor) issue hooks run
    /// around the group at submission.
    pub fn subgroup(
        &mut self,
        parent: GroupId,
        layer: i32,
        view: Option<ViewTransform>,
        hooks: Option<ElementId>,
    ) -> GroupId {
        let target = self.groups[parent.idx()].target;
        let id = self.alloc(Group {
            target,
            entries: Vec::new(),
            view,
            hooks,
        });
        self.push_item(parent, layer, Item::Group(id));
        id
    }

    /// Appends a draw to `group` at `layer`.
    pub fn push(&mut self, group: GroupId, layer: i32, draw: Draw) {
        self.push_item(group, layer, Item::Draw(draw));
    }

    fn push_item(&mut self, group: GroupId, layer: i32, item: Item) {
        let entries = &mut self.groups[group.idx()].entries;
        let seq = u32::try_from(entries.len()).unwrap_or(u32::MAX);
        entries.push(Entry { layer, seq, item });
    }

    /// Returns `true` if `group` contains no draws, directly or through nested groups.
    pub fn is_empty(&self, group: GroupId) -> bool {
        self.groups[group.idx()].entries.iter().all(|e| match &e.item {
            Item::Draw(_) => false,
            Item::Group(g) => self.is_empty(*g),
        })
    }

    /// Number of groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Render target of `group`.
    pub fn target_of(&self, group: GroupId) -> RenderTarget {
        self.groups[group.idx()].target
    }

    fn sorted_entries(&self, group: GroupId) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self.groups[group.idx()].entries.iter().collect();
        entries.sort_unstable_by_key(|e| (e.layer, e.seq));
        entries
    }

    /// Draws for `target` in issue order, ignoring view transforms.
    pub fn ordered_draws(&self, target: RenderTarget) -> Vec<&Draw> {
        let mut out = Vec::new();
        for &root in &self.roots {
            if self.groups[root.idx()].target == target {
                self.collect(root, &mut out);
            }
        }
        out
    }

    fn collect<'a>(&'a self, group: GroupId, out: &mut Vec<&'a Draw>) {
        for entry in self.sorted_entries(group) {
            match &entry.item {
                Item::Draw(d) => out.push(d),
                Item::Group(g) => self.collect(*g, out),
            }
        }
    }

    /// Issues every group to `backend`.
    ///
    /// Scratch targets go first in `scratch_order`, then the frame target. Deferred view
    /// transforms and compositor hooks are resolved against `tree` at `now`.
    pub fn submit(
        &self,
        scratch_order: &[ScratchTargetId],
        tree: &ElementTree,
        now: f64,
        backend: &mut dyn RenderBackend,
    ) {
        let targets = scratch_order
            .iter()
            .map(|&t| RenderTarget::Scratch(t))
            .chain(core::iter::once(RenderTarget::Frame));
        for target in targets {
            backend.begin_target(target);
            for &root in &self.roots {
                if self.groups[root.idx()].target == target {
                    self.submit_group(root, Affine::IDENTITY, tree, now, backend);
                }
            }
        }
    }

    fn submit_group(
        &self,
        group: GroupId,
        view: Affine,
        tree: &ElementTree,
        now: f64,
        backend: &mut dyn RenderBackend,
    ) {
        let g = &self.groups[group.idx()];
        let view = match g.view {
            None => view,
            Some(ViewTransform::Fixed(m)) => view * m,
            Some(ViewTransform::ElementLocal(id)) => {
                view * tree
                    .get(id)
                    .map_or(Affine::IDENTITY, |el| el.local_view_transform(now))
            }
        };
        let hooks = g.hooks.and_then(|id| tree.get(id)).and_then(|el| {
            let record = el.composite_record()?;
            Some((el.compositor.clone()?, record))
        });
        if let Some((compositor, record)) = &hooks {
            compositor.before_issue(record, backend);
        }
        for entry in self.sorted_entries(group) {
            match &entry.item {
                Item::Draw(d) => backend.draw(d, view),
                Item::Group(sub) => self.submit_group(*sub, view, tree, now, backend),
            }
        }
        if let Some((compositor, record)) = &hooks {
            compositor.after_issue(record, backend);
        }
    }
}

/// Cursor into a draw group.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Surface {
    /// Group draws are appended to.
    pub group: GroupId,
    /// Layer for the next draw. Only ever increases.
    pub layer: i32,
    /// Stencil state applied to draws.
    pub stencil: StencilMode,
    /// Blend state applied to draws.
    pub blend: BlendMode,
    /// Whether draws write color.
    pub color_write: bool,
}

impl Surface {
    /// A surface at layer 0 of `group` with default state.
    pub fn new(group: GroupId) -> Self {
        Self {
            group,
            layer: 0,
            stencil: StencilMode::Disabled,
            blend: BlendMode::default(),
            color_write: true,
        }
    }

    /// Opens a nested group at the current layer, inheriting stencil and blend state.
    pub fn subgroup(&self, list: &mut DrawList) -> Self {
        self.subgroup_with(list, None, None)
    }

    /// Opens a nested group with a view transform and optional compositor hooks.
    pub fn subgroup_with(
        &self,
        list: &mut DrawList,
        view: Option<ViewTransform>,
        hooks: Option<ElementId>,
    ) -> Self {
        Self {
            group: list.subgroup(self.group, self.layer, view, hooks),
            layer: 0,
            ..*self
        }
    }

    /// Appends `command` at the current layer with this surface's state.
    pub fn draw(
        &self,
        list: &mut DrawList,
        command: DrawCommand,
        opacity: f32,
        element: Option<ElementId>,
    ) {
        self.draw_at(list, self.layer, command, opacity, element);
    }

    /// Appends `command` at an explicit layer with this surface's state.
    pub fn draw_at(
        &self,
        list: &mut DrawList,
        layer: i32,
        command: DrawCommand,
        opacity: f32,
        element: Option<ElementId>,
    ) {
        list.push(
            self.group,
            layer,
            Draw {
                command,
                stencil: self.stencil,
                blend: self.blend,
                opacity,
                color_write: self.color_write,
                element,
            },
        );
    }
}

/// Drawing handle given to decorators and element behaviors.
///
/// Every draw is stamped with the walk's accumulated opacity and the issuing element.
#[derive(Debug)]
pub struct Renderer<'a> {
    list: &'a mut DrawList,
    surface: &'a mut Surface,
    opacity: f32,
    element: Option<ElementId>,
}

impl<'a> Renderer<'a> {
    /// Wraps a surface.
    pub fn new(
        list: &'a mut DrawList,
        surface: &'a mut Surface,
        opacity: f32,
        element: Option<ElementId>,
    ) -> Self {
        Self {
            list,
            surface,
            opacity,
            element,
        }
    }

    /// Appends a command at the current layer.
    pub fn draw(&mut self, command: DrawCommand) {
        self.surface
            .draw(self.list, command, self.opacity, self.element);
    }

    /// Appends a command at an explicit layer.
    pub fn draw_at(&mut self, layer: i32, command: DrawCommand) {
        self.surface
            .draw_at(self.list, layer, command, self.opacity, self.element);
    }

    /// Fills a rectangle.
    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.draw(DrawCommand::FillRect { rect, color });
    }

    /// Draws a text run.
    pub fn glyphs(&mut self, source: GlyphSource, origin: Point, color: Color) {
        self.draw(DrawCommand::Glyphs {
            source,
            origin,
            color,
        });
    }

    /// Blits a scratch region. The draw carries the blit's own opacity and blend.
    pub fn composite(&mut self, blit: CompositeDraw) {
        let surface = Surface {
            blend: blit.blend,
            ..*self.surface
        };
        surface.draw(
            self.list,
            DrawCommand::Composite(blit),
            blit.opacity,
            self.element,
        );
    }

    /// Current layer.
    pub fn layer(&self) -> i32 {
        self.surface.layer
    }

    /// Moves to a later layer. Layers never move backwards.
    pub fn set_layer(&mut self, layer: i32) {
        self.surface.layer = self.surface.layer.max(layer);
    }

    /// Opacity applied to draws.
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Underlying surface state.
    pub fn surface(&self) -> &Surface {
        self.surface
    }
}
