// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Element identity, flags, and per-element render state.

use core::cell::RefCell;
use core::fmt;
use std::sync::Arc;

use kurbo::{Affine, Rect, Vec2};
use peniko::BlendMode;

use crate::anim::Tween;
use crate::behavior::{DefaultBehavior, ElementBehavior};
use crate::composite::Compositor;
use crate::decor::{DecorationProvider, Decorator, ElementStates};
use crate::draw::CompositeDraw;
use crate::layout::LayoutKey;
use crate::tree::OrderCache;

/// Generational handle to an element in an [`ElementTree`](crate::ElementTree).
///
/// A slot index paired with a generation counter. Removing an element frees its slot;
/// reusing the slot bumps the generation, so a stale `ElementId` never aliases a newer
/// element. Use [`ElementTree::is_alive`](crate::ElementTree::is_alive) to check liveness.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ElementId(pub(crate) u32, pub(crate) u32);

impl ElementId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }

    /// Slot index, stable for the lifetime of the element.
    pub const fn index(self) -> u32 {
        self.0
    }
}

bitflags::bitflags! {
    /// Element flags controlling rendering, clipping, and hit-test participation.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ElementFlags: u16 {
        /// Element participates in rendering and hit testing.
        const VISIBLE = 1 << 0;
        /// Element responds to input. Disabled elements fail filtered hit tests.
        const ENABLED = 1 << 1;
        /// Element is excluded from hit testing despite geometric presence.
        const INTANGIBLE = 1 << 2;
        /// Element accepts pointer input.
        const ACCEPTS_MOUSE_INPUT = 1 << 3;
        /// Element can take keyboard focus.
        const ACCEPTS_FOCUS = 1 << 4;
        /// Children are clipped to this element's box with a stencil mask.
        const CLIP_CHILDREN = 1 << 5;
        /// Children render in their own nested layer context without clipping.
        const ISOLATE_CHILDREN = 1 << 6;
        /// Composited output goes to the frame overlay instead of the Above pass.
        const OVERLAY = 1 << 7;
        /// A container never claims a hit for itself.
        const DISABLE_SELF_HIT_TESTS = 1 << 8;
        /// A container never forwards hit tests to its children.
        const DISABLE_CHILD_HIT_TESTS = 1 << 9;
        /// Children can only be hit inside the container's own box.
        const CONSTRAIN_CHILD_HIT_TESTS = 1 << 10;
        /// Children are neither rendered nor hit.
        const HIDE_CHILDREN = 1 << 11;
    }
}

impl Default for ElementFlags {
    fn default() -> Self {
        Self::VISIBLE | Self::ENABLED | Self::ACCEPTS_MOUSE_INPUT
    }
}

/// An element's transform, applied around a relative origin within its box.
#[derive(Copy, Clone, Debug)]
pub struct ElementTransform {
    /// Transform matrix, possibly animated.
    pub matrix: Tween<Affine>,
    /// Origin as a fraction of the element's box size. Defaults to the center.
    pub origin: Vec2,
}

impl ElementTransform {
    /// A static transform around the element's center.
    pub fn new(matrix: Affine) -> Self {
        Self::animated(Tween::constant(matrix))
    }

    /// An animated transform around the element's center.
    pub fn animated(matrix: Tween<Affine>) -> Self {
        Self {
            matrix,
            origin: Vec2::new(0.5, 0.5),
        }
    }

    /// Sets the relative origin.
    pub fn with_origin(mut self, origin: Vec2) -> Self {
        self.origin = origin;
        self
    }

    /// Returns `true` if the matrix evaluates to identity at `now`.
    pub fn is_identity_at(&self, now: f64) -> bool {
        self.matrix.value(now) == Affine::IDENTITY
    }

    /// Full transform for an element occupying `rect`: translate to origin, apply the
    /// matrix, translate back.
    pub fn global_matrix(&self, rect: Rect, now: f64) -> Affine {
        let offset = Vec2::new(
            rect.x0 + rect.width() * self.origin.x,
            rect.y0 + rect.height() * self.origin.y,
        );
        Affine::translate(offset) * self.matrix.value(now) * Affine::translate(-offset)
    }
}

/// Where an element was last composited.
///
/// Written during rasterization and read during submission, which may happen later in
/// the frame. Submission uses it to resolve deferred element-local view transforms and
/// to drive [`Compositor`] issue hooks.
#[derive(Clone, Debug, PartialEq)]
pub struct CompositeRecord {
    /// Element box at the time of rasterization.
    pub rect: Rect,
    /// The blit, if the element went through a scratch surface.
    pub draw: Option<CompositeDraw>,
}

/// One node of the retained tree.
///
/// Public fields are plain element state that hosts and widgets edit directly.
/// Structure (parent, children) is owned by the [`ElementTree`](crate::ElementTree).
pub struct Element {
    /// Rendering and hit-test flags.
    pub flags: ElementFlags,
    /// Interaction state bits forwarded to decorators (hover, focus, press).
    pub state: ElementStates,
    /// Handle into the layout provider. [`LayoutKey::INVALID`] renders as hidden.
    pub layout_key: LayoutKey,
    /// Paint order among siblings. Ties keep insertion order.
    pub display_order: i32,
    /// Opacity, possibly animated.
    pub opacity: Tween<f32>,
    /// Optional transform.
    pub transform: Option<ElementTransform>,
    /// Decorator used instead of the provider's default.
    pub decorator: Option<Arc<dyn Decorator>>,
    /// Provider pushed for this element's subtree.
    pub decoration_provider: Option<Arc<dyn DecorationProvider>>,
    /// Custom composite behavior.
    pub compositor: Option<Arc<dyn Compositor>>,
    /// Blend used for the final blit. Defaults to source-over.
    pub composite_blend: Option<BlendMode>,
    /// Widget-kind strategy.
    pub behavior: Arc<dyn ElementBehavior>,
    pub(crate) parent: Option<ElementId>,
    pub(crate) children: Option<Vec<ElementId>>,
    pub(crate) sequence: u64,
    pub(crate) composite: Option<CompositeRecord>,
    pub(crate) order_cache: RefCell<Option<OrderCache>>,
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("flags", &self.flags)
            .field("layout_key", &self.layout_key)
            .field("display_order", &self.display_order)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("has_transform", &self.transform.is_some())
            .field("has_compositor", &self.compositor.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Element {
    fn default() -> Self {
        Self::leaf()
    }
}

impl Element {
    /// An element that cannot have children.
    pub fn leaf() -> Self {
        Self {
            flags: ElementFlags::default(),
            state: ElementStates::empty(),
            layout_key: LayoutKey::INVALID,
            display_order: 0,
            opacity: Tween::constant(1.0),
            transform: None,
            decorator: None,
            decoration_provider: None,
            compositor: None,
            composite_blend: None,
            behavior: Arc::new(DefaultBehavior),
            parent: None,
            children: None,
            sequence: 0,
            composite: None,
            order_cache: RefCell::new(None),
        }
    }

    /// An element that owns a child collection.
    pub fn container() -> Self {
        Self {
            children: Some(Vec::new()),
            ..Self::leaf()
        }
    }

    /// Sets the layout key.
    pub fn with_layout(mut self, key: LayoutKey) -> Self {
        self.layout_key = key;
        self
    }

    /// Replaces the flags.
    pub fn with_flags(mut self, flags: ElementFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets a constant opacity.
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = Tween::constant(opacity);
        self
    }

    /// Sets the transform.
    pub fn with_transform(mut self, transform: ElementTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Sets the display order.
    pub fn with_display_order(mut self, order: i32) -> Self {
        self.display_order = order;
        self
    }

    /// Sets the behavior strategy.
    pub fn with_behavior(mut self, behavior: Arc<dyn ElementBehavior>) -> Self {
        self.behavior = behavior;
        self
    }

    /// Sets a decorator override.
    pub fn with_decorator(mut self, decorator: Arc<dyn Decorator>) -> Self {
        self.decorator = Some(decorator);
        self
    }

    /// Sets a subtree decoration provider.
    pub fn with_decoration_provider(mut self, provider: Arc<dyn DecorationProvider>) -> Self {
        self.decoration_provider = Some(provider);
        self
    }

    /// Sets a custom compositor.
    pub fn with_compositor(mut self, compositor: Arc<dyn Compositor>) -> Self {
        self.compositor = Some(compositor);
        self
    }

    /// Parent element, if any. Resolved through the tree; never owning.
    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    /// Children in insertion order. Empty for leaves.
    pub fn children(&self) -> &[ElementId] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Returns `true` if this element can hold children.
    pub fn is_container(&self) -> bool {
        self.children.is_some()
    }

    /// Most recent composite record written by the rasterizer.
    pub fn composite_record(&self) -> Option<&CompositeRecord> {
        self.composite.as_ref()
    }

    /// Returns `true` if the element has a transform that is not identity at `now`.
    pub fn has_active_transform(&self, now: f64) -> bool {
        self.transform.as_ref().is_some_and(|t| !t.is_identity_at(now))
    }

    /// Drops a transform whose animation has settled on identity.
    pub(crate) fn auto_clear_transform(&mut self, now: f64) {
        if self
            .transform
            .as_ref()
            .is_some_and(|t| t.matrix.is_finished(now) && t.is_identity_at(now))
        {
            self.transform = None;
        }
    }

    /// Element-local view transform at `now`, from the most recent composite record.
    pub fn local_view_transform(&self, now: f64) -> Affine {
        match (&self.transform, &self.composite) {
            (Some(t), Some(record)) => t.global_matrix(record.rect, now),
            _ => Affine::IDENTITY,
        }
    }
}
