// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Decorator capability objects and the values handed to them.
//!
//! A [`Decorator`] paints an element's chrome for one pass at a time. The core never
//! subclasses decorators; it resolves one per element (an explicit override, or the
//! active [`DecorationProvider`]'s default for the element's [`DecorationKind`]) and
//! calls it with a freshly built [`DecorationSettings`] value.

use std::sync::Arc;

use kurbo::Rect;
use peniko::Color;
use smallvec::SmallVec;

use crate::draw::Renderer;
use crate::element::ElementId;
use crate::pass::RasterPass;

/// Name of a decorator family a provider can supply, such as `"button"` or `"window"`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DecorationKind(pub &'static str);

bitflags::bitflags! {
    /// Interaction state forwarded to decorators.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ElementStates: u16 {
        /// Pointer is over the element.
        const HOVERING = 1 << 0;
        /// Element has keyboard focus.
        const FOCUSED = 1 << 1;
        /// Element is being pressed.
        const PRESSED = 1 << 2;
        /// Element is selected or checked.
        const SELECTED = 1 << 3;
        /// Element is not enabled.
        const DISABLED = 1 << 4;
        /// Element took the hidden path this frame. Only seen by pre-rasterize hooks.
        const INVISIBLE = 1 << 5;
        /// Element is being rendered into a scratch surface.
        const COMPOSITED = 1 << 6;
    }
}

/// Per-call decoration input. Built fresh for every element and pass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DecorationSettings {
    /// Outer box.
    pub rect: Rect,
    /// Content box.
    pub content_rect: Rect,
    /// Interaction state.
    pub state: ElementStates,
    /// Pass being painted.
    pub pass: RasterPass,
}

/// Read-only view of the walk handed to decorators and hooks.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DecorationContext {
    /// Element being painted.
    pub element: ElementId,
    /// Accumulated opacity. Already applied to draws made through the [`Renderer`].
    pub opacity: f32,
    /// Host time.
    pub now: f64,
    /// Nested clip depth of the surface being painted.
    pub stack_depth: i32,
    /// Current culling rectangle.
    pub visible_region: Rect,
}

/// Identifies a glyph atlas or font source owned by the host.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GlyphSource(pub u32);

/// Paints element chrome.
pub trait Decorator {
    /// Paints `settings.pass` for one element.
    fn rasterize(
        &self,
        cx: &DecorationContext,
        renderer: &mut Renderer<'_>,
        settings: &DecorationSettings,
    );

    /// Paints the clip mask for an element that clips its children.
    ///
    /// Only coverage matters; color writes are disabled on the renderer. The default
    /// covers the whole outer box.
    fn rasterize_clip(
        &self,
        cx: &DecorationContext,
        renderer: &mut Renderer<'_>,
        settings: &DecorationSettings,
    ) {
        let _ = cx;
        renderer.fill_rect(settings.rect, Color::WHITE);
    }

    /// Glyph source used for text this decorator draws, if any.
    fn glyph_source(&self) -> Option<GlyphSource> {
        None
    }
}

/// Supplies default decorators by kind.
pub trait DecorationProvider {
    /// Returns the decorator for `kind`, or `None` if this provider has none.
    fn decorator_for(&self, kind: DecorationKind) -> Option<Arc<dyn Decorator>>;
}

/// Stack of active providers. The innermost provider that knows a kind wins.
#[derive(Clone, Default)]
pub struct ProviderStack {
    stack: SmallVec<[Arc<dyn DecorationProvider>; 4]>,
}

impl core::fmt::Debug for ProviderStack {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProviderStack")
            .field("depth", &self.stack.len())
            .finish()
    }
}

impl ProviderStack {
    /// A stack holding a single base provider.
    pub fn with_base(base: Arc<dyn DecorationProvider>) -> Self {
        let mut stack = SmallVec::new();
        stack.push(base);
        Self { stack }
    }

    pub(crate) fn push(&mut self, provider: Arc<dyn DecorationProvider>) {
        self.stack.push(provider);
    }

    pub(crate) fn pop(&mut self) {
        self.stack.pop();
    }

    /// Number of active providers.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Resolves `kind` against the stack, innermost first.
    pub fn resolve(&self, kind: DecorationKind) -> Option<Arc<dyn Decorator>> {
        self.stack.iter().rev().find_map(|p| p.decorator_for(kind))
    }
}
