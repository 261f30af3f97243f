// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_retained --heading-base-level=0

//! Understory Retained: layered rasterization and input targeting for retained UI trees.
//!
//! This crate is the rendering and hit-testing core of a retained-mode toolkit. It walks an
//! [`ElementTree`] whose geometry comes from an external [`LayoutProvider`] and turns it
//! into a [`DrawList`] that a [`RenderBackend`] consumes, and it answers "what is under
//! this point" both exactly and fuzzily.
//!
//! - Every element paints three passes (Below, Content, Above) into a [`PassSet`], so a
//!   sibling's shadow never covers another sibling's body and a focus ring is never
//!   covered by a later sibling's content.
//! - Siblings with different display orders get separate pass sets (a plane split), so
//!   a raised element paints over everything in lower buckets.
//! - Elements with partial opacity, an active transform, or a custom [`Compositor`]
//!   render their subtree into a pooled scratch surface and blit it back.
//! - Elements that clip their children open a nested pass backed by a stencil mask;
//!   mask values equal nesting depth and are restored, not merely cleared, as siblings
//!   unwind.
//! - Exact hit testing returns at most one winner, honoring display order, capability
//!   filters, and container precedence.
//! - Fuzzy hit testing returns every element within a radius under a deterministic total
//!   order.
//!
//! ## Not a layout engine or a vector renderer
//!
//! Layout is an input: hosts compute boxes however they like and expose them through
//! [`LayoutProvider`]. Drawing is an output: [`DrawCommand`] covers only what decorators
//! need (fills, glyph runs, host-defined primitives, stencil clears, and blits), and a
//! backend maps those onto a real GPU or CPU renderer.
//!
//! ## API overview
//!
//! - [`ElementTree`], [`Element`], [`ElementId`], [`ElementFlags`]: the retained tree.
//! - [`ElementBehavior`]: per-kind strategy with documented defaults for every hook.
//! - [`Decorator`], [`DecorationProvider`]: element chrome, resolved by kind through a
//!   scoped provider stack.
//! - [`Rasterizer`]: the walker, owning the [`DrawList`], [`ScratchPool`], and
//!   [`RecoverableLog`].
//! - [`HitTester`] and [`FuzzyHitTest`]: input targeting.
//!
//! Key operations:
//! - [`Rasterizer::rasterize_frame`] → [`FrameStats`], then [`Rasterizer::submit`].
//! - [`Rasterizer::begin_frame`], then [`Rasterizer::open_pass_set`] and
//!   [`Rasterizer::rasterize`] per top-level element, then [`Rasterizer::end_frame`],
//!   for hosts that choose their own top-level elements.
//! - [`HitTester::hit_test`] → [`Hit`], filtered by [`HitTestOptions`].
//! - [`FuzzyHitTest::run`] → ranked [`FuzzyCandidate`]s.
//!
//! ## Failure model
//!
//! Stale state (an invalid layout key, a transform that cannot be inverted, an exhausted
//! scratch pool) never aborts a frame: the element is treated as hidden and the
//! occurrence is counted and logged through the `log` facade with a rate limit. Broken
//! internal invariants, such as an unbalanced clip stack or a scratch lease outliving its
//! frame, panic.
//!
//! ## Example
//!
//! ```
//! use kurbo::{Point, Rect};
//! use understory_retained::{
//!     Element, ElementTree, HitTestOptions, HitTester, LayoutTable, Rasterizer,
//! };
//!
//! let mut layout = LayoutTable::new();
//! let mut tree = ElementTree::new();
//! let root = tree.insert_root(
//!     Element::container().with_layout(layout.insert_rect(Rect::new(0.0, 0.0, 200.0, 100.0))),
//! );
//! let button = tree
//!     .insert(
//!         root,
//!         Element::leaf().with_layout(layout.insert_rect(Rect::new(10.0, 10.0, 90.0, 40.0))),
//!     )
//!     .unwrap();
//!
//! let mut rasterizer = Rasterizer::default();
//! let stats = rasterizer.rasterize_frame(&mut tree, &layout, 0.0);
//! assert_eq!(stats.visited, 2);
//!
//! let hit = HitTester::new()
//!     .hit_test(&tree, &layout, Point::new(20.0, 20.0), &HitTestOptions::mouse(), 0.0)
//!     .unwrap();
//! assert_eq!(hit.element, button);
//! ```

mod anim;
mod behavior;
mod clip;
mod composite;
mod config;
mod context;
mod decor;
mod diag;
mod draw;
mod element;
mod fuzzy;
mod hit;
mod layout;
mod pass;
mod raster;
mod tree;
mod util;

pub use anim::{Interpolate, Tween};
pub use behavior::{DefaultBehavior, ElementBehavior};
pub use composite::{Compositor, ScratchLease, ScratchPool, ScratchTargetId};
pub use config::{FuzzyConfig, PlaneSplit, RasterConfig};
pub use context::{AmbientContext, ProviderScope};
pub use decor::{
    DecorationContext, DecorationKind, DecorationProvider, DecorationSettings, Decorator,
    ElementStates, GlyphSource, ProviderStack,
};
pub use diag::{FrameStats, Recoverable, RecoverableLog};
pub use draw::{
    CompositeDraw, Draw, DrawCommand, DrawList, GroupId, RenderBackend, RenderTarget, Renderer,
    StencilMode, Surface, ViewTransform,
};
pub use element::{CompositeRecord, Element, ElementFlags, ElementId, ElementTransform};
pub use fuzzy::{FuzzyCandidate, FuzzyHitTest, FuzzyPredicate, FuzzyQuery, FuzzySink};
pub use hit::{Hit, HitTestOptions, HitTester};
pub use layout::{LayoutKey, LayoutProvider, LayoutRects, LayoutTable};
pub use pass::{PassSet, RasterPass};
pub use raster::{FrameRoot, Rasterizer};
pub use tree::{ElementTree, FocusRelease, OrderRange, OrderedChildren, TreeError};
