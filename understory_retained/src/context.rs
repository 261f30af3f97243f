// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mutable walk state threaded through rasterization.

use core::ops::{Deref, DerefMut};
use std::sync::Arc;

use kurbo::Rect;
use smallvec::SmallVec;

use crate::composite::ScratchTargetId;
use crate::decor::{DecorationProvider, ProviderStack};

/// State accumulated from ancestors during a rasterization walk.
#[derive(Clone, Debug)]
pub struct AmbientContext {
    /// Product of ancestor opacities applied without compositing.
    pub opacity: f32,
    /// Number of ancestors rendering under a non-composited transform.
    /// Culling against the visible region is skipped while this is non-zero.
    pub transform_count: u32,
    /// Culling rectangle.
    pub visible_region: Rect,
    /// Host time.
    pub now: f64,
    /// Frame counter, used to key cached child orderings.
    pub frame_index: u64,
    providers: ProviderStack,
    pub(crate) clip_depth: i32,
    pub(crate) scratch_stack: SmallVec<[ScratchTargetId; 4]>,
}

impl AmbientContext {
    /// Fresh context for a frame.
    pub fn new(visible_region: Rect, now: f64, frame_index: u64, providers: ProviderStack) -> Self {
        Self {
            opacity: 1.0,
            transform_count: 0,
            visible_region,
            now,
            frame_index,
            providers,
            clip_depth: 0,
            scratch_stack: SmallVec::new(),
        }
    }

    /// Active decoration providers.
    pub fn providers(&self) -> &ProviderStack {
        &self.providers
    }

    /// Nested clip depth currently open.
    pub fn clip_depth(&self) -> i32 {
        self.clip_depth
    }

    /// Pushes `provider` (if any) for the lifetime of the returned guard.
    ///
    /// The provider is popped when the guard drops, including on early return and
    /// unwinding.
    pub fn scope_provider(
        &mut self,
        provider: Option<Arc<dyn DecorationProvider>>,
    ) -> ProviderScope<'_> {
        let pushed = provider.is_some();
        if let Some(p) = provider {
            self.providers.push(p);
        }
        ProviderScope { cx: self, pushed }
    }
}

/// Guard returned by [`AmbientContext::scope_provider`].
#[derive(Debug)]
pub struct ProviderScope<'a> {
    cx: &'a mut AmbientContext,
    pushed: bool,
}

impl Deref for ProviderScope<'_> {
    type Target = AmbientContext;

    fn deref(&self) -> &AmbientContext {
        self.cx
    }
}

impl DerefMut for ProviderScope<'_> {
    fn deref_mut(&mut self) -> &mut AmbientContext {
        self.cx
    }
}

impl Drop for ProviderScope<'_> {
    fn drop(&mut self) {
        if self.pushed {
            self.cx.providers.pop();
        }
    }
}
