// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Boundary to the external layout solver.
//!
//! The core never computes or mutates layout. It only resolves an element's opaque
//! [`LayoutKey`] into rectangles through a [`LayoutProvider`].

use hashbrown::HashMap;
use kurbo::Rect;

/// Opaque handle to a rectangle computed by the layout solver.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LayoutKey(pub u32);

impl LayoutKey {
    /// The key of an element that has not been laid out, or whose layout was invalidated.
    pub const INVALID: Self = Self(u32::MAX);

    /// Returns `true` unless this is [`LayoutKey::INVALID`].
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl Default for LayoutKey {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Outer and content rectangles for one element, in canvas coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LayoutRects {
    /// Outer box, including decoration padding.
    pub rect: Rect,
    /// Content box, where children are placed.
    pub content_rect: Rect,
}

impl LayoutRects {
    /// Rectangles whose content box equals the outer box.
    pub fn uniform(rect: Rect) -> Self {
        Self {
            rect,
            content_rect: rect,
        }
    }
}

/// Read-only access to solved layout.
///
/// Implementations must be idempotent and side-effect free for a given key within a frame.
pub trait LayoutProvider {
    /// Returns the rectangles for `key`, or `None` if the key is unknown.
    fn rects(&self, key: LayoutKey) -> Option<LayoutRects>;
}

/// A map-backed [`LayoutProvider`] for hosts without their own storage, and for tests.
#[derive(Clone, Debug, Default)]
pub struct LayoutTable {
    map: HashMap<LayoutKey, LayoutRects>,
    next: u32,
}

impl LayoutTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `rects` under a fresh key.
    pub fn insert(&mut self, rects: LayoutRects) -> LayoutKey {
        let key = LayoutKey(self.next);
        self.next += 1;
        self.map.insert(key, rects);
        key
    }

    /// Stores a box whose content rectangle equals its outer rectangle.
    pub fn insert_rect(&mut self, rect: Rect) -> LayoutKey {
        self.insert(LayoutRects::uniform(rect))
    }

    /// Replaces the rectangles for an existing key.
    pub fn set(&mut self, key: LayoutKey, rects: LayoutRects) {
        if key.is_valid() {
            self.map.insert(key, rects);
        }
    }

    /// Forgets a key. Later lookups return `None`.
    pub fn remove(&mut self, key: LayoutKey) -> Option<LayoutRects> {
        self.map.remove(&key)
    }

    /// Forgets every key.
    pub fn clear(&mut self) {
        self.map.clear();
    }
}

impl LayoutProvider for LayoutTable {
    fn rects(&self, key: LayoutKey) -> Option<LayoutRects> {
        if !key.is_valid() {
            return None;
        }
        self.map.get(&key).copied()
    }
}
