// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recoverable-condition reporting and per-frame counters.

use core::fmt;

use crate::element::ElementId;

/// A stale-state condition that the walkers recover from locally.
///
/// None of these abort a frame: the affected element is treated as hidden or culled,
/// and the occurrence is counted and logged through [`RecoverableLog`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Recoverable {
    /// The element's layout key is invalid or the provider has no rectangles for it.
    InvalidLayout,
    /// The element's transform could not be inverted for hit testing.
    NonInvertibleTransform,
    /// No scratch surface was available for an element that needs compositing.
    ScratchExhausted,
    /// A composited element's padded box does not overlap the canvas.
    EmptyCompositeRegion,
}

impl Recoverable {
    const COUNT: usize = 4;

    fn index(self) -> usize {
        match self {
            Self::InvalidLayout => 0,
            Self::NonInvertibleTransform => 1,
            Self::ScratchExhausted => 2,
            Self::EmptyCompositeRegion => 3,
        }
    }
}

impl fmt::Display for Recoverable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidLayout => "invalid layout key",
            Self::NonInvertibleTransform => "non-invertible transform",
            Self::ScratchExhausted => "scratch surface pool exhausted",
            Self::EmptyCompositeRegion => "composite region outside canvas",
        })
    }
}

/// Counts recoverable conditions and logs them with a rate limit.
///
/// The first `burst` occurrences of each kind are logged individually. After that only
/// every `every`-th occurrence is logged, together with the running total. Counts are
/// kept regardless of whether a message was emitted.
#[derive(Clone, Debug)]
pub struct RecoverableLog {
    counts: [u64; Recoverable::COUNT],
    burst: u64,
    every: u64,
}

impl Default for RecoverableLog {
    fn default() -> Self {
        Self::new(4, 256)
    }
}

impl RecoverableLog {
    /// Creates a log with the given burst size and sampling interval.
    pub fn new(burst: u32, every: u32) -> Self {
        Self {
            counts: [0; Recoverable::COUNT],
            burst: u64::from(burst),
            every: u64::from(every.max(1)),
        }
    }

    /// Records one occurrence of `kind` for `element`.
    ///
    /// Returns `true` if a log message was emitted for this occurrence.
    pub fn report(&mut self, kind: Recoverable, element: ElementId) -> bool {
        let slot = &mut self.counts[kind.index()];
        *slot += 1;
        let n = *slot;
        if n <= self.burst {
            log::warn!("{kind} on {element:?}; element skipped");
            true
        } else if (n - self.burst) % self.every == 0 {
            log::warn!("{kind} on {element:?}; {n} occurrences so far");
            true
        } else {
            false
        }
    }

    /// Total occurrences of `kind` since creation or the last [`reset`](Self::reset).
    pub fn count(&self, kind: Recoverable) -> u64 {
        self.counts[kind.index()]
    }

    /// Clears all counters.
    pub fn reset(&mut self) {
        self.counts = [0; Recoverable::COUNT];
    }
}

/// Counters collected during one rasterized frame.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Elements the walker was asked to rasterize.
    pub visited: u32,
    /// Elements that took the hidden path.
    pub hidden: u32,
    /// Elements rendered through a scratch surface.
    pub composited: u32,
    /// Nested pass contexts opened for clipping or isolation.
    pub nested_passes: u32,
    /// Fresh layer contexts opened between siblings.
    pub plane_splits: u32,
    /// Scratch surface acquisitions.
    pub scratch_acquires: u32,
    /// Scratch surface releases.
    pub scratch_releases: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_then_sampled() {
        let mut log = RecoverableLog::new(2, 3);
        let id = ElementId::new(0, 1);
        let emitted: Vec<bool> = (0..8)
            .map(|_| log.report(Recoverable::ScratchExhausted, id))
            .collect();
        assert_eq!(
            emitted,
            [true, true, false, false, true, false, false, true]
        );
        assert_eq!(log.count(Recoverable::ScratchExhausted), 8);
        assert_eq!(log.count(Recoverable::InvalidLayout), 0);
    }

    #[test]
    fn reset_clears_counts() {
        let mut log = RecoverableLog::default();
        log.report(Recoverable::InvalidLayout, ElementId::new(1, 1));
        log.reset();
        assert_eq!(log.count(Recoverable::InvalidLayout), 0);
    }
}
