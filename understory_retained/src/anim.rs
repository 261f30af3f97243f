// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Time-varying element state.
//!
//! Only the evaluation contract lives here. Easing curves are supplied by the host as
//! plain functions.

use kurbo::{Affine, Point, Vec2};

/// Values that can be linearly interpolated.
pub trait Interpolate: Copy {
    /// Interpolates between `a` and `b` at `t` in `[0, 1]`.
    fn lerp(a: Self, b: Self, t: f64) -> Self;
}

impl Interpolate for f32 {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "t is a unit interval fraction"
    )]
    fn lerp(a: Self, b: Self, t: f64) -> Self {
        a + (b - a) * t as Self
    }
}

impl Interpolate for f64 {
    fn lerp(a: Self, b: Self, t: f64) -> Self {
        a + (b - a) * t
    }
}

impl Interpolate for Vec2 {
    fn lerp(a: Self, b: Self, t: f64) -> Self {
        a.lerp(b, t)
    }
}

impl Interpolate for Point {
    fn lerp(a: Self, b: Self, t: f64) -> Self {
        a.lerp(b, t)
    }
}

impl Interpolate for Affine {
    fn lerp(a: Self, b: Self, t: f64) -> Self {
        let (a, b) = (a.as_coeffs(), b.as_coeffs());
        let mut out = [0.0; 6];
        for (o, (x, y)) in out.iter_mut().zip(a.iter().zip(b.iter())) {
            *o = x + (y - x) * t;
        }
        Self::new(out)
    }
}

/// A value moving from `from` to `to` over `[start, start + duration]`.
///
/// Times are host seconds. Before `start` the value is `from`; after the end it is `to`.
#[derive(Copy, Clone, Debug)]
pub struct Tween<T> {
    /// Value at and before `start`.
    pub from: T,
    /// Value at and after `start + duration`.
    pub to: T,
    /// Start time.
    pub start: f64,
    /// Duration in seconds. Zero or negative durations jump straight to `to`.
    pub duration: f64,
    /// Optional easing applied to the normalized progress.
    pub ease: Option<fn(f64) -> f64>,
}

impl<T: Interpolate> Tween<T> {
    /// A tween that always evaluates to `value`.
    pub fn constant(value: T) -> Self {
        Self {
            from: value,
            to: value,
            start: 0.0,
            duration: 0.0,
            ease: None,
        }
    }

    /// A linear tween.
    pub fn new(from: T, to: T, start: f64, duration: f64) -> Self {
        Self {
            from,
            to,
            start,
            duration,
            ease: None,
        }
    }

    /// Sets the easing function.
    pub fn with_ease(mut self, ease: fn(f64) -> f64) -> Self {
        self.ease = Some(ease);
        self
    }

    /// Normalized progress at `now`, after easing.
    pub fn progress(&self, now: f64) -> f64 {
        if self.duration <= 0.0 || now >= self.start + self.duration {
            return 1.0;
        }
        let t = ((now - self.start) / self.duration).clamp(0.0, 1.0);
        self.ease.map_or(t, |f| f(t))
    }

    /// Value at `now`.
    pub fn value(&self, now: f64) -> T {
        T::lerp(self.from, self.to, self.progress(now))
    }

    /// Returns `true` once `now` has reached the end of the tween.
    pub fn is_finished(&self, now: f64) -> bool {
        self.duration <= 0.0 || now >= self.start + self.duration
    }
}

impl<T: Interpolate + Default> Default for Tween<T> {
    fn default() -> Self {
        Self::constant(T::default())
    }
}
