//! Axis-aligned integer rectangles
//!
//! All region math in the crate works on [`Rect`], stored as origin plus
//! size with signed 64-bit fields. A rect with zero width or height is
//! empty and is absorbed by [`Rect::extend`].

use crate::error::contract_violation;

/// A rectangle with a non-negative size whose far edges fit in `i64`.
/// Fields are private so every rect goes through a checked constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    x: i64,
    y: i64,
    w: i64,
    h: i64,
}

impl Rect {
    /// The canonical empty rect.
    pub const EMPTY: Rect = Rect { x: 0, y: 0, w: 0, h: 0 };

    /// Build a rect, aborting on a negative size or on coordinates whose
    /// far edge does not fit in `i64`.
    #[track_caller]
    pub fn new(x: i64, y: i64, w: i64, h: i64) -> Self {
        match Self::checked(x, y, w, h) {
            Some(rect) => rect,
            None => contract_violation(&format!("invalid rect ({x}, {y}, {w}, {h})")),
        }
    }

    /// Build a rect, returning `None` instead of aborting.
    pub fn checked(x: i64, y: i64, w: i64, h: i64) -> Option<Self> {
        if w < 0 || h < 0 {
            return None;
        }
        x.checked_add(w)?;
        y.checked_add(h)?;
        Some(Self { x, y, w, h })
    }

    /// Rect at the origin with the given size. Used for layer bounds.
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            w: width as i64,
            h: height as i64,
        }
    }

    /// Rect as reported by native drivers: signed origin, unsigned size.
    /// Cannot overflow since every input fits in 32 bits.
    pub fn from_driver(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self {
            x: x as i64,
            y: y as i64,
            w: w as i64,
            h: h as i64,
        }
    }

    /// Rect from two opposite corners (exclusive max). Corners are swapped
    /// as needed so the result always has a non-negative size.
    #[track_caller]
    pub fn from_corners(x0: i64, y0: i64, x1: i64, y1: i64) -> Self {
        let (left, right) = (x0.min(x1), x0.max(x1));
        let (top, bottom) = (y0.min(y1), y0.max(y1));
        match (right.checked_sub(left), bottom.checked_sub(top)) {
            (Some(w), Some(h)) => Self::new(left, top, w, h),
            _ => contract_violation(&format!("rect corners overflow ({x0}, {y0}) ({x1}, {y1})")),
        }
    }

    /// `(x0, y0, x1, y1)` with exclusive max corner.
    pub fn corners(&self) -> (i64, i64, i64, i64) {
        (self.x, self.y, self.right(), self.bottom())
    }

    pub fn x(&self) -> i64 {
        self.x
    }

    pub fn y(&self) -> i64 {
        self.y
    }

    pub fn width(&self) -> i64 {
        self.w
    }

    pub fn height(&self) -> i64 {
        self.h
    }

    pub fn right(&self) -> i64 {
        match self.x.checked_add(self.w) {
            Some(right) => right,
            None => contract_violation(&format!("rect right edge overflows: {self}")),
        }
    }

    pub fn bottom(&self) -> i64 {
        match self.y.checked_add(self.h) {
            Some(bottom) => bottom,
            None => contract_violation(&format!("rect bottom edge overflows: {self}")),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    pub fn area(&self) -> i64 {
        self.w.saturating_mul(self.h)
    }

    /// True if `other` lies entirely inside `self`. The empty rect is
    /// contained in everything.
    pub fn contains(&self, other: &Rect) -> bool {
        if other.is_empty() {
            return true;
        }
        !self.is_empty()
            && other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn contains_point(&self, px: i64, py: i64) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.constrain(other).is_empty()
    }

    /// Smallest rect containing both `self` and `other`. Aborts if that
    /// rect's size does not fit in `i64`.
    #[track_caller]
    pub fn extend(&self, other: &Rect) -> Rect {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        match (right.checked_sub(left), bottom.checked_sub(top)) {
            (Some(w), Some(h)) => Rect::new(left, top, w, h),
            _ => contract_violation(&format!("union of {self} and {other} overflows")),
        }
    }

    /// Intersection of `self` with `bounds`, or [`Rect::EMPTY`] if they
    /// do not overlap.
    pub fn constrain(&self, bounds: &Rect) -> Rect {
        let left = self.x.max(bounds.x);
        let top = self.y.max(bounds.y);
        let right = self.right().min(bounds.right());
        let bottom = self.bottom().min(bounds.bottom());
        if right <= left || bottom <= top {
            return Rect::EMPTY;
        }
        Rect::new(left, top, right - left, bottom - top)
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}+{}+{}", self.w, self.h, self.x, self.y)
    }
}
