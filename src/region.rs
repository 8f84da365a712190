//! Dirty region tracking
//!
//! The dirty region of a layer is a single bounding box, not a set of
//! rects: each update is O(1) at the cost of sometimes redrawing pixels
//! that did not change.

use crate::rect::Rect;

/// Smallest rect containing both inputs.
pub fn extend(current: Rect, addition: Rect) -> Rect {
    current.extend(&addition)
}

/// `r` clipped to `bounds`; empty if they are disjoint.
pub fn constrain(r: Rect, bounds: Rect) -> Rect {
    r.constrain(&bounds)
}

/// Bounds and accumulated dirty rect of one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionTracker {
    bounds: Rect,
    dirty: Rect,
}

impl RegionTracker {
    /// A new surface is entirely dirty.
    pub fn new(width: u32, height: u32) -> Self {
        let bounds = Rect::with_size(width, height);
        Self { bounds, dirty: bounds }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Current dirty rect without clearing it.
    pub fn dirty(&self) -> Rect {
        self.dirty
    }

    /// Union `r` into the dirty rect after clipping it to the bounds.
    /// Returns the new dirty rect.
    pub fn mark(&mut self, r: Rect) -> Rect {
        self.dirty = extend(self.dirty, constrain(r, self.bounds));
        self.dirty
    }

    /// Read and reset the dirty rect.
    pub fn drain(&mut self) -> Rect {
        std::mem::replace(&mut self.dirty, Rect::EMPTY)
    }

    /// Adopt new surface dimensions. Old contents are not preserved, so
    /// the whole new surface becomes dirty.
    pub fn reset(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }
}
