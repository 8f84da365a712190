//! Exclusive raw access to a layer's pixels for one paint batch
//!
//! A [`RawContext`] holds the layer's surface lock from open to close. The
//! driver writes pixels through it and reports the rects it touched; on
//! close those rects are merged into the layer's dirty region.

use parking_lot::{ArcMutexGuard, RawMutex};
use std::sync::Arc;
use tracing::trace;

use crate::error::contract_violation;
use crate::layer::{Layer, LayerId, Surface};
use crate::rect::Rect;

pub struct RawContext {
    layer: Arc<Layer>,
    surface: ArcMutexGuard<RawMutex, Surface>,
    bounds: Rect,
    dirty: Rect,
}

impl RawContext {
    /// Open the layer for writing. Opening a layer that already has an open
    /// context is a protocol violation and aborts.
    #[track_caller]
    pub fn open(layer: &Arc<Layer>) -> Self {
        if !layer.try_claim_raw() {
            contract_violation(&format!("raw context already open on layer {}", layer.id()));
        }

        // Geometry is read under the lock, so it reflects any earlier resize.
        let surface = layer.surface().lock_arc();
        let bounds = surface.bounds();
        trace!(layer = %layer.id(), %bounds, "raw context opened");

        Self {
            layer: Arc::clone(layer),
            surface,
            bounds,
            dirty: Rect::EMPTY,
        }
    }

    pub fn layer_id(&self) -> LayerId {
        self.layer.id()
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn stride(&self) -> usize {
        self.surface.stride
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.surface.bytes_per_pixel
    }

    /// Rect accumulated during this paint so far.
    pub fn dirty(&self) -> Rect {
        self.dirty
    }

    pub fn buffer(&self) -> &[u8] {
        &self.surface.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.surface.buffer
    }

    /// Record that `rect` was modified. Parts outside the surface are dropped.
    pub fn report(&mut self, rect: Rect) {
        self.dirty = self.dirty.extend(&rect.constrain(&self.bounds));
    }

    /// Paint `pixel` over `rect` (clipped to the surface). Does not report.
    pub fn fill(&mut self, rect: Rect, pixel: &[u8]) {
        let rect = rect.constrain(&self.bounds);
        let bpp = self.surface.bytes_per_pixel;
        if rect.is_empty() || pixel.len() != bpp {
            return;
        }
        let stride = self.surface.stride;
        for y in rect.y()..rect.bottom() {
            let row = y as usize * stride;
            for x in rect.x()..rect.right() {
                let start = row + x as usize * bpp;
                self.surface.buffer[start..start + bpp].copy_from_slice(pixel);
            }
        }
    }

    /// Forget everything reported so far. Pixels already written stay.
    pub fn discard(&mut self) {
        self.dirty = Rect::EMPTY;
    }

    /// Merge this paint's dirty rect into the layer and release the layer.
    /// Returns the layer's dirty rect after the merge.
    pub fn close(self) -> Rect {
        let merged = if self.dirty.is_empty() {
            self.layer.dirty()
        } else {
            self.layer.merge_dirty(self.dirty)
        };
        trace!(layer = %self.layer.id(), dirty = %self.dirty, %merged, "raw context closed");
        merged
    }
}

impl Drop for RawContext {
    // A context dropped without close() (e.g. while unwinding) still frees
    // the layer; its dirty rect is lost.
    fn drop(&mut self) {
        self.layer.release_raw();
    }
}

impl std::fmt::Debug for RawContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawContext")
            .field("layer", &self.layer.id())
            .field("bounds", &self.bounds)
            .field("dirty", &self.dirty)
            .finish()
    }
}
