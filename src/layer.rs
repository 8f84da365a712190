//! Layers: pixel surfaces with their own dirty tracking
//!
//! Pixel storage and region state sit behind separate locks. A paint in
//! progress owns the surface lock for its whole duration (see
//! [`crate::raw::RawContext`]); the render side only takes the region lock
//! to drain, or both (surface first) to drain and read pixels together.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{contract_violation, DisplayError, Result};
use crate::rect::Rect;
use crate::region::RegionTracker;

/// Identifies a layer within a display. Layer 0 is the default layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u32);

impl LayerId {
    pub const DEFAULT: LayerId = LayerId(0);
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw pixel storage of a layer.
#[derive(Debug)]
pub(crate) struct Surface {
    pub(crate) buffer: Vec<u8>,
    pub(crate) stride: usize,
    pub(crate) bytes_per_pixel: usize,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl Surface {
    fn allocate(width: u32, height: u32, bytes_per_pixel: usize) -> Result<Self> {
        let stride = (width as usize)
            .checked_mul(bytes_per_pixel)
            .ok_or(DisplayError::InvalidDimensions { width, height })?;
        let len = stride
            .checked_mul(height as usize)
            .ok_or(DisplayError::InvalidDimensions { width, height })?;

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(len)
            .map_err(|_| DisplayError::Allocation { bytes: len })?;
        buffer.resize(len, 0);

        Ok(Self {
            buffer,
            stride,
            bytes_per_pixel,
            width,
            height,
        })
    }

    pub(crate) fn bounds(&self) -> Rect {
        Rect::with_size(self.width, self.height)
    }

    pub(crate) fn view(&self) -> SurfaceView<'_> {
        SurfaceView {
            buffer: &self.buffer,
            stride: self.stride,
            bytes_per_pixel: self.bytes_per_pixel,
            bounds: self.bounds(),
        }
    }
}

/// Read-only access to a layer's pixels, handed to encoders.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceView<'a> {
    buffer: &'a [u8],
    stride: usize,
    bytes_per_pixel: usize,
    bounds: Rect,
}

impl<'a> SurfaceView<'a> {
    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_pixel
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Pixels of `rect` (clipped to the bounds), packed row after row.
    pub fn copy_rect(&self, rect: Rect) -> Vec<u8> {
        let rect = rect.constrain(&self.bounds);
        if rect.is_empty() {
            return Vec::new();
        }
        let row_len = rect.width() as usize * self.bytes_per_pixel;
        let mut out = Vec::with_capacity(row_len * rect.height() as usize);
        for y in rect.y()..rect.bottom() {
            let start = y as usize * self.stride + rect.x() as usize * self.bytes_per_pixel;
            out.extend_from_slice(&self.buffer[start..start + row_len]);
        }
        out
    }

    /// Bytes of the pixel at `(x, y)`, if inside the bounds.
    pub fn pixel(&self, x: i64, y: i64) -> Option<&'a [u8]> {
        if !self.bounds.contains_point(x, y) {
            return None;
        }
        let start = y as usize * self.stride + x as usize * self.bytes_per_pixel;
        Some(&self.buffer[start..start + self.bytes_per_pixel])
    }
}

/// One independently tracked pixel surface.
#[derive(Debug)]
pub struct Layer {
    id: LayerId,
    is_default: bool,
    surface: Arc<Mutex<Surface>>,
    region: Mutex<RegionTracker>,
    raw_open: AtomicBool,
    pending: AtomicBool,
}

impl Layer {
    pub(crate) fn new(
        id: LayerId,
        is_default: bool,
        width: u32,
        height: u32,
        bytes_per_pixel: usize,
    ) -> Result<Self> {
        let surface = Surface::allocate(width, height, bytes_per_pixel)?;
        Ok(Self {
            id,
            is_default,
            surface: Arc::new(Mutex::new(surface)),
            region: Mutex::new(RegionTracker::new(width, height)),
            raw_open: AtomicBool::new(false),
            // freshly allocated surfaces have never been sent
            pending: AtomicBool::new(true),
        })
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }

    pub fn bounds(&self) -> Rect {
        self.region.lock().bounds()
    }

    /// Dirty rect accumulated so far, without draining it.
    pub fn dirty(&self) -> Rect {
        self.region.lock().dirty()
    }

    pub fn has_pending_output(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_raw_open(&self) -> bool {
        self.raw_open.load(Ordering::Acquire)
    }

    /// Read and clear the dirty rect in one step.
    pub fn drain(&self) -> Rect {
        let mut region = self.region.lock();
        self.pending.store(false, Ordering::Release);
        region.drain()
    }

    /// Drain the dirty rect and read the pixels it covers while no paint
    /// or resize can touch the surface.
    pub fn drain_with<R>(&self, f: impl FnOnce(Rect, SurfaceView<'_>) -> R) -> R {
        let surface = self.surface.lock();
        let dirty = self.drain();
        f(dirty, surface.view())
    }

    /// Read the pixels without draining.
    pub fn with_surface<R>(&self, f: impl FnOnce(SurfaceView<'_>) -> R) -> R {
        let surface = self.surface.lock();
        f(surface.view())
    }

    pub(crate) fn surface(&self) -> &Arc<Mutex<Surface>> {
        &self.surface
    }

    /// Claim the single raw-context slot. Returns false if already taken.
    pub(crate) fn try_claim_raw(&self) -> bool {
        !self.raw_open.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn release_raw(&self) {
        self.raw_open.store(false, Ordering::Release);
    }

    /// Union a rect into the persistent dirty rect, flagging pending output
    /// when the result is non-empty.
    pub(crate) fn merge_dirty(&self, rect: Rect) -> Rect {
        let mut region = self.region.lock();
        let dirty = region.mark(rect);
        if !dirty.is_empty() {
            self.pending.store(true, Ordering::Release);
        }
        dirty
    }

    /// Replace the surface with one of the new size. Drains and paints are
    /// excluded for the whole reallocation. On allocation failure the old
    /// surface stays in place.
    pub(crate) fn resize(&self, width: u32, height: u32) -> Result<()> {
        if self.is_raw_open() {
            contract_violation(&format!("layer {} resized with a raw context open", self.id));
        }

        let mut surface = self.surface.lock();
        let mut region = self.region.lock();

        let bytes_per_pixel = surface.bytes_per_pixel;
        *surface = Surface::allocate(width, height, bytes_per_pixel)?;
        region.reset(width, height);
        self.pending.store(true, Ordering::Release);
        Ok(())
    }
}
