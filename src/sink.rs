//! Collaborators the core hands its output to
//!
//! Encoding and transmission live outside this crate. Implementations of
//! these traits wrap the protocol connection of one session.

use anyhow::Result;

use crate::layer::{LayerId, SurfaceView};
use crate::rect::Rect;

/// Geometry sent to the client when a monitor changes size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeChange {
    pub width: u32,
    pub height: u32,
    pub monitor_index: u32,
    pub top_offset: i64,
}

/// Cursor appearances the core can request. After a resize the client
/// cursor is reset to the standard pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Pointer,
}

/// Consumes drained layer regions on the render side.
pub trait UpdateEncoder: Send {
    /// Encode and queue the pixels of `dirty` for `layer`.
    fn encode(&mut self, layer: LayerId, dirty: Rect, surface: SurfaceView<'_>) -> Result<()>;

    /// Called once after all pending layers of a render pass were encoded.
    fn end_frame(&mut self, _frames: u64) -> Result<()> {
        Ok(())
    }
}

/// Control instructions sent from the source side.
pub trait ControlChannel: Send + Sync {
    fn set_layer_parameter(&self, layer: LayerId, key: &str, value: &str) -> Result<()>;

    fn size_changed(&self, layer: LayerId, size: SizeChange) -> Result<()>;

    fn set_cursor(&self, cursor: Cursor) -> Result<()>;
}

/// Tells the remote source which frames the client path has absorbed.
pub trait FrameAcknowledger: Send + Sync {
    fn acknowledge(&self, frame_id: u32) -> Result<()>;
}
