//! displaysync - display synchronization core for remote desktop gateways
//!
//! Sits between a native remote display source (RDP GDI surface, VNC
//! framebuffer, ...) and the client connection. Tracks what changed in
//! each layer, groups draws into frames, keeps paints and resizes from
//! racing the render side, and describes the monitor layout to the client.
//!
//! ```text
//! driver thread                         render task
//! -------------                         -----------
//! paint_begin ─┐
//! report_dirty │ RawContext (exclusive)
//! paint_end   ─┘──> layer dirty rect ──> drain ──> UpdateEncoder
//! frame_marker(end) ──────────────────> wakeup
//! resize ──> realloc + monitor layout ──> ControlChannel
//! ```

pub mod config;
pub mod display;
pub mod error;
pub mod frame;
pub mod layer;
pub mod monitor;
pub mod raw;
pub mod rect;
pub mod region;
pub mod render;
pub mod session;
pub mod sink;

pub use config::DisplayConfig;
pub use display::Display;
pub use error::{DisplayError, Result};
pub use frame::{FrameAction, FrameCoordinator};
pub use layer::{Layer, LayerId, SurfaceView};
pub use monitor::{Monitor, MonitorLayout, MULTIMON_LAYOUT_PARAM};
pub use raw::RawContext;
pub use rect::Rect;
pub use render::{render_pending, RenderHandle, RenderStats};
pub use session::{Resize, SourceSession};
pub use sink::{ControlChannel, Cursor, FrameAcknowledger, SizeChange, UpdateEncoder};
