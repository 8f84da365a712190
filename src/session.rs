//! Source-side driver callbacks
//!
//! A [`SourceSession`] is what a native display driver adapter talks to.
//! Callbacks arrive serially on one thread: paint begin/end pairs with
//! dirty reports in between, frame markers, and resizes.

use std::sync::Arc;
use tracing::{debug, error, info, trace};

use crate::display::Display;
use crate::error::{contract_violation, DisplayError, Result};
use crate::frame::FrameAction;
use crate::layer::LayerId;
use crate::monitor::{Monitor, MULTIMON_LAYOUT_PARAM};
use crate::raw::RawContext;
use crate::rect::Rect;
use crate::sink::{ControlChannel, Cursor, SizeChange};

/// New geometry reported by the source for one monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resize {
    pub width: u32,
    pub height: u32,
    pub monitor_index: u32,
    pub left_offset: i64,
    pub top_offset: i64,
}

impl Resize {
    /// Resize of the primary monitor at the origin.
    pub fn primary(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            monitor_index: 0,
            left_offset: 0,
            top_offset: 0,
        }
    }
}

pub struct SourceSession {
    display: Arc<Display>,
    channel: Arc<dyn ControlChannel>,
    current: Option<RawContext>,
    suppress_output: bool,
}

impl SourceSession {
    pub fn new(display: Arc<Display>, channel: Arc<dyn ControlChannel>) -> Self {
        Self {
            display,
            channel,
            current: None,
            suppress_output: false,
        }
    }

    pub fn display(&self) -> &Arc<Display> {
        &self.display
    }

    /// The paint in progress, if any.
    pub fn context(&mut self) -> Option<&mut RawContext> {
        self.current.as_mut()
    }

    pub fn is_painting(&self) -> bool {
        self.current.is_some()
    }

    /// While suppressed, paints complete normally but nothing they report
    /// reaches the layers.
    pub fn set_output_suppressed(&mut self, suppressed: bool) {
        debug!(suppressed, "output suppression changed");
        self.suppress_output = suppressed;
    }

    /// Open the layer for a paint batch and return the raw context to
    /// draw through. Every drawing operation happens inside such a batch.
    #[track_caller]
    pub fn paint_begin(&mut self, layer: LayerId) -> Result<&mut RawContext> {
        if let Some(open) = &self.current {
            contract_violation(&format!(
                "paint begin on layer {layer} while layer {} is still painting",
                open.layer_id()
            ));
        }
        let layer = self.display.layer(layer)?;
        Ok(self.current.insert(RawContext::open(&layer)))
    }

    /// Record a region the driver has drawn into.
    #[track_caller]
    pub fn report_dirty(&mut self, layer: LayerId, rect: Rect) {
        match self.current.as_mut() {
            Some(ctx) if ctx.layer_id() == layer => ctx.report(rect),
            Some(ctx) => contract_violation(&format!(
                "dirty rect reported for layer {layer} during paint of layer {}",
                ctx.layer_id()
            )),
            None => contract_violation(&format!(
                "dirty rect reported for layer {layer} outside a paint"
            )),
        }
    }

    /// Close the paint batch. Returns the layer's accumulated dirty rect,
    /// or `None` if no paint was open.
    #[track_caller]
    pub fn paint_end(&mut self, layer: LayerId) -> Option<Rect> {
        // Some display drivers end a paint they never began: they call it
        // before a resize to release their update lock and flush. That is
        // upstream behavior rather than a caller bug, so it is the one
        // unmatched close that is accepted silently.
        let Some(mut ctx) = self.current.take() else {
            debug!(layer = %layer, "paint end without paint begin ignored");
            return None;
        };
        if ctx.layer_id() != layer {
            contract_violation(&format!(
                "paint end on layer {layer} during paint of layer {}",
                ctx.layer_id()
            ));
        }

        if self.suppress_output {
            ctx.discard();
        }
        let dirty = ctx.close();
        trace!(layer = %layer, %dirty, "paint complete");
        Some(dirty)
    }

    pub fn mark_frame(&self, starting: bool) {
        self.display.frames().mark_frame(starting);
    }

    pub fn frame_marker(&self, action: FrameAction) {
        self.display.frames().frame_marker(action);
    }

    pub fn surface_frame_marker(&self, frame_id: u32, action: FrameAction) {
        self.display.frames().surface_frame_marker(frame_id, action);
    }

    /// Wake the render side for layers painted outside of any frame.
    pub fn flush(&self) {
        if self.display.layers().iter().any(|l| l.has_pending_output()) {
            self.display.frames().notify_modified();
        }
    }

    /// Adopt new source dimensions for `layer`.
    ///
    /// Reallocates the surface (which becomes entirely dirty), updates
    /// the resized monitor's entry, then sends the monitor layout, the
    /// size change and finally a cursor reset, so the client never sees
    /// geometry the layer is not ready for.
    pub fn resize(&mut self, layer: LayerId, resize: Resize) -> Result<()> {
        let Resize {
            width,
            height,
            monitor_index,
            left_offset,
            top_offset,
        } = resize;

        let target = self.display.layer(layer)?;
        self.display.check_dimensions(width, height)?;

        if let Some(ctx) = self.current.take() {
            if !self.display.config().force_close_on_resize {
                contract_violation(&format!(
                    "resize of layer {layer} while layer {} is painting",
                    ctx.layer_id()
                ));
            }
            debug!(layer = %ctx.layer_id(), "closing paint left open across resize");
            ctx.close();
        }

        if let Err(e) = target.resize(width, height) {
            error!(layer = %layer, width, height, "resize failed: {e}");
            return Err(e);
        }
        info!(layer = %layer, "display resized to {}x{}", width, height);

        self.display.set_monitor(Monitor {
            index: monitor_index,
            left: left_offset,
            top: top_offset,
            width,
            height,
        });
        let payload = self.display.monitor_layout_payload(layer)?;

        self.channel
            .set_layer_parameter(layer, MULTIMON_LAYOUT_PARAM, &payload)
            .map_err(channel_error)?;
        self.channel
            .size_changed(
                layer,
                SizeChange {
                    width,
                    height,
                    monitor_index,
                    top_offset,
                },
            )
            .map_err(channel_error)?;
        self.channel.set_cursor(Cursor::Pointer).map_err(channel_error)?;

        self.display.frames().notify_modified();
        Ok(())
    }
}

fn channel_error(e: anyhow::Error) -> DisplayError {
    DisplayError::Channel(format!("{e:#}"))
}

impl std::fmt::Debug for SourceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceSession")
            .field("current", &self.current)
            .field("suppress_output", &self.suppress_output)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DisplayConfig;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Parameter(LayerId, String, String),
        Size(LayerId, SizeChange),
        Cursor(Cursor),
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Sent>>);

    impl ControlChannel for Recorder {
        fn set_layer_parameter(
            &self,
            layer: LayerId,
            key: &str,
            value: &str,
        ) -> anyhow::Result<()> {
            self.0.lock().push(Sent::Parameter(layer, key.into(), value.into()));
            Ok(())
        }

        fn size_changed(&self, layer: LayerId, size: SizeChange) -> anyhow::Result<()> {
            self.0.lock().push(Sent::Size(layer, size));
            Ok(())
        }

        fn set_cursor(&self, cursor: Cursor) -> anyhow::Result<()> {
            self.0.lock().push(Sent::Cursor(cursor));
            Ok(())
        }
    }

    struct Broken;

    impl ControlChannel for Broken {
        fn set_layer_parameter(&self, _: LayerId, _: &str, _: &str) -> anyhow::Result<()> {
            anyhow::bail!("socket closed")
        }

        fn size_changed(&self, _: LayerId, _: SizeChange) -> anyhow::Result<()> {
            anyhow::bail!("socket closed")
        }

        fn set_cursor(&self, _: Cursor) -> anyhow::Result<()> {
            anyhow::bail!("socket closed")
        }
    }

    fn session(config: DisplayConfig) -> (SourceSession, Arc<Recorder>) {
        let display = Display::new(config).unwrap();
        display.default_layer().drain();
        let recorder = Arc::new(Recorder::default());
        (SourceSession::new(display, recorder.clone()), recorder)
    }

    fn square(size: u32) -> DisplayConfig {
        DisplayConfig {
            width: size,
            height: size,
            ..Default::default()
        }
    }

    #[test]
    fn test_paint_cycle_unions_reports() {
        let (mut session, _) = session(square(300));
        session.paint_begin(LayerId::DEFAULT).unwrap();
        session.report_dirty(LayerId::DEFAULT, Rect::new(10, 10, 50, 50));
        session.report_dirty(LayerId::DEFAULT, Rect::new(200, 200, 10, 10));
        assert_eq!(session.paint_end(LayerId::DEFAULT), Some(Rect::new(10, 10, 200, 200)));

        let display = session.display();
        assert_eq!(display.drain(LayerId::DEFAULT).unwrap(), Rect::new(10, 10, 200, 200));
        assert!(display.drain(LayerId::DEFAULT).unwrap().is_empty());
    }

    #[test]
    fn test_paint_writes_through_context() {
        let (mut session, _) = session(square(16));
        let ctx = session.paint_begin(LayerId::DEFAULT).unwrap();
        ctx.fill(Rect::new(0, 0, 2, 2), &[255, 0, 0, 255]);
        ctx.report(Rect::new(0, 0, 2, 2));
        session.paint_end(LayerId::DEFAULT);

        session.display().default_layer().drain_with(|dirty, view| {
            assert_eq!(dirty, Rect::new(0, 0, 2, 2));
            assert_eq!(view.copy_rect(dirty), [255u8, 0, 0, 255].repeat(4));
        });
    }

    #[test]
    fn test_paint_end_without_begin_is_ignored() {
        let (mut session, _) = session(square(300));
        session.paint_begin(LayerId::DEFAULT).unwrap();
        session.report_dirty(LayerId::DEFAULT, Rect::new(1, 1, 1, 1));
        session.paint_end(LayerId::DEFAULT);

        assert_eq!(session.paint_end(LayerId::DEFAULT), None);
        assert_eq!(session.display().default_layer().dirty(), Rect::new(1, 1, 1, 1));
    }

    #[test]
    #[should_panic(expected = "still painting")]
    fn test_double_paint_begin_is_fatal() {
        let (mut session, _) = session(square(300));
        session.paint_begin(LayerId::DEFAULT).unwrap();
        session.paint_begin(LayerId::DEFAULT).unwrap();
    }

    #[test]
    #[should_panic(expected = "outside a paint")]
    fn test_report_outside_paint_is_fatal() {
        let (mut session, _) = session(square(300));
        session.report_dirty(LayerId::DEFAULT, Rect::new(0, 0, 1, 1));
    }

    #[test]
    fn test_unknown_layer() {
        let (mut session, _) = session(square(300));
        assert!(matches!(
            session.paint_begin(LayerId(42)),
            Err(DisplayError::UnknownLayer(LayerId(42)))
        ));
        assert!(!session.is_painting());
    }

    #[test]
    fn test_suppressed_output_is_discarded() {
        let (mut session, _) = session(square(300));
        session.set_output_suppressed(true);
        session.paint_begin(LayerId::DEFAULT).unwrap();
        session.report_dirty(LayerId::DEFAULT, Rect::new(0, 0, 10, 10));
        assert_eq!(session.paint_end(LayerId::DEFAULT), Some(Rect::EMPTY));
        assert!(!session.display().default_layer().has_pending_output());
    }

    #[test]
    fn test_resize_force_closes_open_paint() {
        let (mut session, recorder) = session(DisplayConfig {
            width: 1920,
            height: 1080,
            ..Default::default()
        });
        session.paint_begin(LayerId::DEFAULT).unwrap();
        session.report_dirty(LayerId::DEFAULT, Rect::new(0, 0, 10, 10));

        session.resize(LayerId::DEFAULT, Resize::primary(2560, 1440)).unwrap();

        assert!(!session.is_painting());
        let layer = session.display().default_layer();
        assert_eq!(layer.bounds(), Rect::new(0, 0, 2560, 1440));
        assert_eq!(layer.dirty(), Rect::new(0, 0, 2560, 1440));

        let sent = recorder.0.lock().clone();
        assert_eq!(
            sent,
            vec![
                Sent::Parameter(
                    LayerId::DEFAULT,
                    MULTIMON_LAYOUT_PARAM.into(),
                    r#"{"0":{"left":0,"top":0,"width":2560,"height":1440}}"#.into()
                ),
                Sent::Size(
                    LayerId::DEFAULT,
                    SizeChange {
                        width: 2560,
                        height: 1440,
                        monitor_index: 0,
                        top_offset: 0
                    }
                ),
                Sent::Cursor(Cursor::Pointer),
            ]
        );
    }

    #[test]
    #[should_panic(expected = "while layer 0 is painting")]
    fn test_resize_during_paint_is_fatal_without_force_close() {
        let (mut session, _) = session(DisplayConfig {
            force_close_on_resize: false,
            ..square(300)
        });
        session.paint_begin(LayerId::DEFAULT).unwrap();
        let _ = session.resize(LayerId::DEFAULT, Resize::primary(400, 400));
    }

    #[test]
    fn test_resize_keeps_other_monitors() {
        let (mut session, recorder) = session(DisplayConfig {
            width: 3840,
            height: 1080,
            initial_monitors: vec![
                Monitor {
                    index: 0,
                    left: 0,
                    top: 0,
                    width: 1920,
                    height: 1080,
                },
                Monitor {
                    index: 1,
                    left: 1920,
                    top: 0,
                    width: 1920,
                    height: 1080,
                },
            ],
            ..Default::default()
        });

        session
            .resize(
                LayerId::DEFAULT,
                Resize {
                    width: 1280,
                    height: 1024,
                    monitor_index: 1,
                    left_offset: 1920,
                    top_offset: 56,
                },
            )
            .unwrap();

        let sent = recorder.0.lock().clone();
        let Sent::Parameter(_, _, payload) = &sent[0] else {
            panic!("expected layout first, got {sent:?}");
        };
        let monitors = crate::monitor::MonitorLayout::decode_payload(payload).unwrap();
        assert_eq!(monitors.len(), 2);
        assert_eq!((monitors[0].width, monitors[0].height), (1920, 1080));
        assert_eq!(
            monitors[1],
            Monitor {
                index: 1,
                left: 1920,
                top: 56,
                width: 1280,
                height: 1024
            }
        );
        assert!(matches!(
            sent[1],
            Sent::Size(_, SizeChange { monitor_index: 1, top_offset: 56, .. })
        ));
    }

    #[test]
    fn test_resize_rejects_bad_dimensions() {
        let (mut session, recorder) = session(square(300));
        assert!(matches!(
            session.resize(LayerId::DEFAULT, Resize::primary(0, 100)),
            Err(DisplayError::InvalidDimensions { width: 0, height: 100 })
        ));
        assert!(recorder.0.lock().is_empty());
        assert_eq!(session.display().default_layer().bounds(), Rect::new(0, 0, 300, 300));
    }

    #[test]
    fn test_resize_allocation_failure_sends_nothing() {
        let (mut session, recorder) = session(DisplayConfig {
            bytes_per_pixel: 1,
            max_dimension: u32::MAX,
            ..square(64)
        });
        assert!(matches!(
            session.resize(LayerId::DEFAULT, Resize::primary(u32::MAX, u32::MAX)),
            Err(DisplayError::Allocation { .. })
        ));
        assert!(recorder.0.lock().is_empty());

        let display = session.display();
        assert_eq!(display.default_layer().bounds(), Rect::new(0, 0, 64, 64));
        assert_eq!(
            display.monitor_layout_payload(LayerId::DEFAULT).unwrap(),
            r#"{"0":{"left":0,"top":0,"width":64,"height":64}}"#
        );

        session.paint_begin(LayerId::DEFAULT).unwrap();
        session.report_dirty(LayerId::DEFAULT, Rect::new(0, 0, 4, 4));
        assert_eq!(session.paint_end(LayerId::DEFAULT), Some(Rect::new(0, 0, 4, 4)));
    }

    #[test]
    fn test_resize_channel_failure_is_reported() {
        let display = Display::new(square(300)).unwrap();
        let mut session = SourceSession::new(display, Arc::new(Broken));
        let result = session.resize(LayerId::DEFAULT, Resize::primary(400, 400));
        assert!(matches!(result, Err(DisplayError::Channel(_))));
        assert_eq!(session.display().default_layer().bounds(), Rect::new(0, 0, 400, 400));
    }

    #[test]
    fn test_frame_markers_reach_coordinator() {
        let (session, _) = session(square(300));
        session.frame_marker(FrameAction::Start);
        session.frame_marker(FrameAction::End);
        session.surface_frame_marker(3, FrameAction::End);
        session.mark_frame(true);
        assert_eq!(session.display().frames().completed_frames(), 2);
    }
}
