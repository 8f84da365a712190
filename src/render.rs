//! Render loop
//!
//! Waits for completed frames, drains every layer with pending output and
//! hands the dirty pixels to the encoder. Runs as its own task so the
//! source thread never waits on encoding.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::display::Display;
use crate::sink::UpdateEncoder;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Render passes run
    pub passes: u64,
    /// Layer updates handed to the encoder
    pub updates: u64,
    /// Updates the encoder rejected
    pub failures: u64,
}

/// Drain every layer with pending output into `encoder`.
pub fn render_pending(display: &Display, encoder: &mut dyn UpdateEncoder, stats: &mut RenderStats) {
    stats.passes += 1;
    for layer in display.layers() {
        if !layer.has_pending_output() {
            continue;
        }
        let id = layer.id();
        let result = layer.drain_with(|dirty, view| {
            if dirty.is_empty() {
                return None;
            }
            trace!(layer = %id, %dirty, "encoding layer update");
            Some(encoder.encode(id, dirty, view))
        });
        match result {
            Some(Ok(())) => stats.updates += 1,
            Some(Err(e)) => {
                stats.failures += 1;
                warn!(layer = %id, "encoder rejected update: {e:#}");
            }
            None => {}
        }
    }
    if let Err(e) = encoder.end_frame(display.frames().completed_frames()) {
        warn!("encoder failed to end frame: {e:#}");
    }
}

/// Handle to the running render task.
pub struct RenderHandle {
    display: Arc<Display>,
    task: JoinHandle<RenderStats>,
}

impl RenderHandle {
    /// Start the render loop on the current tokio runtime.
    pub fn spawn(display: Arc<Display>, mut encoder: Box<dyn UpdateEncoder>) -> Self {
        let task = tokio::spawn({
            let display = Arc::clone(&display);
            async move {
                info!("render loop started");
                let mut stats = RenderStats::default();
                while display.frames().wait_for_frame().await {
                    render_pending(&display, encoder.as_mut(), &mut stats);
                }
                debug!(?stats, "render loop stopped");
                stats
            }
        });
        Self { display, task }
    }

    /// Stop the loop and wait for any in-flight pass to finish. Layers
    /// must not be torn down before this returns.
    pub async fn shutdown(self) -> Result<RenderStats, tokio::task::JoinError> {
        self.display.frames().shutdown();
        self.task.await
    }
}
