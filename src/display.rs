//! Per-session display state
//!
//! A [`Display`] owns the layers of one remote session, the monitor
//! layout reported to the client and the frame coordinator shared by the
//! source and render sides. It is always used behind an `Arc`.

use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::DisplayConfig;
use crate::error::{DisplayError, Result};
use crate::frame::FrameCoordinator;
use crate::layer::{Layer, LayerId};
use crate::monitor::{Monitor, MonitorLayout};
use crate::rect::Rect;
use crate::sink::FrameAcknowledger;

#[derive(Debug)]
pub struct Display {
    config: DisplayConfig,
    default_layer: Arc<Layer>,
    layers: RwLock<BTreeMap<LayerId, Arc<Layer>>>,
    next_layer: AtomicU32,
    monitors: Mutex<MonitorLayout>,
    frames: FrameCoordinator,
}

impl Display {
    pub fn new(config: DisplayConfig) -> Result<Arc<Self>> {
        Self::with_acknowledger(config, None)
    }

    pub fn with_acknowledger(
        config: DisplayConfig,
        acknowledger: Option<Arc<dyn FrameAcknowledger>>,
    ) -> Result<Arc<Self>> {
        let (width, height) = (config.width, config.height);
        if !config.accepts(width, height) {
            return Err(DisplayError::InvalidDimensions { width, height });
        }

        let default_layer = Arc::new(Layer::new(
            LayerId::DEFAULT,
            true,
            width,
            height,
            config.bytes_per_pixel,
        )?);
        let mut layers = BTreeMap::new();
        layers.insert(LayerId::DEFAULT, Arc::clone(&default_layer));

        let monitors = if config.initial_monitors.is_empty() {
            MonitorLayout::from_monitors([Monitor {
                index: 0,
                left: 0,
                top: 0,
                width,
                height,
            }])
        } else {
            MonitorLayout::from_monitors(config.initial_monitors.iter().copied())
        };

        info!(width, height, monitors = monitors.len(), "display created");

        Ok(Arc::new(Self {
            frames: FrameCoordinator::new(config.frame_acknowledge, acknowledger),
            config,
            default_layer,
            layers: RwLock::new(layers),
            next_layer: AtomicU32::new(1),
            monitors: Mutex::new(monitors),
        }))
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    pub fn frames(&self) -> &FrameCoordinator {
        &self.frames
    }

    pub fn default_layer(&self) -> Arc<Layer> {
        Arc::clone(&self.default_layer)
    }

    pub fn layer(&self, id: LayerId) -> Result<Arc<Layer>> {
        self.layers
            .read()
            .get(&id)
            .cloned()
            .ok_or(DisplayError::UnknownLayer(id))
    }

    /// All layers, default layer first.
    pub fn layers(&self) -> Vec<Arc<Layer>> {
        self.layers.read().values().cloned().collect()
    }

    /// Add a secondary layer, e.g. for an overlay or extra monitor.
    pub fn create_layer(&self, width: u32, height: u32) -> Result<LayerId> {
        self.check_dimensions(width, height)?;
        let id = self
            .next_layer
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
            .map(LayerId)
            .map_err(|_| DisplayError::LayerIdsExhausted)?;
        let layer = Layer::new(id, false, width, height, self.config.bytes_per_pixel)?;
        self.layers.write().insert(id, Arc::new(layer));
        debug!(layer = %id, width, height, "layer created");
        Ok(id)
    }

    pub fn remove_layer(&self, id: LayerId) -> Result<()> {
        if id == LayerId::DEFAULT {
            return Err(DisplayError::DefaultLayer);
        }
        self.layers
            .write()
            .remove(&id)
            .ok_or(DisplayError::UnknownLayer(id))?;
        debug!(layer = %id, "layer removed");
        Ok(())
    }

    pub fn check_dimensions(&self, width: u32, height: u32) -> Result<()> {
        if self.config.accepts(width, height) {
            Ok(())
        } else {
            Err(DisplayError::InvalidDimensions { width, height })
        }
    }

    /// Read and clear the dirty rect of a layer.
    pub fn drain(&self, id: LayerId) -> Result<Rect> {
        Ok(self.layer(id)?.drain())
    }

    pub fn monitors(&self) -> MonitorLayout {
        self.monitors.lock().clone()
    }

    /// Replace one monitor entry, leaving the others untouched.
    pub fn set_monitor(&self, monitor: Monitor) {
        self.monitors.lock().set(monitor);
    }

    pub fn remove_monitor(&self, index: u32) -> Option<Monitor> {
        self.monitors.lock().remove(index)
    }

    /// Serialized monitor layout to be sent as a parameter of `layer`.
    pub fn monitor_layout_payload(&self, layer: LayerId) -> Result<String> {
        self.layer(layer)?;
        self.monitors.lock().payload()
    }
}
