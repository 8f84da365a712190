//! Display configuration
//!
//! Loaded from a TOML file or built from defaults. Every field has a
//! default, so a config file only needs the values it changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::monitor::Monitor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Initial width of the default layer
    pub width: u32,
    /// Initial height of the default layer
    pub height: u32,
    pub bytes_per_pixel: usize,
    /// Largest accepted width or height
    pub max_dimension: u32,
    /// Acknowledge surface frames upstream when non-zero
    pub frame_acknowledge: u32,
    /// Close a paint left open when the source resizes, instead of aborting.
    /// Some display drivers flush an in-progress paint that way.
    pub force_close_on_resize: bool,
    /// Monitor layout at startup. Empty means one monitor covering the
    /// default layer.
    pub initial_monitors: Vec<Monitor>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            bytes_per_pixel: 4,
            max_dimension: 8192,
            frame_acknowledge: 0,
            force_close_on_resize: true,
            initial_monitors: Vec::new(),
        }
    }
}

impl DisplayConfig {
    /// Load from `path`, or return defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            debug!("no config file given, using defaults");
            return Ok(Self::default());
        };

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: DisplayConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;

        info!("configuration loaded from {}", path.display());
        debug!(?config);
        Ok(config)
    }

    /// True if `width`x`height` is a usable surface size.
    pub fn accepts(&self, width: u32, height: u32) -> bool {
        (1..=self.max_dimension).contains(&width) && (1..=self.max_dimension).contains(&height)
    }
}
