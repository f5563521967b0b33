// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor configuration.
//!
//! Settings are stored as RON. Every section has defaults, so a config
//! file only needs to mention what it overrides:
//!
//! ```ron
//! (
//!     edges: (tangent: 8.0),
//!     view: (initial: (x: 0.0, y: 0.0, k: 1.0)),
//! )
//! ```

use crate::view::ViewTransform;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The RON document did not parse
    #[error("Config parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// The config could not be serialized
    #[error("Config serialization error: {0}")]
    Serialize(#[from] ron::Error),
}

/// Node and port geometry used by retained surfaces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Node width in graph units
    pub node_width: f32,
    /// Title bar height
    pub header_height: f32,
    /// Height of one port row
    pub port_height: f32,
    /// Radius of the port handle
    pub port_radius: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 180.0,
            header_height: 24.0,
            port_height: 22.0,
            port_radius: 6.0,
        }
    }
}

/// Edge path parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Horizontal lead-out from each endpoint before the curve bends
    pub tangent: f32,
    /// Stroke width
    pub stroke_width: f32,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            tangent: 5.0,
            stroke_width: 2.5,
        }
    }
}

/// View settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Transform applied when the host is created
    pub initial: ViewTransform,
    /// Smallest allowed zoom
    pub min_zoom: f32,
    /// Largest allowed zoom
    pub max_zoom: f32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            initial: ViewTransform::new(400.0, 400.0, 2.0),
            min_zoom: 0.5,
            max_zoom: 2.0,
        }
    }
}

/// Top-level editor configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Node layout
    pub layout: LayoutConfig,
    /// Edge rendering
    pub edges: EdgeConfig,
    /// Pan/zoom
    pub view: ViewConfig,
}

impl EditorConfig {
    /// Parse a config from a RON string
    pub fn from_ron(s: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(s)?)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Load a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_ron(&content)?;
        tracing::debug!("Loaded editor config from {:?}", path);
        Ok(config)
    }

    /// Write the config to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    /// The initial view with its zoom clamped into the configured extent
    pub fn initial_view(&self) -> ViewTransform {
        self.view
            .initial
            .clamped(self.view.min_zoom, self.view.max_zoom)
    }
}
