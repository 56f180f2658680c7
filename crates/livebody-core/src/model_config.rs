//! Liveness sub-model descriptors read from `live/config.json`.
//!
//! The file holds a single line: one JSON array with one object per
//! sub-model, e.g.
//!
//! ```json
//! [{"name":"m1","width":80,"height":80,"scale":2.7,"shift_x":0,"shift_y":0,"org_resize":false}]
//! ```
//!
//! Anything after the first line is ignored.

use std::io::{BufRead, BufReader};

use serde::{Deserialize, Serialize};

use crate::assets::AssetSource;
use crate::error::ConfigError;

/// Asset path of the liveness sub-model list.
pub const CONFIG_PATH: &str = "live/config.json";

/// Input geometry and crop normalization of one liveness sub-model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    /// Network input width in pixels.
    pub width: u32,
    /// Network input height in pixels.
    pub height: u32,
    /// Crop enlargement factor around the face box.
    pub scale: f32,
    pub shift_x: f32,
    pub shift_y: f32,
    /// Resize the whole frame instead of a crop around the face.
    #[serde(default)]
    pub org_resize: bool,
}

/// Parse one config line into sub-model descriptors, preserving order.
pub fn parse_model_configs(line: &str) -> Result<Vec<ModelConfig>, ConfigError> {
    let configs: Vec<ModelConfig> = serde_json::from_str(line.trim())?;
    if configs.is_empty() {
        return Err(ConfigError::NoModels);
    }
    if let Some(bad) = configs.iter().find(|c| c.width == 0 || c.height == 0) {
        return Err(ConfigError::InvalidGeometry {
            name: bad.name.clone(),
            width: bad.width,
            height: bad.height,
        });
    }
    Ok(configs)
}

/// Read and parse [`CONFIG_PATH`] from an asset source.
pub fn read_model_configs(assets: &dyn AssetSource) -> Result<Vec<ModelConfig>, ConfigError> {
    let read_err = |source| ConfigError::Read {
        path: CONFIG_PATH,
        source,
    };
    let stream = assets.open(CONFIG_PATH).map_err(read_err)?;
    let mut line = String::new();
    BufReader::new(stream)
        .read_line(&mut line)
        .map_err(read_err)?;
    parse_model_configs(&line)
}
