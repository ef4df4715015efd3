//! Game configuration loading.

use serde::Deserialize;
use std::path::Path;

/// Engine settings, read from a TOML file with kebab-case keys.
///
/// Every key is optional; anything left out keeps the value from
/// [`GameConfig::default`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct GameConfig {
    /// Credit budget available for buying devices.
    pub starting_credits: u32,
    /// Tolerance (plan units) added around every room rectangle.
    pub room_boundary: f64,
    /// Plan units per metre, used to scale protocol ranges.
    pub distance_meters_to_pixels: f64,
    /// Horizontal offset applied to the source position when measuring links.
    pub node_width: f64,
    /// Period of the evaluation tick in milliseconds.
    pub tick_period_ms: u64,
    /// Protocol assigned to links created without one.
    pub default_protocol: String,
    /// Room layout JSON.
    pub layout_path: String,
    /// Device catalog JSON; the bundled catalog is used when unset.
    pub catalog_path: Option<String>,
    /// Where unlocked achievement names are persisted.
    pub achievements_path: String,
    /// Graph document written by `save` and read at startup when present.
    pub graph_path: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            starting_credits: 1500,
            room_boundary: 30.0,
            distance_meters_to_pixels: 50.0,
            node_width: 174.0,
            tick_period_ms: 1000,
            default_protocol: "TSCH".to_string(),
            layout_path: "data/sphere-house-layout.json".to_string(),
            catalog_path: None,
            achievements_path: "achievements.json".to_string(),
            graph_path: "graph.json".to_string(),
        }
    }
}

impl GameConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Returns
    /// * `Ok(GameConfig)` if the file was successfully loaded and parsed
    /// * `Err(String)` with a descriptive error message otherwise
    pub fn load(config_path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(config_path).map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: GameConfig = toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(config_path: &Path) -> Result<Self, String> {
        if config_path.exists() {
            Self::load(config_path)
        } else {
            log::info!("Config file {} not found, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.tick_period_ms == 0 {
            return Err("tick-period-ms must be positive".to_string());
        }
        if !(self.distance_meters_to_pixels > 0.0) {
            return Err("distance-meters-to-pixels must be positive".to_string());
        }
        if !(self.room_boundary >= 0.0) {
            return Err("room-boundary must not be negative".to_string());
        }
        if self.default_protocol.is_empty() {
            return Err("default-protocol must not be empty".to_string());
        }
        Ok(())
    }
}
