//! Session configuration for the canvas client.
//!
//! The wire format matches the server's config endpoint (`gridWidth`,
//! `gridHeight`, `pixelCooldown`, `colorMap`) extended with client tuning
//! knobs. Loaded from `canvas_config.json` with support for an environment
//! variable override; values are immutable for the lifetime of a session.

use std::{
    collections::BTreeMap,
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use canvas_proto::ColorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::palette::{ParseRgbError, Rgb};

pub const BUILTIN_CANVAS_CONFIG: &str = include_str!("data/canvas_config.json");
pub const CANVAS_CONFIG_ENV: &str = "CANVAS_CONFIG_PATH";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CanvasConfig {
    pub grid_width: u32,
    pub grid_height: u32,
    /// Milliseconds between accepted local placements.
    pub pixel_cooldown: u64,
    /// Color code → `#RRGGBB`.
    pub color_map: BTreeMap<ColorCode, String>,
    pub background_color: ColorCode,
    /// Reserved code meaning "leave unchanged" inside batch updates.
    pub transparent_color: ColorCode,
    /// Screen pixels per grid cell at scale 1.0.
    pub cell_size: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    pub default_scale: f64,
    pub frame_budget_ms: u64,
    pub cooldown_tick_ms: u64,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub mini_map_size: f64,
    /// Paint accepted placements locally before the server echo arrives.
    pub optimistic_placement: bool,
    pub endpoint: String,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            grid_width: 500,
            grid_height: 500,
            pixel_cooldown: 3_000,
            color_map: default_color_map(),
            background_color: 0,
            transparent_color: ColorCode::MAX,
            cell_size: 8.0,
            min_scale: 0.1,
            max_scale: 25.0,
            default_scale: 1.0,
            frame_budget_ms: 8,
            cooldown_tick_ms: 100,
            reconnect_delay_ms: 1_000,
            max_reconnect_attempts: 5,
            mini_map_size: 150.0,
            optimistic_placement: false,
            endpoint: "127.0.0.1:8080".to_string(),
        }
    }
}

fn default_color_map() -> BTreeMap<ColorCode, String> {
    [
        "#FFFFFF", "#000000", "#FF0000", "#DC143C", "#FF7F00", "#FFFF00", "#8B4513", "#00FF00",
        "#50C878", "#00FFFF", "#008080", "#0000FF", "#000080", "#800080", "#FF00FF", "#BFFF00",
    ]
    .iter()
    .enumerate()
    .map(|(code, hex)| (code as ColorCode, hex.to_string()))
    .collect()
}

impl CanvasConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_CANVAS_CONFIG)
                .expect("builtin canvas config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, CanvasConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| CanvasConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = CanvasConfig::from_json_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn frame_budget(&self) -> Duration {
        Duration::from_millis(self.frame_budget_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.pixel_cooldown)
    }

    pub fn cooldown_tick(&self) -> Duration {
        Duration::from_millis(self.cooldown_tick_ms.max(1))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Parsed display colors, in code order.
    pub fn display_colors(&self) -> Result<Vec<(ColorCode, Rgb)>, CanvasConfigError> {
        self.color_map
            .iter()
            .map(|(&code, hex)| {
                hex.parse::<Rgb>()
                    .map(|rgb| (code, rgb))
                    .map_err(|source| CanvasConfigError::Color { code, source })
            })
            .collect()
    }

    /// Checks the invariants the rest of the engine relies on: a non-empty
    /// grid, strictly positive geometry and a sentinel that cannot be painted.
    pub fn validate(&self) -> Result<(), CanvasConfigError> {
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(CanvasConfigError::EmptyGrid {
                width: self.grid_width,
                height: self.grid_height,
            });
        }
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(CanvasConfigError::CellSize(self.cell_size));
        }
        let bounds_ok = self.min_scale.is_finite()
            && self.max_scale.is_finite()
            && self.min_scale > 0.0
            && self.min_scale <= self.max_scale;
        if !bounds_ok {
            return Err(CanvasConfigError::ScaleBounds {
                min: self.min_scale,
                max: self.max_scale,
            });
        }
        if !(self.min_scale..=self.max_scale).contains(&self.default_scale) {
            return Err(CanvasConfigError::DefaultScale {
                scale: self.default_scale,
                min: self.min_scale,
                max: self.max_scale,
            });
        }
        if !(self.mini_map_size.is_finite() && self.mini_map_size > 0.0) {
            return Err(CanvasConfigError::MiniMapSize(self.mini_map_size));
        }
        if self.color_map.contains_key(&self.transparent_color) {
            return Err(CanvasConfigError::PaintableSentinel(self.transparent_color));
        }
        if !self.color_map.contains_key(&self.background_color) {
            return Err(CanvasConfigError::UnknownBackground(self.background_color));
        }
        self.display_colors()?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum CanvasConfigError {
    #[error("failed to parse canvas config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read canvas config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("grid must be at least 1x1, got {width}x{height}")]
    EmptyGrid { width: u32, height: u32 },
    #[error("cell size must be positive, got {0}")]
    CellSize(f64),
    #[error("invalid zoom bounds [{min}, {max}]")]
    ScaleBounds { min: f64, max: f64 },
    #[error("default scale {scale} outside [{min}, {max}]")]
    DefaultScale { scale: f64, min: f64, max: f64 },
    #[error("minimap size must be positive, got {0}")]
    MiniMapSize(f64),
    #[error("transparent code {0} is also a paintable color")]
    PaintableSentinel(ColorCode),
    #[error("background code {0} is missing from the color map")]
    UnknownBackground(ColorCode),
    #[error("color {code}: {source}")]
    Color {
        code: ColorCode,
        #[source]
        source: ParseRgbError,
    },
}

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasConfigMetadata {
    path: Option<PathBuf>,
}

impl CanvasConfigMetadata {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }
}

/// Load canvas configuration from `CANVAS_CONFIG_PATH` or the crate default
/// path, falling back to the builtin copy.
pub fn load_canvas_config_from_env() -> (Arc<CanvasConfig>, CanvasConfigMetadata) {
    let override_path = env::var(CANVAS_CONFIG_ENV).ok().map(PathBuf::from);
    let default_path =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/data/canvas_config.json");

    let candidates: Vec<PathBuf> = match override_path {
        Some(ref path) => vec![path.clone()],
        None => vec![default_path],
    };

    for path in candidates {
        match CanvasConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "pixel_canvas::config",
                    path = %path.display(),
                    "canvas_config.loaded=file"
                );
                return (Arc::new(config), CanvasConfigMetadata::new(Some(path)));
            }
            Err(err) => {
                tracing::warn!(
                    target: "pixel_canvas::config",
                    path = %path.display(),
                    error = %err,
                    "canvas_config.load_failed"
                );
            }
        }
    }

    let config = CanvasConfig::builtin();
    tracing::info!(target: "pixel_canvas::config", "canvas_config.loaded=builtin");
    (config, CanvasConfigMetadata::new(None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CanvasConfig::default();
        config.validate().unwrap();
        assert_eq!(config.color_map.len(), 16);
        assert_eq!(config.cooldown(), Duration::from_secs(3));
    }

    #[test]
    fn builtin_config_parses_and_validates() {
        let config = CanvasConfig::builtin();
        config.validate().unwrap();
        assert_eq!(config.grid_width, 500);
        assert_eq!(config.color_map.get(&15).map(String::as_str), Some("#BFFF00"));
    }

    #[test]
    fn server_payload_fills_remaining_fields_from_defaults() {
        let config = CanvasConfig::from_json_str(
            r##"{"gridWidth":64,"gridHeight":32,"pixelCooldown":10000,"colorMap":{"0":"#FFFFFF","1":"#000000"}}"##,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!((config.grid_width, config.grid_height), (64, 32));
        assert_eq!(config.cooldown(), Duration::from_secs(10));
        assert_eq!(config.frame_budget(), Duration::from_millis(8));
    }

    #[test]
    fn sentinel_inside_palette_is_rejected() {
        let mut config = CanvasConfig::default();
        config.transparent_color = 3;
        assert!(matches!(
            config.validate(),
            Err(CanvasConfigError::PaintableSentinel(3))
        ));
    }

    #[test]
    fn degenerate_geometry_is_rejected() {
        let mut config = CanvasConfig::default();
        config.min_scale = 0.0;
        assert!(matches!(
            config.validate(),
            Err(CanvasConfigError::ScaleBounds { .. })
        ));

        let mut config = CanvasConfig::default();
        config.cell_size = -1.0;
        assert!(matches!(config.validate(), Err(CanvasConfigError::CellSize(_))));

        let mut config = CanvasConfig::default();
        config.grid_height = 0;
        assert!(matches!(config.validate(), Err(CanvasConfigError::EmptyGrid { .. })));
    }

    #[test]
    fn bad_hex_colors_are_rejected() {
        let mut config = CanvasConfig::default();
        config.color_map.insert(4, "orange".to_string());
        assert!(matches!(
            config.validate(),
            Err(CanvasConfigError::Color { code: 4, .. })
        ));
    }
}
