//! Persistent application configuration model and defaults.

use crate::catalog::{BrowseMode, SortOrder, SourceKind};

/// Root configuration persisted to `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Browse view preferences.
    pub ui: UiConfig,
    #[serde(default)]
    /// Library indexing preferences.
    pub library: LibraryConfig,
    #[serde(default)]
    /// Internet-radio streaming preferences.
    pub radio: RadioConfig,
    #[serde(default)]
    /// Visualizer preferences.
    pub visualizer: VisualizerConfig,
}

/// Browse view preferences persisted between sessions.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct UiConfig {
    #[serde(default)]
    pub source: SourceKind,
    #[serde(default)]
    pub browse_mode: BrowseMode,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default = "default_browse_columns")]
    pub columns: Vec<BrowseColumnConfig>,
}

/// One column of the browse list.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, PartialEq, Eq)]
pub struct BrowseColumnConfig {
    /// Header label.
    pub name: String,
    #[serde(default = "default_column_width_px")]
    pub width_px: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Library indexing preferences persisted between sessions.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LibraryConfig {
    #[serde(default)]
    pub folders: Vec<String>,
}

/// Internet-radio streaming preferences.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RadioConfig {
    #[serde(default = "default_radio_buffer_seconds")]
    pub buffer_seconds: u32,
}

/// Visualizer rendering style.
#[derive(Debug, Clone, Copy, serde::Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VisualizerMode {
    #[default]
    Spectrum,
    Oscilloscope,
    Off,
}

/// Visualizer preferences persisted between sessions.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct VisualizerConfig {
    #[serde(default)]
    pub mode: VisualizerMode,
    #[serde(default = "default_band_count")]
    pub band_count: u32,
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    #[serde(default = "default_true")]
    pub peak_hold: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Local,
            browse_mode: BrowseMode::Artists,
            sort_order: SortOrder::TitleAsc,
            window_width: default_window_width(),
            window_height: default_window_height(),
            columns: default_browse_columns(),
        }
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            buffer_seconds: default_radio_buffer_seconds(),
        }
    }
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            mode: VisualizerMode::Spectrum,
            band_count: default_band_count(),
            smoothing: default_smoothing(),
            peak_hold: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_window_width() -> u32 {
    1000
}

fn default_window_height() -> u32 {
    700
}

fn default_column_width_px() -> u32 {
    160
}

fn default_radio_buffer_seconds() -> u32 {
    5
}

fn default_band_count() -> u32 {
    24
}

fn default_smoothing() -> f32 {
    0.6
}

pub const BROWSE_COLUMN_MIN_WIDTH_PX: u32 = 24;
pub const BROWSE_COLUMN_MAX_WIDTH_PX: u32 = 512;

/// Returns the built-in browse column set used for new configs.
pub fn default_browse_columns() -> Vec<BrowseColumnConfig> {
    vec![
        BrowseColumnConfig {
            name: "Title".to_string(),
            width_px: 280,
            enabled: true,
        },
        BrowseColumnConfig {
            name: "Details".to_string(),
            width_px: 200,
            enabled: true,
        },
        BrowseColumnConfig {
            name: "Duration".to_string(),
            width_px: 64,
            enabled: true,
        },
        BrowseColumnConfig {
            name: "Year".to_string(),
            width_px: 56,
            enabled: false,
        },
    ]
}

/// Clamps out-of-range values loaded from disk back into supported bounds.
pub fn sanitize_config(mut config: Config) -> Config {
    config.ui.window_width = config.ui.window_width.clamp(480, 7680);
    config.ui.window_height = config.ui.window_height.clamp(320, 4320);
    if config.ui.columns.is_empty() {
        config.ui.columns = default_browse_columns();
    }
    for column in &mut config.ui.columns {
        column.width_px = column
            .width_px
            .clamp(BROWSE_COLUMN_MIN_WIDTH_PX, BROWSE_COLUMN_MAX_WIDTH_PX);
    }
    config.radio.buffer_seconds = config.radio.buffer_seconds.clamp(1, 60);
    config.visualizer.band_count = config.visualizer.band_count.clamp(4, 128);
    if !(0.0..=1.0).contains(&config.visualizer.smoothing) {
        config.visualizer.smoothing = default_smoothing();
    }
    config
}
