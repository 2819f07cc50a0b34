//! Config file load/persist with targeted, comment-preserving updates.
//!
//! Hand-edited config files keep their comments and formatting: persisting
//! re-parses the existing text as a TOML document and rewrites only the keys
//! whose values actually changed.

use std::path::{Path, PathBuf};

use log::warn;
use toml_edit::{value, Array, ArrayOfTables, DocumentMut, Item, Table};

use crate::catalog::{BrowseMode, SortOrder, SourceKind};
use crate::config::{sanitize_config, Config, VisualizerMode};

fn set_table_value_preserving_decor(table: &mut Table, key: &str, item: Item) {
    let replacing_scalar_with_aot = item.is_array_of_tables()
        && table
            .get(key)
            .is_some_and(|current| !current.is_array_of_tables());
    if replacing_scalar_with_aot {
        table.remove(key);
        table[key] = item;
        return;
    }

    let existing_value_decor = table
        .get(key)
        .and_then(|current| current.as_value().map(|value| value.decor().clone()));
    table[key] = item;
    if let Some(existing_value_decor) = existing_value_decor {
        if let Some(next_value) = table[key].as_value_mut() {
            *next_value.decor_mut() = existing_value_decor;
        }
    }
}

fn set_table_scalar_if_changed<T, F>(
    table: &mut Table,
    key: &str,
    previous_value: T,
    next_value: T,
    to_item: F,
) where
    T: PartialEq + Copy,
    F: FnOnce(T) -> Item,
{
    if table.contains_key(key) && previous_value == next_value {
        return;
    }
    set_table_value_preserving_decor(table, key, to_item(next_value));
}

fn ensure_section_table(document: &mut DocumentMut, key: &str) {
    let root = document.as_table_mut();
    let should_replace = !matches!(root.get(key), Some(item) if item.is_table());
    if should_replace {
        root.insert(key, Item::Table(Table::new()));
    }
}

fn source_kind_str(source: SourceKind) -> &'static str {
    match source {
        SourceKind::Local => "local",
        SourceKind::Plex => "plex",
        SourceKind::Subsonic => "subsonic",
        SourceKind::Radio => "radio",
    }
}

fn browse_mode_str(mode: BrowseMode) -> &'static str {
    match mode {
        BrowseMode::Artists => "artists",
        BrowseMode::Albums => "albums",
        BrowseMode::Tracks => "tracks",
        BrowseMode::Movies => "movies",
        BrowseMode::Shows => "shows",
        BrowseMode::Playlists => "playlists",
        BrowseMode::Search => "search",
        BrowseMode::Radio => "radio",
    }
}

fn sort_order_str(order: SortOrder) -> &'static str {
    match order {
        SortOrder::TitleAsc => "title_asc",
        SortOrder::TitleDesc => "title_desc",
        SortOrder::DateAddedAsc => "date_added_asc",
        SortOrder::DateAddedDesc => "date_added_desc",
        SortOrder::YearAsc => "year_asc",
        SortOrder::YearDesc => "year_desc",
    }
}

fn visualizer_mode_str(mode: VisualizerMode) -> &'static str {
    match mode {
        VisualizerMode::Spectrum => "spectrum",
        VisualizerMode::Oscilloscope => "oscilloscope",
        VisualizerMode::Off => "off",
    }
}

fn write_config_to_document(document: &mut DocumentMut, previous: &Config, config: &Config) {
    ensure_section_table(document, "ui");
    ensure_section_table(document, "library");
    ensure_section_table(document, "radio");
    ensure_section_table(document, "visualizer");

    {
        let ui = document["ui"].as_table_mut().expect("ui should be a table");
        if !ui.contains_key("source") || previous.ui.source != config.ui.source {
            set_table_value_preserving_decor(ui, "source", value(source_kind_str(config.ui.source)));
        }
        if !ui.contains_key("browse_mode") || previous.ui.browse_mode != config.ui.browse_mode {
            set_table_value_preserving_decor(
                ui,
                "browse_mode",
                value(browse_mode_str(config.ui.browse_mode)),
            );
        }
        if !ui.contains_key("sort_order") || previous.ui.sort_order != config.ui.sort_order {
            set_table_value_preserving_decor(
                ui,
                "sort_order",
                value(sort_order_str(config.ui.sort_order)),
            );
        }
        set_table_scalar_if_changed(
            ui,
            "window_width",
            i64::from(previous.ui.window_width),
            i64::from(config.ui.window_width),
            value,
        );
        set_table_scalar_if_changed(
            ui,
            "window_height",
            i64::from(previous.ui.window_height),
            i64::from(config.ui.window_height),
            value,
        );
        if !ui.contains_key("columns") || previous.ui.columns != config.ui.columns {
            let mut columns = ArrayOfTables::new();
            for column in &config.ui.columns {
                let mut row = Table::new();
                row.insert("name", value(column.name.clone()));
                row.insert("width_px", value(i64::from(column.width_px)));
                row.insert("enabled", value(column.enabled));
                columns.push(row);
            }
            set_table_value_preserving_decor(ui, "columns", Item::ArrayOfTables(columns));
        }
    }

    {
        let library = document["library"]
            .as_table_mut()
            .expect("library should be a table");
        if !library.contains_key("folders") || previous.library.folders != config.library.folders {
            let mut folders = Array::new();
            for folder in &config.library.folders {
                folders.push(folder.as_str());
            }
            set_table_value_preserving_decor(library, "folders", value(folders));
        }
    }

    {
        let radio = document["radio"]
            .as_table_mut()
            .expect("radio should be a table");
        set_table_scalar_if_changed(
            radio,
            "buffer_seconds",
            i64::from(previous.radio.buffer_seconds),
            i64::from(config.radio.buffer_seconds),
            value,
        );
    }

    {
        let visualizer = document["visualizer"]
            .as_table_mut()
            .expect("visualizer should be a table");
        if !visualizer.contains_key("mode") || previous.visualizer.mode != config.visualizer.mode {
            set_table_value_preserving_decor(
                visualizer,
                "mode",
                value(visualizer_mode_str(config.visualizer.mode)),
            );
        }
        set_table_scalar_if_changed(
            visualizer,
            "band_count",
            i64::from(previous.visualizer.band_count),
            i64::from(config.visualizer.band_count),
            value,
        );
        set_table_scalar_if_changed(
            visualizer,
            "smoothing",
            f64::from(previous.visualizer.smoothing),
            f64::from(config.visualizer.smoothing),
            value,
        );
        set_table_scalar_if_changed(
            visualizer,
            "peak_hold",
            previous.visualizer.peak_hold,
            config.visualizer.peak_hold,
            value,
        );
    }
}

pub fn serialize_config_with_preserved_comments(
    existing_text: &str,
    config: &Config,
) -> Result<String, String> {
    let previous = toml::from_str::<Config>(existing_text)
        .map_err(|err| format!("failed to parse existing config as Config: {}", err))?;
    let mut document = existing_text
        .parse::<DocumentMut>()
        .map_err(|err| format!("failed to parse existing config as TOML document: {}", err))?;
    write_config_to_document(&mut document, &previous, config);
    Ok(document.to_string())
}

pub fn persist_config_file(config: &Config, path: &Path) {
    if let Some(parent) = path.parent() {
        if let Err(err) = std::fs::create_dir_all(parent) {
            log::error!("Failed to create config directory {}: {}", parent.display(), err);
            return;
        }
    }

    let existing_text = std::fs::read_to_string(path).ok();
    let config_text = if let Some(existing_text) = existing_text {
        match serialize_config_with_preserved_comments(&existing_text, config) {
            Ok(updated_text) => Some(updated_text),
            Err(err) => {
                warn!(
                    "Failed to preserve config comments for {} ({}). Falling back to plain serialization.",
                    path.display(),
                    err
                );
                toml::to_string(config).ok()
            }
        }
    } else {
        toml::to_string(config).ok()
    };

    let Some(config_text) = config_text else {
        log::error!("Failed to serialize config for {}", path.display());
        return;
    };

    if let Err(err) = std::fs::write(path, config_text) {
        log::error!("Failed to persist config to {}: {}", path.display(), err);
    }
}

/// Loads and sanitizes the config file, falling back to defaults when the
/// file is missing or unreadable.
pub fn load_config_file(path: &Path) -> Config {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!(
                "Failed to read config file {}. Using defaults. error={}",
                path.display(),
                err
            );
            return Config::default();
        }
    };

    match toml::from_str::<Config>(&content) {
        Ok(config) => sanitize_config(config),
        Err(err) => {
            warn!(
                "Failed to parse config file {}. Using defaults. error={}",
                path.display(),
                err
            );
            Config::default()
        }
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tunedeck")
        .join("config.toml")
}
