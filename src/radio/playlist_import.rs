//! M3U and PLS playlist parsing for station import.
//!
//! Both formats are treated leniently: unknown directives are skipped and
//! entries without a URL are dropped rather than failing the whole file.

use std::fs;
use std::path::Path;

/// One station parsed out of a playlist file. The name falls back to the
/// stream URL when the playlist carries no title.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedStation {
    pub name: String,
    pub stream_url: String,
}

/// Parses a playlist file, choosing the format by extension (`.pls` is PLS,
/// everything else is treated as M3U).
pub fn parse_playlist_file(path: &Path) -> Result<Vec<ImportedStation>, String> {
    let content = fs::read_to_string(path)
        .map_err(|err| format!("could not read {}: {}", path.display(), err))?;
    let is_pls = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pls"));
    if is_pls {
        parse_pls(&content)
    } else {
        parse_m3u(&content)
    }
}

fn looks_like_stream_url(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Parses plain and extended M3U. `#EXTINF` titles apply to the next URL
/// line; URLs without a preceding `#EXTINF` are named after themselves.
pub fn parse_m3u(content: &str) -> Result<Vec<ImportedStation>, String> {
    let mut stations = Vec::new();
    let mut pending_title: Option<String> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(extinf) = line.strip_prefix("#EXTINF:") {
            // "#EXTINF:duration,Title" -- everything after the first comma.
            pending_title = extinf
                .split_once(',')
                .map(|(_, title)| title.trim().to_string())
                .filter(|title| !title.is_empty());
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        if !looks_like_stream_url(line) {
            pending_title = None;
            continue;
        }
        let name = pending_title.take().unwrap_or_else(|| line.to_string());
        stations.push(ImportedStation {
            name,
            stream_url: line.to_string(),
        });
    }

    Ok(stations)
}

/// Parses PLS `FileN=`/`TitleN=` pairs, matching titles to files by index.
pub fn parse_pls(content: &str) -> Result<Vec<ImportedStation>, String> {
    let mut files: Vec<(u32, String)> = Vec::new();
    let mut titles: Vec<(u32, String)> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if let Some(index) = key.strip_prefix("File").and_then(|n| n.parse::<u32>().ok()) {
            if looks_like_stream_url(value) {
                files.push((index, value.to_string()));
            }
        } else if let Some(index) = key.strip_prefix("Title").and_then(|n| n.parse::<u32>().ok()) {
            if !value.is_empty() {
                titles.push((index, value.to_string()));
            }
        }
    }

    if files.is_empty() && !content.to_lowercase().contains("[playlist]") {
        return Err("not a PLS playlist".to_string());
    }

    files.sort_by_key(|(index, _)| *index);
    let stations = files
        .into_iter()
        .map(|(index, stream_url)| {
            let name = titles
                .iter()
                .find(|(title_index, _)| *title_index == index)
                .map(|(_, title)| title.clone())
                .unwrap_or_else(|| stream_url.clone());
            ImportedStation { name, stream_url }
        })
        .collect();
    Ok(stations)
}
