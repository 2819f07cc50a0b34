//! Local filesystem media source.
//!
//! Walks the configured library folders, reads tags with `lofty`, and builds
//! an in-memory index of artists, albums, and tracks. The index is built
//! lazily on first fetch and dropped on refresh.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::UNIX_EPOCH;

use lofty::config::{ParseOptions, ParsingMode};
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::prelude::Accessor;
use lofty::probe::Probe;
use lofty::tag::ItemKey;
use log::{debug, info, warn};
use rand::seq::IndexedRandom;

use crate::browser::search_results::normalized_name;
use crate::catalog::{
    AlbumEntry, ArtistEntry, BrowseMode, CatalogEntry, SearchResults, TrackEntry, TrackLocator,
};
use crate::sources::MediaSourceAdapter;

pub const SUPPORTED_AUDIO_EXTENSIONS: [&str; 7] =
    ["mp3", "wav", "ogg", "flac", "aac", "m4a", "mp4"];

pub fn is_supported_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_AUDIO_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Recursively collects supported audio files under `folder`, sorted by path.
/// Unreadable directories are skipped with a debug log.
pub fn collect_audio_files(folder: &Path) -> Vec<PathBuf> {
    let mut pending = vec![folder.to_path_buf()];
    let mut files = Vec::new();

    while let Some(directory) = pending.pop() {
        let entries = match fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(err) => {
                debug!("Failed to read directory {}: {}", directory.display(), err);
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            match entry.file_type() {
                Ok(file_type) if file_type.is_dir() => pending.push(path),
                Ok(file_type) if file_type.is_file() && is_supported_audio_file(&path) => {
                    files.push(path);
                }
                Ok(_) => {}
                Err(err) => debug!("Failed to inspect {}: {}", path.display(), err),
            }
        }
    }

    files.sort_unstable();
    files
}

fn parse_leading_number(raw: &str) -> Option<u32> {
    // Track frames are often "3/12"; the part before the slash is the number.
    raw.split('/').next()?.trim().parse().ok()
}

fn file_added_at(path: &Path) -> Option<i64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
    i64::try_from(since_epoch.as_secs()).ok()
}

/// Reads one file's tags into a track entry. Files whose tags cannot be
/// parsed still index under their file stem so the library never silently
/// shrinks.
pub fn read_track_entry(path: &Path) -> TrackEntry {
    let mut entry = TrackEntry {
        id: path.to_string_lossy().to_string(),
        title: path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string()),
        artist_name: String::new(),
        album_title: String::new(),
        genre: String::new(),
        duration_secs: 0,
        track_number: None,
        disc_number: None,
        year: None,
        added_at: file_added_at(path),
        locator: TrackLocator::LocalFile(path.to_path_buf()),
    };

    let options = ParseOptions::new()
        .read_properties(true)
        .parsing_mode(ParsingMode::Relaxed);
    let tagged_file = match Probe::open(path).and_then(|probe| probe.options(options).read()) {
        Ok(tagged_file) => tagged_file,
        Err(err) => {
            debug!("Tag read failed for {}: {}", path.display(), err);
            return entry;
        }
    };

    entry.duration_secs = u32::try_from(tagged_file.properties().duration().as_secs())
        .unwrap_or(u32::MAX);

    let Some(tag) = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.tags().first())
    else {
        return entry;
    };

    if let Some(title) = tag.title() {
        let trimmed = title.trim();
        if !trimmed.is_empty() {
            entry.title = trimmed.to_string();
        }
    }
    if let Some(artist) = tag.artist() {
        entry.artist_name = artist.trim().to_string();
    }
    if let Some(album) = tag.album() {
        entry.album_title = album.trim().to_string();
    }
    if let Some(genre) = tag.genre() {
        entry.genre = genre.trim().to_string();
    }
    entry.track_number = tag
        .get_string(&ItemKey::TrackNumber)
        .and_then(parse_leading_number)
        .or_else(|| tag.track());
    entry.disc_number = tag
        .get_string(&ItemKey::DiscNumber)
        .and_then(parse_leading_number)
        .or_else(|| tag.disk());
    entry.year = tag
        .get_string(&ItemKey::Year)
        .and_then(parse_leading_number)
        .or_else(|| tag.year());

    entry
}

const UNKNOWN_ARTIST: &str = "Unknown Artist";
const UNKNOWN_ALBUM: &str = "Unknown Album";

fn artist_id(artist_name: &str) -> String {
    format!("la:{}", normalized_name(artist_name))
}

fn album_id(artist_name: &str, album_title: &str) -> String {
    format!(
        "lb:{}\u{1f}{}",
        normalized_name(artist_name),
        normalized_name(album_title)
    )
}

/// Immutable snapshot of one scan, grouped for browse queries.
///
/// Construction from a flat track list is pure so grouping can be tested
/// without real audio files on disk.
pub struct LibraryIndex {
    artists: Vec<ArtistEntry>,
    albums: Vec<AlbumEntry>,
    tracks: Vec<TrackEntry>,
    albums_by_artist: HashMap<String, Vec<String>>,
    tracks_by_album: HashMap<String, Vec<usize>>,
}

impl LibraryIndex {
    /// Groups a flat track list into artists and albums. Tracks without an
    /// artist or album tag land under the unknown buckets; albums are keyed
    /// by artist and title together so same-named albums stay separate.
    pub fn from_tracks(mut tracks: Vec<TrackEntry>) -> Self {
        for track in &mut tracks {
            if track.artist_name.is_empty() {
                track.artist_name = UNKNOWN_ARTIST.to_string();
            }
            if track.album_title.is_empty() {
                track.album_title = UNKNOWN_ALBUM.to_string();
            }
        }
        // Natural album order: disc, then track number, then title.
        tracks.sort_by(|left, right| {
            left.artist_name
                .to_lowercase()
                .cmp(&right.artist_name.to_lowercase())
                .then_with(|| {
                    left.album_title
                        .to_lowercase()
                        .cmp(&right.album_title.to_lowercase())
                })
                .then_with(|| left.disc_number.cmp(&right.disc_number))
                .then_with(|| left.track_number.cmp(&right.track_number))
                .then_with(|| left.title.to_lowercase().cmp(&right.title.to_lowercase()))
        });

        let mut artists_by_id: HashMap<String, ArtistEntry> = HashMap::new();
        let mut albums_by_id: HashMap<String, AlbumEntry> = HashMap::new();
        let mut albums_by_artist: HashMap<String, Vec<String>> = HashMap::new();
        let mut tracks_by_album: HashMap<String, Vec<usize>> = HashMap::new();

        for (index, track) in tracks.iter().enumerate() {
            let artist_key = artist_id(&track.artist_name);
            let album_key = album_id(&track.artist_name, &track.album_title);

            let artist = artists_by_id
                .entry(artist_key.clone())
                .or_insert_with(|| ArtistEntry {
                    id: artist_key.clone(),
                    name: track.artist_name.clone(),
                    album_count: 0,
                    track_count: 0,
                    added_at: None,
                });
            artist.track_count += 1;
            artist.added_at = max_added(artist.added_at, track.added_at);

            let album_is_new = !albums_by_id.contains_key(&album_key);
            let album = albums_by_id
                .entry(album_key.clone())
                .or_insert_with(|| AlbumEntry {
                    id: album_key.clone(),
                    title: track.album_title.clone(),
                    artist_name: track.artist_name.clone(),
                    year: track.year,
                    track_count: 0,
                    added_at: None,
                });
            album.track_count += 1;
            album.added_at = max_added(album.added_at, track.added_at);
            if album.year.is_none() {
                album.year = track.year;
            }

            if album_is_new {
                albums_by_artist
                    .entry(artist_key.clone())
                    .or_default()
                    .push(album_key.clone());
                if let Some(artist) = artists_by_id.get_mut(&artist_key) {
                    artist.album_count += 1;
                }
            }
            tracks_by_album.entry(album_key).or_default().push(index);
        }

        let mut artists: Vec<ArtistEntry> = artists_by_id.into_values().collect();
        artists.sort_by(|left, right| left.name.to_lowercase().cmp(&right.name.to_lowercase()));
        let mut albums: Vec<AlbumEntry> = albums_by_id.into_values().collect();
        albums.sort_by(|left, right| {
            left.title
                .to_lowercase()
                .cmp(&right.title.to_lowercase())
                .then_with(|| {
                    left.artist_name
                        .to_lowercase()
                        .cmp(&right.artist_name.to_lowercase())
                })
        });

        Self {
            artists,
            albums,
            tracks,
            albums_by_artist,
            tracks_by_album,
        }
    }

    pub fn artists(&self) -> &[ArtistEntry] {
        &self.artists
    }

    pub fn albums(&self) -> &[AlbumEntry] {
        &self.albums
    }

    pub fn tracks(&self) -> &[TrackEntry] {
        &self.tracks
    }

    pub fn albums_for_artist(&self, artist_id: &str) -> Vec<AlbumEntry> {
        let Some(album_ids) = self.albums_by_artist.get(artist_id) else {
            return Vec::new();
        };
        album_ids
            .iter()
            .filter_map(|id| self.albums.iter().find(|album| &album.id == id).cloned())
            .collect()
    }

    pub fn tracks_for_album(&self, album_id: &str) -> Vec<TrackEntry> {
        let Some(indices) = self.tracks_by_album.get(album_id) else {
            return Vec::new();
        };
        indices
            .iter()
            .filter_map(|&index| self.tracks.get(index).cloned())
            .collect()
    }

    /// Every track of one artist, album by album in natural order.
    pub fn tracks_for_artist(&self, artist_id: &str) -> Vec<TrackEntry> {
        let Some(album_ids) = self.albums_by_artist.get(artist_id) else {
            return Vec::new();
        };
        album_ids
            .iter()
            .flat_map(|album_id| self.tracks_for_album(album_id))
            .collect()
    }

    /// Case-insensitive substring search across artists, albums, and tracks.
    pub fn search(&self, query: &str) -> SearchResults {
        let needle = query.to_lowercase();
        SearchResults {
            artists: self
                .artists
                .iter()
                .filter(|artist| artist.name.to_lowercase().contains(&needle))
                .cloned()
                .collect(),
            albums: self
                .albums
                .iter()
                .filter(|album| album.title.to_lowercase().contains(&needle))
                .cloned()
                .collect(),
            tracks: self
                .tracks
                .iter()
                .filter(|track| track.title.to_lowercase().contains(&needle))
                .cloned()
                .collect(),
        }
    }

    /// Tracks related to a seed entry, genre first, then same artist, topped
    /// up with a random sample of the rest of the library.
    pub fn similar_tracks(&self, seed: &CatalogEntry, limit: usize) -> Vec<TrackEntry> {
        let (seed_genre, seed_artist, seed_id) = match seed {
            CatalogEntry::Track(track) => (
                track.genre.to_lowercase(),
                track.artist_name.to_lowercase(),
                track.id.clone(),
            ),
            CatalogEntry::Artist(artist) => {
                (String::new(), artist.name.to_lowercase(), String::new())
            }
            CatalogEntry::Album(album) => {
                (String::new(), album.artist_name.to_lowercase(), String::new())
            }
            _ => return Vec::new(),
        };

        let mut selected: Vec<TrackEntry> = Vec::new();
        let mut remainder: Vec<&TrackEntry> = Vec::new();
        for track in &self.tracks {
            if track.id == seed_id {
                continue;
            }
            let genre_match =
                !seed_genre.is_empty() && track.genre.to_lowercase() == seed_genre;
            let artist_match =
                !seed_artist.is_empty() && track.artist_name.to_lowercase() == seed_artist;
            if genre_match || artist_match {
                if selected.len() < limit {
                    selected.push(track.clone());
                }
            } else {
                remainder.push(track);
            }
        }

        if selected.len() < limit {
            let mut rng = rand::rng();
            for track in remainder.choose_multiple(&mut rng, limit - selected.len()) {
                selected.push((*track).clone());
            }
        }
        selected
    }
}

fn max_added(current: Option<i64>, candidate: Option<i64>) -> Option<i64> {
    match (current, candidate) {
        (Some(current), Some(candidate)) => Some(current.max(candidate)),
        (value, None) | (None, value) => value,
    }
}

/// Adapter serving the configured local library folders.
pub struct LocalLibrarySource {
    folders: Vec<PathBuf>,
    index: Mutex<Option<Arc<LibraryIndex>>>,
}

impl LocalLibrarySource {
    pub fn new(folders: Vec<PathBuf>) -> Self {
        Self {
            folders,
            index: Mutex::new(None),
        }
    }

    fn index(&self) -> Result<Arc<LibraryIndex>, String> {
        let mut guard = self
            .index
            .lock()
            .map_err(|_| "local library index lock poisoned".to_string())?;
        if let Some(index) = guard.as_ref() {
            return Ok(index.clone());
        }
        let index = Arc::new(self.scan());
        *guard = Some(index.clone());
        Ok(index)
    }

    fn scan(&self) -> LibraryIndex {
        let mut tracks = Vec::new();
        for folder in &self.folders {
            if !folder.is_dir() {
                warn!(
                    "Local library folder {} is missing or not a directory",
                    folder.display()
                );
                continue;
            }
            for path in collect_audio_files(folder) {
                tracks.push(read_track_entry(&path));
            }
        }
        info!(
            "Local library scan found {} track(s) across {} folder(s)",
            tracks.len(),
            self.folders.len()
        );
        LibraryIndex::from_tracks(tracks)
    }
}

impl MediaSourceAdapter for LocalLibrarySource {
    fn available_modes(&self) -> Vec<BrowseMode> {
        vec![
            BrowseMode::Artists,
            BrowseMode::Albums,
            BrowseMode::Tracks,
            BrowseMode::Search,
        ]
    }

    fn refresh(&self) {
        if let Ok(mut guard) = self.index.lock() {
            *guard = None;
        }
    }

    fn fetch_artists(&self) -> Result<Vec<CatalogEntry>, String> {
        Ok(self
            .index()?
            .artists()
            .iter()
            .cloned()
            .map(CatalogEntry::Artist)
            .collect())
    }

    fn fetch_albums(&self) -> Result<Vec<CatalogEntry>, String> {
        Ok(self
            .index()?
            .albums()
            .iter()
            .cloned()
            .map(CatalogEntry::Album)
            .collect())
    }

    fn fetch_tracks(&self) -> Result<Vec<CatalogEntry>, String> {
        Ok(self
            .index()?
            .tracks()
            .iter()
            .cloned()
            .map(CatalogEntry::Track)
            .collect())
    }

    fn fetch_albums_for_artist(&self, artist_id: &str) -> Result<Vec<CatalogEntry>, String> {
        Ok(self
            .index()?
            .albums_for_artist(artist_id)
            .into_iter()
            .map(CatalogEntry::Album)
            .collect())
    }

    fn fetch_tracks_for_album(&self, album_id: &str) -> Result<Vec<CatalogEntry>, String> {
        Ok(self
            .index()?
            .tracks_for_album(album_id)
            .into_iter()
            .map(CatalogEntry::Track)
            .collect())
    }

    fn fetch_tracks_for_artist(&self, artist_id: &str) -> Result<Vec<TrackEntry>, String> {
        Ok(self.index()?.tracks_for_artist(artist_id))
    }

    fn search(&self, query: &str) -> Result<SearchResults, String> {
        Ok(self.index()?.search(query))
    }

    fn similar_tracks(&self, seed: &CatalogEntry, limit: usize) -> Result<Vec<TrackEntry>, String> {
        Ok(self.index()?.similar_tracks(seed, limit))
    }
}
