//! Media source adapter abstractions and concrete implementations.

pub mod local_library;

use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::{BrowseMode, CatalogEntry, SearchResults, SourceKind, TrackEntry};

/// Interface implemented by concrete media source adapters.
///
/// Network internals (Plex, Subsonic/Navidrome) live behind this seam; the
/// browser only sees entry lists and stringly errors. Every method may block
/// and is called from a worker thread, never from the manager loop.
pub trait MediaSourceAdapter: Send + Sync {
    /// Browse modes this source can serve.
    fn available_modes(&self) -> Vec<BrowseMode>;

    /// Drop any internal caches; the next fetch sees current data.
    fn refresh(&self) {}

    fn fetch_artists(&self) -> Result<Vec<CatalogEntry>, String>;
    fn fetch_albums(&self) -> Result<Vec<CatalogEntry>, String>;
    fn fetch_tracks(&self) -> Result<Vec<CatalogEntry>, String>;

    fn fetch_albums_for_artist(&self, artist_id: &str) -> Result<Vec<CatalogEntry>, String>;
    fn fetch_tracks_for_album(&self, album_id: &str) -> Result<Vec<CatalogEntry>, String>;
    /// Full track list of one artist, in album/track natural order.
    fn fetch_tracks_for_artist(&self, artist_id: &str) -> Result<Vec<TrackEntry>, String>;

    fn fetch_movies(&self) -> Result<Vec<CatalogEntry>, String> {
        Ok(Vec::new())
    }
    fn fetch_shows(&self) -> Result<Vec<CatalogEntry>, String> {
        Ok(Vec::new())
    }
    fn fetch_seasons_for_show(&self, _show_id: &str) -> Result<Vec<CatalogEntry>, String> {
        Ok(Vec::new())
    }
    fn fetch_episodes_for_season(&self, _season_id: &str) -> Result<Vec<CatalogEntry>, String> {
        Ok(Vec::new())
    }

    fn fetch_playlists(&self) -> Result<Vec<CatalogEntry>, String> {
        Ok(Vec::new())
    }
    fn fetch_playlist_tracks(&self, _playlist_id: &str) -> Result<Vec<CatalogEntry>, String> {
        Ok(Vec::new())
    }

    fn search(&self, query: &str) -> Result<SearchResults, String>;

    /// Similarity-based queue seeding ("item radio").
    fn similar_tracks(&self, seed: &CatalogEntry, limit: usize) -> Result<Vec<TrackEntry>, String>;
}

/// Registry of the adapters wired into one session.
#[derive(Default)]
pub struct SourceSet {
    adapters: HashMap<SourceKind, Arc<dyn MediaSourceAdapter>>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: SourceKind, adapter: Arc<dyn MediaSourceAdapter>) {
        self.adapters.insert(kind, adapter);
    }

    pub fn get(&self, kind: SourceKind) -> Option<Arc<dyn MediaSourceAdapter>> {
        self.adapters.get(&kind).cloned()
    }

    /// Modes the given source serves. The radio source always serves the
    /// station list even without a registered adapter.
    pub fn available_modes(&self, kind: SourceKind) -> Vec<BrowseMode> {
        if kind == SourceKind::Radio {
            return vec![BrowseMode::Radio];
        }
        self.adapters
            .get(&kind)
            .map(|adapter| adapter.available_modes())
            .unwrap_or_default()
    }

    pub fn registered_kinds(&self) -> Vec<SourceKind> {
        let mut kinds: Vec<SourceKind> = self.adapters.keys().copied().collect();
        kinds.sort();
        kinds
    }
}
