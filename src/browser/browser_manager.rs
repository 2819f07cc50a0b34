//! Browse runtime coordinator.
//!
//! This manager is the bus-owned presenter for the browse window: it owns one
//! session per source, flattens hierarchy state into display lists, dispatches
//! fetch workers, and converts row activation into playback queues.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use log::{debug, warn};
use tokio::sync::broadcast::{Receiver, Sender};

use crate::browser::alphabet_index;
use crate::browser::browse_state::{BrowseState, FetchState};
use crate::browser::fetch_coordinator::FetchCoordinator;
use crate::browser::search_results::dedupe_results;
use crate::catalog::{BrowseMode, CatalogEntry, RadioStation, SortOrder, SourceKind};
use crate::config::{BrowseColumnConfig, Config};
use crate::protocol::{
    BrowseMessage, ConfigMessage, DisplayList, FetchKey, FetchPayload, FetchTicket, Message,
    PlaybackMessage, QueuedTrack, RadioMessage, SourceMessage, UiStateSnapshot,
};
use crate::sources::SourceSet;

const ITEM_RADIO_QUEUE_LIMIT: usize = 50;

#[derive(Default)]
struct SourceSession {
    modes: HashMap<BrowseMode, BrowseState>,
}

/// Queue dispatch deferred until a container's children arrive.
/// Latest intent wins; a newer activation replaces an older one.
struct PendingPlay {
    source: SourceKind,
    mode: BrowseMode,
    parent_key: String,
}

/// Coordinates browse sessions, fetch workers, and display-list fan-out
/// over the event bus.
pub struct BrowserManager {
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    sources: Arc<SourceSet>,
    sessions: HashMap<SourceKind, SourceSession>,
    coordinator: FetchCoordinator,
    active_source: SourceKind,
    active_mode: BrowseMode,
    default_sort: SortOrder,
    columns: Vec<BrowseColumnConfig>,
    pending_play: Option<PendingPlay>,
}

impl BrowserManager {
    /// Creates a manager bound to bus channels, restoring view preferences
    /// from the given configuration.
    pub fn new(
        bus_consumer: Receiver<Message>,
        bus_producer: Sender<Message>,
        sources: Arc<SourceSet>,
        config: &Config,
    ) -> Self {
        Self {
            bus_consumer,
            bus_producer,
            sources,
            sessions: HashMap::new(),
            coordinator: FetchCoordinator::new(),
            active_source: config.ui.source,
            active_mode: config.ui.browse_mode,
            default_sort: config.ui.sort_order,
            columns: config.ui.columns.clone(),
            pending_play: None,
        }
    }

    fn state_mut(&mut self, source: SourceKind, mode: BrowseMode) -> &mut BrowseState {
        let default_sort = self.default_sort;
        self.sessions
            .entry(source)
            .or_default()
            .modes
            .entry(mode)
            .or_insert_with(|| BrowseState::new(default_sort))
    }

    fn active_state_mut(&mut self) -> &mut BrowseState {
        let (source, mode) = (self.active_source, self.active_mode);
        self.state_mut(source, mode)
    }

    fn publish_display_list(&mut self, scroll_to: Option<usize>) {
        let (source, mode) = (self.active_source, self.active_mode);
        let state = self.state_mut(source, mode);
        let rows = state.rebuild(mode);
        let letters = alphabet_index::present_letters(&rows);
        let selected = state.selected;
        let _ = self
            .bus_producer
            .send(Message::Browse(BrowseMessage::DisplayListChanged(DisplayList {
                source,
                mode,
                rows,
                letters,
                selected,
                scroll_to,
            })));
    }

    fn emit_ui_state(&self) {
        let _ = self
            .bus_producer
            .send(Message::Config(ConfigMessage::UiStateChanged(UiStateSnapshot {
                source: self.active_source,
                browse_mode: self.active_mode,
                sort_order: self.default_sort,
                columns: self.columns.clone(),
            })));
    }

    fn emit_browse_error(&self, source: SourceKind, mode: BrowseMode, context: &str, error: String) {
        warn!(
            "BrowserManager: {} failed for {:?}/{:?}: {}",
            context, source, mode, error
        );
        let _ = self
            .bus_producer
            .send(Message::Browse(BrowseMessage::BrowseError {
                source,
                mode,
                context: context.to_string(),
                error,
            }));
    }

    fn spawn_fetch<F>(&self, key: FetchKey, ticket: FetchTicket, cancel: Arc<AtomicBool>, job: F)
    where
        F: FnOnce() -> Result<FetchPayload, String> + Send + 'static,
    {
        let bus_producer = self.bus_producer.clone();
        let source = self.active_source;
        thread::spawn(move || {
            let outcome = job();
            if cancel.load(Ordering::Relaxed) {
                debug!("BrowserManager: dropping cancelled fetch {:?}", key);
                return;
            }
            let _ = bus_producer.send(Message::Browse(BrowseMessage::FetchCompleted {
                source,
                key,
                ticket,
                outcome,
            }));
        });
    }

    fn ensure_top_loaded(&mut self) {
        let (source, mode) = (self.active_source, self.active_mode);
        match mode {
            BrowseMode::Search => {}
            BrowseMode::Radio => {
                let state = self.state_mut(source, mode);
                if state.top.is_empty() {
                    state.top = FetchState::Pending;
                    let _ = self
                        .bus_producer
                        .send(Message::Radio(RadioMessage::RequestStations));
                }
            }
            _ => {
                if !self.state_mut(source, mode).top.is_empty() {
                    return;
                }
                let Some(adapter) = self.sources.get(source) else {
                    self.state_mut(source, mode).top =
                        FetchState::Failed(format!("no adapter for source {:?}", source));
                    return;
                };
                let key = FetchKey::TopLevel { mode };
                let Some((ticket, cancel)) = self.coordinator.begin(key.clone()) else {
                    return;
                };
                self.state_mut(source, mode).top = FetchState::Pending;
                self.spawn_fetch(key, ticket, cancel, move || {
                    let entries = match mode {
                        BrowseMode::Artists => adapter.fetch_artists()?,
                        BrowseMode::Albums => adapter.fetch_albums()?,
                        BrowseMode::Tracks => adapter.fetch_tracks()?,
                        BrowseMode::Movies => adapter.fetch_movies()?,
                        BrowseMode::Shows => adapter.fetch_shows()?,
                        BrowseMode::Playlists => adapter.fetch_playlists()?,
                        BrowseMode::Search | BrowseMode::Radio => Vec::new(),
                    };
                    Ok(FetchPayload::Entries(entries))
                });
            }
        }
    }

    fn handle_select_source(&mut self, source: SourceKind) {
        if source == self.active_source {
            return;
        }
        debug!("BrowserManager: switching source to {:?}", source);
        self.coordinator.invalidate_all();
        self.sessions.clear();
        self.pending_play = None;
        self.active_source = source;
        let available = self.sources.available_modes(source);
        if !available.is_empty() && !available.contains(&self.active_mode) {
            self.active_mode = available[0];
        }
        self.ensure_top_loaded();
        let _ = self
            .bus_producer
            .send(Message::Source(SourceMessage::SourceChanged(source)));
        self.emit_ui_state();
        self.publish_display_list(None);
    }

    fn handle_refresh_source(&mut self) {
        debug!("BrowserManager: refreshing source {:?}", self.active_source);
        self.coordinator.invalidate_all();
        self.pending_play = None;
        if let Some(adapter) = self.sources.get(self.active_source) {
            adapter.refresh();
        }
        if let Some(session) = self.sessions.get_mut(&self.active_source) {
            for state in session.modes.values_mut() {
                state.reset();
            }
        }
        self.ensure_top_loaded();
        self.publish_display_list(None);
    }

    fn handle_set_browse_mode(&mut self, mode: BrowseMode) {
        if mode == self.active_mode {
            return;
        }
        self.active_mode = mode;
        self.ensure_top_loaded();
        self.emit_ui_state();
        self.publish_display_list(None);
    }

    fn dispatch_children_fetch(&mut self, entry: &CatalogEntry, expand_key: &str) {
        let mode = self.active_mode;
        let key = FetchKey::Children {
            mode,
            parent_key: expand_key.to_string(),
        };
        let Some(adapter) = self.sources.get(self.active_source) else {
            return;
        };
        let Some((ticket, cancel)) = self.coordinator.begin(key.clone()) else {
            // A fetch for this parent is already running; the row just keeps
            // its loading marker.
            let expand_key = expand_key.to_string();
            self.active_state_mut().pending_children.insert(expand_key);
            return;
        };
        let expand_key_owned = expand_key.to_string();
        self.active_state_mut()
            .pending_children
            .insert(expand_key_owned);
        let entry = entry.clone();
        self.spawn_fetch(key, ticket, cancel, move || {
            let children = match &entry {
                CatalogEntry::Artist(artist) => adapter.fetch_albums_for_artist(&artist.id)?,
                CatalogEntry::Album(album) => adapter.fetch_tracks_for_album(&album.id)?,
                CatalogEntry::Show(show) => adapter.fetch_seasons_for_show(&show.id)?,
                CatalogEntry::Season(season) => adapter.fetch_episodes_for_season(&season.id)?,
                CatalogEntry::Playlist(playlist) => {
                    adapter.fetch_playlist_tracks(&playlist.id)?
                }
                _ => Vec::new(),
            };
            Ok(FetchPayload::Entries(children))
        });
    }

    fn handle_toggle_expand(&mut self, key: String) {
        let state = self.active_state_mut();
        if state.expanded.remove(&key) {
            self.publish_display_list(None);
            return;
        }
        let Some(entry) = state.entry_for_key(&key) else {
            debug!("BrowserManager: toggle for unknown row key {}", key);
            return;
        };
        if !entry.has_children() {
            return;
        }
        state.expanded.insert(key.clone());
        if !state.children.contains_key(&key) {
            self.dispatch_children_fetch(&entry, &key);
        }
        self.publish_display_list(None);
    }

    fn handle_set_sort_order(&mut self, order: SortOrder) {
        self.default_sort = order;
        self.active_state_mut().sort_order = order;
        self.emit_ui_state();
        self.publish_display_list(None);
    }

    fn handle_set_search_query(&mut self, query: String) {
        let source = self.active_source;
        let state = self.state_mut(source, BrowseMode::Search);
        state.query = query.clone();
        let trimmed = query.trim().to_string();
        if trimmed.is_empty() {
            state.search = FetchState::Empty;
            self.coordinator.cancel(&FetchKey::Search);
            if self.active_mode == BrowseMode::Search {
                self.publish_display_list(None);
            }
            return;
        }
        let Some(adapter) = self.sources.get(source) else {
            return;
        };
        let (ticket, cancel) = self.coordinator.supersede(FetchKey::Search);
        self.state_mut(source, BrowseMode::Search).search = FetchState::Pending;
        self.spawn_fetch(FetchKey::Search, ticket, cancel, move || {
            Ok(FetchPayload::Search(adapter.search(&trimmed)?))
        });
        if self.active_mode == BrowseMode::Search {
            self.publish_display_list(None);
        }
    }

    fn handle_jump_to_letter(&mut self, letter: char) {
        let mode = self.active_mode;
        let state = self.active_state_mut();
        let rows = state.rebuild(mode);
        let Some(index) = alphabet_index::jump_row(&rows, letter) else {
            return;
        };
        state.selected = Some(index);
        state.scroll_row = index;
        self.publish_display_list(Some(index));
    }

    fn handle_select_row(&mut self, index: usize) {
        self.active_state_mut().selected = Some(index);
        self.publish_display_list(None);
    }

    fn start_queue(&self, tracks: Vec<QueuedTrack>, start_index: usize) {
        if tracks.is_empty() {
            return;
        }
        let _ = self
            .bus_producer
            .send(Message::Playback(PlaybackMessage::StartQueue {
                tracks,
                start_index,
            }));
    }

    fn queue_container_children(&mut self, parent_key: &str) -> bool {
        let state = self.active_state_mut();
        let Some(children) = state.cached_playable_children(parent_key) else {
            return false;
        };
        let tracks: Vec<QueuedTrack> = children
            .iter()
            .filter_map(queued_from_entry)
            .collect();
        self.start_queue(tracks, 0);
        true
    }

    fn handle_activate_row(&mut self, key: String) {
        let state = self.active_state_mut();
        let Some(entry) = state.entry_for_key(&key) else {
            debug!("BrowserManager: activate for unknown row key {}", key);
            return;
        };
        match &entry {
            CatalogEntry::Track(_) => {
                if let Some((tracks, index)) = self.active_state_mut().track_group_for(&key) {
                    let queue: Vec<QueuedTrack> =
                        tracks.iter().map(QueuedTrack::from).collect();
                    self.start_queue(queue, index);
                }
            }
            CatalogEntry::Movie(_) | CatalogEntry::Episode(_) | CatalogEntry::Station(_) => {
                if let Some(track) = queued_from_entry(&entry) {
                    self.start_queue(vec![track], 0);
                }
            }
            CatalogEntry::Album(_) | CatalogEntry::Season(_) | CatalogEntry::Playlist(_) => {
                if self.queue_container_children(&key) {
                    return;
                }
                // Children not cached yet: expand, fetch, and play on arrival.
                let state = self.active_state_mut();
                state.expanded.insert(key.clone());
                self.pending_play = Some(PendingPlay {
                    source: self.active_source,
                    mode: self.active_mode,
                    parent_key: key.clone(),
                });
                self.dispatch_children_fetch(&entry, &key);
                self.publish_display_list(None);
            }
            CatalogEntry::Artist(artist) => {
                let artist_id = artist.id.clone();
                let fetch_key = FetchKey::ArtistTracks {
                    artist_id: artist_id.clone(),
                };
                let Some(adapter) = self.sources.get(self.active_source) else {
                    return;
                };
                let Some((ticket, cancel)) = self.coordinator.begin(fetch_key.clone()) else {
                    return;
                };
                self.spawn_fetch(fetch_key, ticket, cancel, move || {
                    Ok(FetchPayload::Tracks(
                        adapter.fetch_tracks_for_artist(&artist_id)?,
                    ))
                });
            }
            // Show rows only toggle; there is no flat episode dump.
            CatalogEntry::Show(_) => self.handle_toggle_expand(key),
        }
    }

    fn handle_start_item_radio(&mut self, key: String) {
        let Some(entry) = self.active_state_mut().entry_for_key(&key) else {
            debug!("BrowserManager: item radio for unknown row key {}", key);
            return;
        };
        let Some(adapter) = self.sources.get(self.active_source) else {
            return;
        };
        let fetch_key = FetchKey::Similar {
            seed_key: key.clone(),
        };
        let Some((ticket, cancel)) = self.coordinator.begin(fetch_key.clone()) else {
            return;
        };
        self.spawn_fetch(fetch_key, ticket, cancel, move || {
            Ok(FetchPayload::Tracks(
                adapter.similar_tracks(&entry, ITEM_RADIO_QUEUE_LIMIT)?,
            ))
        });
    }

    fn handle_fetch_completed(
        &mut self,
        source: SourceKind,
        key: FetchKey,
        ticket: FetchTicket,
        outcome: Result<FetchPayload, String>,
    ) {
        if !self.coordinator.complete(&key, ticket) {
            debug!("BrowserManager: dropping stale completion for {:?}", key);
            return;
        }
        let affects_active = source == self.active_source;
        match key {
            FetchKey::TopLevel { mode } => {
                match outcome {
                    Ok(FetchPayload::Entries(entries)) => {
                        self.state_mut(source, mode).top = FetchState::Ready(entries);
                    }
                    Ok(_) => {}
                    Err(error) => {
                        self.state_mut(source, mode).top = FetchState::Failed(error.clone());
                        self.emit_browse_error(source, mode, "load", error);
                    }
                }
                if affects_active && mode == self.active_mode {
                    self.publish_display_list(None);
                }
            }
            FetchKey::Children { mode, parent_key } => {
                let play_now = self.pending_play.as_ref().is_some_and(|pending| {
                    pending.source == source
                        && pending.mode == mode
                        && pending.parent_key == parent_key
                });
                let state = self.state_mut(source, mode);
                state.pending_children.remove(&parent_key);
                match outcome {
                    Ok(FetchPayload::Entries(entries)) => {
                        let queue: Vec<QueuedTrack> = if play_now {
                            entries.iter().filter_map(queued_from_entry).collect()
                        } else {
                            Vec::new()
                        };
                        // Late successes after a collapse still land in the
                        // cache; the rows stay hidden until re-expanded.
                        state.children.insert(parent_key.clone(), entries);
                        if play_now {
                            self.pending_play = None;
                            self.start_queue(queue, 0);
                        }
                    }
                    Ok(_) => {}
                    Err(error) => {
                        // Roll the expand state back so a retry is a plain
                        // re-expand instead of a stuck spinner.
                        state.expanded.remove(&parent_key);
                        if play_now {
                            self.pending_play = None;
                        }
                        self.emit_browse_error(source, mode, "expand", error);
                    }
                }
                if affects_active && mode == self.active_mode {
                    self.publish_display_list(None);
                }
            }
            FetchKey::Search => {
                let state = self.state_mut(source, BrowseMode::Search);
                match outcome {
                    Ok(FetchPayload::Search(results)) => {
                        state.search = FetchState::Ready(dedupe_results(results));
                    }
                    Ok(_) => {}
                    Err(error) => {
                        state.search = FetchState::Failed(error.clone());
                        self.emit_browse_error(source, BrowseMode::Search, "search", error);
                    }
                }
                if affects_active && self.active_mode == BrowseMode::Search {
                    self.publish_display_list(None);
                }
            }
            FetchKey::ArtistTracks { .. } => match outcome {
                Ok(FetchPayload::Tracks(tracks)) => {
                    let queue: Vec<QueuedTrack> = tracks.iter().map(QueuedTrack::from).collect();
                    self.start_queue(queue, 0);
                }
                Ok(_) => {}
                Err(error) => self.emit_browse_error(source, self.active_mode, "queue", error),
            },
            FetchKey::Similar { .. } => match outcome {
                Ok(FetchPayload::Tracks(tracks)) => {
                    if tracks.is_empty() {
                        self.emit_browse_error(
                            source,
                            self.active_mode,
                            "radio",
                            "no similar tracks found".to_string(),
                        );
                    } else {
                        let queue: Vec<QueuedTrack> =
                            tracks.iter().map(QueuedTrack::from).collect();
                        self.start_queue(queue, 0);
                    }
                }
                Ok(_) => {}
                Err(error) => self.emit_browse_error(source, self.active_mode, "radio", error),
            },
        }
    }

    fn handle_stations_result(&mut self, stations: Vec<RadioStation>) {
        let entries: Vec<CatalogEntry> = stations.into_iter().map(CatalogEntry::Station).collect();
        let state = self.state_mut(SourceKind::Radio, BrowseMode::Radio);
        state.top = FetchState::Ready(entries);
        if self.active_source == SourceKind::Radio && self.active_mode == BrowseMode::Radio {
            self.publish_display_list(None);
        }
    }

    fn handle_stations_updated(&mut self) {
        let state = self.state_mut(SourceKind::Radio, BrowseMode::Radio);
        if state.top.is_empty() {
            return;
        }
        state.top = FetchState::Pending;
        let _ = self
            .bus_producer
            .send(Message::Radio(RadioMessage::RequestStations));
    }

    fn handle_config_changed(&mut self, config: Config) {
        self.columns = config.ui.columns;
    }

    /// Starts the blocking event loop. Fetches the active view's top level
    /// and publishes an initial display list before consuming messages.
    pub fn run(&mut self) {
        self.ensure_top_loaded();
        self.emit_ui_state();
        self.publish_display_list(None);
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(Message::Source(SourceMessage::SelectSource(source))) => {
                    self.handle_select_source(source);
                }
                Ok(Message::Source(SourceMessage::RefreshSource)) => {
                    self.handle_refresh_source();
                }
                Ok(Message::Browse(BrowseMessage::SetBrowseMode(mode))) => {
                    self.handle_set_browse_mode(mode);
                }
                Ok(Message::Browse(BrowseMessage::ToggleExpand { key })) => {
                    self.handle_toggle_expand(key);
                }
                Ok(Message::Browse(BrowseMessage::ActivateRow { key })) => {
                    self.handle_activate_row(key);
                }
                Ok(Message::Browse(BrowseMessage::SelectRow { index })) => {
                    self.handle_select_row(index);
                }
                Ok(Message::Browse(BrowseMessage::SetSortOrder(order))) => {
                    self.handle_set_sort_order(order);
                }
                Ok(Message::Browse(BrowseMessage::SetSearchQuery(query))) => {
                    self.handle_set_search_query(query);
                }
                Ok(Message::Browse(BrowseMessage::JumpToLetter(letter))) => {
                    self.handle_jump_to_letter(letter);
                }
                Ok(Message::Browse(BrowseMessage::StartItemRadio { key })) => {
                    self.handle_start_item_radio(key);
                }
                Ok(Message::Browse(BrowseMessage::RequestDisplayList)) => {
                    self.publish_display_list(None);
                }
                Ok(Message::Browse(BrowseMessage::FetchCompleted {
                    source,
                    key,
                    ticket,
                    outcome,
                })) => {
                    self.handle_fetch_completed(source, key, ticket, outcome);
                }
                Ok(Message::Radio(RadioMessage::StationsResult(stations))) => {
                    self.handle_stations_result(stations);
                }
                Ok(Message::Radio(RadioMessage::StationsUpdated)) => {
                    self.handle_stations_updated();
                }
                Ok(Message::Config(ConfigMessage::ConfigChanged(config))) => {
                    self.handle_config_changed(config);
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        "BrowserManager lagged on control bus, skipped {} message(s)",
                        skipped
                    );
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

fn queued_from_entry(entry: &CatalogEntry) -> Option<QueuedTrack> {
    match entry {
        CatalogEntry::Track(track) => Some(QueuedTrack::from(track)),
        CatalogEntry::Movie(movie) => Some(QueuedTrack {
            id: movie.id.clone(),
            title: movie.title.clone(),
            artist: String::new(),
            duration_secs: movie.duration_secs,
            locator: movie.locator.clone(),
        }),
        CatalogEntry::Episode(episode) => Some(QueuedTrack {
            id: episode.id.clone(),
            title: episode.title.clone(),
            artist: episode.show_title.clone(),
            duration_secs: episode.duration_secs,
            locator: episode.locator.clone(),
        }),
        CatalogEntry::Station(station) => Some(QueuedTrack {
            id: station.id.clone(),
            title: station.name.clone(),
            artist: station.genre.clone(),
            duration_secs: 0,
            locator: entry.playable_locator()?,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::BrowserManager;
    use crate::catalog::{
        AlbumEntry, ArtistEntry, BrowseMode, CatalogEntry, SearchResults, SortOrder, SourceKind,
        TrackEntry, TrackLocator,
    };
    use crate::config::Config;
    use crate::protocol::{
        BrowseMessage, DisplayList, DisplayPayload, Message, PlaybackMessage, RadioMessage,
        SourceMessage,
    };
    use crate::sources::{MediaSourceAdapter, SourceSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};
    use tokio::sync::broadcast::{self, error::TryRecvError, Receiver, Sender};

    /// Fixed two-artist catalog with counted, optionally slow or failing
    /// child fetches.
    struct StubSource {
        child_fetch_count: Arc<AtomicUsize>,
        search_count: Arc<AtomicUsize>,
        fetch_delay: Duration,
        fail_children: bool,
    }

    impl StubSource {
        fn new() -> Self {
            Self {
                child_fetch_count: Arc::new(AtomicUsize::new(0)),
                search_count: Arc::new(AtomicUsize::new(0)),
                fetch_delay: Duration::from_millis(0),
                fail_children: false,
            }
        }

        fn artists() -> Vec<CatalogEntry> {
            vec![
                CatalogEntry::Artist(ArtistEntry {
                    id: "a1".to_string(),
                    name: "The Beatles".to_string(),
                    album_count: 1,
                    track_count: 2,
                    added_at: None,
                }),
                CatalogEntry::Artist(ArtistEntry {
                    id: "a2".to_string(),
                    name: "Zebra".to_string(),
                    album_count: 0,
                    track_count: 0,
                    added_at: None,
                }),
            ]
        }

        fn album() -> CatalogEntry {
            CatalogEntry::Album(AlbumEntry {
                id: "al1".to_string(),
                title: "Abbey Road".to_string(),
                artist_name: "The Beatles".to_string(),
                year: Some(1969),
                track_count: 2,
                added_at: None,
            })
        }

        fn tracks() -> Vec<TrackEntry> {
            vec![
                TrackEntry {
                    id: "t1".to_string(),
                    title: "Come Together".to_string(),
                    artist_name: "The Beatles".to_string(),
                    album_title: "Abbey Road".to_string(),
                    genre: "Rock".to_string(),
                    duration_secs: 259,
                    track_number: Some(1),
                    disc_number: Some(1),
                    year: Some(1969),
                    added_at: None,
                    locator: TrackLocator::RemoteItem {
                        source: SourceKind::Plex,
                        item_id: "t1".to_string(),
                    },
                },
                TrackEntry {
                    id: "t2".to_string(),
                    title: "Something".to_string(),
                    artist_name: "The Beatles".to_string(),
                    album_title: "Abbey Road".to_string(),
                    genre: "Rock".to_string(),
                    duration_secs: 182,
                    track_number: Some(2),
                    disc_number: Some(1),
                    year: Some(1969),
                    added_at: None,
                    locator: TrackLocator::RemoteItem {
                        source: SourceKind::Plex,
                        item_id: "t2".to_string(),
                    },
                },
            ]
        }
    }

    impl MediaSourceAdapter for StubSource {
        fn available_modes(&self) -> Vec<BrowseMode> {
            vec![BrowseMode::Artists, BrowseMode::Albums, BrowseMode::Tracks, BrowseMode::Search]
        }

        fn fetch_artists(&self) -> Result<Vec<CatalogEntry>, String> {
            Ok(Self::artists())
        }

        fn fetch_albums(&self) -> Result<Vec<CatalogEntry>, String> {
            Ok(vec![Self::album()])
        }

        fn fetch_tracks(&self) -> Result<Vec<CatalogEntry>, String> {
            Ok(Self::tracks().into_iter().map(CatalogEntry::Track).collect())
        }

        fn fetch_albums_for_artist(&self, artist_id: &str) -> Result<Vec<CatalogEntry>, String> {
            self.child_fetch_count.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.fetch_delay);
            if self.fail_children {
                return Err("stub: children unavailable".to_string());
            }
            if artist_id == "a1" {
                Ok(vec![Self::album()])
            } else {
                Ok(Vec::new())
            }
        }

        fn fetch_tracks_for_album(&self, _album_id: &str) -> Result<Vec<CatalogEntry>, String> {
            self.child_fetch_count.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.fetch_delay);
            if self.fail_children {
                return Err("stub: children unavailable".to_string());
            }
            Ok(Self::tracks().into_iter().map(CatalogEntry::Track).collect())
        }

        fn fetch_tracks_for_artist(&self, _artist_id: &str) -> Result<Vec<TrackEntry>, String> {
            Ok(Self::tracks())
        }

        fn search(&self, query: &str) -> Result<SearchResults, String> {
            self.search_count.fetch_add(1, Ordering::SeqCst);
            let mut results = SearchResults::default();
            if "the beatles".contains(&query.to_lowercase()) || query.to_lowercase() == "beat" {
                results.artists = vec![
                    ArtistEntry {
                        id: "a1".to_string(),
                        name: "The Beatles".to_string(),
                        album_count: 1,
                        track_count: 2,
                        added_at: None,
                    },
                    ArtistEntry {
                        id: "a1-dup".to_string(),
                        name: "the beatles".to_string(),
                        album_count: 13,
                        track_count: 200,
                        added_at: None,
                    },
                ];
            }
            Ok(results)
        }

        fn similar_tracks(
            &self,
            _seed: &CatalogEntry,
            _limit: usize,
        ) -> Result<Vec<TrackEntry>, String> {
            Ok(Self::tracks())
        }
    }

    struct BrowserHarness {
        bus_sender: Sender<Message>,
        receiver: Receiver<Message>,
        child_fetch_count: Arc<AtomicUsize>,
        search_count: Arc<AtomicUsize>,
    }

    impl BrowserHarness {
        fn new() -> Self {
            Self::with_stub(StubSource::new())
        }

        fn with_stub(stub: StubSource) -> Self {
            let child_fetch_count = stub.child_fetch_count.clone();
            let search_count = stub.search_count.clone();
            let (bus_sender, _) = broadcast::channel(1024);
            let mut sources = SourceSet::new();
            sources.register(SourceKind::Plex, Arc::new(stub));
            let sources = Arc::new(sources);

            let mut config = Config::default();
            config.ui.source = SourceKind::Plex;
            config.ui.browse_mode = BrowseMode::Artists;

            let manager_receiver = bus_sender.subscribe();
            let manager_sender = bus_sender.clone();
            let receiver = bus_sender.subscribe();
            thread::spawn(move || {
                let mut manager =
                    BrowserManager::new(manager_receiver, manager_sender, sources, &config);
                manager.run();
            });

            let mut harness = Self {
                bus_sender,
                receiver,
                child_fetch_count,
                search_count,
            };
            // Initial top-level load lands asynchronously.
            harness.wait_for_display_list(|list| {
                list.rows.iter().any(|row| row.key == "artist:a1")
            });
            harness
        }

        fn send(&self, message: Message) {
            self.bus_sender
                .send(message)
                .expect("failed to send message to bus");
        }

        fn wait_for_display_list<F>(&mut self, mut predicate: F) -> DisplayList
        where
            F: FnMut(&DisplayList) -> bool,
        {
            let message = wait_for_message(
                &mut self.receiver,
                Duration::from_secs(2),
                |message| match message {
                    Message::Browse(BrowseMessage::DisplayListChanged(list)) => predicate(list),
                    _ => false,
                },
            );
            match message {
                Message::Browse(BrowseMessage::DisplayListChanged(list)) => list,
                _ => unreachable!(),
            }
        }
    }

    fn wait_for_message<F>(
        receiver: &mut Receiver<Message>,
        timeout: Duration,
        mut predicate: F,
    ) -> Message
    where
        F: FnMut(&Message) -> bool,
    {
        let start = Instant::now();
        loop {
            if start.elapsed() > timeout {
                panic!("timed out waiting for expected message");
            }
            match receiver.try_recv() {
                Ok(message) => {
                    if predicate(&message) {
                        return message;
                    }
                }
                Err(TryRecvError::Empty) => thread::sleep(Duration::from_millis(5)),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Closed) => panic!("bus closed while waiting for message"),
            }
        }
    }

    #[test]
    fn test_initial_display_list_contains_sorted_artists() {
        let mut harness = BrowserHarness::new();
        let list = harness.wait_for_display_list(|list| !list.rows.is_empty());
        let titles: Vec<&str> = list.rows.iter().map(|row| row.title.as_str()).collect();
        assert_eq!(titles, vec!["The Beatles", "Zebra"]);
        assert_eq!(list.letters, vec!['B', 'Z']);
    }

    #[test]
    fn test_expand_fetches_children_once_and_flattens_them() {
        let mut harness = BrowserHarness::new();
        harness.send(Message::Browse(BrowseMessage::ToggleExpand {
            key: "artist:a1".to_string(),
        }));

        let list = harness.wait_for_display_list(|list| {
            list.rows.iter().any(|row| row.key == "album:al1")
        });
        let album_row = list.rows.iter().find(|row| row.key == "album:al1").unwrap();
        assert_eq!(album_row.indent, 1);
        assert_eq!(harness.child_fetch_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_double_toggle_during_fetch_does_not_duplicate_request() {
        let mut stub = StubSource::new();
        stub.fetch_delay = Duration::from_millis(60);
        let mut harness = BrowserHarness::with_stub(stub);

        // Expand, collapse, and re-expand before the fetch resolves.
        for _ in 0..3 {
            harness.send(Message::Browse(BrowseMessage::ToggleExpand {
                key: "artist:a1".to_string(),
            }));
            thread::sleep(Duration::from_millis(5));
        }

        harness.wait_for_display_list(|list| {
            list.rows.iter().any(|row| row.key == "album:al1")
        });
        assert_eq!(harness.child_fetch_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_expand_rolls_back_and_reports_error() {
        let mut stub = StubSource::new();
        stub.fail_children = true;
        let mut harness = BrowserHarness::with_stub(stub);

        harness.send(Message::Browse(BrowseMessage::ToggleExpand {
            key: "artist:a1".to_string(),
        }));

        wait_for_message(
            &mut harness.receiver,
            Duration::from_secs(2),
            |message| matches!(message, Message::Browse(BrowseMessage::BrowseError { context, .. }) if context == "expand"),
        );
        let list = harness.wait_for_display_list(|list| {
            list.rows
                .iter()
                .any(|row| row.key == "artist:a1" && !row.expanded && !row.loading)
        });
        assert!(!list.rows.iter().any(|row| row.key == "album:al1"));

        // A retry is a plain re-expand that dispatches a fresh fetch.
        harness.send(Message::Browse(BrowseMessage::ToggleExpand {
            key: "artist:a1".to_string(),
        }));
        wait_for_message(
            &mut harness.receiver,
            Duration::from_secs(2),
            |message| matches!(message, Message::Browse(BrowseMessage::BrowseError { context, .. }) if context == "expand"),
        );
        assert_eq!(harness.child_fetch_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_empty_search_query_clears_without_fetch() {
        let mut harness = BrowserHarness::new();
        harness.send(Message::Browse(BrowseMessage::SetBrowseMode(
            BrowseMode::Search,
        )));
        harness.wait_for_display_list(|list| list.mode == BrowseMode::Search);

        harness.send(Message::Browse(BrowseMessage::SetSearchQuery(
            "   ".to_string(),
        )));
        let list = harness.wait_for_display_list(|list| list.mode == BrowseMode::Search);
        assert!(list.rows.is_empty());
        assert_eq!(harness.search_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_search_results_are_deduplicated_by_normalized_name() {
        let mut harness = BrowserHarness::new();
        harness.send(Message::Browse(BrowseMessage::SetBrowseMode(
            BrowseMode::Search,
        )));
        harness.send(Message::Browse(BrowseMessage::SetSearchQuery(
            "beat".to_string(),
        )));

        let list = harness.wait_for_display_list(|list| {
            list.mode == BrowseMode::Search
                && list
                    .rows
                    .iter()
                    .any(|row| matches!(row.payload, DisplayPayload::Entry(_)))
        });
        let artist_rows: Vec<_> = list
            .rows
            .iter()
            .filter(|row| matches!(&row.payload, DisplayPayload::Entry(CatalogEntry::Artist(_))))
            .collect();
        assert_eq!(artist_rows.len(), 1);
        // The duplicate with the higher album count wins.
        let DisplayPayload::Entry(CatalogEntry::Artist(kept)) = &artist_rows[0].payload else {
            panic!("expected artist entry row");
        };
        assert_eq!(kept.album_count, 13);
    }

    #[test]
    fn test_activate_track_queues_siblings_from_activated_index() {
        let mut harness = BrowserHarness::new();
        harness.send(Message::Browse(BrowseMessage::SetBrowseMode(
            BrowseMode::Tracks,
        )));
        harness.wait_for_display_list(|list| list.mode == BrowseMode::Tracks);

        harness.send(Message::Browse(BrowseMessage::ActivateRow {
            key: "track:t2".to_string(),
        }));

        let message = wait_for_message(
            &mut harness.receiver,
            Duration::from_secs(2),
            |message| matches!(message, Message::Playback(PlaybackMessage::StartQueue { .. })),
        );
        let Message::Playback(PlaybackMessage::StartQueue { tracks, start_index }) = message else {
            unreachable!();
        };
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[start_index].id, "t2");
    }

    #[test]
    fn test_activate_album_with_uncached_children_plays_after_fetch() {
        let mut harness = BrowserHarness::new();
        harness.send(Message::Browse(BrowseMessage::SetBrowseMode(
            BrowseMode::Albums,
        )));
        harness.wait_for_display_list(|list| {
            list.mode == BrowseMode::Albums && list.rows.iter().any(|row| row.key == "album:al1")
        });

        harness.send(Message::Browse(BrowseMessage::ActivateRow {
            key: "album:al1".to_string(),
        }));

        let message = wait_for_message(
            &mut harness.receiver,
            Duration::from_secs(2),
            |message| matches!(message, Message::Playback(PlaybackMessage::StartQueue { .. })),
        );
        let Message::Playback(PlaybackMessage::StartQueue { tracks, start_index }) = message else {
            unreachable!();
        };
        assert_eq!(start_index, 0);
        assert_eq!(tracks[0].id, "t1");
        assert_eq!(tracks[1].id, "t2");
    }

    #[test]
    fn test_jump_to_letter_selects_and_scrolls() {
        let mut harness = BrowserHarness::new();
        harness.send(Message::Browse(BrowseMessage::JumpToLetter('z')));
        let list = harness.wait_for_display_list(|list| list.scroll_to.is_some());
        assert_eq!(list.scroll_to, Some(1));
        assert_eq!(list.selected, Some(1));
        assert_eq!(list.rows[1].title, "Zebra");
    }

    #[test]
    fn test_sort_order_change_reorders_top_level() {
        let mut harness = BrowserHarness::new();
        harness.send(Message::Browse(BrowseMessage::SetSortOrder(
            SortOrder::TitleDesc,
        )));
        let list = harness.wait_for_display_list(|list| {
            list.rows.first().is_some_and(|row| row.title == "Zebra")
        });
        assert_eq!(list.rows[1].title, "The Beatles");
    }

    #[test]
    fn test_source_switch_resets_state_and_requests_stations_for_radio() {
        let mut harness = BrowserHarness::new();
        harness.send(Message::Browse(BrowseMessage::ToggleExpand {
            key: "artist:a1".to_string(),
        }));
        harness.wait_for_display_list(|list| list.rows.iter().any(|row| row.key == "album:al1"));

        harness.send(Message::Source(SourceMessage::SelectSource(
            SourceKind::Radio,
        )));
        wait_for_message(&mut harness.receiver, Duration::from_secs(2), |message| {
            matches!(
                message,
                Message::Source(SourceMessage::SourceChanged(SourceKind::Radio))
            )
        });
        wait_for_message(&mut harness.receiver, Duration::from_secs(2), |message| {
            matches!(message, Message::Radio(RadioMessage::RequestStations))
        });

        // Switching back starts from a clean session: the artist list is
        // refetched and the expand state is gone.
        harness.send(Message::Source(SourceMessage::SelectSource(
            SourceKind::Plex,
        )));
        let list = harness.wait_for_display_list(|list| {
            list.mode == BrowseMode::Artists && list.rows.iter().any(|row| row.key == "artist:a1")
        });
        assert!(!list.rows.iter().any(|row| row.key == "album:al1"));
    }
}
