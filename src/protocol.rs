//! Event-bus protocol shared by all runtime components.
//!
//! This module defines all message payloads exchanged between the browser
//! presenter, source fetch workers, the radio station manager, the playback
//! engine, and configuration handlers.

use std::path::PathBuf;

use crate::catalog::{
    BrowseMode, CatalogEntry, RadioStation, SearchResults, SortOrder, SourceKind, TrackEntry,
    TrackLocator,
};
use crate::config::{BrowseColumnConfig, Config};

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone)]
pub enum Message {
    Source(SourceMessage),
    Browse(BrowseMessage),
    Radio(RadioMessage),
    Playback(PlaybackMessage),
    Config(ConfigMessage),
}

/// Source-domain commands and notifications.
#[derive(Debug, Clone)]
pub enum SourceMessage {
    /// Switch the active media source. Clears every cache and expand set of
    /// the previous session and invalidates in-flight fetches.
    SelectSource(SourceKind),
    /// Drop and refetch the active source's caches.
    RefreshSource,
    SourceChanged(SourceKind),
}

/// Browse-domain commands and notifications.
#[derive(Debug, Clone)]
pub enum BrowseMessage {
    SetBrowseMode(BrowseMode),
    /// Expand or collapse the row with the given key. Expanding a parent
    /// whose children are not cached dispatches exactly one fetch.
    ToggleExpand {
        key: String,
    },
    /// Double-click/enter on a row: dispatch playback for it.
    ActivateRow {
        key: String,
    },
    SelectRow {
        index: usize,
    },
    SetSortOrder(SortOrder),
    SetSearchQuery(String),
    JumpToLetter(char),
    /// Build a similarity queue seeded by the given row.
    StartItemRadio {
        key: String,
    },
    RequestDisplayList,
    /// Flattened row projection for rendering and hit-testing.
    DisplayListChanged(DisplayList),
    /// Completion of an asynchronous fetch dispatched by the browser.
    FetchCompleted {
        source: SourceKind,
        key: FetchKey,
        ticket: FetchTicket,
        outcome: Result<FetchPayload, String>,
    },
    BrowseError {
        source: SourceKind,
        mode: BrowseMode,
        context: String,
        error: String,
    },
}

/// Radio-domain commands and notifications.
#[derive(Debug, Clone)]
pub enum RadioMessage {
    AddStation {
        name: String,
        stream_url: String,
        genre: String,
    },
    UpdateStation(RadioStation),
    RemoveStation {
        id: String,
    },
    /// Import stations from an M3U/PLS playlist file.
    ImportStations {
        path: PathBuf,
    },
    RequestStations,
    StationsResult(Vec<RadioStation>),
    /// The station list changed; consumers should re-request it.
    StationsUpdated,
    ImportCompleted {
        added: usize,
    },
    RadioError(String),
}

/// Playback-domain commands for the engine collaborator on the bus.
#[derive(Debug, Clone)]
pub enum PlaybackMessage {
    StartQueue {
        tracks: Vec<QueuedTrack>,
        start_index: usize,
    },
    Stop,
}

/// Configuration updates and persisted-preference notifications.
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum ConfigMessage {
    ConfigChanged(Config),
    /// Browser preferences snapshot folded into the config file by the
    /// session persistence listener.
    UiStateChanged(UiStateSnapshot),
}

/// Browser preferences worth persisting between sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct UiStateSnapshot {
    pub source: SourceKind,
    pub browse_mode: BrowseMode,
    pub sort_order: SortOrder,
    pub columns: Vec<BrowseColumnConfig>,
}

/// One entry queued for the playback engine.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedTrack {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub duration_secs: u32,
    pub locator: TrackLocator,
}

impl From<&TrackEntry> for QueuedTrack {
    fn from(track: &TrackEntry) -> Self {
        Self {
            id: track.id.clone(),
            title: track.title.clone(),
            artist: track.artist_name.clone(),
            duration_secs: track.duration_secs,
            locator: track.locator.clone(),
        }
    }
}

/// Identity of one asynchronous fetch dispatched by the browser.
///
/// Fetches are keyed so that at most one request per key is in flight; a
/// second expand of the same parent while its fetch runs never duplicates
/// the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FetchKey {
    TopLevel {
        mode: BrowseMode,
    },
    Children {
        mode: BrowseMode,
        parent_key: String,
    },
    Search,
    /// Full track list of one artist, fetched for queue dispatch.
    ArtistTracks {
        artist_id: String,
    },
    /// Similarity seed query for item radio.
    Similar {
        seed_key: String,
    },
}

/// Stale-completion guard attached to every fetch.
///
/// The epoch changes on source switch/refresh; the generation changes when a
/// fetch for the same key is superseded. Completions carrying an outdated
/// ticket are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub epoch: u64,
    pub generation: u64,
}

/// Payload of a completed fetch.
#[derive(Debug, Clone)]
pub enum FetchPayload {
    /// Top-level or child entries in natural order.
    Entries(Vec<CatalogEntry>),
    Search(SearchResults),
    /// Flat track list used for queue dispatch (artist queue, item radio).
    Tracks(Vec<TrackEntry>),
}

/// One flattened, indent-annotated row of the browse hierarchy.
///
/// Rebuilt on demand from caches and expand state; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayItem {
    /// Stable key used for expand-state lookups and activation.
    pub key: String,
    pub title: String,
    /// Secondary column text (artist, counts, duration).
    pub secondary: String,
    /// Nesting depth, 0..=3.
    pub indent: u8,
    pub has_children: bool,
    pub expanded: bool,
    /// Children fetch is in flight for this row.
    pub loading: bool,
    pub payload: DisplayPayload,
}

/// What a display row stands for.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayPayload {
    Entry(CatalogEntry),
    Section(SearchSection),
    /// Informational row shown in the list area (empty states, errors).
    Notice(String),
}

/// Search result grouping rendered as header rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSection {
    Artists,
    Albums,
    Tracks,
}

impl SearchSection {
    pub fn label(&self) -> &'static str {
        match self {
            SearchSection::Artists => "Artists",
            SearchSection::Albums => "Albums",
            SearchSection::Tracks => "Tracks",
        }
    }
}

/// Flattened projection of the active browse view.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayList {
    pub source: SourceKind,
    pub mode: BrowseMode,
    pub rows: Vec<DisplayItem>,
    /// Alphabet-index letters present in the row list, in row order.
    pub letters: Vec<char>,
    pub selected: Option<usize>,
    /// Row the view should scroll to after this rebuild, if any.
    pub scroll_to: Option<usize>,
}
