//! Per-mode browse state and the display-list flattener.
//!
//! A child row appears in the flattened list iff its parent's key is in the
//! expand set AND the parent's children are cached. Collapsing a parent hides
//! every descendant but preserves the descendants' own expand state for when
//! the parent is re-expanded.

use std::collections::{HashMap, HashSet};

use crate::browser::search_results::normalized_name;
use crate::catalog::{compare_entries, BrowseMode, CatalogEntry, SearchResults, SortOrder, TrackEntry};
use crate::protocol::{DisplayItem, DisplayPayload, SearchSection};

/// Lifecycle of a lazily fetched collection.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchState<T> {
    Empty,
    Pending,
    Ready(T),
    Failed(String),
}

impl<T> FetchState<T> {
    pub fn is_empty(&self) -> bool {
        matches!(self, FetchState::Empty)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, FetchState::Pending)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, FetchState::Ready(_))
    }
}

/// Expand key for a top-level search result row.
///
/// Search result ids can collide or vary between queries, so top-level search
/// rows key by normalized name instead of id. Nested rows use real ids.
pub fn search_expand_key(entry: &CatalogEntry) -> String {
    format!("search:{}:{}", entry.kind_label(), normalized_name(entry.title()))
}

/// State of one browse mode within one source session.
#[derive(Debug, Clone)]
pub struct BrowseState {
    /// Top-level entries, lazily fetched (non-search modes).
    pub top: FetchState<Vec<CatalogEntry>>,
    /// Grouped results of the current query (search mode only).
    pub search: FetchState<SearchResults>,
    /// Expand-state set: keys of parents currently shown with children.
    pub expanded: HashSet<String>,
    /// Fetched children per expand key, in natural order.
    pub children: HashMap<String, Vec<CatalogEntry>>,
    /// Expand keys with a children fetch in flight.
    pub pending_children: HashSet<String>,
    pub sort_order: SortOrder,
    pub selected: Option<usize>,
    pub scroll_row: usize,
    pub query: String,
}

impl BrowseState {
    pub fn new(sort_order: SortOrder) -> Self {
        Self {
            top: FetchState::Empty,
            search: FetchState::Empty,
            expanded: HashSet::new(),
            children: HashMap::new(),
            pending_children: HashSet::new(),
            sort_order,
            selected: None,
            scroll_row: 0,
            query: String::new(),
        }
    }

    /// Full reset on source switch/refresh. The sort order survives.
    pub fn reset(&mut self) {
        let sort_order = self.sort_order;
        *self = Self::new(sort_order);
    }

    /// Top-level entries in the user-selected sort order.
    pub fn sorted_top(&self) -> Vec<CatalogEntry> {
        let FetchState::Ready(entries) = &self.top else {
            return Vec::new();
        };
        let mut sorted = entries.clone();
        sorted.sort_by(|left, right| compare_entries(left, right, self.sort_order));
        sorted
    }

    /// Flattens the current state into display rows for `mode`.
    pub fn rebuild(&self, mode: BrowseMode) -> Vec<DisplayItem> {
        if mode == BrowseMode::Search {
            return self.rebuild_search();
        }

        let mut rows = Vec::new();
        match &self.top {
            FetchState::Empty => {}
            FetchState::Pending => rows.push(notice_row("Loading...")),
            FetchState::Failed(error) => rows.push(notice_row(error)),
            FetchState::Ready(entries) => {
                if entries.is_empty() {
                    rows.push(notice_row("Nothing here yet"));
                } else {
                    for entry in self.sorted_top() {
                        self.emit_entry(&entry, 0, false, &mut rows);
                    }
                }
            }
        }
        rows
    }

    fn rebuild_search(&self) -> Vec<DisplayItem> {
        let mut rows = Vec::new();
        match &self.search {
            FetchState::Empty => {}
            FetchState::Pending => rows.push(notice_row("Searching...")),
            FetchState::Failed(error) => rows.push(notice_row(error)),
            FetchState::Ready(results) => {
                if results.artists.is_empty() && results.albums.is_empty() && results.tracks.is_empty()
                {
                    rows.push(notice_row("No results"));
                    return rows;
                }
                if !results.artists.is_empty() {
                    rows.push(section_row(SearchSection::Artists));
                    for artist in &results.artists {
                        self.emit_entry(&CatalogEntry::Artist(artist.clone()), 1, true, &mut rows);
                    }
                }
                if !results.albums.is_empty() {
                    rows.push(section_row(SearchSection::Albums));
                    for album in &results.albums {
                        self.emit_entry(&CatalogEntry::Album(album.clone()), 1, true, &mut rows);
                    }
                }
                if !results.tracks.is_empty() {
                    rows.push(section_row(SearchSection::Tracks));
                    for track in &results.tracks {
                        self.emit_entry(&CatalogEntry::Track(track.clone()), 1, true, &mut rows);
                    }
                }
            }
        }
        rows
    }

    fn emit_entry(
        &self,
        entry: &CatalogEntry,
        indent: u8,
        search_top: bool,
        rows: &mut Vec<DisplayItem>,
    ) {
        let key = if search_top {
            search_expand_key(entry)
        } else {
            entry.row_key()
        };
        let has_children = entry.has_children();
        let expanded = has_children && self.expanded.contains(&key);
        let loading = expanded && self.pending_children.contains(&key);
        rows.push(DisplayItem {
            key: key.clone(),
            title: entry.title().to_string(),
            secondary: entry.secondary_text(),
            indent,
            has_children,
            expanded,
            loading,
            payload: DisplayPayload::Entry(entry.clone()),
        });
        if !expanded {
            return;
        }
        let Some(children) = self.children.get(&key) else {
            return;
        };
        let child_indent = indent.saturating_add(1).min(3);
        for child in children {
            self.emit_entry(child, child_indent, false, rows);
        }
    }

    /// Looks up the entry behind a row key, searching top-level entries,
    /// search results, and every cached child list.
    pub fn entry_for_key(&self, key: &str) -> Option<CatalogEntry> {
        if let FetchState::Ready(entries) = &self.top {
            if let Some(entry) = entries.iter().find(|entry| entry.row_key() == key) {
                return Some(entry.clone());
            }
        }
        if let FetchState::Ready(results) = &self.search {
            let from_search = results
                .artists
                .iter()
                .map(|artist| CatalogEntry::Artist(artist.clone()))
                .chain(results.albums.iter().map(|album| CatalogEntry::Album(album.clone())))
                .chain(results.tracks.iter().map(|track| CatalogEntry::Track(track.clone())))
                .find(|entry| entry.row_key() == key || search_expand_key(entry) == key);
            if let Some(entry) = from_search {
                return Some(entry);
            }
        }
        for children in self.children.values() {
            if let Some(entry) = children.iter().find(|entry| entry.row_key() == key) {
                return Some(entry.clone());
            }
        }
        None
    }

    /// Sibling track group for queue dispatch: the natural-order track list
    /// the given track row belongs to, plus its index within it.
    ///
    /// Children caches keep natural order; the top level of the tracks mode
    /// queues in the displayed (user-sorted) order.
    pub fn track_group_for(&self, key: &str) -> Option<(Vec<TrackEntry>, usize)> {
        for children in self.children.values() {
            if let Some(group) = track_group_in(children, key) {
                return Some(group);
            }
        }
        if matches!(self.top, FetchState::Ready(_)) {
            if let Some(group) = track_group_in(&self.sorted_top(), key) {
                return Some(group);
            }
        }
        if let FetchState::Ready(results) = &self.search {
            let tracks: Vec<CatalogEntry> = results
                .tracks
                .iter()
                .map(|track| CatalogEntry::Track(track.clone()))
                .collect();
            if let Some(group) = track_group_in(&tracks, key) {
                return Some(group);
            }
        }
        None
    }

    /// Cached tracks under the given parent key, if any.
    pub fn cached_tracks_for(&self, parent_key: &str) -> Option<Vec<TrackEntry>> {
        self.children.get(parent_key).map(|children| {
            children
                .iter()
                .filter_map(|child| match child {
                    CatalogEntry::Track(track) => Some(track.clone()),
                    _ => None,
                })
                .collect()
        })
    }

    /// Cached playable children (tracks or episodes) under the given parent.
    pub fn cached_playable_children(&self, parent_key: &str) -> Option<Vec<CatalogEntry>> {
        self.children.get(parent_key).map(|children| {
            children
                .iter()
                .filter(|child| child.playable_locator().is_some())
                .cloned()
                .collect()
        })
    }
}

fn track_group_in(entries: &[CatalogEntry], key: &str) -> Option<(Vec<TrackEntry>, usize)> {
    let tracks: Vec<TrackEntry> = entries
        .iter()
        .filter_map(|entry| match entry {
            CatalogEntry::Track(track) => Some(track.clone()),
            _ => None,
        })
        .collect();
    let index = tracks
        .iter()
        .position(|track| format!("track:{}", track.id) == key)?;
    Some((tracks, index))
}

fn notice_row(text: &str) -> DisplayItem {
    DisplayItem {
        key: format!("notice:{}", text),
        title: text.to_string(),
        secondary: String::new(),
        indent: 0,
        has_children: false,
        expanded: false,
        loading: false,
        payload: DisplayPayload::Notice(text.to_string()),
    }
}

fn section_row(section: SearchSection) -> DisplayItem {
    DisplayItem {
        key: format!("section:{}", section.label().to_lowercase()),
        title: section.label().to_string(),
        secondary: String::new(),
        indent: 0,
        has_children: false,
        expanded: false,
        loading: false,
        payload: DisplayPayload::Section(section),
    }
}
