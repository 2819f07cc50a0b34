//! Catalog entity model shared by sources, browse state, and playback dispatch.
//!
//! Entries are plain data: every entity carries a stable string id from its
//! source plus the fields the browse window displays and sorts on.

use std::cmp::Ordering;
use std::path::PathBuf;

/// Media source selectable in the browser's source dropdown.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    serde::Deserialize,
    serde::Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Local,
    Plex,
    Subsonic,
    Radio,
}

/// Browse view selectable in the browser's mode dropdown.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Deserialize, serde::Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BrowseMode {
    #[default]
    Artists,
    Albums,
    Tracks,
    Movies,
    Shows,
    Playlists,
    Search,
    Radio,
}

/// Total order applied to top-level siblings of the active view.
/// Children always keep their natural order regardless of this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    TitleAsc,
    TitleDesc,
    DateAddedAsc,
    DateAddedDesc,
    YearAsc,
    YearDesc,
}

/// How the playback engine resolves a queued item to playable media.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackLocator {
    LocalFile(PathBuf),
    RemoteItem { source: SourceKind, item_id: String },
    Stream(String),
}

/// One artist as listed by a source.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtistEntry {
    pub id: String,
    pub name: String,
    pub album_count: u32,
    pub track_count: u32,
    pub added_at: Option<i64>,
}

/// One album as listed by a source.
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumEntry {
    pub id: String,
    pub title: String,
    pub artist_name: String,
    pub year: Option<u32>,
    pub track_count: u32,
    pub added_at: Option<i64>,
}

/// One track as listed by a source.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackEntry {
    pub id: String,
    pub title: String,
    pub artist_name: String,
    pub album_title: String,
    pub genre: String,
    pub duration_secs: u32,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub year: Option<u32>,
    pub added_at: Option<i64>,
    pub locator: TrackLocator,
}

/// One movie as listed by a video-capable source.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieEntry {
    pub id: String,
    pub title: String,
    pub year: Option<u32>,
    pub duration_secs: u32,
    pub added_at: Option<i64>,
    pub locator: TrackLocator,
}

/// One TV show as listed by a video-capable source.
#[derive(Debug, Clone, PartialEq)]
pub struct ShowEntry {
    pub id: String,
    pub title: String,
    pub year: Option<u32>,
    pub season_count: u32,
    pub episode_count: u32,
    pub added_at: Option<i64>,
}

/// One season under a show.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonEntry {
    pub id: String,
    pub show_id: String,
    pub title: String,
    pub season_number: Option<u32>,
    pub episode_count: u32,
}

/// One episode under a season.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeEntry {
    pub id: String,
    pub title: String,
    pub show_title: String,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
    pub duration_secs: u32,
    pub locator: TrackLocator,
}

/// One playlist as listed by a source.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistEntry {
    pub id: String,
    pub title: String,
    pub track_count: u32,
    pub duration_secs: u32,
    pub added_at: Option<i64>,
}

/// One internet-radio station from the station store.
#[derive(Debug, Clone, PartialEq)]
pub struct RadioStation {
    pub id: String,
    pub name: String,
    pub stream_url: String,
    pub genre: String,
}

/// Grouped results of one search query against a source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub artists: Vec<ArtistEntry>,
    pub albums: Vec<AlbumEntry>,
    pub tracks: Vec<TrackEntry>,
}

/// Any entity that can appear as a browse row.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogEntry {
    Artist(ArtistEntry),
    Album(AlbumEntry),
    Track(TrackEntry),
    Movie(MovieEntry),
    Show(ShowEntry),
    Season(SeasonEntry),
    Episode(EpisodeEntry),
    Playlist(PlaylistEntry),
    Station(RadioStation),
}

impl CatalogEntry {
    pub fn id(&self) -> &str {
        match self {
            CatalogEntry::Artist(entry) => &entry.id,
            CatalogEntry::Album(entry) => &entry.id,
            CatalogEntry::Track(entry) => &entry.id,
            CatalogEntry::Movie(entry) => &entry.id,
            CatalogEntry::Show(entry) => &entry.id,
            CatalogEntry::Season(entry) => &entry.id,
            CatalogEntry::Episode(entry) => &entry.id,
            CatalogEntry::Playlist(entry) => &entry.id,
            CatalogEntry::Station(entry) => &entry.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            CatalogEntry::Artist(entry) => &entry.name,
            CatalogEntry::Album(entry) => &entry.title,
            CatalogEntry::Track(entry) => &entry.title,
            CatalogEntry::Movie(entry) => &entry.title,
            CatalogEntry::Show(entry) => &entry.title,
            CatalogEntry::Season(entry) => &entry.title,
            CatalogEntry::Episode(entry) => &entry.title,
            CatalogEntry::Playlist(entry) => &entry.title,
            CatalogEntry::Station(entry) => &entry.name,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            CatalogEntry::Artist(_) => "artist",
            CatalogEntry::Album(_) => "album",
            CatalogEntry::Track(_) => "track",
            CatalogEntry::Movie(_) => "movie",
            CatalogEntry::Show(_) => "show",
            CatalogEntry::Season(_) => "season",
            CatalogEntry::Episode(_) => "episode",
            CatalogEntry::Playlist(_) => "playlist",
            CatalogEntry::Station(_) => "station",
        }
    }

    /// Stable row key used for expand-state and child-cache lookups.
    pub fn row_key(&self) -> String {
        format!("{}:{}", self.kind_label(), self.id())
    }

    /// Whether a row of this kind shows a disclosure control.
    pub fn has_children(&self) -> bool {
        matches!(
            self,
            CatalogEntry::Artist(_)
                | CatalogEntry::Album(_)
                | CatalogEntry::Show(_)
                | CatalogEntry::Season(_)
                | CatalogEntry::Playlist(_)
        )
    }

    /// Secondary column text shown next to the title.
    pub fn secondary_text(&self) -> String {
        match self {
            CatalogEntry::Artist(entry) => count_label(entry.album_count, "album"),
            CatalogEntry::Album(entry) => {
                if entry.artist_name.is_empty() {
                    count_label(entry.track_count, "track")
                } else {
                    entry.artist_name.clone()
                }
            }
            CatalogEntry::Track(entry) => format_duration(entry.duration_secs),
            CatalogEntry::Movie(entry) => format_duration(entry.duration_secs),
            CatalogEntry::Show(entry) => count_label(entry.season_count, "season"),
            CatalogEntry::Season(entry) => count_label(entry.episode_count, "episode"),
            CatalogEntry::Episode(entry) => format_duration(entry.duration_secs),
            CatalogEntry::Playlist(entry) => count_label(entry.track_count, "track"),
            CatalogEntry::Station(entry) => {
                if entry.genre.is_empty() {
                    entry.stream_url.clone()
                } else {
                    entry.genre.clone()
                }
            }
        }
    }

    pub fn sort_year(&self) -> Option<u32> {
        match self {
            CatalogEntry::Album(entry) => entry.year,
            CatalogEntry::Track(entry) => entry.year,
            CatalogEntry::Movie(entry) => entry.year,
            CatalogEntry::Show(entry) => entry.year,
            _ => None,
        }
    }

    pub fn added_at(&self) -> Option<i64> {
        match self {
            CatalogEntry::Artist(entry) => entry.added_at,
            CatalogEntry::Album(entry) => entry.added_at,
            CatalogEntry::Track(entry) => entry.added_at,
            CatalogEntry::Movie(entry) => entry.added_at,
            CatalogEntry::Show(entry) => entry.added_at,
            CatalogEntry::Playlist(entry) => entry.added_at,
            _ => None,
        }
    }

    /// Locator for rows that resolve to a single playable item.
    pub fn playable_locator(&self) -> Option<TrackLocator> {
        match self {
            CatalogEntry::Track(entry) => Some(entry.locator.clone()),
            CatalogEntry::Movie(entry) => Some(entry.locator.clone()),
            CatalogEntry::Episode(entry) => Some(entry.locator.clone()),
            CatalogEntry::Station(entry) => Some(TrackLocator::Stream(entry.stream_url.clone())),
            _ => None,
        }
    }
}

fn count_label(count: u32, singular: &str) -> String {
    if count == 1 {
        format!("1 {}", singular)
    } else {
        format!("{} {}s", count, singular)
    }
}

/// Formats seconds as `M:SS`, or `H:MM:SS` from one hour up.
pub fn format_duration(total_secs: u32) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Returns `title` without one leading English article, if stripping it
/// leaves a non-empty remainder.
pub fn strip_leading_article(title: &str) -> &str {
    let trimmed = title.trim_start();
    for article in ["the ", "a ", "an "] {
        let Some(prefix) = trimmed.get(..article.len()) else {
            continue;
        };
        if !prefix.eq_ignore_ascii_case(article) {
            continue;
        }
        let remainder = trimmed[article.len()..].trim_start();
        if !remainder.is_empty() {
            return remainder;
        }
    }
    trimmed
}

/// Case-folded, article-stripped key used for title ordering.
pub fn sort_title(title: &str) -> String {
    strip_leading_article(title).to_lowercase()
}

fn compare_optional<T: Ord>(left: Option<T>, right: Option<T>, descending: bool) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => {
            if descending {
                right.cmp(&left)
            } else {
                left.cmp(&right)
            }
        }
        // Entries without the sort field stay at the end in both directions.
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Comparator for top-level siblings under the given sort order.
pub fn compare_entries(left: &CatalogEntry, right: &CatalogEntry, order: SortOrder) -> Ordering {
    let by_title = || sort_title(left.title()).cmp(&sort_title(right.title()));
    match order {
        SortOrder::TitleAsc => by_title(),
        SortOrder::TitleDesc => by_title().reverse(),
        SortOrder::DateAddedAsc => {
            compare_optional(left.added_at(), right.added_at(), false).then_with(by_title)
        }
        SortOrder::DateAddedDesc => {
            compare_optional(left.added_at(), right.added_at(), true).then_with(by_title)
        }
        SortOrder::YearAsc => {
            compare_optional(left.sort_year(), right.sort_year(), false).then_with(by_title)
        }
        SortOrder::YearDesc => {
            compare_optional(left.sort_year(), right.sort_year(), true).then_with(by_title)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        compare_entries, format_duration, sort_title, strip_leading_article, AlbumEntry,
        CatalogEntry, RadioStation, SortOrder, TrackLocator,
    };
    use std::cmp::Ordering;

    fn album(title: &str, year: Option<u32>, added_at: Option<i64>) -> CatalogEntry {
        CatalogEntry::Album(AlbumEntry {
            id: format!("album-{}", title),
            title: title.to_string(),
            artist_name: "Artist".to_string(),
            year,
            track_count: 10,
            added_at,
        })
    }

    #[test]
    fn test_strip_leading_article_variants() {
        assert_eq!(strip_leading_article("The Beatles"), "Beatles");
        assert_eq!(strip_leading_article("the beatles"), "beatles");
        assert_eq!(strip_leading_article("A Night at the Opera"), "Night at the Opera");
        assert_eq!(strip_leading_article("An Awesome Wave"), "Awesome Wave");
        assert_eq!(strip_leading_article("Another One"), "Another One");
        assert_eq!(strip_leading_article("The "), "The ");
        assert_eq!(strip_leading_article("Яблоко"), "Яблоко");
    }

    #[test]
    fn test_sort_title_orders_articles_under_stripped_letter() {
        assert!(sort_title("ABBA") < sort_title("The Beatles"));
        assert!(sort_title("The Beatles") < sort_title("Zebra"));
    }

    #[test]
    fn test_compare_entries_by_title_ignores_case() {
        let left = album("abbey road", None, None);
        let right = album("Zebra", None, None);
        assert_eq!(compare_entries(&left, &right, SortOrder::TitleAsc), Ordering::Less);
        assert_eq!(compare_entries(&left, &right, SortOrder::TitleDesc), Ordering::Greater);
    }

    #[test]
    fn test_compare_entries_missing_year_sorts_last_in_both_directions() {
        let dated = album("Dated", Some(1999), None);
        let undated = album("Undated", None, None);
        assert_eq!(compare_entries(&dated, &undated, SortOrder::YearAsc), Ordering::Less);
        assert_eq!(compare_entries(&dated, &undated, SortOrder::YearDesc), Ordering::Less);
    }

    #[test]
    fn test_compare_entries_by_date_added() {
        let older = album("Older", None, Some(100));
        let newer = album("Newer", None, Some(200));
        assert_eq!(
            compare_entries(&older, &newer, SortOrder::DateAddedAsc),
            Ordering::Less
        );
        assert_eq!(
            compare_entries(&older, &newer, SortOrder::DateAddedDesc),
            Ordering::Greater
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(61), "1:01");
        assert_eq!(format_duration(3661), "1:01:01");
    }

    #[test]
    fn test_station_playable_locator_wraps_stream_url() {
        let station = CatalogEntry::Station(RadioStation {
            id: "st-1".to_string(),
            name: "Jazz24".to_string(),
            stream_url: "https://radio.example.com/jazz".to_string(),
            genre: "Jazz".to_string(),
        });
        assert_eq!(
            station.playable_locator(),
            Some(TrackLocator::Stream(
                "https://radio.example.com/jazz".to_string()
            ))
        );
        assert_eq!(station.row_key(), "station:st-1");
        assert!(!station.has_children());
    }
}
