//! Search result merging and deduplication.
//!
//! Fuzzy search can return the same entity twice under different synthetic
//! ids. Results are collapsed by normalized lowercase name, keeping the
//! duplicate with the highest secondary metric (album count for artists,
//! track count for albums, duration for tracks).

use std::collections::HashMap;

use crate::catalog::{AlbumEntry, ArtistEntry, SearchResults, TrackEntry};

/// Lowercased, whitespace-collapsed key used to detect duplicate names.
pub fn normalized_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn dedupe_by_key<T, K, M>(items: Vec<T>, key_of: K, metric_of: M) -> Vec<T>
where
    K: Fn(&T) -> String,
    M: Fn(&T) -> u64,
{
    let mut kept: Vec<T> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();
    for item in items {
        let key = key_of(&item);
        match index_by_key.get(&key) {
            Some(&existing) => {
                if metric_of(&item) > metric_of(&kept[existing]) {
                    kept[existing] = item;
                }
            }
            None => {
                index_by_key.insert(key, kept.len());
                kept.push(item);
            }
        }
    }
    kept
}

pub fn dedupe_artists(artists: Vec<ArtistEntry>) -> Vec<ArtistEntry> {
    dedupe_by_key(
        artists,
        |artist| normalized_name(&artist.name),
        |artist| u64::from(artist.album_count),
    )
}

pub fn dedupe_albums(albums: Vec<AlbumEntry>) -> Vec<AlbumEntry> {
    dedupe_by_key(
        albums,
        |album| {
            format!(
                "{}\u{1f}{}",
                normalized_name(&album.title),
                normalized_name(&album.artist_name)
            )
        },
        |album| u64::from(album.track_count),
    )
}

pub fn dedupe_tracks(tracks: Vec<TrackEntry>) -> Vec<TrackEntry> {
    dedupe_by_key(
        tracks,
        |track| {
            format!(
                "{}\u{1f}{}",
                normalized_name(&track.title),
                normalized_name(&track.artist_name)
            )
        },
        |track| u64::from(track.duration_secs),
    )
}

/// Deduplicates every section of a search response.
pub fn dedupe_results(results: SearchResults) -> SearchResults {
    SearchResults {
        artists: dedupe_artists(results.artists),
        albums: dedupe_albums(results.albums),
        tracks: dedupe_tracks(results.tracks),
    }
}

#[cfg(test)]
mod tests {
    use super::{dedupe_artists, dedupe_results, dedupe_tracks, normalized_name};
    use crate::catalog::{ArtistEntry, SearchResults, TrackEntry, TrackLocator};

    fn artist(id: &str, name: &str, album_count: u32) -> ArtistEntry {
        ArtistEntry {
            id: id.to_string(),
            name: name.to_string(),
            album_count,
            track_count: 0,
            added_at: None,
        }
    }

    fn track(id: &str, title: &str, artist: &str, duration_secs: u32) -> TrackEntry {
        TrackEntry {
            id: id.to_string(),
            title: title.to_string(),
            artist_name: artist.to_string(),
            album_title: String::new(),
            genre: String::new(),
            duration_secs,
            track_number: None,
            disc_number: None,
            year: None,
            added_at: None,
            locator: TrackLocator::RemoteItem {
                source: crate::catalog::SourceKind::Plex,
                item_id: id.to_string(),
            },
        }
    }

    #[test]
    fn test_normalized_name_folds_case_and_whitespace() {
        assert_eq!(normalized_name("The  Beatles "), "the beatles");
        assert_eq!(normalized_name("the beatles"), "the beatles");
    }

    #[test]
    fn test_dedupe_artists_keeps_highest_album_count() {
        let deduped = dedupe_artists(vec![
            artist("a1", "Radiohead", 3),
            artist("a2", "radiohead", 9),
            artist("a3", "Portishead", 2),
        ]);

        assert_eq!(deduped.len(), 2);
        let kept = deduped
            .iter()
            .find(|artist| normalized_name(&artist.name) == "radiohead")
            .unwrap();
        assert_eq!(kept.id, "a2");
        assert_eq!(kept.album_count, 9);
    }

    #[test]
    fn test_dedupe_keeps_first_on_metric_tie() {
        let deduped = dedupe_artists(vec![artist("a1", "Low", 4), artist("a2", "low", 4)]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].id, "a1");
    }

    #[test]
    fn test_kept_metric_never_below_any_discarded_duplicate() {
        let input = vec![
            artist("a1", "Can", 2),
            artist("a2", "can", 7),
            artist("a3", "CAN", 5),
        ];
        let max_metric = input.iter().map(|a| a.album_count).max().unwrap();
        let deduped = dedupe_artists(input);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].album_count, max_metric);
    }

    #[test]
    fn test_dedupe_tracks_distinguishes_same_title_by_artist() {
        let deduped = dedupe_tracks(vec![
            track("t1", "Hurt", "Nine Inch Nails", 365),
            track("t2", "Hurt", "Johnny Cash", 218),
            track("t3", "hurt", "johnny cash", 220),
        ]);
        assert_eq!(deduped.len(), 2);
        let cash = deduped
            .iter()
            .find(|track| normalized_name(&track.artist_name) == "johnny cash")
            .unwrap();
        assert_eq!(cash.duration_secs, 220);
    }

    #[test]
    fn test_dedupe_results_covers_all_sections() {
        let results = SearchResults {
            artists: vec![artist("a1", "Air", 1), artist("a2", "air", 2)],
            albums: Vec::new(),
            tracks: vec![track("t1", "Alone", "Air", 100)],
        };
        let deduped = dedupe_results(results);
        assert_eq!(deduped.artists.len(), 1);
        assert_eq!(deduped.tracks.len(), 1);
    }
}
