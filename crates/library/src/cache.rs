use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use common::{AlbumId, Song, SongId};

#[derive(Debug)]
pub enum CacheError {
    InvalidRecord(&'static str),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::InvalidRecord(reason) => write!(f, "invalid record: {}", reason),
        }
    }
}

impl std::error::Error for CacheError {}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheStats {
    pub songs: usize,
    pub albums: usize,
    pub artists: usize,
}

#[derive(Debug, Default)]
struct AlbumEntry {
    songs: HashSet<SongId>,
    by_artist: HashMap<String, HashSet<SongId>>,
    // live songs per display name; lets by-name retraction stay exact when
    // songs sharing an album id disagree on the album name
    name_counts: HashMap<String, usize>,
}

/// In-memory index over the current song set. Keyed by canonical path;
/// derived album and artist indices are kept in lockstep by `add_song` and
/// `remove_song`. Not synchronized itself; `Discography` owns the locking.
#[derive(Debug, Default)]
pub struct MemCache {
    songs_by_path: HashMap<String, Song>,
    albums_by_name: HashMap<String, HashSet<AlbumId>>,
    albums: HashMap<AlbumId, AlbumEntry>,
    songs_by_artist: HashMap<String, HashSet<SongId>>,
}

impl MemCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `song`, replacing any record previously stored at the same
    /// path. The prior record's entries are fully retracted before the new
    /// ones are written, so a re-tagged file never leaves stale album or
    /// artist memberships behind. Returns the replaced record, if any.
    pub fn add_song(&mut self, song: Song) -> Result<Option<Song>, CacheError> {
        if song.path.trim().is_empty() {
            return Err(CacheError::InvalidRecord("empty path"));
        }
        let replaced = self.remove_song(&song.path);

        self.albums_by_name
            .entry(song.album_name.clone())
            .or_default()
            .insert(song.album_id);

        // album membership is unconditional: a song with no artists still
        // surfaces through its album name and id
        let entry = self.albums.entry(song.album_id).or_default();
        entry.songs.insert(song.id);
        *entry.name_counts.entry(song.album_name.clone()).or_insert(0) += 1;
        for artist in &song.artist_names {
            entry
                .by_artist
                .entry(artist.clone())
                .or_default()
                .insert(song.id);
            self.songs_by_artist
                .entry(artist.clone())
                .or_default()
                .insert(song.id);
        }

        self.songs_by_path.insert(song.path.clone(), song);
        Ok(replaced)
    }

    /// Retracts the record at `path` from every index. No-op when the path
    /// is unknown. Empty album entries, name sets, and artist sets are
    /// deleted rather than left behind.
    pub fn remove_song(&mut self, path: &str) -> Option<Song> {
        let song = self.songs_by_path.remove(path)?;

        let mut drop_album = false;
        let mut drop_name = false;
        if let Some(entry) = self.albums.get_mut(&song.album_id) {
            entry.songs.remove(&song.id);
            for artist in &song.artist_names {
                retract(&mut entry.by_artist, artist, &song.id);
            }
            let name_emptied = match entry.name_counts.get_mut(&song.album_name) {
                Some(count) => {
                    *count -= 1;
                    *count == 0
                }
                None => false,
            };
            if name_emptied {
                entry.name_counts.remove(&song.album_name);
                drop_name = true;
            }
            drop_album = entry.songs.is_empty();
        }
        if drop_name {
            retract(&mut self.albums_by_name, &song.album_name, &song.album_id);
        }
        if drop_album {
            self.albums.remove(&song.album_id);
        }
        for artist in &song.artist_names {
            retract(&mut self.songs_by_artist, artist, &song.id);
        }

        Some(song)
    }

    /// `None` is the defined empty result; callers cannot distinguish
    /// "never scanned" from "known absent".
    pub fn get_song_by_path(&self, path: &str) -> Option<&Song> {
        self.songs_by_path.get(path)
    }

    pub fn album_ids_by_name(&self, name: &str) -> HashSet<AlbumId> {
        self.albums_by_name.get(name).cloned().unwrap_or_default()
    }

    pub fn songs_by_album(&self, album_id: AlbumId) -> HashSet<SongId> {
        self.albums
            .get(&album_id)
            .map(|entry| entry.songs.clone())
            .unwrap_or_default()
    }

    /// Secondary, non-exclusive grouping of an album's songs by
    /// contributing artist. Songs without artists appear in
    /// `songs_by_album` but in no artist bucket.
    pub fn album_songs_by_artist(&self, album_id: AlbumId) -> HashMap<String, HashSet<SongId>> {
        self.albums
            .get(&album_id)
            .map(|entry| entry.by_artist.clone())
            .unwrap_or_default()
    }

    pub fn songs_by_artist(&self, artist: &str) -> HashSet<SongId> {
        self.songs_by_artist.get(artist).cloned().unwrap_or_default()
    }

    pub fn songs(&self) -> impl Iterator<Item = &Song> {
        self.songs_by_path.values()
    }

    pub fn len(&self) -> usize {
        self.songs_by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs_by_path.is_empty()
    }

    pub fn clear(&mut self) {
        self.songs_by_path.clear();
        self.albums_by_name.clear();
        self.albums.clear();
        self.songs_by_artist.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            songs: self.songs_by_path.len(),
            albums: self.albums.len(),
            artists: self.songs_by_artist.len(),
        }
    }

    /// Full cross-index consistency verification. A failure here is a
    /// defect in the mutation procedure, not bad input; the walk is linear
    /// in the cache size and meant for tests and diagnostics.
    pub fn self_check(&self) -> Result<(), String> {
        let songs_by_id: HashMap<SongId, &Song> =
            self.songs_by_path.values().map(|song| (song.id, song)).collect();

        for (name, album_ids) in &self.albums_by_name {
            if album_ids.is_empty() {
                return Err(format!("empty id set kept for album name {:?}", name));
            }
            for album_id in album_ids {
                let entry = self
                    .albums
                    .get(album_id)
                    .ok_or_else(|| format!("album {} named {:?} has no song entry", album_id, name))?;
                if entry.songs.is_empty() {
                    return Err(format!("album {} is empty but still indexed", album_id));
                }
                if !entry.name_counts.contains_key(name) {
                    return Err(format!(
                        "album {} indexed under {:?} without a live song of that name",
                        album_id, name
                    ));
                }
            }
        }

        for (album_id, entry) in &self.albums {
            if entry.songs.is_empty() {
                return Err(format!("album {} kept with no songs", album_id));
            }
            let name_total: usize = entry.name_counts.values().sum();
            if name_total != entry.songs.len() {
                return Err(format!(
                    "album {} name counts ({}) disagree with song count ({})",
                    album_id,
                    name_total,
                    entry.songs.len()
                ));
            }
            for (name, count) in &entry.name_counts {
                if *count == 0 {
                    return Err(format!("album {} holds a zero count for {:?}", album_id, name));
                }
                if !self
                    .albums_by_name
                    .get(name)
                    .map(|ids| ids.contains(album_id))
                    .unwrap_or(false)
                {
                    return Err(format!("album {} missing from name index {:?}", album_id, name));
                }
            }
            for song_id in &entry.songs {
                let song = songs_by_id
                    .get(song_id)
                    .ok_or_else(|| format!("album {} lists unknown song {}", album_id, song_id))?;
                if song.album_id != *album_id {
                    return Err(format!(
                        "song {} filed under album {} but records album {}",
                        song_id, album_id, song.album_id
                    ));
                }
            }
            for (artist, song_ids) in &entry.by_artist {
                if song_ids.is_empty() {
                    return Err(format!("album {} keeps empty artist bucket {:?}", album_id, artist));
                }
                if !song_ids.is_subset(&entry.songs) {
                    return Err(format!(
                        "album {} artist bucket {:?} references foreign songs",
                        album_id, artist
                    ));
                }
            }
        }

        for (artist, song_ids) in &self.songs_by_artist {
            if song_ids.is_empty() {
                return Err(format!("empty song set kept for artist {:?}", artist));
            }
            for song_id in song_ids {
                let song = songs_by_id
                    .get(song_id)
                    .ok_or_else(|| format!("artist {:?} lists unknown song {}", artist, song_id))?;
                if !song.artist_names.iter().any(|name| name == artist) {
                    return Err(format!(
                        "song {} indexed under artist {:?} it does not credit",
                        song_id, artist
                    ));
                }
            }
        }

        for song in self.songs_by_path.values() {
            if !self
                .albums
                .get(&song.album_id)
                .map(|entry| entry.songs.contains(&song.id))
                .unwrap_or(false)
            {
                return Err(format!("song {} missing from album {}", song.id, song.album_id));
            }
            if !self
                .albums_by_name
                .get(&song.album_name)
                .map(|ids| ids.contains(&song.album_id))
                .unwrap_or(false)
            {
                return Err(format!(
                    "album {} missing under name {:?}",
                    song.album_id, song.album_name
                ));
            }
            for artist in &song.artist_names {
                if !self
                    .songs_by_artist
                    .get(artist)
                    .map(|ids| ids.contains(&song.id))
                    .unwrap_or(false)
                {
                    return Err(format!("song {} missing from artist index {:?}", song.id, artist));
                }
            }
        }

        Ok(())
    }
}

fn retract<K, V>(map: &mut HashMap<K, HashSet<V>>, key: &K, value: &V)
where
    K: Eq + Hash,
    V: Eq + Hash,
{
    let emptied = match map.get_mut(key) {
        Some(set) => {
            set.remove(value);
            set.is_empty()
        }
        None => false,
    };
    if emptied {
        map.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::{CacheError, MemCache};
    use common::Song;
    use std::collections::HashSet;

    fn song(id: u64, path: &str, album_id: u64, album_name: &str, artists: &[&str]) -> Song {
        Song {
            id,
            path: path.to_string(),
            title: format!("Track {}", id),
            duration_ms: 180_000,
            track_no: None,
            disc_no: None,
            date_modified: 1_000,
            album_id,
            album_name: album_name.to_string(),
            artist_names: artists.iter().map(|name| name.to_string()).collect(),
        }
    }

    fn ids(values: &[u64]) -> HashSet<u64> {
        values.iter().copied().collect()
    }

    fn populated() -> MemCache {
        let mut cache = MemCache::new();
        cache
            .add_song(song(101, "/m/a.mp3", 1, "Nice Songs 1", &[]))
            .unwrap();
        cache
            .add_song(song(102, "/m/b.mp3", 2, "Nice Songs 2", &["A"]))
            .unwrap();
        cache
            .add_song(song(103, "/m/c.mp3", 3, "Nice Songs 3", &["B", "C"]))
            .unwrap();
        cache
    }

    #[test]
    fn song_with_no_artist_still_reaches_its_album() {
        let mut cache = MemCache::new();
        cache
            .add_song(song(101, "/m/a.mp3", 1, "Nice Songs 1", &[]))
            .unwrap();

        assert_eq!(cache.album_ids_by_name("Nice Songs 1"), ids(&[1]));
        assert_eq!(cache.songs_by_album(1), ids(&[101]));
        assert!(cache.album_songs_by_artist(1).is_empty());
        cache.self_check().unwrap();
    }

    #[test]
    fn indexes_three_albums_exactly() {
        let cache = populated();

        assert_eq!(cache.album_ids_by_name("Nice Songs 1"), ids(&[1]));
        assert_eq!(cache.album_ids_by_name("Nice Songs 2"), ids(&[2]));
        assert_eq!(cache.album_ids_by_name("Nice Songs 3"), ids(&[3]));
        assert!(cache.album_ids_by_name("D").is_empty());

        assert!(!cache.songs_by_album(1).is_empty());
        assert!(!cache.songs_by_album(2).is_empty());
        assert!(!cache.songs_by_album(3).is_empty());

        let stats = cache.stats();
        assert_eq!(stats.songs, 3);
        assert_eq!(stats.albums, 3);
        assert_eq!(stats.artists, 3);
        cache.self_check().unwrap();
    }

    #[test]
    fn removal_cascades_without_touching_other_albums() {
        let mut cache = populated();

        assert!(cache.remove_song("/m/a.mp3").is_some());

        assert!(cache.album_ids_by_name("Nice Songs 1").is_empty());
        assert!(cache.songs_by_album(1).is_empty());
        assert_eq!(cache.album_ids_by_name("Nice Songs 2"), ids(&[2]));
        assert_eq!(cache.album_ids_by_name("Nice Songs 3"), ids(&[3]));
        assert_eq!(cache.songs_by_artist("B"), ids(&[103]));
        cache.self_check().unwrap();
    }

    #[test]
    fn removal_is_idempotent() {
        let mut cache = populated();

        assert!(cache.remove_song("/m/b.mp3").is_some());
        let stats_after_first = cache.stats();
        assert!(cache.remove_song("/m/b.mp3").is_none());

        let stats_after_second = cache.stats();
        assert_eq!(stats_after_first.songs, stats_after_second.songs);
        assert_eq!(stats_after_first.albums, stats_after_second.albums);
        assert_eq!(stats_after_first.artists, stats_after_second.artists);
        assert!(cache.songs_by_artist("A").is_empty());
        cache.self_check().unwrap();
    }

    #[test]
    fn re_adding_a_path_retracts_every_stale_entry() {
        let mut cache = populated();

        // same file, re-tagged onto a different album with different artists
        let replaced = cache
            .add_song(song(150, "/m/c.mp3", 9, "Renamed", &["D"]))
            .unwrap();
        assert_eq!(replaced.unwrap().id, 103);

        assert!(cache.album_ids_by_name("Nice Songs 3").is_empty());
        assert!(cache.songs_by_album(3).is_empty());
        assert!(cache.songs_by_artist("B").is_empty());
        assert!(cache.songs_by_artist("C").is_empty());
        assert_eq!(cache.album_ids_by_name("Renamed"), ids(&[9]));
        assert_eq!(cache.songs_by_album(9), ids(&[150]));
        assert_eq!(cache.songs_by_artist("D"), ids(&[150]));
        cache.self_check().unwrap();
    }

    #[test]
    fn clear_then_round_trip_matches_exactly() {
        let mut cache = populated();
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.album_ids_by_name("Nice Songs 1").is_empty());

        cache
            .add_song(song(101, "/m/a.mp3", 1, "Nice Songs 1", &[]))
            .unwrap();
        cache
            .add_song(song(102, "/m/b.mp3", 2, "Nice Songs 2", &["A"]))
            .unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.album_ids_by_name("Nice Songs 1"), ids(&[1]));
        assert_eq!(cache.album_ids_by_name("Nice Songs 2"), ids(&[2]));
        assert!(cache.album_ids_by_name("Nice Songs 3").is_empty());
        assert!(cache.songs_by_album(3).is_empty());
        cache.self_check().unwrap();
    }

    #[test]
    fn rejects_records_without_a_path() {
        let mut cache = MemCache::new();
        let err = cache.add_song(song(1, "  ", 1, "X", &[])).unwrap_err();
        assert!(matches!(err, CacheError::InvalidRecord(_)));
        assert!(cache.is_empty());
        assert!(cache.album_ids_by_name("X").is_empty());
    }

    #[test]
    fn albums_sharing_a_display_name_stay_distinct() {
        let mut cache = MemCache::new();
        cache
            .add_song(song(1, "/m/x.mp3", 10, "Greatest Hits", &["A"]))
            .unwrap();
        cache
            .add_song(song(2, "/m/y.mp3", 20, "Greatest Hits", &["B"]))
            .unwrap();

        assert_eq!(cache.album_ids_by_name("Greatest Hits"), ids(&[10, 20]));

        cache.remove_song("/m/x.mp3");
        assert_eq!(cache.album_ids_by_name("Greatest Hits"), ids(&[20]));
        cache.self_check().unwrap();
    }

    #[test]
    fn album_with_conflicting_names_keeps_both_until_last_song() {
        let mut cache = MemCache::new();
        cache
            .add_song(song(1, "/m/x.mp3", 10, "Album", &[]))
            .unwrap();
        cache
            .add_song(song(2, "/m/y.mp3", 10, "A1bum", &[]))
            .unwrap();

        assert_eq!(cache.album_ids_by_name("Album"), ids(&[10]));
        assert_eq!(cache.album_ids_by_name("A1bum"), ids(&[10]));
        assert_eq!(cache.songs_by_album(10), ids(&[1, 2]));

        cache.remove_song("/m/y.mp3");
        assert_eq!(cache.album_ids_by_name("Album"), ids(&[10]));
        assert!(cache.album_ids_by_name("A1bum").is_empty());
        cache.self_check().unwrap();
    }

    #[test]
    fn groups_album_songs_by_contributing_artist() {
        let mut cache = MemCache::new();
        cache
            .add_song(song(1, "/m/x.mp3", 10, "Split", &["A", "B"]))
            .unwrap();
        cache
            .add_song(song(2, "/m/y.mp3", 10, "Split", &["B"]))
            .unwrap();
        cache
            .add_song(song(3, "/m/z.mp3", 10, "Split", &[]))
            .unwrap();

        let grouped = cache.album_songs_by_artist(10);
        assert_eq!(grouped.get("A"), Some(&ids(&[1])));
        assert_eq!(grouped.get("B"), Some(&ids(&[1, 2])));
        assert_eq!(grouped.len(), 2);
        assert_eq!(cache.songs_by_album(10), ids(&[1, 2, 3]));
        cache.self_check().unwrap();
    }
}
