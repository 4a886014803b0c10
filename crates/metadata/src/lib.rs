use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use lofty::error::LoftyError;
use lofty::prelude::{AudioFile, ItemKey, TaggedFileExt};

use common::{stable_album_id, stable_song_id, Song};

#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    Lofty(LoftyError),
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Lofty(err) => write!(f, "tag error: {}", err),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Lofty(err)
    }
}

/// Boundary to the tag-reading collaborator. `date_modified` is a cheap
/// stat used to decide whether `read_song` needs to run at all.
pub trait SongProvider {
    fn date_modified(&self, path: &str) -> Option<u64>;
    fn read_song(&self, path: &str) -> Result<Song, MetadataError>;
}

/// Lofty-backed provider. Paths handed in are expected to already be in
/// canonical form; they are stored on the Song verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct TagReader;

impl TagReader {
    pub fn new() -> Self {
        Self
    }
}

impl SongProvider for TagReader {
    fn date_modified(&self, path: &str) -> Option<u64> {
        file_mtime(Path::new(path))
    }

    fn read_song(&self, path: &str) -> Result<Song, MetadataError> {
        let fs_path = Path::new(path);
        let tagged_file = lofty::read_from_path(fs_path)?;
        let properties = tagged_file.properties();

        let duration_ms = properties.duration().as_millis().min(u128::from(u32::MAX)) as u32;
        let date_modified = file_mtime(fs_path).unwrap_or(0);

        let mut title = None;
        let mut album = None;
        let mut album_artist = None;
        let mut artist_names = Vec::new();
        let mut track_no = None;
        let mut disc_no = None;

        if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
            title = tag
                .get_string(&ItemKey::TrackTitle)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
            album = tag
                .get_string(&ItemKey::AlbumTitle)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
            album_artist = tag
                .get_string(&ItemKey::AlbumArtist)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
            if let Some(value) = tag.get_string(&ItemKey::TrackArtist) {
                artist_names = parse_artists(value);
            }
            track_no = tag.get_string(&ItemKey::TrackNumber).and_then(parse_u16);
            disc_no = tag.get_string(&ItemKey::DiscNumber).and_then(parse_u16);
        }

        let title = title.unwrap_or_else(|| file_stem(fs_path));
        let album_name = album
            .or_else(|| parent_dir_name(fs_path))
            .unwrap_or_else(|| "Unknown Album".to_string());
        let album_key_artist = album_artist
            .or_else(|| artist_names.first().cloned())
            .unwrap_or_default();

        Ok(Song {
            id: stable_song_id(path),
            path: path.to_string(),
            title,
            duration_ms,
            track_no,
            disc_no,
            date_modified,
            album_id: stable_album_id(&album_key_artist, &album_name),
            album_name,
            artist_names,
        })
    }
}

fn file_mtime(path: &Path) -> Option<u64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    modified
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|value| value.as_secs())
}

pub fn parse_artists(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for part in text.split(&[';', '\0'][..]) {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !out.iter().any(|existing: &String| existing == trimmed) {
            out.push(trimmed.to_string());
        }
    }
    out
}

fn parse_u16(text: &str) -> Option<u16> {
    let head = text.split('/').next().unwrap_or(text).trim();
    head.parse().ok()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown Track".to_string())
}

fn parent_dir_name(path: &Path) -> Option<String> {
    let name = path.parent()?.file_name()?;
    let name = name.to_string_lossy().trim().to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_artists, parse_u16};

    #[test]
    fn splits_artist_lists() {
        assert_eq!(parse_artists("A; B;C"), vec!["A", "B", "C"]);
        assert_eq!(parse_artists("Solo"), vec!["Solo"]);
    }

    #[test]
    fn keeps_slash_artists_whole() {
        assert_eq!(parse_artists("AC/DC"), vec!["AC/DC"]);
    }

    #[test]
    fn drops_empty_and_duplicate_artists() {
        assert_eq!(parse_artists("A;;A; "), vec!["A"]);
        assert!(parse_artists("  ").is_empty());
    }

    #[test]
    fn parses_track_of_total_forms() {
        assert_eq!(parse_u16("3/12"), Some(3));
        assert_eq!(parse_u16(" 7 "), Some(7));
        assert_eq!(parse_u16("x"), None);
    }
}
