use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

pub type SongId = u64;
pub type AlbumId = u64;

/// One indexed track. Immutable once built; replaced wholesale on re-tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub path: String,
    pub title: String,
    pub duration_ms: u32,
    pub track_no: Option<u16>,
    pub disc_no: Option<u16>,
    pub date_modified: u64,
    pub album_id: AlbumId,
    pub album_name: String,
    #[serde(default)]
    pub artist_names: Vec<String>,
}

pub fn stable_song_id(path: &str) -> SongId {
    stable_id(path)
}

/// Album identity: one id per (album artist, album name) pair. Compilations
/// with a shared album artist collapse to one album; identically named
/// albums by different artists stay distinct.
pub fn stable_album_id(album_artist: &str, album_name: &str) -> AlbumId {
    let mut key = String::with_capacity(album_artist.len() + album_name.len() + 1);
    key.push_str(album_artist.trim());
    key.push('\x1f');
    key.push_str(album_name.trim());
    stable_id(&key)
}

fn stable_id(input: &str) -> u64 {
    let hash = blake3::hash(input.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Normalizes a filesystem path into the canonical string form used as the
/// cache key. Resolves symlinks when the file exists; otherwise falls back
/// to a lexically normalized absolute path.
pub fn canonical_path_string(path: &Path) -> String {
    match std::fs::canonicalize(path) {
        Ok(resolved) => path_to_slash_string(&resolved),
        Err(_) => path_to_slash_string(&lexical_absolute(path)),
    }
}

fn lexical_absolute(path: &Path) -> PathBuf {
    let base = if path.is_absolute() {
        PathBuf::new()
    } else {
        std::env::current_dir().unwrap_or_default()
    };
    let mut out = base;
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

fn path_to_slash_string(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter(|c| !matches!(c, Component::RootDir))
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if path.is_absolute() {
        format!("/{}", parts.join("/"))
    } else {
        parts.join("/")
    }
}
