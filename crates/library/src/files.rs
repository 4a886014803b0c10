use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use common::canonical_path_string;

const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "opus", "m4a", "aac", "wav", "aiff", "wma",
];

pub fn is_audio_file(path: &Path) -> bool {
    let ext = match path.extension() {
        Some(ext) => ext.to_string_lossy().to_ascii_lowercase(),
        None => return false,
    };
    AUDIO_EXTENSIONS.contains(&ext.as_str())
}

/// Walks every include root and returns the canonical paths of all audio
/// files, with blacklisted directories pruned during traversal. The result
/// is deduplicated and sorted, ready to hand to `Discography::rescan`.
pub fn collect_accepted_paths(roots: &[PathBuf], blacklist: &[PathBuf]) -> Vec<String> {
    let blacklist: Vec<PathBuf> = blacklist
        .iter()
        .map(|dir| fs::canonicalize(dir).unwrap_or_else(|_| dir.clone()))
        .collect();

    let mut accepted = BTreeSet::new();
    for root in roots {
        let root = match fs::canonicalize(root) {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!("skipping unreadable root {}: {}", root.display(), err);
                continue;
            }
        };
        let walker = WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir() && is_excluded(entry.path(), &blacklist))
            });
        for entry in walker.filter_map(Result::ok) {
            if entry.file_type().is_file() && is_audio_file(entry.path()) {
                accepted.insert(canonical_path_string(entry.path()));
            }
        }
    }
    accepted.into_iter().collect()
}

fn is_excluded(path: &Path, blacklist: &[PathBuf]) -> bool {
    blacklist.iter().any(|dir| path.starts_with(dir))
}

/// Immediate child directories of `dir`, sorted. Drives the
/// include/exclude folder chooser.
pub fn list_subdirectories(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// Candidate storage-device roots for the folder chooser: the home
/// directory plus mount points under the usual removable-media bases.
/// Only existing, readable directories are returned, deduplicated and in
/// no promised order beyond being sorted.
pub fn storage_roots() -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(home) = std::env::var("HOME") {
        if !home.trim().is_empty() {
            candidates.push(PathBuf::from(home));
        }
    }
    for base in ["/media", "/run/media"] {
        if let Ok(entries) = fs::read_dir(base) {
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                // both /media/<label> and /media/<user>/<label> layouts exist
                candidates.push(path.clone());
                if let Ok(mounts) = fs::read_dir(&path) {
                    for mount in mounts.flatten() {
                        let mount = mount.path();
                        if mount.is_dir() {
                            candidates.push(mount);
                        }
                    }
                }
            }
        }
    }
    candidates.push(PathBuf::from("/mnt"));

    let mut roots = BTreeSet::new();
    for candidate in candidates {
        if candidate.is_dir() && fs::read_dir(&candidate).is_ok() {
            roots.insert(fs::canonicalize(&candidate).unwrap_or(candidate));
        }
    }
    roots.into_iter().collect()
}
