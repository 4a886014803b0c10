use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use common::{AlbumId, Song, SongId};
use metadata::SongProvider;

use crate::cache::{CacheError, CacheStats, MemCache};

#[derive(Debug)]
pub enum DiscogError {
    Closed,
    Record(CacheError),
}

impl std::fmt::Display for DiscogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscogError::Closed => write!(f, "discography is shut down"),
            DiscogError::Record(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for DiscogError {}

impl From<CacheError> for DiscogError {
    fn from(err: CacheError) -> Self {
        DiscogError::Record(err)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ScanFailure {
    pub path: String,
    pub error: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RescanSummary {
    pub added: usize,
    pub replaced: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub failed: Vec<ScanFailure>,
    pub cancelled: bool,
}

/// Shared handle to one long-lived music cache. Reads go through an RwLock
/// read guard and never block each other; mutation sequences (single ops
/// and whole rescans) are serialized by a writer gate so two generations
/// can never interleave. Each add/remove runs inside one write-lock
/// section, so readers see either all of an operation's index updates or
/// none of them.
#[derive(Clone)]
pub struct Discography {
    inner: Arc<Inner>,
}

struct Inner {
    cache: RwLock<MemCache>,
    writer: Mutex<()>,
    cancel: AtomicBool,
    closed: AtomicBool,
}

impl Default for Discography {
    fn default() -> Self {
        Self::new()
    }
}

impl Discography {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cache: RwLock::new(MemCache::new()),
                writer: Mutex::new(()),
                cancel: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn add_song(&self, song: Song) -> Result<Option<Song>, DiscogError> {
        self.ensure_open()?;
        let _gate = self.inner.writer.lock();
        Ok(self.inner.cache.write().add_song(song)?)
    }

    pub fn remove_song(&self, path: &str) -> Result<Option<Song>, DiscogError> {
        self.ensure_open()?;
        let _gate = self.inner.writer.lock();
        Ok(self.inner.cache.write().remove_song(path))
    }

    pub fn clear(&self) -> Result<(), DiscogError> {
        self.ensure_open()?;
        let _gate = self.inner.writer.lock();
        self.inner.cache.write().clear();
        Ok(())
    }

    pub fn get_song_by_path(&self, path: &str) -> Option<Song> {
        self.inner.cache.read().get_song_by_path(path).cloned()
    }

    pub fn album_ids_by_name(&self, name: &str) -> HashSet<AlbumId> {
        self.inner.cache.read().album_ids_by_name(name)
    }

    pub fn songs_by_album(&self, album_id: AlbumId) -> HashSet<SongId> {
        self.inner.cache.read().songs_by_album(album_id)
    }

    pub fn album_songs_by_artist(&self, album_id: AlbumId) -> HashMap<String, HashSet<SongId>> {
        self.inner.cache.read().album_songs_by_artist(album_id)
    }

    pub fn songs_by_artist(&self, artist: &str) -> HashSet<SongId> {
        self.inner.cache.read().songs_by_artist(artist)
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.cache.read().stats()
    }

    pub fn self_check(&self) -> Result<(), String> {
        self.inner.cache.read().self_check()
    }

    /// Brings the cache in line with `accepted_paths`: songs whose path is
    /// no longer accepted are evicted, new or changed paths are read
    /// through `provider` and inserted. Extraction runs outside every
    /// lock; each apply is one short write-lock section. A failing file is
    /// recorded and skipped, never aborting the batch. Cancellation is
    /// honored between per-file operations and keeps the work already
    /// applied.
    pub fn rescan(
        &self,
        accepted_paths: &[String],
        provider: &dyn SongProvider,
    ) -> Result<RescanSummary, DiscogError> {
        self.ensure_open()?;
        let _gate = self.inner.writer.lock();
        self.inner.cancel.store(false, Ordering::SeqCst);

        let mut summary = RescanSummary::default();
        let accepted: HashSet<&str> = accepted_paths.iter().map(String::as_str).collect();

        let (stale, known): (Vec<String>, HashMap<String, u64>) = {
            let cache = self.inner.cache.read();
            let stale = cache
                .songs()
                .filter(|song| !accepted.contains(song.path.as_str()))
                .map(|song| song.path.clone())
                .collect();
            let known = cache
                .songs()
                .map(|song| (song.path.clone(), song.date_modified))
                .collect();
            (stale, known)
        };

        for path in stale {
            if self.cancelled() {
                summary.cancelled = true;
                break;
            }
            if self.inner.cache.write().remove_song(&path).is_some() {
                debug!("evicted {}", path);
                summary.removed += 1;
            }
        }

        if !summary.cancelled {
            let mut seen = HashSet::new();
            for path in accepted_paths {
                if !seen.insert(path.as_str()) {
                    continue;
                }
                if self.cancelled() {
                    summary.cancelled = true;
                    break;
                }

                if let Some(&stored) = known.get(path.as_str()) {
                    if provider.date_modified(path) == Some(stored) {
                        summary.unchanged += 1;
                        continue;
                    }
                }

                match provider.read_song(path) {
                    Ok(song) => match self.inner.cache.write().add_song(song) {
                        Ok(Some(_)) => summary.replaced += 1,
                        Ok(None) => summary.added += 1,
                        Err(err) => {
                            warn!("rejected {}: {}", path, err);
                            summary.failed.push(ScanFailure {
                                path: path.clone(),
                                error: err.to_string(),
                            });
                        }
                    },
                    Err(err) => {
                        warn!("failed to read {}: {}", path, err);
                        summary.failed.push(ScanFailure {
                            path: path.clone(),
                            error: err.to_string(),
                        });
                    }
                }
            }
        }

        if summary.cancelled {
            info!(
                "rescan cancelled after {} added, {} removed",
                summary.added, summary.removed
            );
        } else {
            info!(
                "rescan complete: {} added, {} replaced, {} removed, {} unchanged, {} failed",
                summary.added,
                summary.replaced,
                summary.removed,
                summary.unchanged,
                summary.failed.len()
            );
        }
        Ok(summary)
    }

    /// Asks an in-flight rescan to stop between files. Applied additions
    /// and removals are kept.
    pub fn request_cancel(&self) {
        self.inner.cancel.store(true, Ordering::SeqCst);
    }

    /// Marks the service closed: in-flight rescans stop at the next file
    /// boundary and later mutations fail with `Closed`. Reads keep
    /// answering from the final state.
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.cancel.store(true, Ordering::SeqCst);
        info!("discography shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), DiscogError> {
        if self.is_closed() {
            Err(DiscogError::Closed)
        } else {
            Ok(())
        }
    }

    // shutdown also cancels, even if a rescan reset the flag after the
    // shutdown call landed
    fn cancelled(&self) -> bool {
        self.inner.cancel.load(Ordering::SeqCst) || self.is_closed()
    }
}
