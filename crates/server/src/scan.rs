use std::path::PathBuf;
use std::time::SystemTime;

use tracing::{info, warn};

use crate::config::{resolve_blacklist, resolve_path};
use crate::state::{AppState, ScanState};
use crate::watch::configure_watcher;
use library::files::collect_accepted_paths;
use library::RescanSummary;
use metadata::TagReader;

/// Runs a full scan generation in the background: collect accepted paths,
/// rescan the discography, publish the new status, then (re)arm the
/// watcher.
pub fn start_scan(state: AppState, root: PathBuf) {
    *state.scan_state.write() = ScanState::Scanning {
        started: SystemTime::now(),
    };
    *state.watcher.write() = None;

    tokio::spawn(async move {
        match run_rescan(&state, root.clone()).await {
            Ok(summary) => {
                let stats = state.discog.stats();
                info!(
                    "library ready: {} songs, {} albums, {} artists ({} files skipped)",
                    stats.songs,
                    stats.albums,
                    stats.artists,
                    summary.failed.len()
                );
                *state.scan_state.write() = ScanState::Ready(stats);
                configure_watcher(&state, root);
            }
            Err(message) => {
                warn!("library scan failed: {}", message);
                *state.scan_state.write() = ScanState::Error(message);
            }
        }
    });
}

/// One blocking collect-and-rescan pass, shared by the initial scan, the
/// rescan endpoint, and the watcher. Tag extraction happens on the
/// blocking pool; per-file failures end up in the summary, not here.
pub async fn run_rescan(state: &AppState, root: PathBuf) -> Result<RescanSummary, String> {
    let blacklist = {
        let config = state.config.read();
        resolve_blacklist(&state.config_path, &config.blacklist)
    };
    let discog = state.discog.clone();

    let result = tokio::task::spawn_blocking(move || {
        let accepted = collect_accepted_paths(&[root], &blacklist);
        info!("accepted {} audio files", accepted.len());
        discog.rescan(&accepted, &TagReader::new())
    })
    .await;

    let summary = match result {
        Ok(Ok(summary)) => summary,
        Ok(Err(err)) => return Err(err.to_string()),
        Err(err) => return Err(err.to_string()),
    };
    for failure in &summary.failed {
        warn!("skipped {}: {}", failure.path, failure.error);
    }
    Ok(summary)
}

pub fn set_library_missing(state: &AppState, path: PathBuf) {
    *state.scan_state.write() = ScanState::Missing(path);
}

pub fn apply_music_root_update(state: AppState, new_root: &str) -> String {
    let path = resolve_path(&state.config_path, new_root);
    if !path.exists() {
        set_library_missing(&state, path);
        return "Music directory not found.".to_string();
    }
    start_scan(state, path);
    "Scanning started.".to_string()
}
