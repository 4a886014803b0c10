use std::path::PathBuf;
use std::time::Duration;

use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use crate::scan::run_rescan;
use crate::state::{AppState, ScanState};

pub fn configure_watcher(state: &AppState, root: PathBuf) {
    let config = state.config.read().clone();
    if !config.watch_music {
        info!("watcher disabled (watch_music=false)");
        *state.watcher.write() = None;
        return;
    }

    let watch_debounce_secs = if config.watch_debounce_secs == 0 {
        2
    } else {
        config.watch_debounce_secs
    };
    let watch_debounce = Duration::from_secs(watch_debounce_secs);

    match setup_watcher(state.clone(), root.clone(), watch_debounce) {
        Ok(watcher) => {
            info!(
                "watching {} for changes (debounce {}s)",
                root.display(),
                watch_debounce.as_secs()
            );
            *state.watcher.write() = Some(watcher);
        }
        Err(err) => {
            warn!("failed to start watcher: {}", err);
            *state.watcher.write() = None;
        }
    }
}

fn setup_watcher(
    state: AppState,
    root: PathBuf,
    debounce: Duration,
) -> Result<RecommendedWatcher, Box<dyn std::error::Error>> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Event>();
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        },
        NotifyConfig::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    tokio::spawn(async move {
        watch_loop(state, root, rx, debounce).await;
    });

    Ok(watcher)
}

async fn watch_loop(
    state: AppState,
    root: PathBuf,
    mut rx: UnboundedReceiver<Event>,
    debounce: Duration,
) {
    loop {
        let event = match rx.recv().await {
            Some(event) => event,
            None => break,
        };
        if !is_relevant_event(&event) {
            continue;
        }

        loop {
            tokio::select! {
                _ = tokio::time::sleep(debounce) => {
                    match run_rescan(&state, root.clone()).await {
                        Ok(summary) => {
                            let stats = state.discog.stats();
                            info!(
                                "auto-rescan complete: {} added, {} replaced, {} removed",
                                summary.added, summary.replaced, summary.removed
                            );
                            *state.scan_state.write() = ScanState::Ready(stats);
                        }
                        Err(message) => warn!("auto-rescan failed: {}", message),
                    }
                    break;
                }
                maybe_event = rx.recv() => {
                    if let Some(event) = maybe_event {
                        if !is_relevant_event(&event) {
                            continue;
                        }
                    } else {
                        return;
                    }
                }
            }
        }
    }
}

fn is_relevant_event(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
