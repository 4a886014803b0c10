mod api;
mod config;
mod scan;
mod state;
mod utils;
mod watch;

use std::sync::Arc;

use api::api_router;
use config::{config_path_from_env, load_or_create_config, resolve_music_root};
use library::Discography;
use parking_lot::RwLock;
use scan::{set_library_missing, start_scan};
use state::{AppState, ScanState};
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Created default config at {:?}", config_path);
    } else {
        info!("Loaded config from {:?}", config_path);
    }

    let port = if config.port == 0 { 3000 } else { config.port };
    let bind_addr = format!("0.0.0.0:{}", port);

    let state = AppState {
        discog: Discography::new(),
        config_path: config_path.clone(),
        config: Arc::new(RwLock::new(config.clone())),
        scan_state: Arc::new(RwLock::new(ScanState::Unconfigured)),
        watcher: Arc::new(RwLock::new(None)),
    };

    match resolve_music_root(&config_path, &config.music_root) {
        Some(music_root) if music_root.exists() => {
            start_scan(state.clone(), music_root);
        }
        Some(music_root) => {
            warn!("Music directory not found: {}", music_root.display());
            set_library_missing(&state, music_root);
        }
        None => {
            info!("Music directory not configured yet; set music_root in the config.");
        }
    }

    let app = api_router(state.clone())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.discog.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                warn!("Failed to install terminate signal handler: {}", err);
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", err);
        }
    }

    info!("Shutdown signal received.");
}
