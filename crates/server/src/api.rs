use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::scan::apply_music_root_update;
use crate::state::{
    AppState, HealthResponse, JsonResult, ListResponse, NameQuery, PathQuery, ScanState,
    StatusResponse,
};
use crate::utils::json_error;
use common::{canonical_path_string, Song};
use library::files::{list_subdirectories, storage_roots};

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/library/status", get(library_status))
        .route("/library/songs/by-path", get(song_by_path))
        .route("/library/albums/by-name", get(albums_by_name))
        .route("/library/albums/:album_id/songs", get(album_songs))
        .route(
            "/library/albums/:album_id/songs/by-artist",
            get(album_songs_by_artist),
        )
        .route("/library/artists/:name/songs", get(artist_songs))
        .route("/library/rescan", post(rescan_now))
        .route("/fs/roots", get(fs_roots))
        .route("/fs/subdirs", get(fs_subdirs))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn library_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let scan_state = state.scan_state.read().clone();
    let response = match scan_state {
        ScanState::Unconfigured => StatusResponse {
            status: "unconfigured".to_string(),
            message: Some("No music directory configured.".to_string()),
            songs: None,
            albums: None,
            artists: None,
        },
        ScanState::Missing(path) => StatusResponse {
            status: "missing".to_string(),
            message: Some(format!("Music directory not found: {}", path.display())),
            songs: None,
            albums: None,
            artists: None,
        },
        ScanState::Scanning { started } => StatusResponse {
            status: "scanning".to_string(),
            message: started
                .elapsed()
                .ok()
                .map(|elapsed| format!("Scanning for {}s.", elapsed.as_secs())),
            songs: None,
            albums: None,
            artists: None,
        },
        ScanState::Ready(stats) => StatusResponse {
            status: "ready".to_string(),
            message: None,
            songs: Some(stats.songs),
            albums: Some(stats.albums),
            artists: Some(stats.artists),
        },
        ScanState::Error(message) => StatusResponse {
            status: "error".to_string(),
            message: Some(message),
            songs: None,
            albums: None,
            artists: None,
        },
    };
    Json(response)
}

async fn song_by_path(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> JsonResult<Song> {
    let path = canonical_path_string(Path::new(&query.path));
    match state.discog.get_song_by_path(&path) {
        Some(song) => Ok(Json(song)),
        None => Err(json_error(StatusCode::NOT_FOUND, "song not found")),
    }
}

async fn albums_by_name(
    State(state): State<AppState>,
    Query(query): Query<NameQuery>,
) -> Json<ListResponse<u64>> {
    Json(id_list(state.discog.album_ids_by_name(&query.name)))
}

async fn album_songs(
    State(state): State<AppState>,
    AxumPath(album_id): AxumPath<u64>,
) -> Json<ListResponse<u64>> {
    Json(id_list(state.discog.songs_by_album(album_id)))
}

async fn album_songs_by_artist(
    State(state): State<AppState>,
    AxumPath(album_id): AxumPath<u64>,
) -> Json<BTreeMap<String, Vec<u64>>> {
    let grouped = state
        .discog
        .album_songs_by_artist(album_id)
        .into_iter()
        .map(|(artist, ids)| {
            let mut ids: Vec<u64> = ids.into_iter().collect();
            ids.sort_unstable();
            (artist, ids)
        })
        .collect();
    Json(grouped)
}

async fn artist_songs(
    State(state): State<AppState>,
    AxumPath(name): AxumPath<String>,
) -> Json<ListResponse<u64>> {
    Json(id_list(state.discog.songs_by_artist(&name)))
}

async fn rescan_now(State(state): State<AppState>) -> JsonResult<StatusResponse> {
    let music_root = state.config.read().music_root.clone();
    if music_root.trim().is_empty() {
        return Err(json_error(
            StatusCode::CONFLICT,
            "no music directory configured",
        ));
    }
    let message = apply_music_root_update(state, &music_root);
    Ok(Json(StatusResponse {
        status: "scanning".to_string(),
        message: Some(message),
        songs: None,
        albums: None,
        artists: None,
    }))
}

async fn fs_roots() -> Json<ListResponse<String>> {
    let items: Vec<String> = storage_roots()
        .into_iter()
        .map(|path| path.display().to_string())
        .collect();
    let total = items.len();
    Json(ListResponse { items, total })
}

async fn fs_subdirs(Query(query): Query<PathQuery>) -> JsonResult<ListResponse<String>> {
    match list_subdirectories(Path::new(&query.path)) {
        Ok(dirs) => {
            let items: Vec<String> = dirs.into_iter().map(|dir| dir.display().to_string()).collect();
            let total = items.len();
            Ok(Json(ListResponse { items, total }))
        }
        Err(err) => Err(json_error(
            StatusCode::NOT_FOUND,
            format!("cannot list {}: {}", query.path, err),
        )),
    }
}

fn id_list(ids: HashSet<u64>) -> ListResponse<u64> {
    let mut items: Vec<u64> = ids.into_iter().collect();
    items.sort_unstable();
    let total = items.len();
    ListResponse { items, total }
}
