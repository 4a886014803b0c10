use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use axum::http::StatusCode;
use axum::Json;
use notify::RecommendedWatcher;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::ServerConfig;
use library::{CacheStats, Discography};

#[derive(Clone)]
pub struct AppState {
    pub discog: Discography,
    pub config_path: PathBuf,
    pub config: Arc<RwLock<ServerConfig>>,
    pub scan_state: Arc<RwLock<ScanState>>,
    pub watcher: Arc<RwLock<Option<RecommendedWatcher>>>,
}

#[derive(Clone, Debug)]
pub enum ScanState {
    Unconfigured,
    Missing(PathBuf),
    Scanning { started: SystemTime },
    Ready(CacheStats),
    Error(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: Option<String>,
    pub songs: Option<usize>,
    pub albums: Option<usize>,
    pub artists: Option<usize>,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: String,
}

pub type JsonResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;
