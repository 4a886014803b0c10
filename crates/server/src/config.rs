use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub version: u32,
    pub music_root: String,
    /// Directories excluded from scans, absolute or relative to the
    /// config file.
    pub blacklist: Vec<String>,
    pub port: u16,
    pub watch_music: bool,
    pub watch_debounce_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            music_root: "".to_string(),
            blacklist: Vec::new(),
            port: 3000,
            watch_music: true,
            watch_debounce_secs: 2,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("DISCOGRAPH_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

pub fn load_or_create_config(path: &Path) -> Result<(ServerConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: ServerConfig = serde_yaml::from_str(&contents)?;
        if config.version < CONFIG_VERSION {
            config.version = CONFIG_VERSION;
        }
        if config.port == 0 {
            config.port = 3000;
        }
        return Ok((config, false));
    }

    let config = ServerConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &ServerConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value);
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}

pub fn resolve_music_root(config_path: &Path, value: &str) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(resolve_path(config_path, trimmed))
    }
}

pub fn resolve_blacklist(config_path: &Path, entries: &[String]) -> Vec<PathBuf> {
    entries
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| resolve_path(config_path, value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{resolve_blacklist, resolve_music_root, resolve_path, ServerConfig};
    use std::path::{Path, PathBuf};

    #[test]
    fn absolute_values_pass_through() {
        let out = resolve_path(Path::new("/etc/discograph/config.yaml"), "/music");
        assert_eq!(out, PathBuf::from("/music"));
    }

    #[test]
    fn relative_values_resolve_against_the_config_dir() {
        let out = resolve_path(Path::new("/etc/discograph/config.yaml"), "music");
        assert_eq!(out, PathBuf::from("/etc/discograph/music"));
    }

    #[test]
    fn empty_music_root_means_unconfigured() {
        assert!(resolve_music_root(Path::new("/tmp/config.yaml"), "  ").is_none());
        assert!(resolve_music_root(Path::new("/tmp/config.yaml"), "/music").is_some());
    }

    #[test]
    fn blank_blacklist_entries_are_dropped() {
        let out = resolve_blacklist(
            Path::new("/etc/discograph/config.yaml"),
            &["".to_string(), " /music/skip ".to_string()],
        );
        assert_eq!(out, vec![PathBuf::from("/music/skip")]);
    }

    #[test]
    fn defaults_are_usable() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3000);
        assert!(config.watch_music);
        assert!(config.music_root.is_empty());
    }
}
