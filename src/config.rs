use std::{env, fs, path::PathBuf, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

pub const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_DB_FILE: &str = "movies.db";
pub const DEFAULT_POSTERS_DIR: &str = "posters";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
pub const DEFAULT_TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_TMDB_IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_POSTER_MAX_WIDTH: u32 = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TMDB_API_KEY is not set (environment, .env or config.json)")]
    MissingApiKey,
    #[error("movies directory {0} does not exist")]
    MissingMoviesDir(PathBuf),
}

/// When the server binary runs a reconciliation pass before it starts serving.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartupScan {
    Always,
    IfEmpty,
    Never,
}

impl StartupScan {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "if_empty" | "ifempty" | "empty" => Some(Self::IfEmpty),
            "always" => Some(Self::Always),
            "never" | "off" => Some(Self::Never),
            _ => None,
        }
    }
}

impl Default for StartupScan {
    fn default() -> Self {
        Self::IfEmpty
    }
}

/// Everything read from `config.json` and the environment, before validation.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub tmdb_api_key: Option<String>,
    pub movies_dir: PathBuf,
    pub database_path: PathBuf,
    pub posters_dir: PathBuf,
    pub bind_addr: String,
    pub player_cmd: Option<String>,
    pub tmdb_base_url: String,
    pub tmdb_image_base_url: String,
    pub http_timeout_secs: u64,
    pub poster_max_width: u32,
    pub startup_scan: StartupScan,
    pub rebuild_on_startup: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            movies_dir: resolve_relative_path("."),
            database_path: resolve_relative_path(DEFAULT_DB_FILE),
            posters_dir: resolve_relative_path(DEFAULT_POSTERS_DIR),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            player_cmd: None,
            tmdb_base_url: DEFAULT_TMDB_BASE_URL.to_string(),
            tmdb_image_base_url: DEFAULT_TMDB_IMAGE_BASE_URL.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            poster_max_width: DEFAULT_POSTER_MAX_WIDTH,
            startup_scan: StartupScan::default(),
            rebuild_on_startup: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(alias = "api_key")]
    tmdb_api_key: Option<String>,
    #[serde(alias = "library_root")]
    movies_dir: Option<String>,
    database_path: Option<String>,
    posters_dir: Option<String>,
    bind_addr: Option<String>,
    player_cmd: Option<String>,
    tmdb_base_url: Option<String>,
    tmdb_image_base_url: Option<String>,
    http_timeout_secs: Option<u64>,
    poster_max_width: Option<u32>,
    startup_scan: Option<String>,
    rebuild_on_startup: Option<bool>,
}

/// Explicit configuration handed to the pipeline once the API key is known.
#[derive(Clone, Debug)]
pub struct Settings {
    pub tmdb_api_key: String,
    pub movies_dir: PathBuf,
    pub database_path: PathBuf,
    pub posters_dir: PathBuf,
    pub bind_addr: String,
    pub player_cmd: Option<String>,
    pub tmdb_base_url: String,
    pub tmdb_image_base_url: String,
    pub http_timeout: Duration,
    pub poster_max_width: u32,
    pub startup_scan: StartupScan,
    pub rebuild_on_startup: bool,
}

impl AppConfig {
    /// Checks the credential and the library root; the only fatal errors in the program.
    pub fn validate(self) -> Result<Settings, ConfigError> {
        let tmdb_api_key = self
            .tmdb_api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        if !self.movies_dir.is_dir() {
            return Err(ConfigError::MissingMoviesDir(self.movies_dir));
        }

        Ok(Settings {
            tmdb_api_key,
            movies_dir: self.movies_dir,
            database_path: self.database_path,
            posters_dir: self.posters_dir,
            bind_addr: self.bind_addr,
            player_cmd: self.player_cmd,
            tmdb_base_url: self.tmdb_base_url.trim_end_matches('/').to_string(),
            tmdb_image_base_url: self.tmdb_image_base_url.trim_end_matches('/').to_string(),
            http_timeout: Duration::from_secs(self.http_timeout_secs.max(1)),
            poster_max_width: self.poster_max_width.max(1),
            startup_scan: self.startup_scan,
            rebuild_on_startup: self.rebuild_on_startup,
        })
    }
}

/// Loads `config.json` (if any), then applies environment overrides. `.env` is read first.
pub fn load_config() -> AppConfig {
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded environment from {}", path.display());
    }

    let mut cfg = AppConfig::default();
    let cfg_path = resolve_relative_path(CONFIG_FILE);

    match fs::read_to_string(&cfg_path) {
        Ok(raw) => match serde_json::from_str::<RawConfig>(&raw) {
            Ok(parsed) => {
                apply_raw(&mut cfg, parsed);
                info!("Loaded config from {}", cfg_path.display());
            }
            Err(err) => {
                warn!("Failed to parse {} ({}). Using defaults.", cfg_path.display(), err);
            }
        },
        Err(_) => {
            info!("No {} found; using defaults", CONFIG_FILE);
        }
    }

    apply_env(&mut cfg, |name| env::var(name).ok());
    cfg
}

fn apply_raw(cfg: &mut AppConfig, parsed: RawConfig) {
    if parsed.tmdb_api_key.is_some() {
        cfg.tmdb_api_key = parsed.tmdb_api_key;
    }
    if let Some(dir) = parsed.movies_dir {
        cfg.movies_dir = resolve_relative_path(&dir);
    }
    if let Some(path) = parsed.database_path {
        cfg.database_path = resolve_relative_path(&path);
    }
    if let Some(dir) = parsed.posters_dir {
        cfg.posters_dir = resolve_relative_path(&dir);
    }
    if let Some(addr) = parsed.bind_addr {
        cfg.bind_addr = addr;
    }
    if parsed.player_cmd.is_some() {
        cfg.player_cmd = parsed.player_cmd;
    }
    if let Some(url) = parsed.tmdb_base_url {
        cfg.tmdb_base_url = url;
    }
    if let Some(url) = parsed.tmdb_image_base_url {
        cfg.tmdb_image_base_url = url;
    }
    if let Some(secs) = parsed.http_timeout_secs {
        cfg.http_timeout_secs = secs;
    }
    if let Some(width) = parsed.poster_max_width {
        cfg.poster_max_width = width;
    }
    if let Some(mode) = parsed.startup_scan {
        match StartupScan::from_str(&mode) {
            Some(kind) => cfg.startup_scan = kind,
            None => warn!(
                "Unknown startup_scan `{mode}` in {CONFIG_FILE}; falling back to if_empty."
            ),
        }
    }
    if let Some(rebuild) = parsed.rebuild_on_startup {
        cfg.rebuild_on_startup = rebuild;
    }
}

fn apply_env<F>(cfg: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(key) = non_empty("TMDB_API_KEY") {
        cfg.tmdb_api_key = Some(key);
    }
    if let Some(dir) = non_empty("MOVIES_DIR") {
        cfg.movies_dir = resolve_relative_path(&dir);
    }
    if let Some(path) = non_empty("MOVIELIB_DB") {
        cfg.database_path = resolve_relative_path(&path);
    }
    if let Some(dir) = non_empty("MOVIELIB_POSTERS") {
        cfg.posters_dir = resolve_relative_path(&dir);
    }
    if let Some(addr) = non_empty("MOVIELIB_BIND") {
        cfg.bind_addr = addr;
    }
    if let Some(cmd) = non_empty("MOVIELIB_PLAYER") {
        cfg.player_cmd = Some(cmd);
    }
}

/// Relative paths are taken from the working directory; absolute ones are kept as-is.
pub fn resolve_relative_path(p: &str) -> PathBuf {
    let path = PathBuf::from(p);
    if path.is_absolute() {
        return path;
    }
    env::current_dir()
        .map(|cwd| cwd.join(&path))
        .unwrap_or(path)
}
