use crate::events::AppEvent;
use async_channel::Sender;
use derive_more::{AsRef, Deref, Display, From, Into};
use directories::ProjectDirs;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use spinframe::protocol::SOCKET_PATH;
use spinframe::sequence::SequenceError;
use spinframe::{FrameAddress, FrameSequence, Rig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, Deref, From, Into, AsRef,
)]
#[serde(transparent)]
pub struct ProductName(String);

spinframe::impl_string_newtype!(ProductName);

/// Route path a product is opened by, e.g. `/drill`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, Deref, From, Into, AsRef,
)]
#[serde(transparent)]
pub struct ProductPath(String);

spinframe::impl_string_newtype!(ProductPath);

impl ProductPath {
    /// Matches with or without the leading slash.
    pub fn matches_route(&self, path: &str) -> bool {
        self.0.trim_start_matches('/') == path.trim_start_matches('/')
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProductConfig {
    pub name: ProductName,
    pub path: ProductPath,
    pub image_path: String,
    pub image_prefix: String,
    pub image_extension: String,
    pub total_frames: usize,
    pub frame_digits: usize,
    #[serde(default)]
    pub rig: Rig,
    #[serde(default)]
    pub description: String,
}

impl ProductConfig {
    pub fn sequence(&self) -> Result<FrameSequence, SequenceError> {
        FrameSequence::new(
            self.image_path.clone(),
            self.image_prefix.clone(),
            self.image_extension.clone(),
            self.total_frames,
            self.frame_digits,
        )
    }

    pub fn thumbnail(&self) -> Result<FrameAddress, SequenceError> {
        self.sequence().map(|s| s.thumbnail())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    #[serde(default)]
    pub products: Vec<ProductConfig>,
}

fn default_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(SOCKET_PATH)
}

fn default_fetch_timeout_ms() -> u64 {
    10_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            socket_path: default_socket_path(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            products: Vec::new(),
        }
    }
}

impl Config {
    /// The registry shipped with turntable.
    pub fn builtin() -> Self {
        config::Config::builder()
            .add_source(builtin_source())
            .build()
            .and_then(|c| c.try_deserialize())
            .unwrap_or_else(|e| {
                log::error!("Built-in config is invalid: {}", e);
                Self::default()
            })
    }

    pub fn find_product(&self, path: &str) -> Option<&ProductConfig> {
        self.products.iter().find(|p| p.path.matches_route(path))
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        (self.fetch_timeout_ms > 0).then(|| Duration::from_millis(self.fetch_timeout_ms))
    }

    /// Products whose frame sequence cannot be built.
    pub fn invalid_products(&self) -> Vec<(&ProductConfig, SequenceError)> {
        self.products
            .iter()
            .filter_map(|p| p.sequence().err().map(|e| (p, e)))
            .collect()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine config directory")]
    ConfigDirNotFound,
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),
}

pub fn get_config_path() -> Result<PathBuf, ConfigError> {
    let proj_dirs = ProjectDirs::from("org", "turntable", "turntable")
        .ok_or(ConfigError::ConfigDirNotFound)?;
    Ok(proj_dirs.config_dir().join("config.toml"))
}

fn builtin_source() -> impl config::Source + Send + Sync + 'static {
    config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml)
}

/// Layers the user's config file and `TURNTABLE_*` variables over the built-in registry.
pub fn load_config() -> Result<Config, ConfigError> {
    layered(&get_config_path()?)
}

fn layered(config_path: &Path) -> Result<Config, ConfigError> {
    let s = config::Config::builder()
        .add_source(builtin_source())
        .add_source(config::File::from(config_path).required(false))
        .add_source(config::Environment::with_prefix("TURNTABLE").try_parsing(true))
        .build()?;

    Ok(s.try_deserialize()?)
}

pub fn load_or_default() -> Config {
    match load_config() {
        Ok(c) => c,
        Err(e) => {
            log::error!("Failed to load config, using built-in products: {}", e);
            Config::builtin()
        }
    }
}

/// Writes the built-in registry to the user's config path for `turntable --init`.
pub fn write_default_config() -> std::io::Result<PathBuf> {
    let path = get_config_path().map_err(std::io::Error::other)?;
    write_registry_template(&path)?;
    Ok(path)
}

/// Returns `false` when a file already exists at `path`; it is never overwritten.
fn write_registry_template(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)?;
    }
    fs_err::write(path, DEFAULT_CONFIG)?;
    log::info!("Wrote the default registry to {}", path.display());
    Ok(true)
}

const DEFAULT_CONFIG: &str = include_str!("default_config.toml");

fn is_config_change(event: &notify::Event, config_path: &Path) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    ) && event.paths.iter().any(|p| p == config_path)
}

/// Sends [`AppEvent::ConfigReload`] whenever the registry file is written, replaced or
/// removed. Editors that save by renaming are covered because the directory is watched.
pub async fn run_async_watcher(tx: Sender<AppEvent>) {
    let config_path = match get_config_path() {
        Ok(p) => p,
        Err(e) => {
            log::error!("Config watcher error: {}", e);
            return;
        }
    };
    let Some(config_dir) = config_path.parent().map(Path::to_path_buf) else {
        return;
    };
    if let Err(e) = fs_err::create_dir_all(&config_dir) {
        log::error!("Failed to create config directory for watching: {}", e);
        return;
    }

    let (bridge_tx, bridge_rx) = async_channel::unbounded();
    let watcher = RecommendedWatcher::new(
        move |res| {
            let _ = bridge_tx.send_blocking(res);
        },
        notify::Config::default(),
    );
    let mut watcher = match watcher {
        Ok(w) => w,
        Err(e) => {
            log::error!("Failed to create watcher: {}", ConfigError::from(e));
            return;
        }
    };
    if let Err(e) = watcher.watch(&config_dir, RecursiveMode::NonRecursive) {
        log::error!("Failed to watch {}: {}", config_dir.display(), e);
        return;
    }
    log::debug!("Watching {}", config_path.display());

    while let Ok(res) = bridge_rx.recv().await {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                log::error!("Watch error: {}", e);
                continue;
            }
        };
        if !is_config_change(&event, &config_path) {
            continue;
        }
        log::debug!("{:?} on {}", event.kind, config_path.display());
        if tx.send(AppEvent::ConfigReload).await.is_err() {
            break;
        }
    }
}
