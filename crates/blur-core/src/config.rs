//! Configuration system for blurd.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $BLURD_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/blurd/config.toml
//!   3. ~/.config/blurd/config.toml

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::radius::{Radius, DEFAULT_RADIUS, RADIUS_CEILING};
use crate::wire::{FrameLimits, DEFAULT_MAX_FRAME_BYTES, DEFAULT_READ_CHUNK_BYTES};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurConfig {
    pub network: NetworkConfig,
    pub filter: FilterConfig,
    pub transfer: TransferConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the image socket binds to.
    pub listen_addr: IpAddr,
    /// TCP port for image jobs. 0 = OS-assigned.
    pub port: u16,
    /// Local HTTP control port. 0 = disabled.
    pub api_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Radius in effect until the control surface changes it.
    pub initial_radius: u32,
    /// Largest radius the control surface accepts.
    pub max_radius: u32,
    /// Parallel bands per image. 0 = available parallelism.
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Frames declaring more than this many bytes are rejected.
    pub max_frame_bytes: u64,
    /// Bytes requested per socket read.
    pub read_chunk_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Received originals and filtered results are written here.
    pub work_dir: PathBuf,
    /// SQLite audit database.
    pub database: PathBuf,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            filter: FilterConfig::default(),
            transfer: TransferConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: IpAddr::from([0, 0, 0, 0]),
            port: 5000,
            api_port: 5001,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            initial_radius: DEFAULT_RADIUS,
            max_radius: 15,
            workers: 0,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            read_chunk_bytes: DEFAULT_READ_CHUNK_BYTES,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let work_dir = data_dir().join("images");
        Self {
            database: work_dir.join("index.db"),
            work_dir,
        }
    }
}

// ── Derived values ────────────────────────────────────────────────────────────

impl FilterConfig {
    pub fn initial(&self) -> Radius {
        Radius::new(self.initial_radius)
    }

    /// Resolved band count.
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.workers
        }
    }
}

impl TransferConfig {
    pub fn limits(&self) -> FrameLimits {
        FrameLimits::new(self.max_frame_bytes, self.read_chunk_bytes)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("blurd")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("blurd")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl BlurConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            BlurConfig::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("BLURD_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&BlurConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Reject values the daemon cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transfer.max_frame_bytes == 0 {
            return Err(ConfigError::Invalid(
                "transfer.max_frame_bytes must be > 0".into(),
            ));
        }
        if self.transfer.read_chunk_bytes == 0 {
            return Err(ConfigError::Invalid(
                "transfer.read_chunk_bytes must be > 0".into(),
            ));
        }
        if self.filter.max_radius > RADIUS_CEILING {
            return Err(ConfigError::Invalid(format!(
                "filter.max_radius {} is above the supported ceiling {}",
                self.filter.max_radius, RADIUS_CEILING
            )));
        }
        if self.filter.initial().get() > Radius::new(self.filter.max_radius).get() {
            return Err(ConfigError::Invalid(format!(
                "filter.initial_radius {} is above filter.max_radius {}",
                self.filter.initial_radius, self.filter.max_radius
            )));
        }
        Ok(())
    }

    /// Apply BLURD_* overrides. `lookup` is `std::env::var` outside tests.
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("BLURD_NETWORK__LISTEN_ADDR") {
            if let Ok(addr) = v.parse() {
                self.network.listen_addr = addr;
            }
        }
        if let Some(v) = lookup("BLURD_NETWORK__PORT") {
            if let Ok(p) = v.parse() {
                self.network.port = p;
            }
        }
        if let Some(v) = lookup("BLURD_NETWORK__API_PORT") {
            if let Ok(p) = v.parse() {
                self.network.api_port = p;
            }
        }
        if let Some(v) = lookup("BLURD_FILTER__INITIAL_RADIUS") {
            if let Ok(r) = v.parse() {
                self.filter.initial_radius = r;
            }
        }
        if let Some(v) = lookup("BLURD_FILTER__WORKERS") {
            if let Ok(n) = v.parse() {
                self.filter.workers = n;
            }
        }
        if let Some(v) = lookup("BLURD_TRANSFER__MAX_FRAME_BYTES") {
            if let Ok(n) = v.parse() {
                self.transfer.max_frame_bytes = n;
            }
        }
        if let Some(v) = lookup("BLURD_STORAGE__WORK_DIR") {
            self.storage.work_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("BLURD_STORAGE__DATABASE") {
            self.storage.database = PathBuf::from(v);
        }
    }
}
