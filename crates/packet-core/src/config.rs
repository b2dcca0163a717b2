//! Configuration system for Packet.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $PACKET_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/packet/config.toml
//!   3. ~/.config/packet/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PacketConfig {
    pub transfer: TransferConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Read size for local files and byte sources.
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Redirect hops before the transfer fails.
    pub max_redirects: u32,
    /// 0 = no connect timeout.
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    /// Honour HTTP_PROXY / HTTPS_PROXY from the environment.
    pub use_system_proxy: bool,
    /// Credentials tried per transfer before the 401 is delivered as-is.
    pub max_auth_attempts: u32,
    /// Report connectivity stalls and keep re-attempting the connection
    /// instead of failing on the first connect error.
    pub wait_for_connectivity: bool,
    pub connectivity_poll_ms: u64,
    pub connectivity_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when RUST_LOG is unset.
    pub filter: String,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16 * 1024,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_redirects: 10,
            connect_timeout_secs: 30,
            user_agent: format!("packet/{}", env!("CARGO_PKG_VERSION")),
            use_system_proxy: true,
            max_auth_attempts: 3,
            wait_for_connectivity: false,
            connectivity_poll_ms: 1_000,
            connectivity_timeout_secs: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0).then(|| Duration::from_secs(self.connect_timeout_secs))
    }

    pub fn connectivity_poll(&self) -> Duration {
        Duration::from_millis(self.connectivity_poll_ms.max(1))
    }

    pub fn connectivity_timeout(&self) -> Duration {
        Duration::from_secs(self.connectivity_timeout_secs)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("packet")
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
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl PacketConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::file_path())
    }

    /// Load from an explicit file, falling back to defaults if it is absent.
    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            Self::from_toml_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            PacketConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("PACKET_CONFIG")
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
            let text = PacketConfig::default().to_toml_string()?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply PACKET_* env var overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("PACKET_TRANSFER__CHUNK_SIZE") {
            if let Ok(n) = v.parse::<usize>() {
                if n > 0 {
                    self.transfer.chunk_size = n;
                }
            }
        }
        if let Some(v) = var("PACKET_HTTP__MAX_REDIRECTS") {
            if let Ok(n) = v.parse() {
                self.http.max_redirects = n;
            }
        }
        if let Some(v) = var("PACKET_HTTP__WAIT_FOR_CONNECTIVITY") {
            self.http.wait_for_connectivity = v == "true" || v == "1";
        }
        if let Some(v) = var("PACKET_HTTP__USE_SYSTEM_PROXY") {
            self.http.use_system_proxy = v == "true" || v == "1";
        }
        if let Some(v) = var("PACKET_LOG") {
            self.logging.filter = v;
        }
    }
}
