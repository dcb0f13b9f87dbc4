//! TOML-based configuration for the security component service.
//!
//! Reads `ServiceConfig` from an explicit path (`--config`) or the
//! platform-appropriate config file:
//! - Windows:  `%APPDATA%\Clickgate\config.toml`
//! - Linux:    `~/.config/clickgate/config.toml`
//! - macOS:    `~/Library/Application Support/Clickgate/config.toml`
//!
//! Example:
//!
//! ```toml
//! [service]
//! log_level = "debug"
//! dump_on_start = true
//!
//! [enhance]
//! input = "hmac"
//! service = "hmac"
//! client = "none"
//! hmac_key_hex = "000102030405060708090a0b0c0d0e0f"
//!
//! [dialog]
//! confirm_types = ["save"]
//! auto_accept = true
//! ```
//!
//! Every field has a serde default, so a missing file, a missing section or
//! a missing key all fall back to a backend-less service logging at `info`.

use std::fmt;
use std::path::{Path, PathBuf};

use clickgate_core::ComponentType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is not usable (e.g. a malformed HMAC key).
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level service configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    #[serde(default)]
    pub service: ServiceSection,
    #[serde(default)]
    pub enhance: EnhanceConfig,
    #[serde(default)]
    pub dialog: DialogConfig,
}

/// General service behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceSection {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log a full diagnostic dump once the service is up.
    #[serde(default)]
    pub dump_on_start: bool,
}

/// Which enhance backend each role uses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnhanceConfig {
    #[serde(default)]
    pub input: BackendKind,
    #[serde(default)]
    pub service: BackendKind,
    #[serde(default)]
    pub client: BackendKind,
    /// Shared HMAC key, hex encoded.  Required when any role uses `hmac`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac_key_hex: Option<String>,
}

/// Policy of the headless confirmation dialog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DialogConfig {
    /// Component types whose grant waits for the dialog.
    #[serde(default)]
    pub confirm_types: Vec<ComponentType>,
    /// Verdict given to every dialog.
    #[serde(default = "default_true")]
    pub auto_accept: bool,
}

/// Backend implementation selectable per role.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// No backend: the adapter's fallbacks apply.
    #[default]
    None,
    /// HMAC-SHA256 signing and verification with `hmac_key_hex`.
    Hmac,
    /// Accept-all backend that records every call; for test rigs only.
    Recording,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::None => "none",
            BackendKind::Hmac => "hmac",
            BackendKind::Recording => "recording",
        };
        f.write_str(name)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            confirm_types: Vec::new(),
            auto_accept: default_true(),
        }
    }
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dump_on_start: false,
        }
    }
}

impl EnhanceConfig {
    /// `true` when at least one role is configured to use HMAC.
    pub fn uses_hmac(&self) -> bool {
        [self.input, self.service, self.client].contains(&BackendKind::Hmac)
    }

    /// Decodes the HMAC key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the key is missing, not hex, or
    /// empty.
    pub fn hmac_key(&self) -> Result<Vec<u8>, ConfigError> {
        let hex_key = self.hmac_key_hex.as_deref().ok_or(ConfigError::Invalid {
            field: "enhance.hmac_key_hex",
            reason: "required when a role uses the hmac backend".to_string(),
        })?;
        let key = hex::decode(hex_key.trim()).map_err(|e| ConfigError::Invalid {
            field: "enhance.hmac_key_hex",
            reason: e.to_string(),
        })?;
        if key.is_empty() {
            return Err(ConfigError::Invalid {
                field: "enhance.hmac_key_hex",
                reason: "key is empty".to_string(),
            });
        }
        Ok(key)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `ServiceConfig` from `path`, or from the platform default when
/// `path` is `None`.  A file that does not exist yields the defaults.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };

    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServiceConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("Clickgate"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("clickgate"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("Clickgate")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
