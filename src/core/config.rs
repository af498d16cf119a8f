//! Daemon configuration.
//!
//! Read from `<dir>/config.json`; every path and bound has a default under
//! `~/.keyward/`. Durations use the grammar from [`crate::core::duration`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::duration::duration_str;
use crate::core::fsio;
use crate::core::types::HeartbeatConfig;
use crate::error::{ConfigError, Result};

/// Default directory name under the user's home.
pub const DEFAULT_DIR: &str = ".keyward";
/// Socket filename.
pub const DEFAULT_SOCKET: &str = "keyward.sock";
/// Age identity filename.
pub const DEFAULT_IDENTITY_FILE: &str = "identity.age";
/// Encrypted secrets filename.
pub const DEFAULT_SECRETS_FILE: &str = "secrets.age";
/// Audit log filename.
pub const DEFAULT_AUDIT_FILE: &str = "audit.log";
/// Lease persistence filename.
pub const DEFAULT_LEASES_FILE: &str = "leases.json";
/// Config filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base directory for all keyward state.
    pub directory: PathBuf,

    /// Unix socket the dispatcher listens on.
    pub socket_path: PathBuf,

    /// Age identity (private key) file.
    pub identity_path: PathBuf,

    /// Encrypted secrets file.
    pub secrets_path: PathBuf,

    /// Append-only audit log.
    pub audit_path: PathBuf,

    /// Active-lease persistence file.
    pub leases_path: PathBuf,

    /// TTL substituted when a lease request does not specify one.
    #[serde(with = "duration_str")]
    pub default_lease_ttl: Duration,

    /// Upper bound on requested lease TTLs.
    #[serde(with = "duration_str")]
    pub max_lease_ttl: Duration,

    /// Hard deadline for rotation hook subprocesses.
    #[serde(with = "duration_str")]
    pub rotation_timeout: Duration,

    /// Optional remote heartbeat monitoring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat: Option<HeartbeatConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let base = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_DIR);
        Self::in_directory(base)
    }
}

impl Config {
    /// A config with every path rooted under `directory`.
    pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
        let directory = directory.into();
        Self {
            socket_path: directory.join(DEFAULT_SOCKET),
            identity_path: directory.join(DEFAULT_IDENTITY_FILE),
            secrets_path: directory.join(DEFAULT_SECRETS_FILE),
            audit_path: directory.join(DEFAULT_AUDIT_FILE),
            leases_path: directory.join(DEFAULT_LEASES_FILE),
            directory,
            default_lease_ttl: Duration::from_secs(3600),
            max_lease_ttl: Duration::from_secs(24 * 3600),
            rotation_timeout: Duration::from_secs(30),
            heartbeat: None,
        }
    }

    /// Load from `<default dir>/config.json`; absent file means defaults.
    pub fn load() -> Result<Self> {
        let defaults = Self::default();
        let path = defaults.directory.join(DEFAULT_CONFIG_FILE);
        if !path.exists() {
            return Ok(defaults);
        }
        Self::load_from(&path)
    }

    /// Load from an explicit path.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadFile` or `ConfigError::Parse`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config: Self = serde_json::from_str(&contents).map_err(ConfigError::Parse)?;
        Ok(config)
    }

    /// Write the config to `<dir>/config.json` at mode 0600.
    pub fn save(&self) -> Result<()> {
        fsio::ensure_dir(&self.directory)?;
        let contents = serde_json::to_vec_pretty(self).map_err(ConfigError::Parse)?;
        fsio::atomic_write_mode(
            &self.directory.join(DEFAULT_CONFIG_FILE),
            &contents,
            fsio::SECURE_FILE_MODE,
        )
    }

    /// Create the data directory (0700).
    pub fn ensure_directories(&self) -> Result<()> {
        fsio::ensure_dir(&self.directory)
    }

    /// Check bounds and heartbeat completeness.
    pub fn validate(&self) -> Result<()> {
        if self.directory.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "directory",
                message: "cannot be empty",
            }
            .into());
        }
        if self.default_lease_ttl.is_zero() {
            return Err(ConfigError::Invalid {
                field: "default_lease_ttl",
                message: "must be positive",
            }
            .into());
        }
        if self.max_lease_ttl < self.default_lease_ttl {
            return Err(ConfigError::Invalid {
                field: "max_lease_ttl",
                message: "must be >= default_lease_ttl",
            }
            .into());
        }
        if self.rotation_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "rotation_timeout",
                message: "must be positive",
            }
            .into());
        }

        if let Some(hb) = &self.heartbeat {
            if hb.enabled {
                if hb.url.is_empty() {
                    return Err(ConfigError::Invalid {
                        field: "heartbeat.url",
                        message: "required when heartbeat enabled",
                    }
                    .into());
                }
                if hb.interval.is_zero() {
                    return Err(ConfigError::Invalid {
                        field: "heartbeat.interval",
                        message: "must be positive",
                    }
                    .into());
                }
                if hb.timeout.is_zero() {
                    return Err(ConfigError::Invalid {
                        field: "heartbeat.timeout",
                        message: "must be positive",
                    }
                    .into());
                }
            }
        }

        Ok(())
    }
}
