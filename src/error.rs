//! Error types for keyward.
//!
//! Each subsystem has its own error family; the top-level [`Error`] wraps
//! them transparently so call sites can use `?` across subsystem seams.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("config: {field} {message}")]
    Invalid { field: &'static str, message: &'static str },
}

/// Cryptographic operation errors.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("invalid age identity: {0}")]
    InvalidIdentity(String),

    #[error("identity file not found: {0}")]
    IdentityNotFound(PathBuf),
}

/// Encrypted store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("secret already exists: {0}")]
    Exists(String),

    #[error("store not initialized: run `keyward init` first")]
    NotInitialized,

    #[error("store data corrupted: {0}")]
    Corrupted(String),

    #[error(
        "insecure permissions on {path}: mode {mode:04o}, expected 0600 \
         (fix with: chmod 600 {path})"
    )]
    PermissionInsecure { path: String, mode: u32 },
}

/// Lease lifecycle errors.
#[derive(Error, Debug)]
pub enum LeaseError {
    #[error("lease not found: {0}")]
    NotFound(String),

    #[error("lease has expired: {0}")]
    Expired(String),

    #[error("lease has been revoked: {0}")]
    Revoked(String),

    #[error("invalid TTL: {0}")]
    InvalidTtl(String),
}

/// Rotation hook errors for hooks that never ran.
///
/// A hook that *did* run reports failure through the structured
/// [`RotationResult`](crate::core::types::RotationResult) instead.
#[derive(Error, Debug)]
pub enum RotationError {
    #[error("no rotation hook configured for secret {0}")]
    NoHook(String),

    #[error("rotation of secret {name} failed: {reason}")]
    Failed { name: String, reason: String },

    #[error("rotation of secret {0} timed out")]
    Timeout(String),
}

/// Daemon and transport errors.
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("daemon is not running")]
    NotRunning,

    #[error("daemon is already running")]
    AlreadyRunning,

    #[error("socket file already exists: {0}")]
    SocketExists(PathBuf),

    #[error(
        "connection to daemon failed: {0} (is the daemon running? start it with `keyward serve`)"
    )]
    ConnectionFailed(String),
}

/// Top-level keyward error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lease(#[from] LeaseError),

    #[error(transparent)]
    Rotation(#[from] RotationError),

    #[error(transparent)]
    Daemon(#[from] DaemonError),

    #[error("heartbeat check failed: {0}")]
    Heartbeat(String),

    #[error("killswitch partial failure: {0}")]
    Killswitch(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    InvalidParams(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for keyward operations.
pub type Result<T> = std::result::Result<T, Error>;
