//! Shared domain types.
//!
//! Everything that crosses a subsystem boundary lives here: secret
//! references and metadata, leases, audit actions, rotation results, and
//! the killswitch/heartbeat/status structs.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::duration::duration_str;

/// The reserved namespace applied to bare secret names.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Separator between namespace and name in external references.
pub const NAMESPACE_DELIMITER: &str = "::";

/// A parsed `namespace::name` secret reference.
///
/// Bare names resolve to the [`DEFAULT_NAMESPACE`]. Only the first `::`
/// splits, so names may themselves contain `::`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretRef {
    pub namespace: String,
    pub name: String,
}

impl SecretRef {
    /// Build a reference from explicit parts.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parse an external reference, defaulting the namespace.
    pub fn parse(reference: &str) -> Self {
        match reference.split_once(NAMESPACE_DELIMITER) {
            Some((namespace, name)) => Self::new(namespace, name),
            None => Self::new(DEFAULT_NAMESPACE, reference),
        }
    }

    /// The composite key used for internal storage, always namespaced.
    pub fn key(&self) -> String {
        format!("{}{}{}", self.namespace, NAMESPACE_DELIMITER, self.name)
    }
}

impl fmt::Display for SecretRef {
    /// External form: bare name for the default namespace.
    ///
    /// A default-namespace name that itself contains `::` stays fully
    /// qualified, otherwise parsing the bare form would split it.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace == DEFAULT_NAMESPACE && !self.name.contains(NAMESPACE_DELIMITER) {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}{}{}", self.namespace, NAMESPACE_DELIMITER, self.name)
        }
    }
}

/// Secret metadata. The value never travels with this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate_via: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_rotated: Option<DateTime<Utc>>,
}

impl Secret {
    /// Reference for this secret.
    pub fn secret_ref(&self) -> SecretRef {
        SecretRef::new(self.namespace.clone(), self.name.clone())
    }

    /// Whether a non-empty rotation hook is configured.
    pub fn has_rotation_hook(&self) -> bool {
        self.rotate_via.as_deref().is_some_and(|c| !c.is_empty())
    }
}

/// A time-bounded access grant to a secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    pub id: String,
    pub namespace: String,
    pub secret_name: String,
    pub client_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl Lease {
    /// True once `expires_at` has passed.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Active means neither revoked nor expired at the instant observed.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired_at(now)
    }

    /// Duration until expiry; zero once expired or revoked.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
        if self.revoked {
            return Duration::ZERO;
        }
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// The closed set of audited actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    SecretAdd,
    SecretDelete,
    SecretRotate,
    LeaseAcquire,
    LeaseRevoke,
    LeaseExpire,
    Killswitch,
    DaemonStart,
    DaemonStop,
    HeartbeatFail,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            AuditAction::SecretAdd => "secret_add",
            AuditAction::SecretDelete => "secret_delete",
            AuditAction::SecretRotate => "secret_rotate",
            AuditAction::LeaseAcquire => "lease_acquire",
            AuditAction::LeaseRevoke => "lease_revoke",
            AuditAction::LeaseExpire => "lease_expire",
            AuditAction::Killswitch => "killswitch",
            AuditAction::DaemonStart => "daemon_start",
            AuditAction::DaemonStop => "daemon_stop",
            AuditAction::HeartbeatFail => "heartbeat_fail",
        };
        f.write_str(tag)
    }
}

/// Outcome of one rotation hook execution.
///
/// Returned for every hook that actually ran, success or not, so callers
/// always have the diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationResult {
    pub secret_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub timed_out: bool,
    pub executed_at: DateTime<Utc>,
}

/// Which killswitch sub-operations to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillswitchOptions {
    #[serde(default)]
    pub revoke_all: bool,
    #[serde(default)]
    pub rotate_all: bool,
    #[serde(default)]
    pub wipe_store: bool,
}

impl KillswitchOptions {
    /// True when no sub-operation is selected.
    pub fn is_empty(&self) -> bool {
        !(self.revoke_all || self.rotate_all || self.wipe_store)
    }
}

/// Optional remote heartbeat monitoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
    #[serde(with = "duration_str")]
    pub interval: Duration,
    #[serde(with = "duration_str")]
    pub timeout: Duration,
    #[serde(default)]
    pub fail_action: KillswitchOptions,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            interval: Duration::from_secs(60),
            timeout: Duration::from_secs(10),
            fail_action: KillswitchOptions::default(),
        }
    }
}

/// Daemon status snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub running: bool,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub secrets_count: usize,
    pub active_leases: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat: Option<HeartbeatConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_name_defaults_namespace() {
        let r = SecretRef::parse("api_key");
        assert_eq!(r.namespace, "default");
        assert_eq!(r.name, "api_key");
    }

    #[test]
    fn test_parse_namespaced() {
        let r = SecretRef::parse("prod::github_token");
        assert_eq!(r.namespace, "prod");
        assert_eq!(r.name, "github_token");
    }

    #[test]
    fn test_parse_splits_first_delimiter_only() {
        let r = SecretRef::parse("prod::a::b");
        assert_eq!(r.namespace, "prod");
        assert_eq!(r.name, "a::b");
    }

    #[test]
    fn test_display_round_trip() {
        for s in ["api_key", "prod::github", "prod::a::b"] {
            let r = SecretRef::parse(s);
            assert_eq!(SecretRef::parse(&r.to_string()), r);
        }
    }

    #[test]
    fn test_display_default_namespace_is_bare() {
        let r = SecretRef::new("default", "api_key");
        assert_eq!(r.to_string(), "api_key");
        assert_eq!(r.key(), "default::api_key");
    }

    #[test]
    fn test_lease_active_window() {
        let now = Utc::now();
        let lease = Lease {
            id: "x".to_string(),
            namespace: "default".to_string(),
            secret_name: "k".to_string(),
            client_id: "c".to_string(),
            created_at: now,
            expires_at: now + chrono::Duration::seconds(60),
            revoked: false,
        };
        assert!(lease.is_active_at(now));
        assert!(!lease.is_active_at(now + chrono::Duration::seconds(61)));

        let mut revoked = lease.clone();
        revoked.revoked = true;
        assert!(!revoked.is_active_at(now));
        assert_eq!(revoked.time_remaining(now), Duration::ZERO);
    }

    #[test]
    fn test_audit_action_wire_tags() {
        let json = serde_json::to_string(&AuditAction::LeaseExpire).unwrap();
        assert_eq!(json, "\"lease_expire\"");
        let back: AuditAction = serde_json::from_str("\"heartbeat_fail\"").unwrap();
        assert_eq!(back, AuditAction::HeartbeatFail);
        assert_eq!(AuditAction::SecretRotate.to_string(), "secret_rotate");
    }
}
