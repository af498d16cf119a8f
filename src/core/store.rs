//! Encrypted secret storage.
//!
//! The whole secret set lives in one age-encrypted JSON document:
//! `{"version": 2, "secrets": {"<namespace>::<name>": {...}}}`. Every
//! mutation re-encrypts and atomically rewrites the file, so a crash
//! leaves either the old document or the new one.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use age::x25519;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::config::Config;
use crate::core::crypto;
use crate::core::fsio;
use crate::core::types::{Secret, SecretRef, DEFAULT_NAMESPACE};
use crate::error::{Result, StoreError};

/// Store document schema versions.
const STORE_VERSION_V1: u32 = 1;
const STORE_VERSION_V2: u32 = 2;

/// Metadata plus the secret value, as stored inside the ciphertext.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSecret {
    #[serde(flatten)]
    meta: Secret,
    value: String,
}

/// The plaintext document inside the encrypted secrets file.
#[derive(Debug, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    secrets: BTreeMap<String, StoredSecret>,
}

struct Inner {
    identity: Option<x25519::Identity>,
    secrets: BTreeMap<String, StoredSecret>,
}

/// Encrypted, namespaced secret store.
///
/// Readers proceed in parallel; any mutation excludes all others and
/// persists before the lock is released.
pub struct Store {
    inner: RwLock<Inner>,
    identity_path: PathBuf,
    secrets_path: PathBuf,
    skip_permission_check: bool,
}

impl Store {
    /// Build a store over the configured paths. Call [`Store::load`] or
    /// [`Store::init`] before use.
    pub fn new(config: &Config) -> Self {
        Self::with_options(config, false)
    }

    /// As [`Store::new`], optionally disabling the permission check.
    pub fn with_options(config: &Config, skip_permission_check: bool) -> Self {
        Self {
            inner: RwLock::new(Inner {
                identity: None,
                secrets: BTreeMap::new(),
            }),
            identity_path: config.identity_path.clone(),
            secrets_path: config.secrets_path.clone(),
            skip_permission_check,
        }
    }

    /// Idempotently create the directory, the identity, and an empty
    /// encrypted document.
    pub fn init(&self) -> Result<()> {
        let mut inner = self.inner.write().expect("store lock poisoned");

        if let Some(parent) = self.identity_path.parent() {
            fsio::ensure_dir(parent)?;
        }

        let identity = if self.identity_path.exists() {
            crypto::load_identity(&self.identity_path)?
        } else {
            info!(path = %self.identity_path.display(), "generating age identity");
            crypto::generate_identity(&self.identity_path)?
        };
        inner.identity = Some(identity);

        if !self.secrets_path.exists() {
            inner.secrets = BTreeMap::new();
            self.save_locked(&inner)?;
        }

        Ok(())
    }

    /// Load the identity and decrypt the secrets document.
    ///
    /// Validates 0600 permissions first (unless the operator override is
    /// set). A missing or empty secrets file yields an empty map. A v1
    /// document is migrated to v2 in memory.
    pub fn load(&self) -> Result<()> {
        let mut inner = self.inner.write().expect("store lock poisoned");

        fsio::validate_key_files(
            &[self.identity_path.as_path(), self.secrets_path.as_path()],
            self.skip_permission_check,
        )?;

        let identity = crypto::load_identity(&self.identity_path)?;

        let ciphertext = match fs::read(&self.secrets_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        if ciphertext.is_empty() {
            inner.identity = Some(identity);
            inner.secrets = BTreeMap::new();
            return Ok(());
        }

        let plaintext = crypto::decrypt(&ciphertext, &identity)?;
        let mut document: StoreDocument = serde_json::from_slice(&plaintext)
            .map_err(|e| StoreError::Corrupted(e.to_string()))?;

        if document.version <= STORE_VERSION_V1 {
            migrate_v1_to_v2(&mut document);
            debug!(secrets = document.secrets.len(), "migrated store document to v2");
        }

        inner.identity = Some(identity);
        inner.secrets = document.secrets;
        Ok(())
    }

    /// Add a new secret; fails if the reference is already present.
    pub fn add(&self, r: &SecretRef, value: &str, rotate_via: Option<String>) -> Result<()> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.require_identity()?;

        let key = r.key();
        if inner.secrets.contains_key(&key) {
            return Err(StoreError::Exists(r.to_string()).into());
        }

        let now = Utc::now();
        inner.secrets.insert(
            key,
            StoredSecret {
                meta: Secret {
                    name: r.name.clone(),
                    namespace: r.namespace.clone(),
                    created_at: now,
                    updated_at: now,
                    rotate_via: rotate_via.filter(|c| !c.is_empty()),
                    last_rotated: None,
                },
                value: value.to_string(),
            },
        );

        self.save_locked(&inner)
    }

    /// Decrypted value of a secret. Callers must never log it.
    pub fn get(&self, r: &SecretRef) -> Result<String> {
        let inner = self.inner.read().expect("store lock poisoned");
        inner.require_identity()?;
        inner
            .secrets
            .get(&r.key())
            .map(|s| s.value.clone())
            .ok_or_else(|| StoreError::NotFound(r.to_string()).into())
    }

    /// Metadata snapshot for one secret.
    pub fn metadata(&self, r: &SecretRef) -> Result<Secret> {
        let inner = self.inner.read().expect("store lock poisoned");
        inner.require_identity()?;
        inner
            .secrets
            .get(&r.key())
            .map(|s| s.meta.clone())
            .ok_or_else(|| StoreError::NotFound(r.to_string()).into())
    }

    /// Overwrite a secret's value; optionally replace its rotation hook.
    ///
    /// `rotate_via`: `None` leaves the hook unchanged; `Some("")` clears it.
    pub fn update(&self, r: &SecretRef, value: &str, rotate_via: Option<String>) -> Result<()> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.require_identity()?;

        let secret = inner
            .secrets
            .get_mut(&r.key())
            .ok_or_else(|| StoreError::NotFound(r.to_string()))?;

        secret.value = value.to_string();
        secret.meta.updated_at = Utc::now();
        if let Some(hook) = rotate_via {
            secret.meta.rotate_via = Some(hook).filter(|c| !c.is_empty());
        }

        self.save_locked(&inner)
    }

    /// Stamp `last_rotated` (and `updated_at`) with the current time.
    pub fn mark_rotated(&self, r: &SecretRef) -> Result<()> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.require_identity()?;

        let secret = inner
            .secrets
            .get_mut(&r.key())
            .ok_or_else(|| StoreError::NotFound(r.to_string()))?;

        let now = Utc::now();
        secret.meta.last_rotated = Some(now);
        secret.meta.updated_at = now;

        self.save_locked(&inner)
    }

    /// Remove a secret.
    pub fn delete(&self, r: &SecretRef) -> Result<()> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.require_identity()?;

        if inner.secrets.remove(&r.key()).is_none() {
            return Err(StoreError::NotFound(r.to_string()).into());
        }

        self.save_locked(&inner)
    }

    /// Metadata projections for every secret, values excluded.
    pub fn list(&self) -> Result<Vec<Secret>> {
        let inner = self.inner.read().expect("store lock poisoned");
        inner.require_identity()?;
        Ok(inner.secrets.values().map(|s| s.meta.clone()).collect())
    }

    /// Number of stored secrets.
    pub fn count(&self) -> Result<usize> {
        let inner = self.inner.read().expect("store lock poisoned");
        inner.require_identity()?;
        Ok(inner.secrets.len())
    }

    /// Replace the map with an empty one and persist.
    pub fn wipe_all(&self) -> Result<()> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.require_identity()?;
        inner.secrets = BTreeMap::new();
        self.save_locked(&inner)
    }

    fn save_locked(&self, inner: &Inner) -> Result<()> {
        let identity = inner.identity.as_ref().ok_or(StoreError::NotInitialized)?;

        let document = StoreDocument {
            version: STORE_VERSION_V2,
            secrets: inner.secrets.clone(),
        };
        let plaintext = serde_json::to_vec_pretty(&document)
            .map_err(|e| StoreError::Corrupted(e.to_string()))?;

        let ciphertext = crypto::encrypt(&plaintext, &identity.to_public())?;
        fsio::atomic_write_mode(&self.secrets_path, &ciphertext, fsio::SECURE_FILE_MODE)
    }
}

impl Inner {
    fn require_identity(&self) -> Result<()> {
        if self.identity.is_none() {
            return Err(StoreError::NotInitialized.into());
        }
        Ok(())
    }
}

/// Re-key a v1 (flat-name) document under namespaced composite keys,
/// stamping the default namespace on entries that lack one.
fn migrate_v1_to_v2(document: &mut StoreDocument) {
    let old = std::mem::take(&mut document.secrets);
    for (name, mut secret) in old {
        if secret.meta.namespace.is_empty() {
            secret.meta.namespace = DEFAULT_NAMESPACE.to_string();
        }
        secret.meta.name = name;
        let key = SecretRef::new(secret.meta.namespace.clone(), secret.meta.name.clone()).key();
        document.secrets.insert(key, secret);
    }
    document.version = STORE_VERSION_V2;
}
