//! Lease issuance, tracking, expiry, and revocation.
//!
//! The manager owns the lease map behind an `RwLock`. Every mutation
//! persists the currently-active set to `leases.json` (0600) so leases
//! survive a daemon restart; revoked or expired leases are dropped both
//! at persist time and at load time.
//!
//! A lease that has passed `expires_at` is already inactive even before
//! the reaper has swept it; the reaper's job is the `lease_expire` audit
//! record and memory reclamation, not the deactivation itself.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::audit::{AuditEntry, AuditLogger};
use crate::core::config::Config;
use crate::core::duration::format_duration;
use crate::core::fsio;
use crate::core::types::{AuditAction, Lease};
use crate::error::{LeaseError, Result};

/// Default reaper tick.
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(60);

struct ReaperHandle {
    stop_tx: Sender<()>,
    join: JoinHandle<()>,
}

/// Issues and tracks time-bounded leases.
pub struct LeaseManager {
    leases: RwLock<HashMap<String, Lease>>,
    leases_path: PathBuf,
    default_ttl: Duration,
    max_ttl: Duration,
    audit: Arc<AuditLogger>,
    reaper: Mutex<Option<ReaperHandle>>,
}

impl LeaseManager {
    /// Create a manager and restore persisted leases.
    ///
    /// A missing leases file is not an error; revoked or already-expired
    /// entries are dropped during restore.
    pub fn new(config: &Config, audit: Arc<AuditLogger>) -> Result<Self> {
        let manager = Self {
            leases: RwLock::new(HashMap::new()),
            leases_path: config.leases_path.clone(),
            default_ttl: config.default_lease_ttl,
            max_ttl: config.max_lease_ttl,
            audit,
            reaper: Mutex::new(None),
        };
        manager.load()?;
        Ok(manager)
    }

    /// Mint a lease for `client_id` on a secret.
    ///
    /// A zero/absent TTL becomes the configured default; a TTL above the
    /// configured maximum is refused with `LeaseError::InvalidTtl` and the
    /// refusal is audited.
    pub fn acquire(
        &self,
        namespace: &str,
        secret_name: &str,
        client_id: &str,
        ttl: Option<Duration>,
    ) -> Result<Lease> {
        let ttl = match ttl {
            None => self.default_ttl,
            Some(d) if d.is_zero() => self.default_ttl,
            Some(d) => d,
        };

        if ttl > self.max_ttl {
            let entry = AuditEntry::new(AuditAction::LeaseAcquire, false)
                .namespace(namespace)
                .secret(secret_name)
                .client(client_id)
                .details(format!(
                    "TTL {} exceeds max {}",
                    format_duration(ttl),
                    format_duration(self.max_ttl)
                ));
            self.log_best_effort(&entry);
            return Err(LeaseError::InvalidTtl(format!(
                "{} exceeds max {}",
                format_duration(ttl),
                format_duration(self.max_ttl)
            ))
            .into());
        }

        let now = Utc::now();
        let lease = Lease {
            id: Uuid::new_v4().to_string(),
            namespace: namespace.to_string(),
            secret_name: secret_name.to_string(),
            client_id: client_id.to_string(),
            created_at: now,
            expires_at: now
                + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            revoked: false,
        };

        {
            let mut leases = self.leases.write().expect("lease lock poisoned");
            leases.insert(lease.id.clone(), lease.clone());
        }
        self.persist_best_effort();

        let entry = AuditEntry::new(AuditAction::LeaseAcquire, true)
            .namespace(namespace)
            .secret(secret_name)
            .client(client_id)
            .lease(lease.id.clone())
            .details(format!("TTL: {}", format_duration(ttl)));
        self.log_best_effort(&entry);

        Ok(lease)
    }

    /// Snapshot of a lease by id.
    pub fn get(&self, lease_id: &str) -> Result<Lease> {
        let leases = self.leases.read().expect("lease lock poisoned");
        leases
            .get(lease_id)
            .cloned()
            .ok_or_else(|| LeaseError::NotFound(lease_id.to_string()).into())
    }

    /// All leases that are neither revoked nor past expiry right now.
    pub fn list(&self) -> Vec<Lease> {
        let now = Utc::now();
        let leases = self.leases.read().expect("lease lock poisoned");
        leases
            .values()
            .filter(|l| l.is_active_at(now))
            .cloned()
            .collect()
    }

    /// Number of active leases.
    pub fn active_count(&self) -> usize {
        self.list().len()
    }

    /// Flip a single lease to revoked. Unknown ids are audited failures.
    pub fn revoke(&self, lease_id: &str) -> Result<()> {
        let revoked = {
            let mut leases = self.leases.write().expect("lease lock poisoned");
            match leases.get_mut(lease_id) {
                Some(lease) => {
                    lease.revoked = true;
                    Some(lease.clone())
                }
                None => None,
            }
        };

        let Some(lease) = revoked else {
            let entry = AuditEntry::new(AuditAction::LeaseRevoke, false)
                .lease(lease_id)
                .details("lease not found");
            self.log_best_effort(&entry);
            return Err(LeaseError::NotFound(lease_id.to_string()).into());
        };

        self.persist_best_effort();

        let entry = AuditEntry::new(AuditAction::LeaseRevoke, true)
            .namespace(lease.namespace)
            .secret(lease.secret_name)
            .client(lease.client_id)
            .lease(lease_id);
        self.log_best_effort(&entry);

        Ok(())
    }

    /// Revoke every non-revoked lease on `namespace::secret_name`.
    /// Returns the number flipped.
    pub fn revoke_by_secret(&self, namespace: &str, secret_name: &str) -> usize {
        let count = self.revoke_where(|l| l.namespace == namespace && l.secret_name == secret_name);

        let entry = AuditEntry::new(AuditAction::LeaseRevoke, true)
            .namespace(namespace)
            .secret(secret_name)
            .details(format!("revoked {count} leases"));
        self.log_best_effort(&entry);

        count
    }

    /// Revoke every non-revoked lease in `namespace`. Returns the count.
    pub fn revoke_by_namespace(&self, namespace: &str) -> usize {
        let count = self.revoke_where(|l| l.namespace == namespace);

        let entry = AuditEntry::new(AuditAction::LeaseRevoke, true)
            .namespace(namespace)
            .details(format!("revoked {count} leases in namespace"));
        self.log_best_effort(&entry);

        count
    }

    /// Revoke every non-revoked lease. Returns the count.
    pub fn revoke_all(&self) -> usize {
        let count = self.revoke_where(|_| true);

        let entry = AuditEntry::new(AuditAction::LeaseRevoke, true)
            .details(format!("revoked {count} leases"));
        self.log_best_effort(&entry);

        count
    }

    fn revoke_where(&self, predicate: impl Fn(&Lease) -> bool) -> usize {
        let mut count = 0;
        {
            let mut leases = self.leases.write().expect("lease lock poisoned");
            for lease in leases.values_mut() {
                if !lease.revoked && predicate(lease) {
                    lease.revoked = true;
                    count += 1;
                }
            }
        }
        self.persist_best_effort();
        count
    }

    /// One reaper sweep: audit and drop every lease past its expiry.
    ///
    /// Expiry is a lifecycle endpoint, not a revocation: it gets its own
    /// `lease_expire` action tag.
    pub fn reap_expired(&self) {
        let now = Utc::now();
        let expired: Vec<Lease> = {
            let mut leases = self.leases.write().expect("lease lock poisoned");
            let ids: Vec<String> = leases
                .values()
                .filter(|l| !l.revoked && l.is_expired_at(now))
                .map(|l| l.id.clone())
                .collect();
            ids.iter().filter_map(|id| leases.remove(id)).collect()
        };

        if expired.is_empty() {
            return;
        }

        for lease in &expired {
            let entry = AuditEntry::new(AuditAction::LeaseExpire, true)
                .namespace(lease.namespace.clone())
                .secret(lease.secret_name.clone())
                .client(lease.client_id.clone())
                .lease(lease.id.clone());
            self.log_best_effort(&entry);
        }
        debug!(count = expired.len(), "reaped expired leases");
        self.persist_best_effort();
    }

    /// Start the background reaper. Idempotent.
    pub fn start_reaper(self: &Arc<Self>, interval: Duration) {
        let mut guard = self.reaper.lock().expect("reaper handle lock poisoned");
        if guard.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let manager = Arc::clone(self);
        let join = std::thread::Builder::new()
            .name("lease-reaper".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => manager.reap_expired(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                }
            })
            .expect("failed to spawn lease reaper");

        *guard = Some(ReaperHandle { stop_tx, join });
    }

    /// Stop the reaper and wait for it to exit. Idempotent.
    pub fn stop_reaper(&self) {
        let handle = self.reaper.lock().expect("reaper handle lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.stop_tx.send(());
            let _ = handle.join.join();
        }
    }

    /// Persist the active set (not revoked, not expired) to disk.
    pub fn save(&self) -> Result<()> {
        let now = Utc::now();
        let active: Vec<Lease> = {
            let leases = self.leases.read().expect("lease lock poisoned");
            leases
                .values()
                .filter(|l| l.is_active_at(now))
                .cloned()
                .collect()
        };

        let data = serde_json::to_vec_pretty(&active)
            .map_err(|e| crate::error::Error::Other(format!("lease encode: {e}")))?;
        fsio::atomic_write_mode(&self.leases_path, &data, fsio::SECURE_FILE_MODE)
    }

    fn load(&self) -> Result<()> {
        let data = match fs::read(&self.leases_path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if data.is_empty() {
            return Ok(());
        }

        let persisted: Vec<Lease> = serde_json::from_slice(&data)
            .map_err(|e| crate::error::Error::Other(format!("lease decode: {e}")))?;

        let now = Utc::now();
        let mut leases = self.leases.write().expect("lease lock poisoned");
        for lease in persisted {
            if lease.is_active_at(now) {
                leases.insert(lease.id.clone(), lease);
            }
        }
        Ok(())
    }

    fn persist_best_effort(&self) {
        if let Err(e) = self.save() {
            warn!(error = %e, "failed to persist leases");
        }
    }

    fn log_best_effort(&self, entry: &AuditEntry) {
        if let Err(e) = self.audit.log(entry) {
            warn!(error = %e, "failed to write audit entry");
        }
    }
}
