//! Emergency revocation.
//!
//! The killswitch composes up to three sub-operations in a fixed order:
//! revoke (agents lose access now), rotate (outstanding copies die at the
//! provider), wipe (local evidence goes). Sub-operations never
//! short-circuit; failures are accumulated and reported together.

use std::sync::Arc;

use tracing::warn;

use crate::core::audit::{AuditEntry, AuditLogger};
use crate::core::lease::LeaseManager;
use crate::core::rotation::RotationExecutor;
use crate::core::store::Store;
use crate::core::types::{AuditAction, KillswitchOptions};
use crate::error::{Error, Result};

/// Composite emergency action across the lease manager, rotation
/// executor, and store.
pub struct Killswitch {
    leases: Arc<LeaseManager>,
    rotation: Arc<RotationExecutor>,
    store: Arc<Store>,
    audit: Arc<AuditLogger>,
}

impl Killswitch {
    pub fn new(
        leases: Arc<LeaseManager>,
        rotation: Arc<RotationExecutor>,
        store: Arc<Store>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self {
            leases,
            rotation,
            store,
            audit,
        }
    }

    /// Run the selected sub-operations in order revoke → rotate → wipe.
    ///
    /// Exactly one `killswitch` audit record is written per activation,
    /// successful or not. On partial failure the returned error
    /// enumerates each sub-failure.
    pub fn activate(&self, options: KillswitchOptions) -> Result<()> {
        let mut failures: Vec<String> = Vec::new();
        let mut summary: Vec<String> = Vec::new();

        if options.revoke_all {
            // The per-count detail lives in the lease_revoke record.
            self.leases.revoke_all();
            summary.push("all leases revoked".to_string());
        }

        if options.rotate_all {
            match self.rotation.rotate_all() {
                Ok(results) => {
                    let rotated = results.iter().filter(|r| r.success).count();
                    let failed = results.len() - rotated;
                    if failed > 0 {
                        failures.push(format!("rotate: {failed} hook(s) failed"));
                    }
                    summary.push(format!("rotated {rotated} secrets ({failed} failed)"));
                }
                Err(e) => failures.push(format!("rotate failed: {e}")),
            }
        }

        if options.wipe_store {
            match self.store.wipe_all() {
                Ok(()) => summary.push("store wiped".to_string()),
                Err(e) => failures.push(format!("wipe failed: {e}")),
            }
        }

        let success = failures.is_empty();
        let entry = AuditEntry::new(AuditAction::Killswitch, success).details(summary.join("; "));
        if let Err(e) = self.audit.log(&entry) {
            warn!(error = %e, "failed to write killswitch audit entry");
        }

        if success {
            Ok(())
        } else {
            Err(Error::Killswitch(failures.join("; ")))
        }
    }
}
