//! Request handlers.
//!
//! Each request is decoded into a typed command and routed to exactly one
//! subsystem. `secrets.get` is refused unconditionally: values only leave
//! the store through the lease path.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use tracing::warn;

use crate::core::audit::{AuditEntry, AuditLogger};
use crate::core::config::Config;
use crate::core::duration::parse_duration;
use crate::core::killswitch::Killswitch;
use crate::core::lease::LeaseManager;
use crate::core::rotation::RotationExecutor;
use crate::core::store::Store;
use crate::core::types::{AuditAction, DaemonStatus, SecretRef};
use crate::error::Error;

use super::protocol::*;

/// Dispatches decoded requests to the owning subsystem.
pub struct Handler {
    store: Arc<Store>,
    leases: Arc<LeaseManager>,
    rotation: Arc<RotationExecutor>,
    killswitch: Arc<Killswitch>,
    audit: Arc<AuditLogger>,
    config: Config,
    started_at: Arc<Mutex<DateTime<Utc>>>,
}

impl Handler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        leases: Arc<LeaseManager>,
        rotation: Arc<RotationExecutor>,
        killswitch: Arc<Killswitch>,
        audit: Arc<AuditLogger>,
        config: Config,
        started_at: Arc<Mutex<DateTime<Utc>>>,
    ) -> Self {
        Self {
            store,
            leases,
            rotation,
            killswitch,
            audit,
            config,
            started_at,
        }
    }

    /// Handle one request, producing exactly one response.
    pub fn handle(&self, req: &RpcRequest) -> RpcResponse {
        if req.jsonrpc != JSONRPC_VERSION {
            return RpcResponse::failure(
                req.id.clone(),
                RpcError::new(
                    RPC_INVALID_REQUEST,
                    format!("unsupported jsonrpc version {:?}", req.jsonrpc),
                ),
            );
        }

        let outcome = match req.method.as_str() {
            METHOD_INIT => self.handle_init(),
            METHOD_ADD => self.handle_add(&req.params),
            METHOD_GET => Err(Error::Unauthorized(
                "direct secret access not allowed; use secrets.lease instead".to_string(),
            )),
            METHOD_UPDATE => self.handle_update(&req.params),
            METHOD_DELETE => self.handle_delete(&req.params),
            METHOD_LIST => self.handle_list(),
            METHOD_LEASE => self.handle_lease(&req.params),
            METHOD_REVOKE => self.handle_revoke(&req.params),
            METHOD_REVOKE_ALL => self.handle_revoke_all(),
            METHOD_ROTATE => return self.handle_rotate(req),
            METHOD_AUDIT => self.handle_audit(&req.params),
            METHOD_STATUS => self.handle_status(),
            METHOD_HEALTH => self.handle_health(),
            METHOD_KILLSWITCH => self.handle_killswitch(&req.params),
            other => {
                return RpcResponse::failure(
                    req.id.clone(),
                    RpcError::new(
                        RPC_METHOD_NOT_FOUND,
                        format!("method {other:?} not found"),
                    ),
                );
            }
        };

        match outcome {
            Ok(result) => RpcResponse::success(req.id.clone(), result),
            Err(e) => RpcResponse::failure(req.id.clone(), RpcError::from_error(&e)),
        }
    }

    fn handle_init(&self) -> Result<Value, Error> {
        self.store.init()?;
        encode(&SimpleResult {
            success: true,
            message: "store initialized".to_string(),
        })
    }

    fn handle_add(&self, params: &Option<Value>) -> Result<Value, Error> {
        let p: AddParams = decode(params)?;
        require(!p.name.is_empty(), "name is required")?;
        require(!p.value.is_empty(), "value is required")?;

        let r = SecretRef::parse(&p.name);
        let added = self.store.add(&r, &p.value, p.rotate_via);

        let entry = AuditEntry::new(AuditAction::SecretAdd, added.is_ok())
            .namespace(r.namespace.clone())
            .secret(r.name.clone());
        let entry = match &added {
            Ok(()) => entry,
            Err(e) => entry.details(e.to_string()),
        };
        self.log_best_effort(&entry);
        added?;

        encode(&SimpleResult {
            success: true,
            message: format!("secret {r} added"),
        })
    }

    fn handle_update(&self, params: &Option<Value>) -> Result<Value, Error> {
        let p: UpdateParams = decode(params)?;
        require(!p.name.is_empty(), "name is required")?;
        require(!p.value.is_empty(), "value is required")?;

        let r = SecretRef::parse(&p.name);
        self.store.update(&r, &p.value, p.rotate_via)?;

        encode(&SimpleResult {
            success: true,
            message: format!("secret {r} updated"),
        })
    }

    fn handle_delete(&self, params: &Option<Value>) -> Result<Value, Error> {
        let p: DeleteParams = decode(params)?;
        require(!p.name.is_empty(), "name is required")?;

        let r = SecretRef::parse(&p.name);
        // Cut off every holder before the secret disappears.
        let leases_revoked = self.leases.revoke_by_secret(&r.namespace, &r.name);
        let deleted = self.store.delete(&r);

        let entry = AuditEntry::new(AuditAction::SecretDelete, deleted.is_ok())
            .namespace(r.namespace.clone())
            .secret(r.name.clone())
            .details(match &deleted {
                Ok(()) => format!("revoked {leases_revoked} leases"),
                Err(e) => e.to_string(),
            });
        self.log_best_effort(&entry);
        deleted?;

        encode(&DeleteResult {
            success: true,
            leases_revoked,
            message: format!("secret {r} deleted"),
        })
    }

    fn handle_list(&self) -> Result<Value, Error> {
        let secrets = self.store.list()?;
        encode(&ListResult { secrets })
    }

    fn handle_lease(&self, params: &Option<Value>) -> Result<Value, Error> {
        let p: LeaseParams = decode(params)?;
        require(!p.secret_name.is_empty(), "secret_name is required")?;
        require(!p.client_id.is_empty(), "client_id is required")?;

        let r = match &p.namespace {
            Some(namespace) => SecretRef::new(namespace.clone(), p.secret_name.clone()),
            None => SecretRef::parse(&p.secret_name),
        };

        let ttl = if p.ttl.is_empty() {
            None
        } else {
            Some(parse_duration(&p.ttl).map_err(|_| {
                Error::Lease(crate::error::LeaseError::InvalidTtl(p.ttl.clone()))
            })?)
        };

        // Value first: a lease is only minted for a secret that exists.
        let value = self.store.get(&r)?;
        let lease = self
            .leases
            .acquire(&r.namespace, &r.name, &p.client_id, ttl)?;

        encode(&LeaseResult {
            lease_id: lease.id,
            value,
            expires_at: lease.expires_at,
        })
    }

    fn handle_revoke(&self, params: &Option<Value>) -> Result<Value, Error> {
        let p: RevokeParams = decode(params)?;
        let selected =
            usize::from(p.lease_id.is_some()) + usize::from(p.secret.is_some())
                + usize::from(p.namespace.is_some());
        require(
            selected == 1,
            "exactly one of lease_id, secret, or namespace is required",
        )?;

        if let Some(lease_id) = &p.lease_id {
            self.leases.revoke(lease_id)?;
            return encode(&RevokeResult {
                success: true,
                leases_revoked: 1,
                message: format!("lease {lease_id} revoked"),
            });
        }

        let (count, scope) = if let Some(secret) = &p.secret {
            let r = SecretRef::parse(secret);
            (
                self.leases.revoke_by_secret(&r.namespace, &r.name),
                format!("secret {r}"),
            )
        } else {
            let namespace = p.namespace.as_deref().unwrap_or_default();
            (
                self.leases.revoke_by_namespace(namespace),
                format!("namespace {namespace}"),
            )
        };

        encode(&RevokeResult {
            success: true,
            leases_revoked: count,
            message: format!("revoked {count} leases for {scope}"),
        })
    }

    fn handle_revoke_all(&self) -> Result<Value, Error> {
        let count = self.leases.active_count();
        self.killswitch.activate(crate::core::types::KillswitchOptions {
            revoke_all: true,
            ..Default::default()
        })?;

        encode(&RevokeResult {
            success: true,
            leases_revoked: count,
            message: format!("all {count} active leases revoked"),
        })
    }

    // Rotation needs the raw request because a hook that ran and failed
    // still ships its structured result, as JSON-RPC error data.
    fn handle_rotate(&self, req: &RpcRequest) -> RpcResponse {
        let p: RotateParams = match decode(&req.params) {
            Ok(p) => p,
            Err(e) => return RpcResponse::failure(req.id.clone(), RpcError::from_error(&e)),
        };
        if p.secret_name.is_empty() {
            return RpcResponse::failure(
                req.id.clone(),
                RpcError::new(RPC_INVALID_PARAMS, "secret_name is required"),
            );
        }

        let r = SecretRef::parse(&p.secret_name);
        match self.rotation.rotate(&r) {
            Ok(result) if result.success => match encode(&result) {
                Ok(value) => RpcResponse::success(req.id.clone(), value),
                Err(e) => RpcResponse::failure(req.id.clone(), RpcError::from_error(&e)),
            },
            Ok(result) => {
                let message = result
                    .error
                    .clone()
                    .unwrap_or_else(|| "rotation failed".to_string());
                let data = serde_json::to_value(&result).unwrap_or(Value::Null);
                RpcResponse::failure(
                    req.id.clone(),
                    RpcError::new(RPC_ROTATION_FAILED, message).with_data(data),
                )
            }
            Err(e) => RpcResponse::failure(req.id.clone(), RpcError::from_error(&e)),
        }
    }

    fn handle_audit(&self, params: &Option<Value>) -> Result<Value, Error> {
        let p: AuditParams = match params {
            Some(_) => decode(params)?,
            None => AuditParams::default(),
        };
        let tail = if p.tail == 0 { 100 } else { p.tail };
        let entries = self.audit.tail(tail)?;
        encode(&AuditResult { entries })
    }

    fn handle_status(&self) -> Result<Value, Error> {
        let status = DaemonStatus {
            running: true,
            pid: std::process::id(),
            started_at: *self.started_at.lock().expect("status clock poisoned"),
            secrets_count: self.store.count()?,
            active_leases: self.leases.active_count(),
            heartbeat: self.config.heartbeat.clone(),
        };
        encode(&status)
    }

    fn handle_health(&self) -> Result<Value, Error> {
        let secrets = self.store.list()?;
        let leases = self.leases.list();
        let now = Utc::now();
        let soon = now + ChronoDuration::hours(1);

        let mut warnings = Vec::new();

        let expiring_soon = leases.iter().filter(|l| l.expires_at <= soon).count();
        for lease in leases.iter().filter(|l| l.expires_at <= soon) {
            warnings.push(HealthWarning {
                kind: "expiring_soon".to_string(),
                secret_name: Some(lease.secret_name.clone()),
                message: format!(
                    "lease {} for {} expires at {}",
                    lease.id, lease.secret_name, lease.expires_at
                ),
            });
        }

        let no_rotation_hook = secrets.iter().filter(|s| !s.has_rotation_hook()).count();
        for secret in secrets.iter().filter(|s| !s.has_rotation_hook()) {
            warnings.push(HealthWarning {
                kind: "no_rotation_hook".to_string(),
                secret_name: Some(secret.secret_ref().to_string()),
                message: format!("secret {} has no rotation hook", secret.secret_ref()),
            });
        }

        let never_rotated = secrets
            .iter()
            .filter(|s| s.has_rotation_hook() && s.last_rotated.is_none())
            .count();

        encode(&HealthResult {
            total_secrets: secrets.len(),
            active_leases: leases.len(),
            expiring_soon,
            no_rotation_hook,
            never_rotated,
            warnings,
        })
    }

    fn handle_killswitch(&self, params: &Option<Value>) -> Result<Value, Error> {
        let p: KillswitchParams = decode(params)?;
        require(
            !p.options.is_empty(),
            "at least one of revoke_all, rotate_all, wipe_store is required",
        )?;

        self.killswitch.activate(p.options)?;
        encode(&SimpleResult {
            success: true,
            message: "killswitch activated".to_string(),
        })
    }

    fn log_best_effort(&self, entry: &AuditEntry) {
        if let Err(e) = self.audit.log(entry) {
            warn!(error = %e, "failed to write audit entry");
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(params: &Option<Value>) -> Result<T, Error> {
    let value = params
        .clone()
        .ok_or_else(|| invalid_params("parameters are required"))?;
    serde_json::from_value(value).map_err(|e| invalid_params(format!("invalid parameters: {e}")))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|e| Error::Other(format!("encode response: {e}")))
}

fn require(condition: bool, message: &str) -> Result<(), Error> {
    if condition {
        Ok(())
    } else {
        Err(invalid_params(message))
    }
}

/// Parameter problems carry the JSON-RPC invalid-params code.
fn invalid_params(message: impl Into<String>) -> Error {
    Error::InvalidParams(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_params_maps_to_wire_code() {
        let err = invalid_params("name is required");
        let rpc = RpcError::from_error(&err);
        assert_eq!(rpc.code, RPC_INVALID_PARAMS);
        assert_eq!(rpc.message, "name is required");
    }
}
