//! JSON-RPC 2.0 wire types for the Unix-socket protocol.
//!
//! Framing is newline-delimited JSON in both directions: one complete
//! request or response document per line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::audit::AuditEntry;
use crate::core::types::{DaemonStatus, KillswitchOptions, Secret};
use crate::error::{CryptoError, Error, LeaseError, RotationError, StoreError};

/// Protocol version stamped on every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

// Method names, all under the `secrets.` namespace.
pub const METHOD_INIT: &str = "secrets.init";
pub const METHOD_ADD: &str = "secrets.add";
pub const METHOD_GET: &str = "secrets.get";
pub const METHOD_UPDATE: &str = "secrets.update";
pub const METHOD_DELETE: &str = "secrets.delete";
pub const METHOD_LIST: &str = "secrets.list";
pub const METHOD_LEASE: &str = "secrets.lease";
pub const METHOD_REVOKE: &str = "secrets.revoke";
pub const METHOD_REVOKE_ALL: &str = "secrets.revokeAll";
pub const METHOD_ROTATE: &str = "secrets.rotate";
pub const METHOD_AUDIT: &str = "secrets.audit";
pub const METHOD_STATUS: &str = "secrets.status";
pub const METHOD_HEALTH: &str = "secrets.health";
pub const METHOD_KILLSWITCH: &str = "secrets.killswitch";

// Standard JSON-RPC error codes.
pub const RPC_PARSE_ERROR: i64 = -32700;
pub const RPC_INVALID_REQUEST: i64 = -32600;
pub const RPC_METHOD_NOT_FOUND: i64 = -32601;
pub const RPC_INVALID_PARAMS: i64 = -32602;
pub const RPC_INTERNAL_ERROR: i64 = -32603;

// Application error codes.
pub const RPC_SECRET_NOT_FOUND: i64 = -32000;
pub const RPC_LEASE_NOT_FOUND: i64 = -32001;
pub const RPC_LEASE_EXPIRED: i64 = -32002;
pub const RPC_ROTATION_FAILED: i64 = -32003;
pub const RPC_ENCRYPTION_ERROR: i64 = -32004;
pub const RPC_DECRYPTION_ERROR: i64 = -32005;
pub const RPC_UNAUTHORIZED: i64 = -32006;

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Value,
}

impl RpcRequest {
    pub fn new(method: &str, params: Option<Value>, id: impl Into<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
            id: id.into(),
        }
    }
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    #[serde(default)]
    pub id: Value,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Map an internal error kind to its stable wire code.
    pub fn from_error(err: &Error) -> Self {
        let code = match err {
            Error::Store(StoreError::NotFound(_)) => RPC_SECRET_NOT_FOUND,
            Error::Lease(LeaseError::NotFound(_)) => RPC_LEASE_NOT_FOUND,
            Error::Lease(LeaseError::Expired(_) | LeaseError::Revoked(_)) => RPC_LEASE_EXPIRED,
            Error::Lease(LeaseError::InvalidTtl(_)) => RPC_INVALID_PARAMS,
            Error::Rotation(
                RotationError::Failed { .. }
                | RotationError::Timeout(_)
                | RotationError::NoHook(_),
            ) => RPC_ROTATION_FAILED,
            Error::Crypto(CryptoError::EncryptionFailed(_)) => RPC_ENCRYPTION_ERROR,
            Error::Crypto(CryptoError::DecryptionFailed(_)) => RPC_DECRYPTION_ERROR,
            Error::Unauthorized(_) => RPC_UNAUTHORIZED,
            Error::InvalidParams(_) => RPC_INVALID_PARAMS,
            _ => RPC_INTERNAL_ERROR,
        };
        Self::new(code, err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Method parameters and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddParams {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate_via: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateParams {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate_via: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteParams {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub secret_name: String,
    pub client_id: String,
    /// Duration string like "1h" or "30m"; empty means the default.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ttl: String,
}

/// Exactly one of the fields selects the revocation scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevokeParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotateParams {
    pub secret_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditParams {
    /// Number of recent entries to return; 0 means the default (100).
    #[serde(default)]
    pub tail: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleResult {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResult {
    pub success: bool,
    pub leases_revoked: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResult {
    pub secrets: Vec<Secret>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseResult {
    pub lease_id: String,
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeResult {
    pub success: bool,
    pub leases_revoked: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResult {
    pub entries: Vec<AuditEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillswitchParams {
    #[serde(flatten)]
    pub options: KillswitchOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthWarning {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResult {
    pub total_secrets: usize,
    pub active_leases: usize,
    pub expiring_soon: usize,
    pub no_rotation_hook: usize,
    pub never_rotated: usize,
    pub warnings: Vec<HealthWarning>,
}

/// Re-exported so wire consumers see one module for every payload type.
pub type StatusResult = DaemonStatus;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_round_trip() {
        let req = RpcRequest::new(
            METHOD_LEASE,
            Some(serde_json::json!({"secret_name": "k", "client_id": "c", "ttl": "1h"})),
            7,
        );
        let line = serde_json::to_string(&req).unwrap();
        let back: RpcRequest = serde_json::from_str(&line).unwrap();
        assert_eq!(back.method, METHOD_LEASE);
        assert_eq!(back.id, serde_json::json!(7));
    }

    #[test]
    fn test_error_code_mapping() {
        let cases: Vec<(Error, i64)> = vec![
            (StoreError::NotFound("x".into()).into(), RPC_SECRET_NOT_FOUND),
            (LeaseError::NotFound("x".into()).into(), RPC_LEASE_NOT_FOUND),
            (LeaseError::Expired("x".into()).into(), RPC_LEASE_EXPIRED),
            (LeaseError::Revoked("x".into()).into(), RPC_LEASE_EXPIRED),
            (LeaseError::InvalidTtl("x".into()).into(), RPC_INVALID_PARAMS),
            (RotationError::NoHook("x".into()).into(), RPC_ROTATION_FAILED),
            (RotationError::Timeout("x".into()).into(), RPC_ROTATION_FAILED),
            (
                CryptoError::EncryptionFailed("x".into()).into(),
                RPC_ENCRYPTION_ERROR,
            ),
            (
                CryptoError::DecryptionFailed("x".into()).into(),
                RPC_DECRYPTION_ERROR,
            ),
            (Error::Unauthorized("x".into()), RPC_UNAUTHORIZED),
            (StoreError::NotInitialized.into(), RPC_INTERNAL_ERROR),
        ];
        for (err, code) in cases {
            assert_eq!(RpcError::from_error(&err).code, code, "for {err}");
        }
    }

    #[test]
    fn test_missing_id_defaults_to_null() {
        let back: RpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"secrets.list"}"#).unwrap();
        assert!(back.id.is_null());
        assert!(back.params.is_none());
    }
}
