//! Lease lifecycle integration tests.

mod support;
use support::Test;

use std::time::Duration;

use chrono::Utc;
use keyward::core::audit::QueryFilter;
use keyward::core::lease::LeaseManager;
use keyward::core::types::AuditAction;

#[test]
fn test_expiry_sweep_scenario() {
    let t = Test::new();
    let stack = t.stack();

    let lease = stack
        .leases
        .acquire("default", "api_key", "agent-1", Some(Duration::from_millis(10)))
        .unwrap();

    std::thread::sleep(Duration::from_millis(100));
    stack.leases.reap_expired();

    assert!(stack.leases.list().is_empty());

    let expirations = stack
        .audit
        .query(&QueryFilter {
            action: Some(AuditAction::LeaseExpire),
            ..QueryFilter::default()
        })
        .unwrap();
    assert_eq!(expirations.len(), 1);
    assert_eq!(expirations[0].lease_id.as_deref(), Some(lease.id.as_str()));
}

#[test]
fn test_ttl_ceiling_invariant() {
    let t = Test::new();
    let stack = t.stack();

    for ttl in [None, Some(Duration::from_secs(60)), Some(Duration::from_secs(86400))] {
        let lease = stack.leases.acquire("default", "k", "c", ttl).unwrap();
        assert!(lease.expires_at > lease.created_at);
        let ceiling = lease.created_at
            + chrono::Duration::from_std(t.config.max_lease_ttl).unwrap();
        assert!(lease.expires_at <= ceiling);
    }
}

#[test]
fn test_lease_ids_are_opaque_and_unique() {
    let t = Test::new();
    let stack = t.stack();

    let mut ids = std::collections::HashSet::new();
    for _ in 0..64 {
        let lease = stack.leases.acquire("default", "k", "c", None).unwrap();
        assert!(ids.insert(lease.id), "duplicate lease id");
    }
}

#[test]
fn test_restart_restores_active_leases_only() {
    let t = Test::new();
    let stack = t.stack();

    let keep = stack.leases.acquire("default", "k", "keeper", None).unwrap();
    let dying = stack
        .leases
        .acquire("default", "k", "short", Some(Duration::from_millis(10)))
        .unwrap();
    let revoked = stack.leases.acquire("default", "k", "victim", None).unwrap();
    stack.leases.revoke(&revoked.id).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    stack.leases.save().unwrap();

    let restored = LeaseManager::new(&t.config, stack.audit.clone()).unwrap();
    let active = restored.list();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, keep.id);
    assert!(restored.get(&dying.id).is_err());
    assert!(restored.get(&revoked.id).is_err());
}

#[test]
fn test_acquire_orders_audit_before_return() {
    let t = Test::new();
    let stack = t.stack();

    let lease = stack.leases.acquire("default", "k", "c", None).unwrap();

    // By the time acquire returned, its audit record must exist.
    let acquisitions = stack
        .audit
        .query(&QueryFilter {
            action: Some(AuditAction::LeaseAcquire),
            ..QueryFilter::default()
        })
        .unwrap();
    assert!(acquisitions
        .iter()
        .any(|e| e.lease_id.as_deref() == Some(lease.id.as_str())));
    assert!(acquisitions[0].timestamp <= Utc::now());
}

#[test]
fn test_revocation_takes_effect_immediately() {
    let t = Test::new();
    let stack = t.stack();

    let lease = stack.leases.acquire("default", "k", "c", None).unwrap();
    stack.leases.revoke(&lease.id).unwrap();

    // No grace window: the flag is visible as soon as revoke returns.
    assert!(stack.leases.get(&lease.id).unwrap().revoked);
    assert!(stack.leases.list().is_empty());
}
