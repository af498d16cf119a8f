//! Encrypted store integration tests.
//!
//! Persistence idempotence, at-rest secrecy, and the reference-parsing
//! laws the wire protocol depends on.

mod support;
use support::Test;

use proptest::prelude::*;

use keyward::core::store::Store;
use keyward::core::types::SecretRef;

#[test]
fn test_restart_preserves_post_mutation_state() {
    let t = Test::new();
    let stack = t.stack();

    stack
        .store
        .add(&SecretRef::parse("api_key"), "v1", None)
        .unwrap();
    stack
        .store
        .add(
            &SecretRef::parse("prod::github"),
            "tok",
            Some("echo rotate".to_string()),
        )
        .unwrap();
    stack
        .store
        .update(&SecretRef::parse("api_key"), "v2", None)
        .unwrap();
    stack.store.delete(&SecretRef::parse("prod::github")).unwrap();

    // Fresh process: reload from disk and compare.
    let reloaded = Store::new(&t.config);
    reloaded.load().unwrap();
    assert_eq!(reloaded.count().unwrap(), 1);
    assert_eq!(reloaded.get(&SecretRef::parse("api_key")).unwrap(), "v2");
    assert!(reloaded.get(&SecretRef::parse("prod::github")).is_err());
}

#[test]
fn test_value_never_on_disk_in_plaintext() {
    let t = Test::new();
    let stack = t.stack();

    let marker = "plaintext-canary-5a1e";
    stack
        .store
        .add(&SecretRef::parse("api_key"), marker, None)
        .unwrap();

    let raw = std::fs::read(&t.config.secrets_path).unwrap();
    let haystack = String::from_utf8_lossy(&raw);
    assert!(
        !haystack.contains(marker),
        "secrets file must be ciphertext"
    );
}

#[test]
fn test_values_stay_out_of_audit_log() {
    let t = Test::new();
    let stack = t.stack();

    let marker = "audit-canary-77f3";
    stack
        .store
        .add(&SecretRef::parse("api_key"), marker, None)
        .unwrap();
    stack
        .leases
        .acquire("default", "api_key", "agent-1", None)
        .unwrap();
    stack.leases.revoke_all();

    let log = std::fs::read_to_string(&t.config.audit_path).unwrap_or_default();
    assert!(!log.contains(marker), "secret value leaked into audit log");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_ref_parse_format_identity(
        namespace in "[a-z][a-z0-9_-]{0,12}",
        name in "[a-zA-Z][a-zA-Z0-9_:.-]{0,24}",
    ) {
        let r = SecretRef::new(namespace.clone(), name.clone());
        let parsed = SecretRef::parse(&r.to_string());
        prop_assert_eq!(parsed.namespace, namespace);
        prop_assert_eq!(parsed.name, name);
    }

    #[test]
    fn prop_bare_names_land_in_default(name in "[a-zA-Z][a-zA-Z0-9_.-]{0,24}") {
        let parsed = SecretRef::parse(&name);
        prop_assert_eq!(parsed.namespace, "default");
        prop_assert_eq!(parsed.name, name);
    }

    #[test]
    fn prop_add_then_get_returns_value(value in "\\PC{1,64}") {
        let t = Test::new();
        let stack = t.stack();
        let r = SecretRef::parse("k");
        stack.store.add(&r, &value, None).unwrap();
        prop_assert_eq!(stack.store.get(&r).unwrap(), value);
    }
}
