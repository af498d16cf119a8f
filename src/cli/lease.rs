//! Lease command.
//!
//! `--raw` prints only the value so agents can capture it:
//! `export TOKEN=$(keyward lease github_token --raw)`.

use zeroize::Zeroizing;

use crate::cli::{output, Ctx};
use crate::core::daemon::protocol::{LeaseParams, LeaseResult, METHOD_LEASE};
use crate::core::types::SecretRef;
use crate::error::Result;

pub fn execute(
    ctx: &Ctx,
    name: &str,
    ttl: &str,
    client_id: Option<String>,
    raw: bool,
) -> Result<()> {
    let r = SecretRef::parse(name);
    let client_id = client_id.unwrap_or_else(default_client_id);

    let client = ctx.client()?;
    let params = LeaseParams {
        namespace: Some(r.namespace.clone()),
        secret_name: r.name.clone(),
        client_id: client_id.clone(),
        ttl: ttl.to_string(),
    };
    let result: LeaseResult = client.call(METHOD_LEASE, Some(&params))?;
    let value = Zeroizing::new(result.value);

    if raw {
        print!("{}", value.as_str());
        return Ok(());
    }

    output::success(&format!("lease acquired on {r}"));
    output::kv("lease_id", &result.lease_id);
    output::kv("client_id", &client_id);
    output::kv("expires_at", result.expires_at.to_rfc3339());
    output::kv("value", value.as_str());
    output::hint(&format!("revoke it with: keyward revoke {}", result.lease_id));
    Ok(())
}

fn default_client_id() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
