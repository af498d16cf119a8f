//! Status command.

use crate::cli::{output, Ctx};
use crate::core::daemon::protocol::{StatusResult, METHOD_STATUS};
use crate::error::Result;

pub fn execute(ctx: &Ctx, json: bool) -> Result<()> {
    let client = ctx.client()?;
    let status: StatusResult = client.call::<(), _>(METHOD_STATUS, None)?;

    if json {
        return output::json(&status);
    }

    output::success("daemon is running");
    output::kv("pid", status.pid);
    output::kv("started_at", status.started_at.to_rfc3339());
    output::kv("secrets", status.secrets_count);
    output::kv("active_leases", status.active_leases);
    match &status.heartbeat {
        Some(hb) if hb.enabled => output::kv("heartbeat", &hb.url),
        _ => output::kv("heartbeat", "disabled"),
    }
    Ok(())
}
