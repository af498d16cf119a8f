//! Health command.

use crate::cli::{output, Ctx};
use crate::core::daemon::protocol::{HealthResult, METHOD_HEALTH};
use crate::error::Result;

pub fn execute(ctx: &Ctx, json: bool) -> Result<()> {
    let client = ctx.client()?;
    let report: HealthResult = client.call::<(), _>(METHOD_HEALTH, None)?;

    if json {
        return output::json(&report);
    }

    output::header("keyward health");
    output::kv("secrets", report.total_secrets);
    output::kv("active_leases", report.active_leases);
    output::kv("expiring_soon", report.expiring_soon);
    output::kv("no_hook", report.no_rotation_hook);
    output::kv("never_rotated", report.never_rotated);

    if report.warnings.is_empty() {
        output::success("no warnings");
        return Ok(());
    }

    println!();
    for warning in &report.warnings {
        output::warn(&warning.message);
    }
    if report.no_rotation_hook > 0 {
        output::hint("add a hook with: keyward update <name> --rotate-via <command>");
    }
    Ok(())
}
