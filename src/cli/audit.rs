//! Audit command.

use colored::Colorize;

use crate::cli::{output, Ctx};
use crate::core::daemon::protocol::{AuditParams, AuditResult, METHOD_AUDIT};
use crate::error::Result;

pub fn execute(ctx: &Ctx, tail: usize, json: bool) -> Result<()> {
    let client = ctx.client()?;
    let params = AuditParams { tail };
    let result: AuditResult = client.call(METHOD_AUDIT, Some(&params))?;

    if json {
        return output::json(&result);
    }

    if result.entries.is_empty() {
        output::warn("audit log is empty");
        return Ok(());
    }

    for entry in &result.entries {
        let status = if entry.success {
            "ok".green()
        } else {
            "fail".red()
        };
        let mut line = format!(
            "{}  {:<14} {:>4}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.action.to_string(),
            status
        );
        if let (Some(ns), Some(name)) = (&entry.namespace, &entry.secret_name) {
            line.push_str(&format!("  {ns}::{name}"));
        } else if let Some(name) = &entry.secret_name {
            line.push_str(&format!("  {name}"));
        }
        if let Some(lease) = &entry.lease_id {
            line.push_str(&format!("  lease={lease}"));
        }
        if let Some(details) = &entry.details {
            let flat = details.replace('\n', " | ");
            line.push_str(&format!("  {}", flat.dimmed()));
        }
        println!("{line}");
    }
    Ok(())
}
