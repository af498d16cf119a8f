//! List command.

use crate::cli::{output, Ctx};
use crate::core::daemon::protocol::{ListResult, METHOD_LIST};
use crate::error::Result;

pub fn execute(ctx: &Ctx, json: bool) -> Result<()> {
    let client = ctx.client()?;
    let result: ListResult = client.call::<(), _>(METHOD_LIST, None)?;

    if json {
        return output::json(&result);
    }

    if result.secrets.is_empty() {
        output::warn("no secrets stored");
        output::hint("add one with: keyward add <name>");
        return Ok(());
    }

    output::header(&format!("{} secret(s)", result.secrets.len()));
    for secret in &result.secrets {
        let hook = if secret.has_rotation_hook() {
            "rotatable"
        } else {
            "no hook"
        };
        let rotated = secret
            .last_rotated
            .map(|t| format!("rotated {}", t.to_rfc3339()))
            .unwrap_or_else(|| "never rotated".to_string());
        println!(
            "  {:<32} {:<10} {}",
            secret.secret_ref().to_string(),
            hook,
            rotated
        );
    }
    Ok(())
}
