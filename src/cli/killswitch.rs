//! Killswitch command.
//!
//! Destructive by design; wiping the store requires either `--yes` or an
//! interactive confirmation.

use crate::cli::{output, Ctx};
use crate::core::daemon::protocol::{SimpleResult, METHOD_KILLSWITCH};
use crate::core::types::KillswitchOptions;
use crate::error::{Error, Result};

pub fn execute(
    ctx: &Ctx,
    revoke_all: bool,
    rotate_all: bool,
    wipe_store: bool,
    yes: bool,
) -> Result<()> {
    let options = KillswitchOptions {
        revoke_all,
        rotate_all,
        wipe_store,
    };
    if options.is_empty() {
        return Err(Error::Other(
            "select at least one of --revoke-all, --rotate-all, --wipe-store".to_string(),
        ));
    }

    if wipe_store && !yes {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt("This permanently deletes every stored secret. Continue?")
            .default(false)
            .interact()
            .map_err(|e| Error::Other(format!("confirmation failed: {e}")))?;
        if !confirmed {
            output::warn("aborted");
            return Ok(());
        }
    }

    let client = ctx.client()?;
    let result: SimpleResult = client.call(METHOD_KILLSWITCH, Some(&options))?;

    output::success(&result.message);
    output::hint("review the trail with: keyward audit");
    Ok(())
}
