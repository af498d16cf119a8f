//! Init command.
//!
//! Asks the daemon to create the store: directory, age identity, and an
//! empty encrypted document.

use crate::cli::{output, Ctx};
use crate::core::daemon::protocol::{SimpleResult, METHOD_INIT};
use crate::error::Result;

pub fn execute(ctx: &Ctx) -> Result<()> {
    let client = ctx.client()?;
    let result: SimpleResult = client.call::<(), _>(METHOD_INIT, None)?;

    if result.success {
        output::success(&result.message);
        output::hint("add a secret with: keyward add <name>");
    } else {
        output::error(&result.message);
    }
    Ok(())
}
