//! Remove command.
//!
//! Deleting a secret revokes its outstanding leases first; the count is
//! reported so the operator can see who just lost access.

use crate::cli::{output, Ctx};
use crate::core::daemon::protocol::{DeleteParams, DeleteResult, METHOD_DELETE};
use crate::error::Result;

pub fn execute(ctx: &Ctx, name: &str) -> Result<()> {
    let client = ctx.client()?;
    let params = DeleteParams {
        name: name.to_string(),
    };
    let result: DeleteResult = client.call(METHOD_DELETE, Some(&params))?;

    output::success(&result.message);
    if result.leases_revoked > 0 {
        output::warn(&format!(
            "{} active lease(s) were revoked",
            result.leases_revoked
        ));
    }
    Ok(())
}
