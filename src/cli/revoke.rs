//! Revoke command.
//!
//! `keyward revoke <lease-id>` cuts one grant; `--secret` and
//! `--namespace` widen the scope; `--all` is the revoke-everything
//! killswitch shorthand.

use crate::cli::{output, Ctx};
use crate::core::daemon::protocol::{
    RevokeParams, RevokeResult, METHOD_REVOKE, METHOD_REVOKE_ALL,
};
use crate::error::{Error, Result};

pub fn execute(
    ctx: &Ctx,
    lease_id: Option<String>,
    all: bool,
    secret: Option<String>,
    namespace: Option<String>,
) -> Result<()> {
    let client = ctx.client()?;

    if all {
        let result: RevokeResult = client.call::<(), _>(METHOD_REVOKE_ALL, None)?;
        output::success(&result.message);
        output::hint("check the trail with: keyward audit");
        return Ok(());
    }

    if lease_id.is_none() && secret.is_none() && namespace.is_none() {
        return Err(Error::Other(
            "lease-id required (or use --all, --secret, or --namespace)".to_string(),
        ));
    }

    let params = RevokeParams {
        lease_id,
        secret,
        namespace,
    };
    let result: RevokeResult = client.call(METHOD_REVOKE, Some(&params))?;

    output::success(&result.message);
    Ok(())
}
