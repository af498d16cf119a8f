//! Add command.
//!
//! Prompts for the secret value with hidden input when it is not passed
//! on the command line, so values stay out of shell history.

use zeroize::Zeroizing;

use crate::cli::{output, Ctx};
use crate::core::daemon::protocol::{AddParams, SimpleResult, METHOD_ADD};
use crate::error::Result;

pub fn execute(
    ctx: &Ctx,
    name: &str,
    value: Option<String>,
    rotate_via: Option<String>,
) -> Result<()> {
    let value = Zeroizing::new(match value {
        Some(value) => value,
        None => prompt_hidden(name)?,
    });

    let client = ctx.client()?;
    let params = AddParams {
        name: name.to_string(),
        value: value.to_string(),
        rotate_via,
    };
    let result: SimpleResult = client.call(METHOD_ADD, Some(&params))?;

    output::success(&result.message);
    output::hint(&format!("lease it with: keyward lease {name}"));
    Ok(())
}

pub(super) fn prompt_hidden(name: &str) -> Result<String> {
    dialoguer::Password::new()
        .with_prompt(format!("Value for {name}"))
        .interact()
        .map_err(|e| crate::error::Error::Other(format!("failed to read value: {e}")))
}
