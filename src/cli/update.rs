//! Update command.

use zeroize::Zeroizing;

use crate::cli::{add, output, Ctx};
use crate::core::daemon::protocol::{SimpleResult, UpdateParams, METHOD_UPDATE};
use crate::error::Result;

pub fn execute(
    ctx: &Ctx,
    name: &str,
    value: Option<String>,
    rotate_via: Option<String>,
) -> Result<()> {
    let value = Zeroizing::new(match value {
        Some(value) => value,
        None => add::prompt_hidden(name)?,
    });

    let client = ctx.client()?;
    let params = UpdateParams {
        name: name.to_string(),
        value: value.to_string(),
        rotate_via,
    };
    let result: SimpleResult = client.call(METHOD_UPDATE, Some(&params))?;

    output::success(&result.message);
    Ok(())
}
