//! Rotate command.
//!
//! A failed hook still returns its captured output; show it rather than
//! burying the diagnostics in an error code. A full sweep is part of the
//! killswitch: `keyward killswitch --rotate-all`.

use crate::cli::{output, Ctx};
use crate::core::daemon::protocol::{RotateParams, METHOD_ROTATE};
use crate::core::types::RotationResult;
use crate::error::{Error, Result};

pub fn execute(ctx: &Ctx, name: &str) -> Result<()> {
    let client = ctx.client()?;
    let params = RotateParams {
        secret_name: name.to_string(),
    };
    let response = client.call_raw(METHOD_ROTATE, Some(&params))?;

    if let Some(error) = &response.error {
        output::error(&format!("rotation of {name} failed: {}", error.message));
        if let Some(result) = error
            .data
            .clone()
            .and_then(|d| serde_json::from_value::<RotationResult>(d).ok())
        {
            if !result.output.is_empty() {
                output::header("hook output");
                println!("{}", result.output.trim_end());
            }
        }
        return Err(Error::Other(error.message.clone()));
    }

    let result: RotationResult = response
        .result
        .and_then(|v| serde_json::from_value(v).ok())
        .ok_or_else(|| Error::Other("malformed rotation response".to_string()))?;

    output::success(&format!("rotated {}", result.secret_name));
    if !result.output.is_empty() {
        output::header("hook output");
        println!("{}", result.output.trim_end());
    }
    Ok(())
}
