//! Delete command - remove a stored session.

use anyhow::Result;
use clap::Args;
use console::style;
use serde_json::json;
use sessionfarm_session::identity;

use super::Context;

/// Arguments for the delete command.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Session id, with or without a route suffix
    pub id: String,
}

/// Run the delete command.
pub fn run(args: DeleteArgs, ctx: &Context) -> Result<()> {
    let key = identity::key_of(&args.id)?.to_string();
    ctx.with_backend(|backend| Ok(backend.delete(&key)?))?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&json!({ "deleted": key }))?);
    } else {
        println!("{} {key}", style("Deleted").bold());
    }
    Ok(())
}
