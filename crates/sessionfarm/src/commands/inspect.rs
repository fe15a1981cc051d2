//! Inspect command - show a stored session.

use anyhow::{Result, bail};
use clap::Args;
use console::style;
use sessionfarm_config::HasStoreConfig;
use sessionfarm_session::{JsonCodec, Session, SessionCodec, SessionId, identity};

use super::Context;

/// Arguments for the inspect command.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Session id, with or without a route suffix
    pub id: String,
}

/// Run the inspect command.
pub fn run(args: InspectArgs, ctx: &Context) -> Result<()> {
    let key = identity::key_of(&args.id)?.to_string();
    let bytes = ctx.with_backend(|backend| Ok(backend.fetch(&key)?))?;

    let Some(bytes) = bytes else {
        bail!("session '{key}' not found");
    };

    let shell = Session::shell(SessionId::new(key.as_str(), ctx.config.route()));
    let Some(session) = JsonCodec.deserialize(shell, &bytes) else {
        bail!("session '{key}' has an unreadable payload ({} bytes)", bytes.len());
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    println!("{} {}", style("Session").bold(), session.id());
    println!("  Key:           {}", session.key());
    println!("  Created:       {}", session.created_at.to_rfc3339());
    println!("  Last accessed: {}", session.last_accessed.to_rfc3339());
    if session.attributes.is_empty() {
        println!("  Attributes:    (none)");
    } else {
        println!("  Attributes:");
        for (name, value) in &session.attributes {
            println!("    {name} = {value}");
        }
    }
    Ok(())
}
