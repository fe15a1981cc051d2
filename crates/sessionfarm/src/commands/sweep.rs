//! Sweep command - run one expiry pass against the backend.

use anyhow::Result;
use clap::Args;
use console::style;
use serde::Serialize;

use super::Context;

/// Arguments for the sweep command.
#[derive(Args, Debug)]
pub struct SweepArgs {
    /// List expired sessions without deleting them
    #[arg(long)]
    pub dry_run: bool,
}

/// Sweep result for JSON output.
#[derive(Debug, Serialize)]
struct SweepOutput {
    dry_run: bool,
    keys: Vec<String>,
}

/// Run the sweep command.
pub fn run(args: SweepArgs, ctx: &Context) -> Result<()> {
    let keys = ctx.with_backend(|backend| {
        let keys = if args.dry_run {
            backend.expired_keys()?
        } else {
            backend.remove_expired()?
        };
        Ok(keys)
    })?;

    if ctx.json_output {
        let output = SweepOutput {
            dry_run: args.dry_run,
            keys,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let verb = if args.dry_run { "Would remove" } else { "Removed" };
    println!(
        "{} {} expired session(s)",
        style(verb).bold(),
        keys.len()
    );
    for key in &keys {
        println!("  {key}");
    }
    Ok(())
}
