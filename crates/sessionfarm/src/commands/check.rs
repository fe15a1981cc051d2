//! Check command - verify the backend configuration and connectivity.

use anyhow::Result;
use clap::Args;
use console::style;
use serde::Serialize;
use sessionfarm_backend::{BackendSpec, ExpiryThreshold};
use sessionfarm_config::HasStoreConfig;

use super::Context;

/// Arguments for the check command.
#[derive(Args, Debug)]
pub struct CheckArgs {}

/// Check result for JSON output.
#[derive(Debug, Serialize)]
struct CheckOutput {
    config_source: Option<String>,
    kind: String,
    replicate: bool,
    route: Option<String>,
    expiry_threshold_ms: i64,
    endpoints: Vec<String>,
}

/// Run the check command.
pub fn run(_args: CheckArgs, ctx: &Context) -> Result<()> {
    let spec = BackendSpec::from_config(&ctx.config.backend)?;
    let endpoints = ctx.with_backend(|backend| {
        // Any round-trip proves the endpoints are reachable.
        backend.fetch("sessionfarm-check")?;
        Ok(backend.endpoints())
    })?;

    let output = CheckOutput {
        config_source: ctx.config_source.as_ref().map(|p| p.display().to_string()),
        kind: spec.kind,
        replicate: spec.replicate,
        route: ctx.config.route().map(str::to_string),
        expiry_threshold_ms: ctx.config.expiry_threshold_ms(),
        endpoints: endpoints.iter().map(ToString::to_string).collect(),
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", style("Backend OK").green().bold());
    println!(
        "  Config:    {}",
        output.config_source.as_deref().unwrap_or("(defaults)")
    );
    println!("  Kind:      {}", output.kind);
    println!("  Replicate: {}", output.replicate);
    println!("  Route:     {}", output.route.as_deref().unwrap_or("(none)"));
    match spec.expiry {
        ExpiryThreshold::Never => println!("  Expiry:    never"),
        ExpiryThreshold::After(d) => println!("  Expiry:    {} ms", d.as_millis()),
    }
    println!("  Endpoints:");
    for endpoint in &output.endpoints {
        println!("    {endpoint}");
    }

    if ctx.verbose {
        println!();
        println!("{}", style("Resolved configuration").bold());
        print!("{}", ctx.config.to_toml()?);
    }
    Ok(())
}
