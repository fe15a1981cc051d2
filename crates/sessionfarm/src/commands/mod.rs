//! CLI command handlers.

pub mod check;
pub mod delete;
pub mod inspect;
pub mod sweep;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use sessionfarm_backend::{BackendRegistry, BackendService};
use sessionfarm_config::StoreConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Resolved configuration.
    pub config: StoreConfig,
    /// File the configuration came from, if any.
    pub config_source: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    pub fn load(path: Option<&Path>, json_output: bool, verbose: bool) -> Result<Self> {
        let loaded = sessionfarm_config::load_config(path).context("failed to load configuration")?;
        if let Some(source) = &loaded.source {
            tracing::debug!(path = %source.display(), "Loaded configuration");
        }
        Ok(Self {
            config: loaded.config,
            config_source: loaded.source,
            json_output,
            verbose,
        })
    }

    /// Build and initialise the configured backend.
    pub fn open_backend(&self) -> Result<Arc<dyn BackendService>> {
        let backend = BackendRegistry::default()
            .build_from_config(&self.config.backend)
            .context("invalid backend configuration")?;
        backend.init().context("failed to initialise backend")?;
        Ok(backend)
    }

    /// Run `f` against an initialised backend and always shut it down.
    pub fn with_backend<T>(&self, f: impl FnOnce(&dyn BackendService) -> Result<T>) -> Result<T> {
        let backend = self.open_backend()?;
        let result = f(backend.as_ref());
        backend.shutdown();
        result
    }
}
