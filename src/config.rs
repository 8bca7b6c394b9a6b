//! Configuration loading for the binary.
//!
//! Files are read in order and merged; later files win per backend id and
//! per scalar field. Command-line overrides apply last.

use std::{env, ffi::OsString, path::PathBuf};

use toolscout_mcp::{McpError, McpResult, ProxyConfig};
use tracing::{debug, info};

/// Used when no `--config` is given. May hold several paths separated like `PATH`.
pub const CONFIG_ENV: &str = "TOOLSCOUT_CONFIG";

#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub files: Vec<PathBuf>,
    pub discover_limit: Option<usize>,
}

impl ConfigSources {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            discover_limit: None,
        }
    }

    #[must_use]
    pub fn with_discover_limit(mut self, limit: Option<usize>) -> Self {
        self.discover_limit = limit;
        self
    }

    /// Explicit files, or the paths in `TOOLSCOUT_CONFIG` when there are none.
    pub fn resolved_files(&self) -> Vec<PathBuf> {
        if !self.files.is_empty() {
            return self.files.clone();
        }
        env::var_os(CONFIG_ENV)
            .filter(|value| !value.is_empty())
            .map(|value: OsString| env::split_paths(&value).collect())
            .unwrap_or_default()
    }
}

/// Read, merge and validate the configuration.
pub async fn load_config(sources: &ConfigSources) -> McpResult<ProxyConfig> {
    let files = sources.resolved_files();
    if files.is_empty() {
        return Err(McpError::Config(format!(
            "no configuration file given (use --config or set {CONFIG_ENV})"
        )));
    }

    let mut config = ProxyConfig::default();
    for path in &files {
        debug!(path = %path.display(), "Reading configuration file");
        config = config.merge(ProxyConfig::from_file(path).await?);
    }

    if sources.discover_limit.is_some() {
        config.discover_limit = sources.discover_limit;
    }

    config.validate()?;
    info!(
        files = files.len(),
        backends = config.mcp_servers.len(),
        discover_limit = config.discover_limit(),
        "Configuration loaded"
    );
    Ok(config)
}
