//! Proxy configuration types and validation.
//!
//! Mirrors the JSON configuration file:
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "weather": { "command": "weather-mcp", "args": ["--units", "metric"] }
//!   },
//!   "discoverLimit": 5
//! }
//! ```

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    core::local::LOCAL_TOOL_ID,
    error::{McpError, McpResult},
};

pub use rmcp::model::{CallToolResult, Tool};

/// Default number of entries returned by `discover`.
pub const DEFAULT_DISCOVER_LIMIT: usize = 5;

/// Default edit-distance ratio used for fuzzy matching.
pub const DEFAULT_FUZZINESS: f64 = 0.2;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Backend servers keyed by id.
    #[serde(default)]
    pub mcp_servers: BTreeMap<String, BackendConfig>,

    /// Text shown to the caller describing `discover`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discover_description: Option<String>,

    /// Appended to the discover description after a blank line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discover_description_extras: Option<String>,

    /// Maximum entries returned by `discover`.
    /// Default: 5
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discover_limit: Option<usize>,

    /// Edit-distance ratio for fuzzy term matching, in `[0, 1)`.
    /// Default: 0.2
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuzziness: Option<f64>,
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Transport kind. Only "stdio" is supported.
    #[serde(default = "default_transport")]
    pub transport: String,

    /// Whether this backend must start for the proxy to start.
    /// - true: startup fails if this backend cannot be reached (default)
    /// - false: log a warning and serve the catalog without it
    #[serde(default = "default_true")]
    pub required: bool,
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Values are often API keys; only keys are printed.
        let mut env_keys: Vec<&String> = self.env.keys().collect();
        env_keys.sort();
        f.debug_struct("BackendConfig")
            .field("command", &self.command)
            .field("args", &self.args)
            .field("env", &env_keys)
            .field("transport", &self.transport)
            .field("required", &self.required)
            .finish()
    }
}

/// Transport used to reach a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpTransport {
    /// Child process speaking JSON-RPC over stdin/stdout.
    Stdio,
}

impl McpTransport {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "stdio" => Some(McpTransport::Stdio),
            _ => None,
        }
    }
}

impl fmt::Display for McpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            McpTransport::Stdio => f.write_str("stdio"),
        }
    }
}

/// A single invalid field, reported with its path in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl ConfigValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigValidationError {}

impl From<ConfigValidationError> for McpError {
    fn from(e: ConfigValidationError) -> Self {
        McpError::Config(e.to_string())
    }
}

fn default_transport() -> String {
    McpTransport::Stdio.to_string()
}

fn default_true() -> bool {
    true
}

impl BackendConfig {
    pub fn stdio(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            transport: default_transport(),
            required: true,
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Parsed transport kind. Unknown kinds are a configuration error.
    pub fn transport_kind(&self, id: &str) -> Result<McpTransport, ConfigValidationError> {
        McpTransport::parse(&self.transport).ok_or_else(|| {
            ConfigValidationError::new(
                format!("mcpServers.{id}.transport"),
                format!(
                    "unsupported transport '{}' (supported: stdio)",
                    self.transport
                ),
            )
        })
    }
}

impl ProxyConfig {
    pub fn discover_limit(&self) -> usize {
        self.discover_limit.unwrap_or(DEFAULT_DISCOVER_LIMIT)
    }

    pub fn fuzziness(&self) -> f64 {
        self.fuzziness.unwrap_or(DEFAULT_FUZZINESS)
    }

    /// Validate every field eagerly. Stops at the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.discover_limit == Some(0) {
            return Err(ConfigValidationError::new(
                "discoverLimit",
                "must be a positive integer",
            ));
        }

        if let Some(fuzziness) = self.fuzziness {
            if !(0.0..1.0).contains(&fuzziness) {
                return Err(ConfigValidationError::new(
                    "fuzziness",
                    format!("must be in [0, 1), got {fuzziness}"),
                ));
            }
        }

        for (id, backend) in &self.mcp_servers {
            if id.trim().is_empty() {
                return Err(ConfigValidationError::new(
                    "mcpServers",
                    "backend id must not be empty",
                ));
            }
            if id == LOCAL_TOOL_ID {
                return Err(ConfigValidationError::new(
                    format!("mcpServers.{id}"),
                    format!("'{LOCAL_TOOL_ID}' is reserved for in-process functions"),
                ));
            }
            if backend.command.trim().is_empty() {
                return Err(ConfigValidationError::new(
                    format!("mcpServers.{id}.command"),
                    "must not be empty",
                ));
            }
            backend.transport_kind(id)?;
        }

        Ok(())
    }

    /// Merge `other` on top of `self`: backends merge by id (other wins),
    /// scalar fields from `other` replace ours when present.
    #[must_use]
    pub fn merge(mut self, other: ProxyConfig) -> Self {
        self.mcp_servers.extend(other.mcp_servers);
        if other.discover_description.is_some() {
            self.discover_description = other.discover_description;
        }
        if other.discover_description_extras.is_some() {
            self.discover_description_extras = other.discover_description_extras;
        }
        if other.discover_limit.is_some() {
            self.discover_limit = other.discover_limit;
        }
        if other.fuzziness.is_some() {
            self.fuzziness = other.fuzziness;
        }
        self
    }

    /// Parse configuration from a JSON string (not validated).
    pub fn from_json_str(content: &str) -> McpResult<Self> {
        serde_json::from_str(content).map_err(|e| McpError::Config(format!("invalid JSON: {e}")))
    }

    /// Load configuration from a JSON file (not validated).
    pub async fn from_file(path: impl AsRef<Path>) -> McpResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| McpError::Config(format!("read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| McpError::Config(format!("parse {}: {}", path.display(), e)))
    }
}
