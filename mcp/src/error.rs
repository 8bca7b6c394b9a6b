//! Proxy error types.
//!
//! One error enum covers the whole core: configuration problems, backend
//! startup failures, unknown identifiers at execution time, and failures
//! raised while a backend or local function executes a call.

use thiserror::Error;

pub type McpResult<T> = Result<T, McpError>;

/// Boxed error returned by local function implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend '{backend}' failed to connect: {reason}")]
    BackendConnection { backend: String, reason: String },

    #[error("Unknown backend '{backend}'. Available backends: {}", known.join(", "))]
    UnknownBackend { backend: String, known: Vec<String> },

    #[error("Unknown local function '{name}'. Available functions: {}", known.join(", "))]
    UnknownFunction { name: String, known: Vec<String> },

    #[error("Backend '{backend}' failed to execute '{method}': {reason}")]
    BackendExecution {
        backend: String,
        method: String,
        reason: String,
    },

    #[error("Local function '{name}' failed: {source}")]
    LocalFunction {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl McpError {
    /// Errors that abort startup rather than a single call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            McpError::Config(_) | McpError::BackendConnection { .. }
        )
    }

    pub(crate) fn unknown_backend(backend: impl Into<String>, mut known: Vec<String>) -> Self {
        known.sort();
        McpError::UnknownBackend {
            backend: backend.into(),
            known,
        }
    }

    pub(crate) fn unknown_function(name: impl Into<String>, mut known: Vec<String>) -> Self {
        known.sort();
        McpError::UnknownFunction {
            name: name.into(),
            known,
        }
    }
}
