//! Core proxy infrastructure.

pub mod aggregator;
pub mod command;
pub mod config;
pub mod connection;
pub mod discovery;
pub mod handler;
pub mod local;
pub mod metrics;
pub mod router;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::{BackendSummary, ProxyAggregator};
pub use command::{resolve_command, CommandResolver};
pub use config::{
    BackendConfig, CallToolResult, ConfigValidationError, McpTransport, ProxyConfig, Tool,
    DEFAULT_DISCOVER_LIMIT, DEFAULT_FUZZINESS,
};
pub use connection::{BackendConnection, BackendState};
pub use discovery::{DiscoveredTool, DiscoveryService};
pub use handler::{ProxyClientHandler, RefreshRequest, CLIENT_NAME};
pub use local::{ContextFactory, LocalFunctionRegistry, LOCAL_TOOL_ID};
pub use metrics::{LatencySnapshot, MetricsSnapshot, ProxyMetrics};
pub use router::{Backend, ExecutionRouter, ToolProvider};
