//! Tool aggregation core for the toolscout MCP proxy.
//!
//! ## Modules
//!
//! - [`core`]: backend connections, local functions, routing, aggregation
//! - [`inventory`]: the searchable tool catalog
//! - [`transform`]: content-envelope helpers
//!
//! The two public operations live on [`ProxyAggregator`]:
//! [`ProxyAggregator::discover`] and [`ProxyAggregator::execute`].

pub mod core;
pub mod error;
pub mod inventory;
pub mod transform;

pub use self::core::{
    config, resolve_command, Backend, BackendConfig, BackendConnection, BackendState,
    BackendSummary, CommandResolver, ContextFactory, DiscoveredTool, DiscoveryService,
    ExecutionRouter, LatencySnapshot, LocalFunctionRegistry, McpTransport, MetricsSnapshot,
    ProxyAggregator, ProxyClientHandler, ProxyConfig, ProxyMetrics, ToolProvider, LOCAL_TOOL_ID,
};
pub use error::{BoxError, McpError, McpResult};
pub use inventory::{CatalogIndex, SearchHit, ToolDescriptor, ToolKey};
pub use transform::{envelope_text, json_envelope, text_envelope, ContentEnvelope};
