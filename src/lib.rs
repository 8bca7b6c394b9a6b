//! toolscout: an MCP proxy that puts many MCP servers behind two tools.
//!
//! - [`config`]: configuration file loading and merging
//! - [`logging`]: tracing setup (stderr only)
//! - [`server`]: the MCP server exposing `discover` and `execute`
//!
//! The catalog, ranking and routing live in [`toolscout_mcp`].

pub mod config;
pub mod logging;
pub mod server;

pub use server::ProxyServer;
pub use toolscout_mcp as mcp;
