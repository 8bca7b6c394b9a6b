//! One backend MCP server reached over a child-process transport.
//!
//! Lifecycle: `Configured → Connecting → Connected → Ready`, with `Failed`
//! reachable from any step. No retries: a single failure is terminal for the
//! connection.

use std::fmt;

use parking_lot::{Mutex, RwLock};
use rmcp::{
    model::CallToolRequestParam,
    service::{Peer, RunningService},
    transport::IntoTransport,
    RoleClient, ServiceExt,
};
use tracing::{debug, info, warn};

use super::{
    command::CommandResolver,
    config::{BackendConfig, CallToolResult, McpTransport},
    handler::ProxyClientHandler,
};
use crate::{
    error::{McpError, McpResult},
    inventory::{JsonObject, ToolDescriptor},
};

type ProxyClient = RunningService<RoleClient, ProxyClientHandler>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Configured,
    Connecting,
    Connected,
    /// Tools listed; the backend is part of the catalog.
    Ready,
    Failed,
}

impl fmt::Display for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackendState::Configured => "configured",
            BackendState::Connecting => "connecting",
            BackendState::Connected => "connected",
            BackendState::Ready => "ready",
            BackendState::Failed => "failed",
        };
        f.write_str(s)
    }
}

pub struct BackendConnection {
    id: String,
    config: BackendConfig,
    resolver: CommandResolver,
    state: RwLock<BackendState>,
    peer: RwLock<Option<Peer<RoleClient>>>,
    service: Mutex<Option<ProxyClient>>,
}

impl BackendConnection {
    pub fn new(id: impl Into<String>, config: BackendConfig) -> Self {
        Self {
            id: id.into(),
            config,
            resolver: CommandResolver::new(),
            state: RwLock::new(BackendState::Configured),
            peer: RwLock::new(None),
            service: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: CommandResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn state(&self) -> BackendState {
        *self.state.read()
    }

    fn set_state(&self, state: BackendState) {
        debug!(backend = %self.id, state = %state, "Backend state changed");
        *self.state.write() = state;
    }

    fn connection_error(&self, reason: impl Into<String>) -> McpError {
        self.set_state(BackendState::Failed);
        McpError::BackendConnection {
            backend: self.id.clone(),
            reason: reason.into(),
        }
    }

    /// Spawn the backend process and perform the handshake.
    pub async fn start(&self, handler: ProxyClientHandler) -> McpResult<()> {
        use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};

        let McpTransport::Stdio = self.config.transport_kind(&self.id)?;

        let command = self.resolver.resolve_async(&self.config.command).await;
        info!(
            backend = %self.id,
            command = %command,
            args = ?self.config.args,
            "Starting backend"
        );

        self.set_state(BackendState::Connecting);
        let transport = TokioChildProcess::new(tokio::process::Command::new(&command).configure(
            |cmd| {
                cmd.args(&self.config.args)
                    .envs(self.config.env.iter())
                    .stderr(std::process::Stdio::inherit());
            },
        ))
        .map_err(|e| self.connection_error(format!("spawn '{command}': {e}")))?;

        self.handshake(handler, transport).await
    }

    /// Perform the handshake over an already-open transport.
    pub async fn connect<T, E, A>(&self, handler: ProxyClientHandler, transport: T) -> McpResult<()>
    where
        T: IntoTransport<RoleClient, E, A>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.set_state(BackendState::Connecting);
        self.handshake(handler, transport).await
    }

    async fn handshake<T, E, A>(&self, handler: ProxyClientHandler, transport: T) -> McpResult<()>
    where
        T: IntoTransport<RoleClient, E, A>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let client = handler
            .serve(transport)
            .await
            .map_err(|e| self.connection_error(format!("initialize: {e}")))?;

        if let Some(server) = client.peer_info() {
            debug!(
                backend = %self.id,
                server_name = %server.server_info.name,
                server_version = %server.server_info.version,
                "Backend handshake complete"
            );
        }

        *self.peer.write() = Some(client.peer().clone());
        *self.service.lock() = Some(client);
        self.set_state(BackendState::Connected);
        Ok(())
    }

    fn peer(&self) -> Option<Peer<RoleClient>> {
        self.peer.read().clone()
    }

    /// List the backend's tools and mark the backend ready.
    pub async fn list_tools(&self) -> McpResult<Vec<ToolDescriptor>> {
        let peer = self
            .peer()
            .ok_or_else(|| self.connection_error("not connected"))?;

        let tools = peer
            .list_all_tools()
            .await
            .map_err(|e| self.connection_error(format!("list tools: {e}")))?;

        info!(backend = %self.id, tools = tools.len(), "Listed backend tools");
        if self.state() == BackendState::Connected {
            self.set_state(BackendState::Ready);
        }

        Ok(tools
            .iter()
            .map(|tool| ToolDescriptor::from_backend_tool(&self.id, tool))
            .collect())
    }

    /// Forward a call verbatim and return the backend's envelope unchanged.
    pub async fn call(&self, method: &str, args: JsonObject) -> McpResult<CallToolResult> {
        let execution_error = |reason: String| McpError::BackendExecution {
            backend: self.id.clone(),
            method: method.to_string(),
            reason,
        };

        let peer = self
            .peer()
            .ok_or_else(|| execution_error("backend is not connected".to_string()))?;

        peer.call_tool(CallToolRequestParam {
            name: method.to_string().into(),
            arguments: Some(args),
        })
        .await
        .map_err(|e| execution_error(e.to_string()))
    }

    /// Close the session. The backend process exits with it.
    pub async fn shutdown(&self) {
        self.peer.write().take();
        let service = self.service.lock().take();
        if let Some(service) = service {
            if let Err(e) = service.cancel().await {
                warn!(backend = %self.id, error = %e, "Error closing backend session");
            }
            debug!(backend = %self.id, "Backend session closed");
        }
        self.set_state(BackendState::Configured);
    }
}

impl fmt::Debug for BackendConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConnection")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}
