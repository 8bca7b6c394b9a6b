//! In-process backend server for tests.

use std::sync::Arc;

use parking_lot::RwLock;
use rmcp::{
    model::{
        CallToolRequestParam, CallToolResult, Content, ListToolsResult, PaginatedRequestParam,
        ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
    ErrorData, RoleServer, ServerHandler, ServiceExt,
};
use serde_json::{json, Value};

use crate::{
    core::{connection::BackendConnection, handler::ProxyClientHandler, BackendConfig},
    inventory::JsonObject,
    transform::envelope_text,
};

/// Backend that echoes calls back as text.
///
/// Calling `fail` returns a protocol error; `soft_fail` returns an error
/// envelope.
#[derive(Clone)]
pub(crate) struct StubServer {
    tools: Arc<RwLock<Vec<Tool>>>,
}

impl StubServer {
    pub fn new(tools: Vec<Tool>) -> Self {
        Self {
            tools: Arc::new(RwLock::new(tools)),
        }
    }

    /// Replace the advertised tool list. Clones share the list.
    pub fn set_tools(&self, tools: Vec<Tool>) {
        *self.tools.write() = tools;
    }
}

impl ServerHandler for StubServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(self.tools.read().clone()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let args = Value::Object(request.arguments.unwrap_or_default());
        match request.name.as_ref() {
            "fail" => Err(ErrorData::internal_error("backend exploded", None)),
            "soft_fail" => Ok(CallToolResult::error(vec![Content::text("soft failure")])),
            name => Ok(CallToolResult::success(vec![Content::text(format!(
                "{name} {args}"
            ))])),
        }
    }
}

pub(crate) fn schema(value: Value) -> JsonObject {
    match value {
        Value::Object(m) => m,
        _ => JsonObject::new(),
    }
}

pub(crate) fn tool(name: &str, description: &str) -> Tool {
    Tool::new(
        name.to_string(),
        description.to_string(),
        Arc::new(schema(json!({
            "type": "object",
            "properties": {"city": {"type": "string", "description": "City name"}}
        }))),
    )
}

pub(crate) fn text_of(result: &CallToolResult) -> String {
    envelope_text(result).unwrap_or_default()
}

/// A connected backend served by a [`StubServer`] over an in-memory pipe.
pub(crate) async fn connected_backend(
    id: &str,
    tools: Vec<Tool>,
    handler: ProxyClientHandler,
) -> Arc<BackendConnection> {
    serve_stub(id, StubServer::new(tools), handler).await
}

pub(crate) async fn serve_stub(
    id: &str,
    server: StubServer,
    handler: ProxyClientHandler,
) -> Arc<BackendConnection> {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    tokio::spawn(async move {
        if let Ok(running) = server.serve(server_io).await {
            let _ = running.waiting().await;
        }
    });

    let connection = Arc::new(BackendConnection::new(id, BackendConfig::stdio("in-memory")));
    connection
        .connect(handler, client_io)
        .await
        .expect("connect to stub server");
    connection
}
