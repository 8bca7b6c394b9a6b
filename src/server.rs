//! MCP server exposing exactly two tools: `discover` and `execute`.

use std::sync::{Arc, Weak};

use rmcp::{
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult,
        PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
    ErrorData, RoleServer, ServerHandler,
};
use serde::Deserialize;
use serde_json::{json, Value};
use toolscout_mcp::{
    inventory::JsonObject, json_envelope, BoxError, ContextFactory, McpError, ProxyAggregator,
    ProxyConfig,
};
use tracing::{debug, warn};
use uuid::Uuid;

pub const DISCOVER_TOOL: &str = "discover";
pub const EXECUTE_TOOL: &str = "execute";
pub const LIST_BACKENDS_FUNCTION: &str = "list_backends";

pub const DEFAULT_DISCOVER_DESCRIPTION: &str = "Search the tool catalog. Pass one or more short \
phrases describing what you want to do; returns matching tools as {toolId, method, inputSchema}. \
Call `execute` with the chosen toolId and method.";

const EXECUTE_DESCRIPTION: &str = "Execute a tool found with `discover`. Pass its toolId, method \
and an args object matching its inputSchema.";

#[derive(Debug, Deserialize)]
struct DiscoverParams {
    queries: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteParams {
    tool_id: String,
    method: String,
    #[serde(default)]
    args: Value,
}

/// `discoverDescription` (or the default), then `discoverDescriptionExtras`
/// after a blank line.
pub fn discover_description(config: &ProxyConfig) -> String {
    let base = config
        .discover_description
        .as_deref()
        .unwrap_or(DEFAULT_DISCOVER_DESCRIPTION);
    match config.discover_description_extras.as_deref() {
        Some(extras) if !extras.is_empty() => format!("{base}\n\n{extras}"),
        _ => base.to_string(),
    }
}

fn object(value: Value) -> JsonObject {
    match value {
        Value::Object(map) => map,
        _ => JsonObject::new(),
    }
}

fn discover_tool(config: &ProxyConfig) -> Tool {
    Tool::new(
        DISCOVER_TOOL,
        discover_description(config),
        Arc::new(object(json!({
            "type": "object",
            "properties": {
                "queries": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Short phrases describing the capability you need"
                }
            },
            "required": ["queries"]
        }))),
    )
}

fn execute_tool() -> Tool {
    Tool::new(
        EXECUTE_TOOL,
        EXECUTE_DESCRIPTION,
        Arc::new(object(json!({
            "type": "object",
            "properties": {
                "toolId": {"type": "string", "description": "toolId returned by discover"},
                "method": {"type": "string", "description": "method returned by discover"},
                "args": {"type": "object", "description": "Arguments matching inputSchema"}
            },
            "required": ["toolId", "method", "args"]
        }))),
    )
}

/// Per-call host context handed to local functions.
fn request_context_factory() -> ContextFactory {
    Box::new(|| Box::pin(async { json!({"requestId": Uuid::new_v4().to_string()}) }))
}

fn to_error_data(e: &McpError) -> ErrorData {
    match e {
        McpError::UnknownBackend { .. }
        | McpError::UnknownFunction { .. }
        | McpError::InvalidArguments(_) => ErrorData::invalid_params(e.to_string(), None),
        _ => ErrorData::internal_error(e.to_string(), None),
    }
}

fn parse_params<T: for<'de> Deserialize<'de>>(
    tool: &str,
    arguments: Option<JsonObject>,
) -> Result<T, ErrorData> {
    serde_json::from_value(Value::Object(arguments.unwrap_or_default())).map_err(|e| {
        ErrorData::invalid_params(format!("invalid arguments for '{tool}': {e}"), None)
    })
}

#[derive(Clone)]
pub struct ProxyServer {
    aggregator: Arc<ProxyAggregator>,
    tools: Arc<Vec<Tool>>,
}

impl ProxyServer {
    /// Wrap `aggregator` and register the built-in `list_backends` function.
    pub fn new(aggregator: Arc<ProxyAggregator>) -> Self {
        register_list_backends(&aggregator);
        let tools = vec![discover_tool(aggregator.config()), execute_tool()];
        Self {
            aggregator,
            tools: Arc::new(tools),
        }
    }

    pub fn aggregator(&self) -> &Arc<ProxyAggregator> {
        &self.aggregator
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    fn discover(&self, params: DiscoverParams) -> Result<CallToolResult, ErrorData> {
        let results = self.aggregator.discover(&params.queries);
        debug!(queries = ?params.queries, results = results.len(), "discover");
        json_envelope(&results).map_err(|e| {
            warn!(error = %e, "Failed to encode discovery results");
            to_error_data(&e)
        })
    }

    async fn execute(&self, params: ExecuteParams) -> Result<CallToolResult, ErrorData> {
        self.aggregator
            .execute(
                &params.tool_id,
                &params.method,
                params.args,
                Some(request_context_factory()),
            )
            .await
            .map_err(|e| to_error_data(&e))
    }
}

fn register_list_backends(aggregator: &Arc<ProxyAggregator>) {
    let weak: Weak<ProxyAggregator> = Arc::downgrade(aggregator);
    aggregator.register_local_function(
        LIST_BACKENDS_FUNCTION,
        "list connected backend servers and their tool counts",
        object(json!({"type": "object", "properties": {}})),
        move |_args, _ctx| {
            let weak = weak.clone();
            async move {
                let aggregator = weak.upgrade().ok_or("proxy is shutting down")?;
                let summaries = aggregator.backend_summaries();
                Ok::<_, BoxError>(json_envelope(&summaries)?)
            }
        },
    );
}

impl ServerHandler for ProxyServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(format!(
                "Use `{DISCOVER_TOOL}` to find tools, then `{EXECUTE_TOOL}` to run them."
            )),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(self.tools.as_ref().clone()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        match request.name.as_ref() {
            DISCOVER_TOOL => {
                let params = parse_params(DISCOVER_TOOL, request.arguments)?;
                self.discover(params)
            }
            EXECUTE_TOOL => {
                let params = parse_params(EXECUTE_TOOL, request.arguments)?;
                self.execute(params).await
            }
            other => Err(ErrorData::invalid_params(
                format!("unknown tool '{other}' (available: {DISCOVER_TOOL}, {EXECUTE_TOOL})"),
                None,
            )),
        }
    }
}
