//! Proxy aggregator: the entry point for `discover` and `execute`.
//!
//! `ProxyAggregator` owns:
//! - every backend connection, started concurrently at startup
//! - the local function registry (routed under `local`)
//! - the catalog index shared by discovery
//! - metrics and the background refresh task
//!
//! ## Usage
//!
//! ```ignore
//! let aggregator = ProxyAggregator::start(config).await?;
//!
//! let hits = aggregator.discover(&["weather for tomorrow"]);
//! let result = aggregator
//!     .execute("weather", "forecast", json!({"city": "Oslo"}), None)
//!     .await?;
//!
//! aggregator.shutdown().await;
//! ```

use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    config::{CallToolResult, ProxyConfig},
    connection::{BackendConnection, BackendState},
    discovery::{DiscoveredTool, DiscoveryService},
    handler::{ProxyClientHandler, RefreshRequest},
    local::{ContextFactory, LocalFunctionRegistry, LOCAL_TOOL_ID},
    metrics::{MetricsSnapshot, ProxyMetrics},
    router::ExecutionRouter,
};
use crate::{
    error::{BoxError, McpError, McpResult},
    inventory::{CatalogIndex, JsonObject, ToolKey},
};

const REFRESH_CHANNEL_CAPACITY: usize = 64;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// One row of [`ProxyAggregator::backend_summaries`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendSummary {
    pub tool_id: String,
    pub state: String,
    pub tools: usize,
}

pub struct ProxyAggregator {
    config: ProxyConfig,
    index: Arc<CatalogIndex>,
    local: Arc<LocalFunctionRegistry>,
    router: Arc<ExecutionRouter>,
    discovery: DiscoveryService,
    metrics: Arc<ProxyMetrics>,
    refresh_tx: mpsc::Sender<RefreshRequest>,
    shutdown_token: CancellationToken,
}

impl ProxyAggregator {
    /// Build an aggregator without connecting any backend.
    ///
    /// Spawns the refresh task, so it must be called inside a Tokio runtime.
    pub fn new(config: ProxyConfig) -> McpResult<Self> {
        config.validate()?;

        let index = Arc::new(CatalogIndex::with_fuzziness(config.fuzziness()));
        let local = Arc::new(LocalFunctionRegistry::new());
        local.attach_index(Arc::clone(&index));

        let router = Arc::new(ExecutionRouter::new(Arc::clone(&local)));
        let discovery = DiscoveryService::new(Arc::clone(&index), config.discover_limit());
        let (refresh_tx, refresh_rx) = mpsc::channel(REFRESH_CHANNEL_CAPACITY);

        let aggregator = Self {
            config,
            index,
            local,
            router,
            discovery,
            metrics: Arc::new(ProxyMetrics::new()),
            refresh_tx,
            shutdown_token: CancellationToken::new(),
        };
        aggregator.spawn_refresh_handler(refresh_rx);
        Ok(aggregator)
    }

    /// Start every configured backend concurrently and build the catalog.
    ///
    /// Any failing backend with `required: true` fails the whole startup and
    /// every backend already started is shut down. Failures of optional
    /// backends are logged and the backend is left out.
    pub async fn start(config: ProxyConfig) -> McpResult<Self> {
        Self::start_with(config, |connection, handler| async move {
            connection.start(handler).await
        })
        .await
    }

    /// [`start`](Self::start) with a custom way of opening each backend
    /// session, e.g. an in-memory transport instead of a child process.
    pub async fn start_with<C, Fut>(config: ProxyConfig, connect: C) -> McpResult<Self>
    where
        C: Fn(Arc<BackendConnection>, ProxyClientHandler) -> Fut,
        Fut: Future<Output = McpResult<()>>,
    {
        let aggregator = Self::new(config)?;

        let connections: Vec<Arc<BackendConnection>> = aggregator
            .config
            .mcp_servers
            .iter()
            .map(|(id, backend)| Arc::new(BackendConnection::new(id, backend.clone())))
            .collect();

        info!(backends = connections.len(), "Starting backends");

        let results = join_all(connections.iter().map(|connection| {
            let connected = connect(
                Arc::clone(connection),
                aggregator.client_handler(connection.id()),
            );
            async move {
                connected.await?;
                connection.list_tools().await
            }
        }))
        .await;

        let mut fatal = None;
        let mut ready = Vec::new();
        for (connection, result) in connections.iter().zip(results) {
            match result {
                Ok(tools) => ready.push((Arc::clone(connection), tools)),
                Err(e) => {
                    aggregator.metrics.record_connection_failure();
                    if connection.config().required {
                        error!(backend = %connection.id(), error = %e, "Required backend failed to start");
                        if fatal.is_none() {
                            fatal = Some(e);
                        }
                    } else {
                        warn!(backend = %connection.id(), error = %e, "Optional backend failed to start, skipping");
                    }
                }
            }
        }

        if let Some(e) = fatal {
            for connection in &connections {
                connection.shutdown().await;
            }
            aggregator.shutdown_token.cancel();
            return Err(e);
        }

        for (connection, tools) in ready {
            let id = connection.id().to_string();
            let count = tools.len();
            aggregator.router.add_backend(connection);
            for tool in tools {
                aggregator.index.upsert(tool);
            }
            debug!(backend = %id, tools = count, "Backend added to catalog");
        }

        info!(
            backends = aggregator.router.remotes().len(),
            tools = aggregator.index.len(),
            "Proxy catalog ready"
        );
        Ok(aggregator)
    }

    /// Client handler for a backend, wired to this aggregator's refresh task.
    pub fn client_handler(&self, backend: &str) -> ProxyClientHandler {
        ProxyClientHandler::new(backend).with_refresh_channel(self.refresh_tx.clone())
    }

    /// Add an already-connected backend and index its tools.
    pub async fn add_backend(&self, connection: Arc<BackendConnection>) -> McpResult<usize> {
        if connection.id() == LOCAL_TOOL_ID {
            return Err(McpError::Config(format!(
                "'{LOCAL_TOOL_ID}' is reserved for in-process functions"
            )));
        }

        let tools = match connection.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                self.metrics.record_connection_failure();
                return Err(e);
            }
        };
        let count = self.index.replace_tool_id(connection.id(), tools);
        if let Some(previous) = self.router.add_backend(Arc::clone(&connection)) {
            warn!(backend = %connection.id(), "Replacing existing backend {:?}", previous);
        }
        info!(backend = %connection.id(), tools = count, "Backend added");
        Ok(count)
    }

    /// Register an in-process function under the `local` tool id.
    pub fn register_local_function<F, Fut>(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameter_schema: JsonObject,
        function: F,
    ) where
        F: Fn(JsonObject, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CallToolResult, BoxError>> + Send + 'static,
    {
        self.local
            .register(name, description, parameter_schema, function);
    }

    /// Rank the catalog against `queries`.
    pub fn discover<S: AsRef<str>>(&self, queries: &[S]) -> Vec<DiscoveredTool> {
        self.metrics.record_discover();
        self.discovery.discover(queries)
    }

    /// Route a call to the backend or local function owning `tool_id`.
    pub async fn execute(
        &self,
        tool_id: &str,
        method: &str,
        args: Value,
        context: Option<ContextFactory>,
    ) -> McpResult<CallToolResult> {
        let key = ToolKey::new(tool_id, method);
        self.metrics.record_execute_start();
        let _active = scopeguard::guard(Arc::clone(&self.metrics), |metrics| {
            metrics.record_execute_finished();
        });
        let start = Instant::now();

        let result = self.router.execute(tool_id, method, args, context).await;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let routed = !matches!(
            result,
            Err(McpError::UnknownBackend { .. }
                | McpError::UnknownFunction { .. }
                | McpError::InvalidArguments(_))
        );
        self.metrics
            .record_execute_end(routed.then_some(&key), result.is_ok(), elapsed_ms);

        match &result {
            Ok(_) => debug!(tool = %key, elapsed_ms, "Execution succeeded"),
            Err(e) => error!(tool = %key, error = %e, "Execution failed"),
        }
        result
    }

    /// Re-list one backend's tools and replace its catalog entries.
    pub async fn refresh_backend(&self, backend: &str) -> McpResult<usize> {
        refresh_backend(&self.router, &self.index, backend).await
    }

    fn spawn_refresh_handler(&self, mut rx: mpsc::Receiver<RefreshRequest>) {
        let token = self.shutdown_token.clone();
        let router = Arc::clone(&self.router);
        let index = Arc::clone(&self.index);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Refresh handler shutting down");
                        break;
                    }
                    Some(request) = rx.recv() => {
                        if let Err(e) = refresh_backend(&router, &index, &request.backend).await {
                            warn!(backend = %request.backend, error = %e, "Failed to refresh backend tools");
                        }
                    }
                    else => break,
                }
            }
        });
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<CatalogIndex> {
        &self.index
    }

    pub fn local_functions(&self) -> &Arc<LocalFunctionRegistry> {
        &self.local
    }

    pub fn discover_limit(&self) -> usize {
        self.discovery.limit()
    }

    /// Every routable tool id, including `local`, sorted.
    pub fn tool_ids(&self) -> Vec<String> {
        self.router.tool_ids()
    }

    /// Every routable backend with its state and catalog tool counts.
    /// In-process functions come first under `local`.
    pub fn backend_summaries(&self) -> Vec<BackendSummary> {
        let counts = self.index.tool_counts();
        let local = BackendSummary {
            tool_id: LOCAL_TOOL_ID.to_string(),
            state: BackendState::Ready.to_string(),
            tools: self.local.len(),
        };
        std::iter::once(local)
            .chain(self.router.remotes().into_iter().map(|connection| BackendSummary {
                tool_id: connection.id().to_string(),
                state: connection.state().to_string(),
                tools: counts.get(connection.id()).copied().unwrap_or(0),
            }))
            .collect()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn metrics_registry(&self) -> &Arc<ProxyMetrics> {
        &self.metrics
    }

    /// Stop the refresh task, close every backend session and clear the
    /// catalog. In-flight executions get a short grace period.
    pub async fn shutdown(&self) {
        info!("Shutting down proxy");
        self.shutdown_token.cancel();

        let start = Instant::now();
        while self.metrics.snapshot().active_executions > 0 {
            if start.elapsed() >= SHUTDOWN_GRACE {
                warn!(
                    active = self.metrics.snapshot().active_executions,
                    "Shutdown grace period elapsed with executions still active"
                );
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        for connection in self.router.remotes() {
            connection.shutdown().await;
            self.router.remove_backend(connection.id());
        }
        self.index.clear();
        info!("Proxy shutdown complete");
    }
}

impl Drop for ProxyAggregator {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

async fn refresh_backend(
    router: &ExecutionRouter,
    index: &CatalogIndex,
    backend: &str,
) -> McpResult<usize> {
    let target = router
        .backend(backend)
        .ok_or_else(|| McpError::unknown_backend(backend, router.tool_ids()))?;

    let tools = target.provider().list_tools().await?;
    let count = index.replace_tool_id(backend, tools);
    info!(backend = %backend, tools = count, "Refreshed backend tools");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use futures::future::{BoxFuture, FutureExt};
    use rmcp::{
        model::{Content, Tool},
        ServiceExt,
    };
    use serde_json::json;

    use super::*;
    use crate::core::{
        config::BackendConfig,
        testing::{connected_backend, serve_stub, text_of, tool, StubServer},
    };

    fn register_add(aggregator: &ProxyAggregator) {
        aggregator.register_local_function(
            "add",
            "adds two numbers",
            JsonObject::new(),
            |args, _ctx| async move {
                let a = args.get("a").and_then(Value::as_i64).unwrap_or(0);
                let b = args.get("b").and_then(Value::as_i64).unwrap_or(0);
                Ok(CallToolResult::success(vec![Content::text((a + b).to_string())]))
            },
        );
    }

    async fn weather_and_stock(aggregator: &ProxyAggregator) {
        let weather = connected_backend(
            "weather",
            vec![
                tool("today", "Current weather conditions"),
                tool("forecast", "Weather forecast for the coming days"),
            ],
            aggregator.client_handler("weather"),
        )
        .await;
        let stock = connected_backend(
            "stock",
            vec![tool("price", "Latest stock price quote")],
            aggregator.client_handler("stock"),
        )
        .await;
        aggregator.add_backend(weather).await.unwrap();
        aggregator.add_backend(stock).await.unwrap();
    }

    #[tokio::test]
    async fn test_start_with_no_backends() {
        let aggregator = ProxyAggregator::start(ProxyConfig::default()).await.unwrap();
        assert!(aggregator.catalog().is_empty());
        assert_eq!(aggregator.tool_ids(), vec!["local"]);
        assert!(aggregator.discover(&["anything"]).is_empty());
        assert_eq!(aggregator.metrics().discover_calls, 1);
    }

    #[tokio::test]
    async fn test_required_backend_failure_aborts_startup() {
        let mut config = ProxyConfig::default();
        config.mcp_servers.insert(
            "ghost".to_string(),
            BackendConfig::stdio("definitely-not-a-real-mcp-server-xyz"),
        );

        let err = match ProxyAggregator::start(config).await {
            Ok(_) => panic!("startup should fail"),
            Err(e) => e,
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("ghost"));
    }

    /// Connector serving each backend id found in `catalogs` from a
    /// [`StubServer`]; other ids fail to connect. Server sessions report
    /// their id on `closed` when they end.
    fn stub_connector(
        catalogs: BTreeMap<&'static str, Vec<Tool>>,
        closed: mpsc::UnboundedSender<String>,
    ) -> impl Fn(Arc<BackendConnection>, ProxyClientHandler) -> BoxFuture<'static, McpResult<()>> {
        move |connection, handler| {
            let tools = catalogs.get(connection.id()).cloned();
            let closed = closed.clone();
            async move {
                let Some(tools) = tools else {
                    return Err(McpError::BackendConnection {
                        backend: connection.id().to_string(),
                        reason: "spawn failed".to_string(),
                    });
                };
                let (client_io, server_io) = tokio::io::duplex(64 * 1024);
                let id = connection.id().to_string();
                tokio::spawn(async move {
                    if let Ok(running) = StubServer::new(tools).serve(server_io).await {
                        let _ = running.waiting().await;
                    }
                    let _ = closed.send(id);
                });
                connection.connect(handler, client_io).await
            }
            .boxed()
        }
    }

    fn in_memory_config(ids: &[&str]) -> ProxyConfig {
        let mut config = ProxyConfig::default();
        for id in ids {
            config
                .mcp_servers
                .insert(id.to_string(), BackendConfig::stdio("in-memory"));
        }
        config
    }

    #[tokio::test]
    async fn test_one_failing_backend_tears_down_the_others() {
        let (closed_tx, mut closed_rx) = mpsc::unbounded_channel();
        let catalogs = BTreeMap::from([("weather", vec![tool("today", "Current weather conditions")])]);

        let result = ProxyAggregator::start_with(
            in_memory_config(&["weather", "broken"]),
            stub_connector(catalogs, closed_tx),
        )
        .await;
        let err = match result {
            Ok(_) => panic!("startup should fail"),
            Err(e) => e,
        };
        assert!(matches!(err, McpError::BackendConnection { ref backend, .. } if backend == "broken"));

        let closed = tokio::time::timeout(Duration::from_secs(5), closed_rx.recv())
            .await
            .expect("weather session should be closed");
        assert_eq!(closed.as_deref(), Some("weather"));
    }

    #[tokio::test]
    async fn test_started_backends_populate_catalog_once() {
        let (closed_tx, _closed_rx) = mpsc::unbounded_channel();
        let catalogs = BTreeMap::from([
            (
                "weather",
                vec![
                    tool("today", "Current weather conditions"),
                    tool("forecast", "Weather forecast for the coming days"),
                ],
            ),
            ("stock", vec![tool("price", "Latest stock price quote")]),
        ]);
        let mut config = in_memory_config(&["weather", "stock"]);
        config.mcp_servers.insert(
            "flaky".to_string(),
            BackendConfig::stdio("in-memory").optional(),
        );

        let aggregator = ProxyAggregator::start_with(config, stub_connector(catalogs, closed_tx))
            .await
            .unwrap();

        let keys: Vec<String> = aggregator
            .catalog()
            .list()
            .iter()
            .map(|d| d.key().to_string())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        assert_eq!(keys, vec!["stock:price", "weather:forecast", "weather:today"]);
        assert_eq!(aggregator.catalog().len(), 3);
        assert_eq!(aggregator.tool_ids(), vec!["local", "stock", "weather"]);
        assert_eq!(aggregator.metrics().backend_connection_failures, 1);

        let result = aggregator
            .execute("weather", "today", json!({"city": "Oslo"}), None)
            .await
            .unwrap();
        assert_eq!(text_of(&result), r#"today {"city":"Oslo"}"#);
        aggregator.shutdown().await;
    }

    #[tokio::test]
    async fn test_optional_backend_failure_is_skipped() {
        let mut config = ProxyConfig::default();
        config.mcp_servers.insert(
            "ghost".to_string(),
            BackendConfig::stdio("definitely-not-a-real-mcp-server-xyz").optional(),
        );

        let aggregator = ProxyAggregator::start(config).await.unwrap();
        assert_eq!(aggregator.tool_ids(), vec!["local"]);
        assert_eq!(aggregator.metrics().backend_connection_failures, 1);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = ProxyConfig {
            discover_limit: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            ProxyAggregator::start(config).await,
            Err(McpError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_discover_is_bounded_by_limit() {
        let config = ProxyConfig {
            discover_limit: Some(2),
            ..Default::default()
        };
        let aggregator = ProxyAggregator::new(config).unwrap();
        weather_and_stock(&aggregator).await;

        let results = aggregator.discover(&["weather for tomorrow"]);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.tool_id == "weather"));

        assert!(aggregator.discover::<&str>(&[]).is_empty());
        assert!(aggregator.discover(&["weather stock price"]).len() <= 2);
    }

    #[tokio::test]
    async fn test_local_function_is_discoverable_and_executable() {
        let aggregator = ProxyAggregator::new(ProxyConfig::default()).unwrap();
        weather_and_stock(&aggregator).await;
        register_add(&aggregator);

        let results = aggregator.discover(&["addition math"]);
        assert!(results
            .iter()
            .any(|r| r.tool_id == LOCAL_TOOL_ID && r.method == "add"));

        let result = aggregator
            .execute(LOCAL_TOOL_ID, "add", json!({"a": 2, "b": 40}), None)
            .await
            .unwrap();
        assert_eq!(text_of(&result), "42");

        // Re-registering keeps a single catalog entry.
        register_add(&aggregator);
        let local_entries = aggregator
            .catalog()
            .list()
            .into_iter()
            .filter(|d| d.tool_id == LOCAL_TOOL_ID)
            .count();
        assert_eq!(local_entries, 1);
    }

    #[tokio::test]
    async fn test_execute_routes_and_records_metrics() {
        let aggregator = ProxyAggregator::new(ProxyConfig::default()).unwrap();
        weather_and_stock(&aggregator).await;

        let result = aggregator
            .execute("stock", "price", json!({"symbol": "ACME"}), None)
            .await
            .unwrap();
        assert_eq!(text_of(&result), r#"price {"symbol":"ACME"}"#);

        let err = aggregator
            .execute("missing-backend", "x", json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::UnknownBackend { .. }));
        assert!(err.to_string().contains("local, stock, weather"));

        let err = aggregator
            .execute(LOCAL_TOOL_ID, "nope", json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::UnknownFunction { .. }));

        let snapshot = aggregator.metrics();
        assert_eq!(snapshot.execute_calls, 3);
        assert_eq!(snapshot.successful_executions, 1);
        assert_eq!(snapshot.failed_executions, 2);
        assert_eq!(snapshot.active_executions, 0);
        let latency = aggregator
            .metrics_registry()
            .tool_latency(&ToolKey::new("stock", "price"))
            .unwrap();
        assert_eq!(latency.count, 1);
    }

    #[tokio::test]
    async fn test_unknown_targets_do_not_grow_latency_table() {
        let aggregator = ProxyAggregator::new(ProxyConfig::default()).unwrap();

        for i in 0..50 {
            let tool_id = format!("bogus-{i}");
            assert!(aggregator
                .execute(&tool_id, "x", json!({}), None)
                .await
                .is_err());
        }
        assert!(aggregator
            .execute(LOCAL_TOOL_ID, "add", json!([1, 2]), None)
            .await
            .is_err());

        assert_eq!(aggregator.metrics().failed_executions, 51);
        assert!(aggregator.metrics_registry().all_tool_latencies().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_execution_is_not_left_active() {
        let aggregator = ProxyAggregator::new(ProxyConfig::default()).unwrap();
        aggregator.register_local_function(
            "hang",
            "never returns",
            JsonObject::new(),
            |_args, _ctx| futures::future::pending::<Result<CallToolResult, BoxError>>(),
        );

        let call = aggregator.execute(LOCAL_TOOL_ID, "hang", json!({}), None);
        assert!(tokio::time::timeout(Duration::from_millis(20), call)
            .await
            .is_err());
        assert_eq!(aggregator.metrics().active_executions, 0);

        let started = Instant::now();
        aggregator.shutdown().await;
        assert!(started.elapsed() < SHUTDOWN_GRACE);
    }

    #[tokio::test]
    async fn test_tool_list_change_refreshes_catalog() {
        let aggregator = ProxyAggregator::new(ProxyConfig::default()).unwrap();
        let server = StubServer::new(vec![tool("today", "Current weather conditions")]);
        let backend = serve_stub("weather", server.clone(), aggregator.client_handler("weather")).await;
        aggregator.add_backend(backend).await.unwrap();
        assert!(aggregator.catalog().contains(&ToolKey::new("weather", "today")));

        server.set_tools(vec![tool("alerts", "Severe weather alerts")]);
        let count = aggregator.refresh_backend("weather").await.unwrap();
        assert_eq!(count, 1);
        assert!(!aggregator.catalog().contains(&ToolKey::new("weather", "today")));
        assert!(aggregator.catalog().contains(&ToolKey::new("weather", "alerts")));

        assert!(matches!(
            aggregator.refresh_backend("missing").await,
            Err(McpError::UnknownBackend { .. })
        ));
    }

    #[tokio::test]
    async fn test_refresh_request_is_processed_in_background() {
        let aggregator = ProxyAggregator::new(ProxyConfig::default()).unwrap();
        let server = StubServer::new(vec![tool("today", "Current weather conditions")]);
        let backend = serve_stub("weather", server.clone(), aggregator.client_handler("weather")).await;
        aggregator.add_backend(backend).await.unwrap();

        server.set_tools(vec![tool("alerts", "Severe weather alerts")]);
        aggregator
            .refresh_tx
            .send(RefreshRequest {
                backend: "weather".to_string(),
            })
            .await
            .unwrap();

        let key = ToolKey::new("weather", "alerts");
        let deadline = Instant::now() + Duration::from_secs(5);
        while !aggregator.catalog().contains(&key) {
            assert!(Instant::now() < deadline, "refresh was not applied");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_backend_summaries_and_shutdown() {
        let aggregator = ProxyAggregator::new(ProxyConfig::default()).unwrap();
        weather_and_stock(&aggregator).await;

        register_add(&aggregator);

        let summaries = aggregator.backend_summaries();
        assert_eq!(
            summaries,
            vec![
                BackendSummary {
                    tool_id: LOCAL_TOOL_ID.to_string(),
                    state: "ready".to_string(),
                    tools: 1,
                },
                BackendSummary {
                    tool_id: "stock".to_string(),
                    state: "ready".to_string(),
                    tools: 1,
                },
                BackendSummary {
                    tool_id: "weather".to_string(),
                    state: "ready".to_string(),
                    tools: 2,
                },
            ]
        );

        aggregator.shutdown().await;
        assert!(aggregator.catalog().is_empty());
        assert_eq!(aggregator.tool_ids(), vec!["local"]);
        let summaries = aggregator.backend_summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].tool_id, LOCAL_TOOL_ID);
    }

    #[tokio::test]
    async fn test_local_backend_id_is_reserved() {
        let aggregator = ProxyAggregator::new(ProxyConfig::default()).unwrap();
        let impostor = connected_backend(
            LOCAL_TOOL_ID,
            vec![tool("x", "x")],
            ProxyClientHandler::new(LOCAL_TOOL_ID),
        )
        .await;
        assert!(matches!(
            aggregator.add_backend(impostor).await,
            Err(McpError::Config(_))
        ));
    }
}
