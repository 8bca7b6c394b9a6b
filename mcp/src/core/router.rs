//! Execution routing by tool id.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use super::{
    config::CallToolResult,
    connection::BackendConnection,
    local::{ContextFactory, LocalFunctionRegistry, LOCAL_TOOL_ID},
};
use crate::{
    error::{McpError, McpResult},
    inventory::{JsonObject, ToolDescriptor},
};

/// Anything that can list tools and execute them.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    async fn list_tools(&self) -> McpResult<Vec<ToolDescriptor>>;

    /// `context` is only consumed by providers that use host context.
    async fn call(
        &self,
        method: &str,
        args: JsonObject,
        context: Option<ContextFactory>,
    ) -> McpResult<CallToolResult>;
}

#[async_trait]
impl ToolProvider for LocalFunctionRegistry {
    async fn list_tools(&self) -> McpResult<Vec<ToolDescriptor>> {
        Ok(self.descriptors())
    }

    async fn call(
        &self,
        method: &str,
        args: JsonObject,
        context: Option<ContextFactory>,
    ) -> McpResult<CallToolResult> {
        self.invoke(method, args, context).await
    }
}

#[async_trait]
impl ToolProvider for BackendConnection {
    async fn list_tools(&self) -> McpResult<Vec<ToolDescriptor>> {
        BackendConnection::list_tools(self).await
    }

    async fn call(
        &self,
        method: &str,
        args: JsonObject,
        _context: Option<ContextFactory>,
    ) -> McpResult<CallToolResult> {
        BackendConnection::call(self, method, args).await
    }
}

/// A routing target.
#[derive(Debug, Clone)]
pub enum Backend {
    Local(Arc<LocalFunctionRegistry>),
    Remote(Arc<BackendConnection>),
}

impl Backend {
    pub fn provider(&self) -> &dyn ToolProvider {
        match self {
            Backend::Local(registry) => registry.as_ref(),
            Backend::Remote(connection) => connection.as_ref(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Backend::Local(_))
    }
}

/// Maps tool ids to backends and dispatches `execute` calls.
#[derive(Debug)]
pub struct ExecutionRouter {
    backends: RwLock<BTreeMap<String, Backend>>,
}

impl ExecutionRouter {
    /// Router with the local registry registered under [`LOCAL_TOOL_ID`].
    pub fn new(local: Arc<LocalFunctionRegistry>) -> Self {
        let mut backends = BTreeMap::new();
        backends.insert(LOCAL_TOOL_ID.to_string(), Backend::Local(local));
        Self {
            backends: RwLock::new(backends),
        }
    }

    /// Add a remote backend. Returns the previous backend with that id.
    pub fn add_backend(&self, connection: Arc<BackendConnection>) -> Option<Backend> {
        let id = connection.id().to_string();
        self.backends.write().insert(id, Backend::Remote(connection))
    }

    pub fn remove_backend(&self, tool_id: &str) -> Option<Backend> {
        if tool_id == LOCAL_TOOL_ID {
            return None;
        }
        self.backends.write().remove(tool_id)
    }

    pub fn backend(&self, tool_id: &str) -> Option<Backend> {
        self.backends.read().get(tool_id).cloned()
    }

    /// Every known tool id, sorted.
    pub fn tool_ids(&self) -> Vec<String> {
        self.backends.read().keys().cloned().collect()
    }

    /// Remote backends, sorted by id.
    pub fn remotes(&self) -> Vec<Arc<BackendConnection>> {
        self.backends
            .read()
            .values()
            .filter_map(|backend| match backend {
                Backend::Remote(connection) => Some(Arc::clone(connection)),
                Backend::Local(_) => None,
            })
            .collect()
    }

    /// Dispatch a call to the backend owning `tool_id`.
    ///
    /// `args` must be a JSON object; `null` is treated as `{}`.
    pub async fn execute(
        &self,
        tool_id: &str,
        method: &str,
        args: Value,
        context: Option<ContextFactory>,
    ) -> McpResult<CallToolResult> {
        let args = normalize_arguments(args)?;
        let backend = self
            .backend(tool_id)
            .ok_or_else(|| McpError::unknown_backend(tool_id, self.tool_ids()))?;

        debug!(
            tool_id = %tool_id,
            method = %method,
            local = backend.is_local(),
            "Routing execution"
        );
        backend.provider().call(method, args, context).await
    }
}

fn normalize_arguments(args: Value) -> McpResult<JsonObject> {
    match args {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(JsonObject::new()),
        other => Err(McpError::InvalidArguments(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use rmcp::model::Content;
    use serde_json::json;

    use super::*;
    use crate::core::{
        handler::ProxyClientHandler,
        testing::{connected_backend, text_of, tool},
    };

    fn local_registry() -> Arc<LocalFunctionRegistry> {
        let registry = Arc::new(LocalFunctionRegistry::new());
        registry.register("echo", "echo arguments", JsonObject::new(), |args, ctx| async move {
            let body = json!({"args": args, "context": ctx});
            Ok(CallToolResult::success(vec![Content::text(body.to_string())]))
        });
        registry
    }

    #[tokio::test]
    async fn test_local_dispatch_with_context() {
        let router = ExecutionRouter::new(local_registry());
        let factory: ContextFactory =
            Box::new(|| Box::pin(async { json!({"requestId": "abc"}) }));

        let result = router
            .execute(LOCAL_TOOL_ID, "echo", json!({"x": 1}), Some(factory))
            .await
            .unwrap();
        let body: Value = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(body["args"]["x"], 1);
        assert_eq!(body["context"]["requestId"], "abc");
    }

    #[tokio::test]
    async fn test_remote_dispatch_ignores_context() {
        let router = ExecutionRouter::new(local_registry());
        let backend = connected_backend(
            "weather",
            vec![tool("today", "Current weather conditions")],
            ProxyClientHandler::new("weather"),
        )
        .await;
        router.add_backend(backend);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let factory: ContextFactory = Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Value::Null })
        });

        let result = router
            .execute("weather", "today", json!({"city": "Lima"}), Some(factory))
            .await
            .unwrap();
        assert_eq!(text_of(&result), r#"today {"city":"Lima"}"#);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_backend_lists_known_ids() {
        let router = ExecutionRouter::new(local_registry());
        let backend = connected_backend(
            "stock",
            vec![tool("price", "Latest stock price quote")],
            ProxyClientHandler::new("stock"),
        )
        .await;
        router.add_backend(backend);

        let err = router
            .execute("missing-backend", "x", Value::Null, None)
            .await
            .unwrap_err();
        match &err {
            McpError::UnknownBackend { backend, known } => {
                assert_eq!(backend, "missing-backend");
                assert_eq!(known, &vec!["local".to_string(), "stock".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("local, stock"));
    }

    #[tokio::test]
    async fn test_non_object_arguments_rejected() {
        let router = ExecutionRouter::new(local_registry());
        for bad in [json!([1, 2]), json!("text"), json!(3)] {
            let err = router
                .execute(LOCAL_TOOL_ID, "echo", bad, None)
                .await
                .unwrap_err();
            assert!(matches!(err, McpError::InvalidArguments(_)));
        }

        let result = router
            .execute(LOCAL_TOOL_ID, "echo", Value::Null, None)
            .await
            .unwrap();
        let body: Value = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(body["args"], json!({}));
    }

    #[tokio::test]
    async fn test_local_backend_cannot_be_removed() {
        let router = ExecutionRouter::new(local_registry());
        assert!(router.remove_backend(LOCAL_TOOL_ID).is_none());
        assert_eq!(router.tool_ids(), vec!["local"]);
        assert!(router.remotes().is_empty());

        let provider_tools = router
            .backend(LOCAL_TOOL_ID)
            .unwrap()
            .provider()
            .list_tools()
            .await
            .unwrap();
        assert_eq!(provider_tools.len(), 1);
    }
}
