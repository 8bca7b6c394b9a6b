//! In-process functions exposed through the catalog under the `local` tool id.

use std::{fmt, future::Future, sync::Arc};

use dashmap::DashMap;
use futures::{future::BoxFuture, FutureExt};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, error};

use crate::{
    core::config::CallToolResult,
    error::{BoxError, McpError, McpResult},
    inventory::{CatalogIndex, JsonObject, ToolDescriptor},
};

/// Tool id reserved for in-process functions.
pub const LOCAL_TOOL_ID: &str = "local";

/// Produces the host context handed to a local function.
///
/// Invoked at most once per execution, and only when the target is local.
pub type ContextFactory = Box<dyn FnOnce() -> BoxFuture<'static, Value> + Send>;

type LocalResult = Result<CallToolResult, BoxError>;

type LocalFn = Arc<dyn Fn(JsonObject, Option<Value>) -> BoxFuture<'static, LocalResult> + Send + Sync>;

#[derive(Clone)]
struct LocalEntry {
    descriptor: ToolDescriptor,
    function: LocalFn,
}

/// Registry of in-process callables.
///
/// Once attached to a [`CatalogIndex`], every registration is mirrored into
/// the index immediately.
#[derive(Default)]
pub struct LocalFunctionRegistry {
    functions: DashMap<String, LocalEntry>,
    index: RwLock<Option<Arc<CatalogIndex>>>,
}

impl LocalFunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror current and future registrations into `index`.
    pub fn attach_index(&self, index: Arc<CatalogIndex>) {
        let mut slot = self.index.write();
        for entry in self.functions.iter() {
            index.upsert(entry.descriptor.clone());
        }
        *slot = Some(index);
    }

    /// Register or overwrite a function.
    pub fn register<F, Fut>(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameter_schema: JsonObject,
        function: F,
    ) where
        F: Fn(JsonObject, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LocalResult> + Send + 'static,
    {
        let name = name.into();
        let descriptor =
            ToolDescriptor::new(LOCAL_TOOL_ID, name.clone(), description, parameter_schema);
        let function: LocalFn = Arc::new(
            move |args: JsonObject, ctx: Option<Value>| -> BoxFuture<'static, LocalResult> {
                function(args, ctx).boxed()
            },
        );

        // Hold the index slot while inserting so attach_index cannot miss it.
        let index = self.index.read();
        let replaced = self
            .functions
            .insert(
                name.clone(),
                LocalEntry {
                    descriptor: descriptor.clone(),
                    function,
                },
            )
            .is_some();
        if let Some(index) = index.as_ref() {
            index.upsert(descriptor);
        }

        debug!(function = %name, replaced, "Registered local function");
    }

    /// Invoke `name` with `args`.
    ///
    /// The context factory runs only after the function is found.
    pub async fn invoke(
        &self,
        name: &str,
        args: JsonObject,
        context: Option<ContextFactory>,
    ) -> McpResult<CallToolResult> {
        let function = match self.functions.get(name) {
            Some(entry) => Arc::clone(&entry.function),
            None => return Err(McpError::unknown_function(name, self.names())),
        };

        let ctx = match context {
            Some(factory) => Some(factory().await),
            None => None,
        };

        function(args, ctx).await.map_err(|source| {
            error!(function = %name, error = %source, "Local function failed");
            McpError::LocalFunction {
                name: name.to_string(),
                source,
            }
        })
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<ToolDescriptor> = self
            .functions
            .iter()
            .map(|e| e.descriptor.clone())
            .collect();
        descriptors.sort_by(|a, b| a.method.cmp(&b.method));
        descriptors
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for LocalFunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalFunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}
