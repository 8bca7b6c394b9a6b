//! The `discover` operation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::inventory::{CatalogIndex, JsonObject};

/// A discovery hit. Descriptions are left out to keep responses small.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredTool {
    pub tool_id: String,
    pub method: String,
    pub input_schema: JsonObject,
}

#[derive(Debug, Clone)]
pub struct DiscoveryService {
    index: Arc<CatalogIndex>,
    limit: usize,
}

impl DiscoveryService {
    pub fn new(index: Arc<CatalogIndex>, limit: usize) -> Self {
        Self { index, limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Join `queries` with spaces and return at most `limit` ranked tools.
    pub fn discover<S: AsRef<str>>(&self, queries: &[S]) -> Vec<DiscoveredTool> {
        if self.index.is_empty() {
            debug!("Discovery against an empty catalog");
            return Vec::new();
        }

        let query = queries
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(" ");

        let hits = self.index.search(&query, self.limit);
        debug!(query = %query, results = hits.len(), "Discovery complete");

        hits.into_iter()
            .map(|hit| DiscoveredTool {
                tool_id: hit.descriptor.tool_id,
                method: hit.descriptor.method,
                input_schema: hit.descriptor.parameter_schema.as_ref().clone(),
            })
            .collect()
    }
}
