//! Core types for the tool catalog.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::text::{flatten_parameter_descriptions, tokenize};
use crate::core::config::Tool;

/// JSON schema object describing a tool's arguments.
pub type JsonObject = Map<String, Value>;

/// Unique tool identifier: `tool_id:method`.
///
/// Used both as the catalog key and as the routing key for execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ToolKey {
    pub tool_id: String,
    pub method: String,
}

impl ToolKey {
    pub fn new(tool_id: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            method: method.into(),
        }
    }

    /// Parse from "tool_id:method" format.
    pub fn parse(s: &str) -> Option<Self> {
        let (tool_id, method) = s.split_once(':')?;
        Some(Self::new(tool_id, method))
    }
}

impl fmt::Display for ToolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tool_id, self.method)
    }
}

/// A tool known to the catalog, from a backend or the local registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub tool_id: String,
    pub method: String,
    pub description: String,
    pub parameter_schema: Arc<JsonObject>,
}

impl ToolDescriptor {
    pub fn new(
        tool_id: impl Into<String>,
        method: impl Into<String>,
        description: impl Into<String>,
        parameter_schema: impl Into<Arc<JsonObject>>,
    ) -> Self {
        Self {
            tool_id: tool_id.into(),
            method: method.into(),
            description: description.into(),
            parameter_schema: parameter_schema.into(),
        }
    }

    /// Build a descriptor from a tool listed by a backend server.
    pub fn from_backend_tool(tool_id: impl Into<String>, tool: &Tool) -> Self {
        Self {
            tool_id: tool_id.into(),
            method: tool.name.to_string(),
            description: tool
                .description
                .as_deref()
                .unwrap_or_default()
                .to_string(),
            parameter_schema: Arc::clone(&tool.input_schema),
        }
    }

    pub fn key(&self) -> ToolKey {
        ToolKey::new(&self.tool_id, &self.method)
    }
}

/// Searchable projection of a [`ToolDescriptor`].
///
/// Holds the lowercased, deduplicated terms of each ranked field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: ToolKey,
    pub method_terms: Vec<String>,
    pub description_terms: Vec<String>,
    /// Terms from every `description` found in the parameter schema.
    pub parameter_terms: Vec<String>,
}

impl IndexEntry {
    pub fn from_descriptor(descriptor: &ToolDescriptor) -> Self {
        Self {
            key: descriptor.key(),
            method_terms: dedup(tokenize(&descriptor.method)),
            description_terms: dedup(tokenize(&descriptor.description)),
            parameter_terms: dedup(tokenize(&flatten_parameter_descriptions(
                &descriptor.parameter_schema,
            ))),
        }
    }
}

fn dedup(terms: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(terms.len());
    for term in terms {
        if !out.contains(&term) {
            out.push(term);
        }
    }
    out
}
