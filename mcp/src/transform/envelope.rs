use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

use crate::error::McpResult;

/// Uniform result shape returned by `execute` and `discover`.
pub type ContentEnvelope = CallToolResult;

/// Successful envelope holding one text block.
pub fn text_envelope(text: impl Into<String>) -> ContentEnvelope {
    CallToolResult::success(vec![Content::text(text.into())])
}

/// Successful envelope holding `value` encoded as JSON text.
pub fn json_envelope<T: Serialize + ?Sized>(value: &T) -> McpResult<ContentEnvelope> {
    Ok(text_envelope(serde_json::to_string(value)?))
}

/// Concatenated text of every text block, `None` when there is none.
pub fn envelope_text(envelope: &ContentEnvelope) -> Option<String> {
    let texts: Vec<&str> = envelope
        .content
        .iter()
        .filter_map(|c| c.raw.as_text().map(|t| t.text.as_str()))
        .collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    }
}
