//! Content-envelope helpers.
//!
//! Every result crossing the proxy is an MCP `CallToolResult`: a list of
//! typed content blocks, of which the proxy itself only produces text.

mod envelope;

pub use envelope::{envelope_text, json_envelope, text_envelope, ContentEnvelope};
