//! Tool catalog and search.
//!
//! - [`CatalogIndex`]: keyed store of every reachable tool with ranked search
//! - [`ToolDescriptor`] / [`ToolKey`]: catalog records and their routing keys
//! - [`text`]: tokenization and fuzzy matching helpers

pub mod index;
pub mod text;
pub mod types;

pub use index::{CatalogIndex, SearchHit};
pub use types::{IndexEntry, JsonObject, ToolDescriptor, ToolKey};
