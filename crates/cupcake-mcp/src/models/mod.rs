//! Data models for records and tool inputs/outputs.
//!
//! Optional record fields use `#[serde(default)]` so sparse records load.

mod inputs;
mod record;

pub use inputs::{FetchInput, SearchInput};
pub use record::{FetchResult, Record, SearchResult, SearchResultPage};
