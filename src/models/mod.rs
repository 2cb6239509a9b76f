//! Data models for the TriAI MCP server.
//!
//! Rows travel between layers as JSON maps; the entity structs give the
//! logical (backend-neutral) shape of the tables the tools read back.

pub mod entities;
pub mod envelope;

pub use entities::{
    Memory, QueryHistoryEntry, STORE_TIMESTAMP_FORMAT, now_timestamp, parse_timestamp,
};
pub use envelope::ToolEnvelope;

/// A single result row: column name to JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;
