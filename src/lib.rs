//! TriAI MCP Server Library
//!
//! A fixed catalog of database and memory tools for TriAI agents, served over
//! MCP. Tools run against one data link (in-memory mock, PostgreSQL or SQL
//! Server) and always answer with a `{success, data | error}` envelope.

pub mod compat;
pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use compat::SchemaCompatibility;
pub use config::Config;
pub use db::{Backend, DataLink};
pub use error::DbError;
pub use mcp::TriaiService;
pub use models::ToolEnvelope;
pub use tools::{ToolKind, ToolProvider};
