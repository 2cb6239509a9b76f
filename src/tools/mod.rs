//! Agent tool implementations.
//!
//! This module contains the tool catalog and its handlers:
//! - `catalog`: connection checks, schema discovery, data exploration, permissions
//! - `query`: guarded SELECT execution, SQL review, query history
//! - `memory`: agent memory CRUD, recall, statistics, expiry
//! - `provider`: `ToolProvider`, the single dispatch entry point
//! - `sql_validator`: SELECT gate, row limits and keyword review

pub mod catalog;
pub mod memory;
pub mod provider;
pub mod query;
pub mod sql_validator;

pub use catalog::{
    CheckPermissionsInput, ColumnStatsInput, ConnectInput, DescribeTableInput,
    ListDatabasesInput, SampleTableInput, SchemaInfoInput, TableFilterInput,
};
pub use memory::{
    AgentInput, DeleteMemoryInput, PurgeMemoriesInput, RetrieveMemoriesInput,
    SearchMemoriesInput, StoreMemoryInput, UpdateMemoryInput,
};
pub use provider::{ToolCall, ToolProvider};
pub use query::{ExecuteQueryInput, QueryHistoryInput, ValidateSqlInput};

use crate::error::DbError;
use serde::Serialize;
use std::str::FromStr;

/// Every tool an agent can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    ConnectToDatabase,
    ListDatabases,
    GetSchemaInfo,
    DescribeTable,
    GetTableRelationships,
    GetTableDependencies,
    ExecuteQuery,
    ValidateSql,
    GetQueryHistory,
    CheckPermissions,
    SampleTable,
    GetColumnStats,
    StoreMemory,
    RetrieveMemories,
    SearchMemories,
    UpdateMemory,
    DeleteMemory,
    GetMemoryStats,
    PurgeExpiredMemories,
}

impl ToolKind {
    /// Registry order; also the order of `available_tools`.
    pub const ALL: [ToolKind; 19] = [
        Self::ConnectToDatabase,
        Self::ListDatabases,
        Self::GetSchemaInfo,
        Self::DescribeTable,
        Self::GetTableRelationships,
        Self::GetTableDependencies,
        Self::ExecuteQuery,
        Self::ValidateSql,
        Self::GetQueryHistory,
        Self::CheckPermissions,
        Self::SampleTable,
        Self::GetColumnStats,
        Self::StoreMemory,
        Self::RetrieveMemories,
        Self::SearchMemories,
        Self::UpdateMemory,
        Self::DeleteMemory,
        Self::GetMemoryStats,
        Self::PurgeExpiredMemories,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectToDatabase => "connect_to_database",
            Self::ListDatabases => "list_databases",
            Self::GetSchemaInfo => "get_schema_info",
            Self::DescribeTable => "describe_table",
            Self::GetTableRelationships => "get_table_relationships",
            Self::GetTableDependencies => "get_table_dependencies",
            Self::ExecuteQuery => "execute_query",
            Self::ValidateSql => "validate_sql",
            Self::GetQueryHistory => "get_query_history",
            Self::CheckPermissions => "check_permissions",
            Self::SampleTable => "sample_table",
            Self::GetColumnStats => "get_column_stats",
            Self::StoreMemory => "store_memory",
            Self::RetrieveMemories => "retrieve_memories",
            Self::SearchMemories => "search_memories",
            Self::UpdateMemory => "update_memory",
            Self::DeleteMemory => "delete_memory",
            Self::GetMemoryStats => "get_memory_stats",
            Self::PurgeExpiredMemories => "purge_expired_memories",
        }
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        Self::ALL.iter().map(|kind| kind.as_str())
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = DbError;

    /// Exact, case-sensitive match against the registry names.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| DbError::unknown_tool(name))
    }
}
