//! The tool dispatcher.
//!
//! `ToolProvider::execute_tool` takes a tool name and a JSON parameter object,
//! parses the parameters into the tool's typed input, runs the handler against
//! the active data link and always answers with a [`ToolEnvelope`]. `run` is
//! the only place where a `DbError` (or a panic inside a handler) becomes a
//! failure envelope.

use crate::compat::SchemaCompatibility;
use crate::db::{Backend, DataLink};
use crate::error::{DbError, DbResult};
use crate::models::ToolEnvelope;
use crate::tools::ToolKind;
use crate::tools::catalog::{
    CheckPermissionsInput, ColumnStatsInput, ConnectInput, DescribeTableInput,
    ListDatabasesInput, SampleTableInput, SchemaInfoInput, TableFilterInput,
};
use crate::tools::memory::{
    AgentInput, DeleteMemoryInput, PurgeMemoriesInput, RetrieveMemoriesInput,
    SearchMemoriesInput, StoreMemoryInput, UpdateMemoryInput,
};
use crate::tools::query::{ExecuteQueryInput, QueryHistoryInput, ValidateSqlInput};
use futures_util::FutureExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Agent name recorded in query history when none is configured.
pub const DEFAULT_AGENT: &str = "system";

/// One parsed tool invocation.
#[derive(Debug, Clone)]
pub enum ToolCall {
    ConnectToDatabase(ConnectInput),
    ListDatabases(ListDatabasesInput),
    GetSchemaInfo(SchemaInfoInput),
    DescribeTable(DescribeTableInput),
    GetTableRelationships(TableFilterInput),
    GetTableDependencies(TableFilterInput),
    ExecuteQuery(ExecuteQueryInput),
    ValidateSql(ValidateSqlInput),
    GetQueryHistory(QueryHistoryInput),
    CheckPermissions(CheckPermissionsInput),
    SampleTable(SampleTableInput),
    GetColumnStats(ColumnStatsInput),
    StoreMemory(StoreMemoryInput),
    RetrieveMemories(RetrieveMemoriesInput),
    SearchMemories(SearchMemoriesInput),
    UpdateMemory(UpdateMemoryInput),
    DeleteMemory(DeleteMemoryInput),
    GetMemoryStats(AgentInput),
    PurgeExpiredMemories(PurgeMemoriesInput),
}

fn parse_input<T: DeserializeOwned>(kind: ToolKind, params: JsonValue) -> DbResult<T> {
    let params = match params {
        JsonValue::Null => JsonValue::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(params)
        .map_err(|e| DbError::invalid_input(format!("Invalid parameters for {}: {}", kind, e)))
}

impl ToolCall {
    /// Parse `params` into the typed input of `kind`. `null` counts as `{}`.
    pub fn parse(kind: ToolKind, params: JsonValue) -> DbResult<Self> {
        Ok(match kind {
            ToolKind::ConnectToDatabase => Self::ConnectToDatabase(parse_input(kind, params)?),
            ToolKind::ListDatabases => Self::ListDatabases(parse_input(kind, params)?),
            ToolKind::GetSchemaInfo => Self::GetSchemaInfo(parse_input(kind, params)?),
            ToolKind::DescribeTable => Self::DescribeTable(parse_input(kind, params)?),
            ToolKind::GetTableRelationships => {
                Self::GetTableRelationships(parse_input(kind, params)?)
            }
            ToolKind::GetTableDependencies => {
                Self::GetTableDependencies(parse_input(kind, params)?)
            }
            ToolKind::ExecuteQuery => Self::ExecuteQuery(parse_input(kind, params)?),
            ToolKind::ValidateSql => Self::ValidateSql(parse_input(kind, params)?),
            ToolKind::GetQueryHistory => Self::GetQueryHistory(parse_input(kind, params)?),
            ToolKind::CheckPermissions => Self::CheckPermissions(parse_input(kind, params)?),
            ToolKind::SampleTable => Self::SampleTable(parse_input(kind, params)?),
            ToolKind::GetColumnStats => Self::GetColumnStats(parse_input(kind, params)?),
            ToolKind::StoreMemory => Self::StoreMemory(parse_input(kind, params)?),
            ToolKind::RetrieveMemories => Self::RetrieveMemories(parse_input(kind, params)?),
            ToolKind::SearchMemories => Self::SearchMemories(parse_input(kind, params)?),
            ToolKind::UpdateMemory => Self::UpdateMemory(parse_input(kind, params)?),
            ToolKind::DeleteMemory => Self::DeleteMemory(parse_input(kind, params)?),
            ToolKind::GetMemoryStats => Self::GetMemoryStats(parse_input(kind, params)?),
            ToolKind::PurgeExpiredMemories => {
                Self::PurgeExpiredMemories(parse_input(kind, params)?)
            }
        })
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            Self::ConnectToDatabase(_) => ToolKind::ConnectToDatabase,
            Self::ListDatabases(_) => ToolKind::ListDatabases,
            Self::GetSchemaInfo(_) => ToolKind::GetSchemaInfo,
            Self::DescribeTable(_) => ToolKind::DescribeTable,
            Self::GetTableRelationships(_) => ToolKind::GetTableRelationships,
            Self::GetTableDependencies(_) => ToolKind::GetTableDependencies,
            Self::ExecuteQuery(_) => ToolKind::ExecuteQuery,
            Self::ValidateSql(_) => ToolKind::ValidateSql,
            Self::GetQueryHistory(_) => ToolKind::GetQueryHistory,
            Self::CheckPermissions(_) => ToolKind::CheckPermissions,
            Self::SampleTable(_) => ToolKind::SampleTable,
            Self::GetColumnStats(_) => ToolKind::GetColumnStats,
            Self::StoreMemory(_) => ToolKind::StoreMemory,
            Self::RetrieveMemories(_) => ToolKind::RetrieveMemories,
            Self::SearchMemories(_) => ToolKind::SearchMemories,
            Self::UpdateMemory(_) => ToolKind::UpdateMemory,
            Self::DeleteMemory(_) => ToolKind::DeleteMemory,
            Self::GetMemoryStats(_) => ToolKind::GetMemoryStats,
            Self::PurgeExpiredMemories(_) => ToolKind::PurgeExpiredMemories,
        }
    }
}

fn to_data<T: Serialize>(value: T) -> DbResult<JsonValue> {
    serde_json::to_value(value)
        .map_err(|e| DbError::internal(format!("Failed to serialize tool result: {}", e)))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Tool registry bound to one data link.
///
/// Cheap to clone; clones share the link.
#[derive(Debug)]
pub struct ToolProvider<L: DataLink = Backend> {
    pub(super) link: Arc<L>,
    pub(super) compat: SchemaCompatibility,
    /// Agent recorded in query history.
    pub(super) agent: String,
    /// Extra database name treated as the home database.
    home_alias: Option<String>,
}

impl<L: DataLink> Clone for ToolProvider<L> {
    fn clone(&self) -> Self {
        Self {
            link: Arc::clone(&self.link),
            compat: self.compat,
            agent: self.agent.clone(),
            home_alias: self.home_alias.clone(),
        }
    }
}

impl<L: DataLink> ToolProvider<L> {
    pub fn new(link: Arc<L>, agent: impl Into<String>) -> Self {
        let compat = SchemaCompatibility::new(link.kind());
        Self {
            link,
            compat,
            agent: agent.into(),
            home_alias: None,
        }
    }

    /// Also route calls naming `alias` to the home database.
    ///
    /// Agents address the main store by its logical name (e.g. `TriAI_Main`)
    /// even when the server's physical database is called something else.
    pub fn with_home_alias(mut self, alias: impl Into<String>) -> Self {
        self.home_alias = Some(alias.into());
        self
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn compat(&self) -> SchemaCompatibility {
        self.compat
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// The database a call should run in; `None` means the home database.
    pub(super) fn target<'a>(&self, database: &'a str) -> Option<&'a str> {
        let database = database.trim();
        let is_home = database.is_empty()
            || database.eq_ignore_ascii_case(self.link.home_database())
            || self
                .home_alias
                .as_deref()
                .is_some_and(|alias| database.eq_ignore_ascii_case(alias));
        (!is_home).then_some(database)
    }

    /// Dispatch `name` with `params` and wrap the outcome.
    ///
    /// Never fails: unknown names, bad parameters, backend errors and handler
    /// panics all come back as `success: false` envelopes.
    pub async fn execute_tool(&self, name: &str, params: JsonValue) -> ToolEnvelope {
        let kind = match name.parse::<ToolKind>() {
            Ok(kind) => kind,
            Err(e) => {
                warn!(tool = %name, error = %e, "unknown tool requested");
                return ToolEnvelope::unknown_tool(&e, ToolKind::names());
            }
        };
        match ToolCall::parse(kind, params) {
            Ok(call) => self.run(call).await,
            Err(e) => {
                warn!(tool = %kind, error = %e, "rejected tool parameters");
                Self::failure(e)
            }
        }
    }

    /// Run an already parsed call. The single error-to-envelope boundary.
    pub async fn run(&self, call: ToolCall) -> ToolEnvelope {
        let kind = call.kind();
        let start = Instant::now();
        debug!(tool = %kind, "running tool");

        let outcome = AssertUnwindSafe(self.dispatch(call)).catch_unwind().await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let envelope = match outcome {
            Ok(Ok(data)) => ToolEnvelope::ok(data),
            Ok(Err(e)) => {
                warn!(tool = %kind, error = %e, "tool failed");
                Self::failure(e)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(tool = %kind, panic = %message, "tool panicked");
                ToolEnvelope::failure(format!("Internal error: tool panicked: {}", message))
            }
        };
        info!(tool = %kind, success = envelope.success, elapsed_ms, "tool call finished");
        envelope
    }

    fn failure(error: DbError) -> ToolEnvelope {
        match error {
            DbError::InvalidInput { message } => ToolEnvelope::failure(message),
            other => ToolEnvelope::failure(other.to_string()),
        }
    }

    async fn dispatch(&self, call: ToolCall) -> DbResult<JsonValue> {
        match call {
            ToolCall::ConnectToDatabase(input) => to_data(self.connect_to_database(input).await?),
            ToolCall::ListDatabases(input) => to_data(self.list_databases(input).await?),
            ToolCall::GetSchemaInfo(input) => to_data(self.get_schema_info(input).await?),
            ToolCall::DescribeTable(input) => to_data(self.describe_table(input).await?),
            ToolCall::GetTableRelationships(input) => {
                to_data(self.get_table_relationships(input).await?)
            }
            ToolCall::GetTableDependencies(input) => {
                to_data(self.get_table_dependencies(input).await?)
            }
            ToolCall::ExecuteQuery(input) => to_data(self.execute_query(input).await?),
            ToolCall::ValidateSql(input) => to_data(self.validate_sql(input)),
            ToolCall::GetQueryHistory(input) => to_data(self.get_query_history(input).await?),
            ToolCall::CheckPermissions(input) => to_data(self.check_permissions(input)),
            ToolCall::SampleTable(input) => to_data(self.sample_table(input).await?),
            ToolCall::GetColumnStats(input) => to_data(self.get_column_stats(input).await?),
            ToolCall::StoreMemory(input) => to_data(self.store_memory(input).await?),
            ToolCall::RetrieveMemories(input) => to_data(self.retrieve_memories(input).await?),
            ToolCall::SearchMemories(input) => to_data(self.search_memories(input).await?),
            ToolCall::UpdateMemory(input) => to_data(self.update_memory(input).await?),
            ToolCall::DeleteMemory(input) => to_data(self.delete_memory(input).await?),
            ToolCall::GetMemoryStats(input) => to_data(self.get_memory_stats(input).await?),
            ToolCall::PurgeExpiredMemories(input) => {
                to_data(self.purge_expired_memories(input).await?)
            }
        }
    }
}
