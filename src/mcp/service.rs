//! MCP service implementation using rmcp.
//!
//! Every tool in the registry is exposed under its registry name. Each call is
//! handed to the shared `ToolProvider` and answered with the JSON envelope, so
//! backend failures reach the agent as `{success: false, error}` rather than
//! as protocol errors.

use crate::db::Backend;
use crate::models::ToolEnvelope;
use crate::tools::{
    AgentInput, CheckPermissionsInput, ColumnStatsInput, ConnectInput, DeleteMemoryInput,
    DescribeTableInput, ExecuteQueryInput, ListDatabasesInput, PurgeMemoriesInput,
    QueryHistoryInput, RetrieveMemoriesInput, SampleTableInput, SchemaInfoInput,
    SearchMemoriesInput, StoreMemoryInput, TableFilterInput, ToolCall, ToolProvider,
    UpdateMemoryInput, ValidateSqlInput,
};
use rmcp::Json;
use rmcp::{
    ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};

#[derive(Clone)]
pub struct TriaiService {
    /// Shared tool provider bound to the active backend
    provider: ToolProvider<Backend>,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl TriaiService {
    pub fn new(provider: ToolProvider<Backend>) -> Self {
        Self {
            provider,
            tool_router: Self::tool_router(),
        }
    }

    pub fn provider(&self) -> &ToolProvider<Backend> {
        &self.provider
    }

    async fn call(&self, call: ToolCall) -> Json<ToolEnvelope> {
        Json(self.provider.run(call).await)
    }
}

#[tool_router]
impl TriaiService {
    #[tool(
        description = "Check that a database is reachable.\nRuns a trivial probe query; no session is kept."
    )]
    async fn connect_to_database(
        &self,
        Parameters(input): Parameters<ConnectInput>,
    ) -> Json<ToolEnvelope> {
        self.call(ToolCall::ConnectToDatabase(input)).await
    }

    #[tool(description = "List databases on the server.\nFalls back to the home database when the catalog cannot be read.")]
    async fn list_databases(
        &self,
        Parameters(input): Parameters<ListDatabasesInput>,
    ) -> Json<ToolEnvelope> {
        self.call(ToolCall::ListDatabases(input)).await
    }

    #[tool(description = "List tables, views and procedures of a database.\nUse object_types to restrict the listing.")]
    async fn get_schema_info(
        &self,
        Parameters(input): Parameters<SchemaInfoInput>,
    ) -> Json<ToolEnvelope> {
        self.call(ToolCall::GetSchemaInfo(input)).await
    }

    #[tool(
        description = "Describe the columns of a table.\nReturns name, type, nullability, primary key flag and default. Optionally attaches five sample rows."
    )]
    async fn describe_table(
        &self,
        Parameters(input): Parameters<DescribeTableInput>,
    ) -> Json<ToolEnvelope> {
        self.call(ToolCall::DescribeTable(input)).await
    }

    #[tool(description = "List foreign key relationships, optionally for one table.")]
    async fn get_table_relationships(
        &self,
        Parameters(input): Parameters<TableFilterInput>,
    ) -> Json<ToolEnvelope> {
        self.call(ToolCall::GetTableRelationships(input)).await
    }

    #[tool(description = "List views and procedures that reference a table.")]
    async fn get_table_dependencies(
        &self,
        Parameters(input): Parameters<TableFilterInput>,
    ) -> Json<ToolEnvelope> {
        self.call(ToolCall::GetTableDependencies(input)).await
    }

    #[tool(
        description = "Execute a SELECT query and return the rows.\nAnything that does not start with SELECT is refused. A row limit (default 1000) is added when the query has none.\nEvery query is recorded in the query history."
    )]
    async fn execute_query(
        &self,
        Parameters(input): Parameters<ExecuteQueryInput>,
    ) -> Json<ToolEnvelope> {
        self.call(ToolCall::ExecuteQuery(input)).await
    }

    #[tool(
        description = "Check SQL without running it.\nFlags write/DDL keywords, text not starting with SELECT and unbalanced parentheses."
    )]
    async fn validate_sql(
        &self,
        Parameters(input): Parameters<ValidateSqlInput>,
    ) -> Json<ToolEnvelope> {
        self.call(ToolCall::ValidateSql(input)).await
    }

    #[tool(description = "Recent queries run by an agent, newest first.")]
    async fn get_query_history(
        &self,
        Parameters(input): Parameters<QueryHistoryInput>,
    ) -> Json<ToolEnvelope> {
        self.call(ToolCall::GetQueryHistory(input)).await
    }

    #[tool(description = "Check whether an operation is permitted.\nOnly SELECT is ever permitted.")]
    async fn check_permissions(
        &self,
        Parameters(input): Parameters<CheckPermissionsInput>,
    ) -> Json<ToolEnvelope> {
        self.call(ToolCall::CheckPermissions(input)).await
    }

    #[tool(description = "Return the first rows of a table, optionally projecting columns.")]
    async fn sample_table(
        &self,
        Parameters(input): Parameters<SampleTableInput>,
    ) -> Json<ToolEnvelope> {
        self.call(ToolCall::SampleTable(input)).await
    }

    #[tool(description = "Row, null and distinct counts plus min/max for one column.")]
    async fn get_column_stats(
        &self,
        Parameters(input): Parameters<ColumnStatsInput>,
    ) -> Json<ToolEnvelope> {
        self.call(ToolCall::GetColumnStats(input)).await
    }

    #[tool(description = "Store a memory for an agent.\nTags are space separated; purge_after sets an optional expiry.")]
    async fn store_memory(
        &self,
        Parameters(input): Parameters<StoreMemoryInput>,
    ) -> Json<ToolEnvelope> {
        self.call(ToolCall::StoreMemory(input)).await
    }

    #[tool(
        description = "Recall an agent's memories by tag.\nMost recalled first. Each returned memory has its recall counter incremented."
    )]
    async fn retrieve_memories(
        &self,
        Parameters(input): Parameters<RetrieveMemoriesInput>,
    ) -> Json<ToolEnvelope> {
        self.call(ToolCall::RetrieveMemories(input)).await
    }

    #[tool(description = "Search an agent's memories by label or content.\nDoes not change recall counters.")]
    async fn search_memories(
        &self,
        Parameters(input): Parameters<SearchMemoriesInput>,
    ) -> Json<ToolEnvelope> {
        self.call(ToolCall::SearchMemories(input)).await
    }

    #[tool(description = "Replace a memory's content and optionally its tags.")]
    async fn update_memory(
        &self,
        Parameters(input): Parameters<UpdateMemoryInput>,
    ) -> Json<ToolEnvelope> {
        self.call(ToolCall::UpdateMemory(input)).await
    }

    #[tool(description = "Delete a memory by id.")]
    async fn delete_memory(
        &self,
        Parameters(input): Parameters<DeleteMemoryInput>,
    ) -> Json<ToolEnvelope> {
        self.call(ToolCall::DeleteMemory(input)).await
    }

    #[tool(description = "Memory statistics for an agent: totals, recall counts and the five most used tags.")]
    async fn get_memory_stats(
        &self,
        Parameters(input): Parameters<AgentInput>,
    ) -> Json<ToolEnvelope> {
        self.call(ToolCall::GetMemoryStats(input)).await
    }

    #[tool(description = "Delete memories whose purge_after time has passed, for one agent or all.")]
    async fn purge_expired_memories(
        &self,
        Parameters(input): Parameters<PurgeMemoriesInput>,
    ) -> Json<ToolEnvelope> {
        self.call(ToolCall::PurgeExpiredMemories(input)).await
    }
}

#[tool_handler]
impl ServerHandler for TriaiService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "triai-mcp-server".to_owned(),
                title: Some("TriAI MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Database and memory tools for TriAI agents.\n\
                \n\
                Every tool answers with {success, data} or {success: false, error}.\n\
                \n\
                ## Database\n\
                - Explore with `get_schema_info`, `describe_table`, `sample_table`\n\
                - Only SELECT statements run; check SQL first with `validate_sql`\n\
                \n\
                ## Memory\n\
                - `store_memory` saves a labelled note with space-separated tags\n\
                - `retrieve_memories` recalls by tag and counts the recall\n\
                - `search_memories` finds by text without counting"
                    .to_string(),
            ),
        }
    }
}
