//! Query tools: guarded SELECT execution, static SQL review and the
//! per-agent query history.
//!
//! `execute_query` only runs text that starts with `select`; anything else is
//! a soft rejection, not a backend call. Every successful query is appended to
//! `ai_query_history` on a best-effort basis.

use crate::db::{DataLink, WriteOptions};
use crate::error::{DbError, DbResult};
use crate::models::{QueryHistoryEntry, Row, now_timestamp};
use crate::tools::provider::ToolProvider;
use crate::tools::sql_validator::{self, SELECT_ONLY};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Instant;
use tracing::{debug, info, warn};

const HISTORY_TABLE: &str = "ai_query_history";

fn default_row_limit() -> u32 {
    1000
}

fn default_history_limit() -> u32 {
    50
}

/// Input for the execute_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteQueryInput {
    #[serde(alias = "databaseName")]
    pub database_name: String,
    /// SQL SELECT statement. Anything not starting with SELECT is refused.
    #[serde(alias = "sqlQuery")]
    pub sql_query: String,
    /// Row limit added when the query has none. Default: 1000, 0 disables
    #[serde(default = "default_row_limit", alias = "rowLimit")]
    pub row_limit: u32,
}

/// Input for the validate_sql tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ValidateSqlInput {
    /// Accepted for symmetry with execute_query; nothing is executed
    #[serde(default, alias = "databaseName")]
    pub database_name: Option<String>,
    #[serde(alias = "sqlQuery")]
    pub sql_query: String,
}

/// Input for the get_query_history tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryHistoryInput {
    #[serde(alias = "agentName")]
    pub agent_name: String,
    /// Entries to return, newest first. Default: 50
    #[serde(default = "default_history_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteQueryOutput {
    /// The statement as executed, after the row limit was applied
    pub query: String,
    pub row_count: usize,
    pub execution_time_ms: u64,
    pub results: Vec<Row>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidateSqlOutput {
    pub valid: bool,
    pub issues: Vec<String>,
    pub query: String,
}

impl<L: DataLink> ToolProvider<L> {
    pub async fn execute_query(&self, input: ExecuteQueryInput) -> DbResult<ExecuteQueryOutput> {
        if !sql_validator::is_select(&input.sql_query) {
            info!(database = %input.database_name, "refused non-SELECT query");
            return Err(DbError::invalid_input(SELECT_ONLY));
        }

        let query = sql_validator::apply_row_limit(self.link.kind(), &input.sql_query, input.row_limit);
        let target = self.target(&input.database_name);

        let start = Instant::now();
        let results = self.link.query_in(target, &query).await?;
        let execution_time_ms = start.elapsed().as_millis() as u64;
        debug!(rows = results.len(), elapsed_ms = execution_time_ms, "query finished");

        let entry = QueryHistoryEntry {
            query_id: None,
            agent: self.agent.clone(),
            database_name: input.database_name,
            sql_query: query.clone(),
            executed_time: now_timestamp(),
            row_count: results.len() as i64,
            execution_time_ms: execution_time_ms as i64,
        };
        self.record_history(entry).await;

        Ok(ExecuteQueryOutput {
            query,
            row_count: results.len(),
            execution_time_ms,
            results,
        })
    }

    /// Append to the query history. Failures are logged, never returned.
    async fn record_history(&self, entry: QueryHistoryEntry) {
        let row = self.compat.row_from_logical(HISTORY_TABLE, entry.to_row());
        let table = self.compat.table_name(HISTORY_TABLE);
        if let Err(e) = self
            .link
            .bulk_insert(table, std::slice::from_ref(&row), WriteOptions::default())
            .await
        {
            warn!(error = %e, "failed to log query history");
            self.link.log(&format!("Failed to log query history: {}", e));
        }
    }

    pub fn validate_sql(&self, input: ValidateSqlInput) -> ValidateSqlOutput {
        let issues = sql_validator::review(self.link.kind(), &input.sql_query);
        ValidateSqlOutput {
            valid: issues.is_empty(),
            issues,
            query: input.sql_query,
        }
    }

    /// The agent's history as logical rows, newest first.
    pub async fn get_query_history(&self, input: QueryHistoryInput) -> DbResult<Vec<Row>> {
        let agent_field = self.compat.field_name(HISTORY_TABLE, "agent");
        let filter = format!(
            "{} = {}",
            agent_field,
            self.link.escape(&JsonValue::from(input.agent_name.as_str()), true)
        );
        let sql = self
            .compat
            .build_select(HISTORY_TABLE, &[], Some(&filter), None, None);
        let rows = self.link.query(&sql).await?;

        let mut entries = self
            .compat
            .rows_to_logical(HISTORY_TABLE, rows)
            .into_iter()
            .map(|row| QueryHistoryEntry::from_row(&row))
            .collect::<DbResult<Vec<_>>>()?;
        entries.sort_by(|a, b| {
            b.executed_time
                .cmp(&a.executed_time)
                .then_with(|| b.query_id.cmp(&a.query_id))
        });
        entries.truncate(input.limit as usize);
        Ok(entries.iter().map(QueryHistoryEntry::to_row).collect())
    }
}
