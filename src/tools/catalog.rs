//! Connection, schema discovery and data exploration tools.
//!
//! Catalog reads are issued as dialect-specific SQL against
//! `INFORMATION_SCHEMA` (plus `sys` views on SQL Server and `pg_database` on
//! PostgreSQL). The mock link answers the SQL Server shapes from its seed
//! tables. Result columns are read case-insensitively because PostgreSQL
//! reports catalog columns in lowercase.

use crate::db::{BackendKind, DataLink, sql};
use crate::error::DbResult;
use crate::models::Row;
use crate::tools::provider::ToolProvider;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

fn default_object_types() -> Vec<String> {
    vec!["tables".into(), "views".into(), "procedures".into()]
}

fn default_sample_rows() -> u32 {
    10
}

/// Rows fetched for `describe_table` when sample data is requested.
const DESCRIBE_SAMPLE_ROWS: u32 = 5;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ConnectInput {
    /// Server name as the agent knows it; echoed back
    #[serde(alias = "serverInstance")]
    pub server_instance: String,
    #[serde(alias = "databaseName")]
    pub database_name: String,
    /// Accepted for compatibility; the server always uses its configured connection
    #[serde(default, alias = "connectionString")]
    pub connection_string: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListDatabasesInput {
    #[serde(alias = "serverInstance")]
    pub server_instance: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SchemaInfoInput {
    #[serde(alias = "databaseName")]
    pub database_name: String,
    /// Any of "tables", "views", "procedures". Default: all three
    #[serde(default = "default_object_types", alias = "objectTypes")]
    pub object_types: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    #[serde(alias = "databaseName")]
    pub database_name: String,
    #[serde(alias = "tableName")]
    pub table_name: String,
    /// Attach up to five sample rows
    #[serde(default, alias = "includeSampleData")]
    pub include_sample_data: bool,
}

/// Input shared by `get_table_relationships` and `get_table_dependencies`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TableFilterInput {
    #[serde(alias = "databaseName")]
    pub database_name: String,
    /// Restrict to one table. Default: every table
    #[serde(default, alias = "tableName")]
    pub table_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CheckPermissionsInput {
    #[serde(alias = "databaseName")]
    pub database_name: String,
    #[serde(alias = "objectName")]
    pub object_name: String,
    /// SQL verb, e.g. "SELECT" or "DELETE"
    pub operation: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SampleTableInput {
    #[serde(alias = "databaseName")]
    pub database_name: String,
    #[serde(alias = "tableName")]
    pub table_name: String,
    /// Rows to return. Default: 10
    #[serde(default = "default_sample_rows", alias = "rowCount")]
    pub row_count: u32,
    /// Columns to project. Default: all
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ColumnStatsInput {
    #[serde(alias = "databaseName")]
    pub database_name: String,
    #[serde(alias = "tableName")]
    pub table_name: String,
    #[serde(alias = "columnName")]
    pub column_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectOutput {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_result: Option<Vec<Row>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaObject {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaInfoOutput {
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<SchemaObject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views: Option<Vec<SchemaObject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procedures: Option<Vec<SchemaObject>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DescribeTableOutput {
    pub table_name: String,
    pub database: String,
    pub columns: Vec<ColumnInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_data: Option<Vec<Row>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relationship {
    pub parent_table: String,
    pub parent_column: String,
    pub child_table: String,
    pub child_column: String,
    pub constraint_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dependency {
    pub dependent_object: String,
    pub dependency_type: String,
    pub referenced_table: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PermissionOutput {
    pub permitted: bool,
    pub operation: String,
    pub object: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnStatsOutput {
    pub column_name: String,
    pub table_name: String,
    pub total_rows: i64,
    pub non_null_count: i64,
    pub null_count: i64,
    pub unique_values: i64,
    pub min_value: JsonValue,
    pub max_value: JsonValue,
}

/// Column value by name, ignoring ASCII case.
pub(crate) fn field<'a>(row: &'a Row, name: &str) -> Option<&'a JsonValue> {
    row.get(name).or_else(|| {
        row.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

fn text(row: &Row, name: &str) -> String {
    match field(row, name) {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn integer(row: &Row, name: &str) -> Option<i64> {
    match field(row, name)? {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        JsonValue::Bool(b) => Some(i64::from(*b)),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Last dotted part of a table reference, without quoting.
fn unqualified(table: &str) -> &str {
    table
        .rsplit('.')
        .next()
        .unwrap_or(table)
        .trim_matches(|c| c == '"' || c == '[' || c == ']')
}

fn string_literal(value: &str) -> String {
    sql::escape(&JsonValue::String(value.to_string()), true)
}

fn databases_sql(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Postgres => {
            "SELECT datname AS name FROM pg_database WHERE datallowconn = TRUE ORDER BY datname"
        }
        BackendKind::SqlServer | BackendKind::Mock => {
            "SELECT name FROM sys.databases WHERE database_id > 4 ORDER BY name"
        }
    }
}

fn tables_sql(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Postgres => {
            "SELECT table_schema, table_name, table_type FROM information_schema.tables \
             WHERE table_schema = 'public' AND table_type = 'BASE TABLE' ORDER BY table_name"
        }
        BackendKind::SqlServer | BackendKind::Mock => {
            "SELECT TABLE_SCHEMA, TABLE_NAME, TABLE_TYPE FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME"
        }
    }
}

fn views_sql(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Postgres => {
            "SELECT table_schema, table_name FROM information_schema.views \
             WHERE table_schema = 'public' ORDER BY table_name"
        }
        BackendKind::SqlServer | BackendKind::Mock => {
            "SELECT TABLE_SCHEMA, TABLE_NAME FROM INFORMATION_SCHEMA.VIEWS ORDER BY TABLE_NAME"
        }
    }
}

fn procedures_sql(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Postgres => {
            "SELECT routine_schema, routine_name, routine_type FROM information_schema.routines \
             WHERE routine_schema = 'public' ORDER BY routine_name"
        }
        BackendKind::SqlServer | BackendKind::Mock => {
            "SELECT ROUTINE_SCHEMA, ROUTINE_NAME, ROUTINE_TYPE FROM INFORMATION_SCHEMA.ROUTINES \
             WHERE ROUTINE_TYPE = 'PROCEDURE' ORDER BY ROUTINE_NAME"
        }
    }
}

fn columns_sql(kind: BackendKind, table: &str) -> String {
    let table = string_literal(table);
    match kind {
        BackendKind::Postgres => format!(
            "SELECT c.column_name, c.data_type, c.character_maximum_length, c.is_nullable, \
             c.column_default, CASE WHEN k.column_name IS NULL THEN 0 ELSE 1 END AS is_primary_key \
             FROM information_schema.columns c \
             LEFT JOIN (SELECT kcu.table_name, kcu.column_name \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu ON tc.constraint_name = kcu.constraint_name \
             AND tc.table_schema = kcu.table_schema \
             WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = 'public') k \
             ON c.table_name = k.table_name AND c.column_name = k.column_name \
             WHERE c.table_schema = 'public' AND c.table_name = {} ORDER BY c.ordinal_position",
            table
        ),
        BackendKind::SqlServer | BackendKind::Mock => format!(
            "SELECT c.COLUMN_NAME, c.DATA_TYPE, c.CHARACTER_MAXIMUM_LENGTH, c.IS_NULLABLE, \
             c.COLUMN_DEFAULT, CASE WHEN k.COLUMN_NAME IS NULL THEN 0 ELSE 1 END AS IS_PRIMARY_KEY \
             FROM INFORMATION_SCHEMA.COLUMNS c \
             LEFT JOIN (SELECT ku.TABLE_NAME, ku.COLUMN_NAME \
             FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc \
             JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE ku ON tc.CONSTRAINT_NAME = ku.CONSTRAINT_NAME \
             WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY') k \
             ON c.TABLE_NAME = k.TABLE_NAME AND c.COLUMN_NAME = k.COLUMN_NAME \
             WHERE c.TABLE_NAME = {} ORDER BY c.ORDINAL_POSITION",
            table
        ),
    }
}

fn relationships_sql(kind: BackendKind, table: Option<&str>) -> String {
    match kind {
        BackendKind::Postgres => {
            let mut query = String::from(
                "SELECT ccu.table_name AS parent_table, ccu.column_name AS parent_column, \
                 tc.table_name AS child_table, kcu.column_name AS child_column, tc.constraint_name \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu ON tc.constraint_name = kcu.constraint_name \
                 JOIN information_schema.constraint_column_usage ccu ON ccu.constraint_name = tc.constraint_name \
                 WHERE tc.table_schema = 'public' AND tc.constraint_type = 'FOREIGN KEY'",
            );
            if let Some(table) = table {
                let table = string_literal(table);
                query.push_str(&format!(
                    " AND (tc.table_name = {} OR ccu.table_name = {})",
                    table, table
                ));
            }
            query
        }
        BackendKind::SqlServer | BackendKind::Mock => {
            let mut query = String::from(
                "SELECT pk.TABLE_NAME AS PARENT_TABLE, pkc.COLUMN_NAME AS PARENT_COLUMN, \
                 fk.TABLE_NAME AS CHILD_TABLE, fkc.COLUMN_NAME AS CHILD_COLUMN, \
                 rc.CONSTRAINT_NAME AS CONSTRAINT_NAME \
                 FROM INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS rc \
                 JOIN INFORMATION_SCHEMA.TABLE_CONSTRAINTS fk ON rc.CONSTRAINT_NAME = fk.CONSTRAINT_NAME \
                 JOIN INFORMATION_SCHEMA.TABLE_CONSTRAINTS pk ON rc.UNIQUE_CONSTRAINT_NAME = pk.CONSTRAINT_NAME \
                 JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE fkc ON fkc.CONSTRAINT_NAME = rc.CONSTRAINT_NAME \
                 JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE pkc ON pkc.CONSTRAINT_NAME = rc.UNIQUE_CONSTRAINT_NAME \
                 AND pkc.ORDINAL_POSITION = fkc.ORDINAL_POSITION",
            );
            if let Some(table) = table {
                let table = string_literal(table);
                query.push_str(&format!(
                    " WHERE pk.TABLE_NAME = {} OR fk.TABLE_NAME = {}",
                    table, table
                ));
            }
            query
        }
    }
}

fn dependencies_sql(kind: BackendKind, table: Option<&str>) -> String {
    match kind {
        BackendKind::Postgres => {
            let mut query = String::from(
                "SELECT view_name AS dependent_object, 'VIEW' AS dependency_type, \
                 table_name AS referenced_table FROM information_schema.view_table_usage \
                 WHERE view_schema = 'public'",
            );
            if let Some(table) = table {
                query.push_str(&format!(" AND table_name = {}", string_literal(table)));
            }
            query.push_str(" ORDER BY view_name");
            query
        }
        BackendKind::SqlServer | BackendKind::Mock => {
            let mut query = String::from(
                "SELECT OBJECT_NAME(d.referencing_id) AS DEPENDENT_OBJECT, o.type_desc AS DEPENDENCY_TYPE, \
                 d.referenced_entity_name AS REFERENCED_TABLE \
                 FROM sys.sql_expression_dependencies d \
                 JOIN sys.objects o ON o.object_id = d.referencing_id",
            );
            if let Some(table) = table {
                query.push_str(&format!(
                    " WHERE d.referenced_entity_name = {}",
                    string_literal(table)
                ));
            }
            query
        }
    }
}

/// `SELECT <columns> FROM <table>` limited to `rows`, identifiers quoted per dialect.
fn sample_sql(kind: BackendKind, table: &str, columns: Option<&[String]>, rows: u32) -> String {
    let projection = match columns.filter(|c| !c.is_empty()) {
        Some(columns) => columns
            .iter()
            .map(|c| sql::quote_ident(kind, c))
            .collect::<Vec<_>>()
            .join(", "),
        None => "*".to_string(),
    };
    let table = sql::quote_ident(kind, table);
    if kind.uses_top() {
        format!("SELECT TOP {} {} FROM {}", rows, projection, table)
    } else {
        format!("SELECT {} FROM {} LIMIT {}", projection, table, rows)
    }
}

fn column_stats_sql(kind: BackendKind, table: &str, column: &str) -> String {
    let column = sql::quote_ident(kind, column);
    format!(
        "SELECT COUNT(*) AS total_rows, COUNT({c}) AS non_null_count, \
         COUNT(DISTINCT {c}) AS unique_values, MIN({c}) AS min_value, MAX({c}) AS max_value \
         FROM {t}",
        c = column,
        t = sql::quote_ident(kind, table)
    )
}

fn schema_objects(rows: &[Row], prefix: &str, fixed_type: Option<&str>) -> Vec<SchemaObject> {
    rows.iter()
        .map(|row| SchemaObject {
            name: text(row, &format!("{}_name", prefix)),
            object_type: fixed_type
                .map(str::to_string)
                .unwrap_or_else(|| text(row, &format!("{}_type", prefix))),
            schema: Some(text(row, &format!("{}_schema", prefix))).filter(|s| !s.is_empty()),
        })
        .collect()
}

fn column_info(row: &Row) -> ColumnInfo {
    ColumnInfo {
        name: text(row, "column_name"),
        data_type: text(row, "data_type"),
        nullable: text(row, "is_nullable").eq_ignore_ascii_case("YES"),
        primary_key: integer(row, "is_primary_key").is_some_and(|v| v != 0),
        default: field(row, "column_default").filter(|v| !v.is_null()).cloned(),
        max_length: integer(row, "character_maximum_length"),
    }
}

impl<L: DataLink> ToolProvider<L> {
    pub async fn connect_to_database(&self, input: ConnectInput) -> DbResult<ConnectOutput> {
        if input.connection_string.is_some() {
            debug!("connection_string supplied to connect_to_database; using configured link");
        }
        let target = self.target(&input.database_name);
        match self
            .link
            .query_in(target, "SELECT 1 AS connection_test")
            .await
        {
            Ok(rows) => Ok(ConnectOutput {
                connected: true,
                server: Some(input.server_instance),
                database: Some(input.database_name),
                backend: Some(self.link.kind()),
                test_result: Some(rows),
                error: None,
            }),
            Err(e) => {
                warn!(database = %input.database_name, error = %e, "connection probe failed");
                Ok(ConnectOutput {
                    connected: false,
                    server: None,
                    database: None,
                    backend: None,
                    test_result: None,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    /// Catalog database names; the home database alone when the catalog read fails.
    pub async fn list_databases(&self, input: ListDatabasesInput) -> DbResult<Vec<String>> {
        debug!(server = %input.server_instance, "listing databases");
        match self.link.query(databases_sql(self.link.kind())).await {
            Ok(rows) => Ok(rows.iter().map(|row| text(row, "name")).collect()),
            Err(e) => {
                warn!(error = %e, "database listing failed, reporting home database");
                self.link
                    .log(&format!("list_databases fell back to home database: {}", e));
                Ok(vec![self.link.home_database().to_string()])
            }
        }
    }

    pub async fn get_schema_info(&self, input: SchemaInfoInput) -> DbResult<SchemaInfoOutput> {
        let kind = self.link.kind();
        let target = self.target(&input.database_name);
        let wants = |name: &str| input.object_types.iter().any(|t| t.eq_ignore_ascii_case(name));

        let mut output = SchemaInfoOutput {
            database: input.database_name.clone(),
            tables: None,
            views: None,
            procedures: None,
        };
        if wants("tables") {
            let rows = self.link.query_in(target, tables_sql(kind)).await?;
            output.tables = Some(schema_objects(&rows, "table", None));
        }
        if wants("views") {
            let rows = self.link.query_in(target, views_sql(kind)).await?;
            output.views = Some(schema_objects(&rows, "table", Some("VIEW")));
        }
        if wants("procedures") {
            let rows = self.link.query_in(target, procedures_sql(kind)).await?;
            output.procedures = Some(schema_objects(&rows, "routine", None));
        }
        Ok(output)
    }

    pub async fn describe_table(&self, input: DescribeTableInput) -> DbResult<DescribeTableOutput> {
        let target = self.target(&input.database_name);
        let sql = columns_sql(self.link.kind(), unqualified(&input.table_name));
        let rows = self.link.query_in(target, &sql).await?;

        let sample_data = if input.include_sample_data {
            Some(
                self.sample_table(SampleTableInput {
                    database_name: input.database_name.clone(),
                    table_name: input.table_name.clone(),
                    row_count: DESCRIBE_SAMPLE_ROWS,
                    columns: None,
                })
                .await?,
            )
        } else {
            None
        };

        Ok(DescribeTableOutput {
            table_name: input.table_name,
            database: input.database_name,
            columns: rows.iter().map(column_info).collect(),
            sample_data,
        })
    }

    pub async fn get_table_relationships(
        &self,
        input: TableFilterInput,
    ) -> DbResult<Vec<Relationship>> {
        let table = input.table_name.as_deref().map(unqualified);
        let sql = relationships_sql(self.link.kind(), table);
        let rows = self.link.query_in(self.target(&input.database_name), &sql).await?;
        Ok(rows
            .iter()
            .map(|row| Relationship {
                parent_table: text(row, "parent_table"),
                parent_column: text(row, "parent_column"),
                child_table: text(row, "child_table"),
                child_column: text(row, "child_column"),
                constraint_name: text(row, "constraint_name"),
            })
            .collect())
    }

    pub async fn get_table_dependencies(
        &self,
        input: TableFilterInput,
    ) -> DbResult<Vec<Dependency>> {
        let table = input.table_name.as_deref().map(unqualified);
        let sql = dependencies_sql(self.link.kind(), table);
        let rows = self.link.query_in(self.target(&input.database_name), &sql).await?;
        Ok(rows
            .iter()
            .map(|row| Dependency {
                dependent_object: text(row, "dependent_object"),
                dependency_type: text(row, "dependency_type"),
                referenced_table: text(row, "referenced_table"),
            })
            .collect())
    }

    /// Static policy: SELECT is always permitted, everything else never.
    pub fn check_permissions(&self, input: CheckPermissionsInput) -> PermissionOutput {
        let permitted = input.operation.trim().eq_ignore_ascii_case("SELECT");
        PermissionOutput {
            permitted,
            operation: input.operation,
            object: input.object_name,
            reason: (!permitted)
                .then(|| "Only SELECT operations are permitted for AI agents".to_string()),
        }
    }

    pub async fn sample_table(&self, input: SampleTableInput) -> DbResult<Vec<Row>> {
        let sql = sample_sql(
            self.link.kind(),
            &input.table_name,
            input.columns.as_deref(),
            input.row_count,
        );
        self.link.query_in(self.target(&input.database_name), &sql).await
    }

    pub async fn get_column_stats(&self, input: ColumnStatsInput) -> DbResult<ColumnStatsOutput> {
        let sql = column_stats_sql(self.link.kind(), &input.table_name, &input.column_name);
        let rows = self.link.query_in(self.target(&input.database_name), &sql).await?;
        let stats = rows.into_iter().next().unwrap_or_default();

        let total_rows = integer(&stats, "total_rows").unwrap_or(0);
        let non_null_count = integer(&stats, "non_null_count").unwrap_or(0);
        Ok(ColumnStatsOutput {
            column_name: input.column_name,
            table_name: input.table_name,
            total_rows,
            non_null_count,
            null_count: (total_rows - non_null_count).max(0),
            unique_values: integer(&stats, "unique_values").unwrap_or(0),
            min_value: field(&stats, "min_value").cloned().unwrap_or(JsonValue::Null),
            max_value: field(&stats, "max_value").cloned().unwrap_or(JsonValue::Null),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: JsonValue) -> Row {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_field_ignores_case() {
        let r = row(json!({"TABLE_NAME": "AI_Agents"}));
        assert_eq!(field(&r, "table_name"), Some(&json!("AI_Agents")));
        assert_eq!(text(&r, "missing"), "");
    }

    #[test]
    fn test_unqualified() {
        assert_eq!(unqualified("dbo.AI_Agents"), "AI_Agents");
        assert_eq!(unqualified("[dbo].[Loans]"), "Loans");
        assert_eq!(unqualified("\"members\""), "members");
    }

    #[test]
    fn test_columns_sql_escapes_table() {
        let sql = columns_sql(BackendKind::SqlServer, "O'Brien");
        assert!(sql.contains("WHERE c.TABLE_NAME = 'O''Brien'"));
    }

    #[test]
    fn test_sample_sql_per_dialect() {
        let columns = vec!["Agent".to_string(), "Model".to_string()];
        assert_eq!(
            sample_sql(BackendKind::SqlServer, "AI_Agents", Some(&columns), 5),
            "SELECT TOP 5 [Agent], [Model] FROM [AI_Agents]"
        );
        assert_eq!(
            sample_sql(BackendKind::Postgres, "ai_agents", None, 10),
            "SELECT * FROM \"ai_agents\" LIMIT 10"
        );
        assert_eq!(
            sample_sql(BackendKind::Mock, "Loans", Some(&[]), 3),
            "SELECT * FROM Loans LIMIT 3"
        );
    }

    #[test]
    fn test_column_info_from_catalog_row() {
        let info = column_info(&row(json!({
            "column_name": "times_recalled",
            "data_type": "integer",
            "character_maximum_length": null,
            "is_nullable": "NO",
            "column_default": "0",
            "is_primary_key": 0,
        })));
        assert_eq!(info.name, "times_recalled");
        assert!(!info.nullable);
        assert!(!info.primary_key);
        assert_eq!(info.default, Some(json!("0")));
        assert_eq!(info.max_length, None);
    }

    #[test]
    fn test_integer_accepts_numeric_shapes() {
        let r = row(json!({"a": 3, "b": "7", "c": 2.0, "d": true}));
        assert_eq!(integer(&r, "a"), Some(3));
        assert_eq!(integer(&r, "b"), Some(7));
        assert_eq!(integer(&r, "c"), Some(2));
        assert_eq!(integer(&r, "d"), Some(1));
    }
}
