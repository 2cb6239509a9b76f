//! Logical ↔ physical naming across backends.
//!
//! Tools speak one vocabulary (lower_snake_case table and field names). Each
//! backend stores the TriAI tables under its own casing: PostgreSQL keeps the
//! logical names, SQL Server and the mock use PascalCase. `SchemaCompatibility`
//! is a small `Copy` value built once from the backend kind and passed to
//! whatever needs it.
//!
//! Unknown tables and fields are never an error; they pass through unchanged.

use crate::db::BackendKind;
use crate::models::Row;
use serde_json::{Value as JsonValue, json};

type FieldMap = &'static [(&'static str, &'static str)];

const TABLES: FieldMap = &[
    ("ai_agents", "AI_Agents"),
    ("ai_messages", "AI_Messages"),
    ("ai_memories", "AI_Memories"),
    ("ai_scripts", "AI_Scripts"),
    ("ai_query_history", "AI_Query_History"),
];

const AGENT_FIELDS: FieldMap = &[
    ("agent", "Agent"),
    ("description", "Description"),
    ("role", "Role"),
    ("model_api", "Model_API"),
    ("model", "Model"),
    ("polling_interval", "Polling_Interval"),
    ("model_api_key", "Model_API_KEY"),
];

const MESSAGE_FIELDS: FieldMap = &[
    ("message_id", "Message_ID"),
    ("posted", "Posted"),
    ("user_from", "User_From"),
    ("user_to", "User_To"),
    ("message", "Message"),
    ("user_read", "User_Read"),
];

const MEMORY_FIELDS: FieldMap = &[
    ("memory_id", "Memory_ID"),
    ("agent", "Agent"),
    ("first_posted", "First_Posted"),
    ("times_recalled", "Times_Recalled"),
    ("last_recalled", "Last_Recalled"),
    ("memory_label", "Memory_Label"),
    ("memory", "Memory"),
    ("related_to", "Related_To"),
    ("purge_after", "Purge_After"),
];

const SCRIPT_FIELDS: FieldMap = &[
    ("language", "Language"),
    ("folder", "Folder"),
    ("filename", "FileName"),
    ("summary", "Summary"),
    ("script", "Script"),
];

const QUERY_HISTORY_FIELDS: FieldMap = &[
    ("query_id", "Query_ID"),
    ("agent", "Agent"),
    ("database_name", "Database_Name"),
    ("sql_query", "SQL_Query"),
    ("executed_time", "Executed_Time"),
    ("row_count", "Row_Count"),
    ("execution_time_ms", "Execution_Time_MS"),
];

/// Deprecated agent column, still present in the mock seed only.
const DEPRECATED_AGENT_FIELD: &str = "model_api_key";

fn fields_of(table: &str) -> FieldMap {
    match table {
        "ai_agents" => AGENT_FIELDS,
        "ai_messages" => MESSAGE_FIELDS,
        "ai_memories" => MEMORY_FIELDS,
        "ai_scripts" => SCRIPT_FIELDS,
        "ai_query_history" => QUERY_HISTORY_FIELDS,
        _ => &[],
    }
}

/// Name translation and portable statement building for one backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaCompatibility {
    kind: BackendKind,
}

impl SchemaCompatibility {
    pub fn new(kind: BackendKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// `(logical, physical)` field pairs for a table under this backend kind.
    fn field_pairs(&self, table: &str) -> impl Iterator<Item = (&'static str, &'static str)> {
        let kind = self.kind;
        fields_of(table)
            .iter()
            .filter(move |(logical, _)| {
                kind == BackendKind::Mock || *logical != DEPRECATED_AGENT_FIELD
            })
            .map(move |&(logical, pascal)| match kind {
                BackendKind::Postgres => (logical, logical),
                BackendKind::Mock | BackendKind::SqlServer => (logical, pascal),
            })
    }

    pub fn table_name<'a>(&self, logical_table: &'a str) -> &'a str {
        match TABLES.iter().find(|(logical, _)| *logical == logical_table) {
            Some(&(logical, _)) if self.kind == BackendKind::Postgres => logical,
            Some(&(_, pascal)) => pascal,
            None => logical_table,
        }
    }

    pub fn field_name<'a>(&self, logical_table: &str, logical_field: &'a str) -> &'a str {
        self.field_pairs(logical_table)
            .find(|(logical, _)| *logical == logical_field)
            .map(|(_, physical)| physical)
            .unwrap_or(logical_field)
    }

    /// Rename physical keys to logical ones. Unmapped keys are lower-cased.
    pub fn row_to_logical(&self, logical_table: &str, row: Row) -> Row {
        row.into_iter()
            .map(|(key, value)| {
                let logical = self
                    .field_pairs(logical_table)
                    .find(|(_, physical)| *physical == key)
                    .map(|(logical, _)| logical.to_string())
                    .unwrap_or_else(|| key.to_lowercase());
                (logical, value)
            })
            .collect()
    }

    pub fn rows_to_logical(&self, logical_table: &str, rows: Vec<Row>) -> Vec<Row> {
        rows.into_iter()
            .map(|row| self.row_to_logical(logical_table, row))
            .collect()
    }

    /// Rename logical keys to physical ones. Unmapped keys pass through.
    pub fn row_from_logical(&self, logical_table: &str, row: Row) -> Row {
        row.into_iter()
            .map(|(key, value)| {
                let physical = self.field_name(logical_table, &key).to_string();
                (physical, value)
            })
            .collect()
    }

    /// Render `SELECT <fields> FROM <table> [WHERE ..] [ORDER BY ..]` plus a row limit.
    ///
    /// `where_clause` and `order_by` must already use physical names. SQL Server
    /// gets `TOP n` spliced in by textual replacement of `SELECT <fields>`, so a
    /// where clause containing the same select list text is rewritten too.
    pub fn build_select(
        &self,
        logical_table: &str,
        fields: &[&str],
        where_clause: Option<&str>,
        order_by: Option<&str>,
        limit: Option<u32>,
    ) -> String {
        let fields_str = if fields.is_empty() {
            "*".to_string()
        } else {
            fields
                .iter()
                .map(|f| self.field_name(logical_table, f))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut query = format!(
            "SELECT {} FROM {}",
            fields_str,
            self.table_name(logical_table)
        );
        if let Some(clause) = where_clause.filter(|c| !c.is_empty()) {
            query.push_str(" WHERE ");
            query.push_str(clause);
        }
        if let Some(order) = order_by.filter(|o| !o.is_empty()) {
            query.push_str(" ORDER BY ");
            query.push_str(order);
        }

        match limit.filter(|n| *n > 0) {
            Some(n) if self.kind.uses_top() => query.replace(
                &format!("SELECT {}", fields_str),
                &format!("SELECT TOP {} {}", n, fields_str),
            ),
            Some(n) => format!("{} LIMIT {}", query, n),
            None => query,
        }
    }

    /// Parameterized INSERT for the first row's columns; empty input renders "".
    pub fn build_insert(&self, logical_table: &str, rows: &[Row]) -> String {
        let Some(first) = rows.first() else {
            return String::new();
        };
        let columns: Vec<&str> = first
            .keys()
            .map(|k| self.field_name(logical_table, k))
            .collect();
        let placeholders: Vec<String> = (1..=columns.len())
            .map(|i| match self.kind {
                BackendKind::Postgres => format!("${}", i),
                BackendKind::Mock | BackendKind::SqlServer => "?".to_string(),
            })
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table_name(logical_table),
            columns.join(", "),
            placeholders.join(", ")
        )
    }

    /// Static description of how the agent schema differs across backends.
    pub fn schema_differences(&self) -> JsonValue {
        json!({
            "new_fields_added": ["role", "polling_interval"],
            "deprecated_fields": [DEPRECATED_AGENT_FIELD],
            "field_name_case_differences": {
                "postgres": "lowercase",
                "sqlserver": "PascalCase",
                "mock": "PascalCase",
            },
            "compatibility_notes": [
                "Role stores the agent system prompt",
                "Polling_Interval sets per-agent inbox polling",
                "Model_API_KEY is deprecated and only present in mock data",
                "PostgreSQL uses lowercase field names",
                "SQL Server and Mock use PascalCase field names",
            ],
            "backend": self.kind.as_str(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KINDS: [BackendKind; 3] = [
        BackendKind::Mock,
        BackendKind::Postgres,
        BackendKind::SqlServer,
    ];

    fn row(pairs: &[(&str, JsonValue)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_table_names_per_backend() {
        let pg = SchemaCompatibility::new(BackendKind::Postgres);
        let ss = SchemaCompatibility::new(BackendKind::SqlServer);
        assert_eq!(pg.table_name("ai_memories"), "ai_memories");
        assert_eq!(ss.table_name("ai_memories"), "AI_Memories");
        assert_eq!(ss.table_name("ai_query_history"), "AI_Query_History");
        assert_eq!(ss.table_name("members"), "members");
    }

    #[test]
    fn test_field_names_fall_back() {
        let mock = SchemaCompatibility::new(BackendKind::Mock);
        assert_eq!(mock.field_name("ai_scripts", "filename"), "FileName");
        assert_eq!(mock.field_name("ai_memories", "nonexistent"), "nonexistent");
        assert_eq!(mock.field_name("unknown_table", "x"), "x");
    }

    #[test]
    fn test_deprecated_key_only_on_mock() {
        let mock = SchemaCompatibility::new(BackendKind::Mock);
        let ss = SchemaCompatibility::new(BackendKind::SqlServer);
        assert_eq!(mock.field_name("ai_agents", "model_api_key"), "Model_API_KEY");
        assert_eq!(ss.field_name("ai_agents", "model_api_key"), "model_api_key");
    }

    #[test]
    fn test_row_to_logical_lowercases_unmapped() {
        let ss = SchemaCompatibility::new(BackendKind::SqlServer);
        let physical = row(&[
            ("Memory_ID", json!(4)),
            ("Related_To", json!("sales")),
            ("ExtraCol", json!(true)),
        ]);
        let logical = ss.row_to_logical("ai_memories", physical);
        assert_eq!(logical["memory_id"], 4);
        assert_eq!(logical["related_to"], "sales");
        assert_eq!(logical["extracol"], true);
    }

    #[test]
    fn test_mapping_round_trips_for_every_kind() {
        for kind in ALL_KINDS {
            let compat = SchemaCompatibility::new(kind);
            for (table, _) in TABLES {
                let physical: Row = compat
                    .field_pairs(table)
                    .enumerate()
                    .map(|(i, (_, p))| (p.to_string(), json!(i)))
                    .collect();
                let back = compat.row_from_logical(table, compat.row_to_logical(table, physical.clone()));
                assert_eq!(back, physical, "{kind} {table}");
            }
        }
    }

    #[test]
    fn test_build_select_limit_dialects() {
        let fields = ["agent", "description"];
        let pg = SchemaCompatibility::new(BackendKind::Postgres)
            .build_select("ai_agents", &fields, None, Some("agent"), Some(5));
        assert_eq!(pg, "SELECT agent, description FROM ai_agents ORDER BY agent LIMIT 5");

        let ss = SchemaCompatibility::new(BackendKind::SqlServer)
            .build_select("ai_agents", &fields, Some("Agent = 'x'"), None, Some(5));
        assert_eq!(
            ss,
            "SELECT TOP 5 Agent, Description FROM AI_Agents WHERE Agent = 'x'"
        );

        let mock = SchemaCompatibility::new(BackendKind::Mock)
            .build_select("ai_messages", &[], None, None, Some(0));
        assert_eq!(mock, "SELECT * FROM AI_Messages");
    }

    #[test]
    fn test_build_select_top_rewrites_every_matching_segment() {
        let ss = SchemaCompatibility::new(BackendKind::SqlServer);
        let sql = ss.build_select(
            "ai_agents",
            &[],
            Some("Agent IN (SELECT * FROM Allowed)"),
            None,
            Some(2),
        );
        assert_eq!(sql.matches("TOP 2").count(), 2);
    }

    #[test]
    fn test_build_insert_placeholders() {
        let rows = vec![row(&[("agent", json!("a")), ("memory", json!("m"))])];
        let pg = SchemaCompatibility::new(BackendKind::Postgres).build_insert("ai_memories", &rows);
        assert_eq!(pg, "INSERT INTO ai_memories (agent, memory) VALUES ($1, $2)");
        let ss = SchemaCompatibility::new(BackendKind::SqlServer).build_insert("ai_memories", &rows);
        assert_eq!(ss, "INSERT INTO AI_Memories (Agent, Memory) VALUES (?, ?)");
        assert_eq!(
            SchemaCompatibility::new(BackendKind::Mock).build_insert("ai_memories", &[]),
            ""
        );
    }

    #[test]
    fn test_schema_differences_names_backend() {
        let diff = SchemaCompatibility::new(BackendKind::Postgres).schema_differences();
        assert_eq!(diff["backend"], "postgres");
        assert_eq!(diff["deprecated_fields"][0], "model_api_key");
    }
}
