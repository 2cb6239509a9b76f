//! Canned system-catalog answers for the mock link.
//!
//! Recognises the INFORMATION_SCHEMA / sys catalog reads the tool provider
//! issues and answers them from the seed tables, with the column shapes a SQL
//! Server instance would return. The answer is final: no further WHERE or
//! ORDER BY processing is applied.

use super::{MockStore, MockTable, lookup};
use crate::models::{Row, parse_timestamp};
use regex::Regex;
use serde_json::{Value as JsonValue, json};
use std::sync::LazyLock;

static TABLE_FILTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:table_name|referenced_entity_name)\s*=\s*'([^']*)'").expect("valid regex")
});

/// Database names reported by `sys.databases`.
pub(super) const DATABASES: [&str; 4] = ["TriAI_Main", "SalesDB", "CustomerDB", "InventoryDB"];

const VIEWS: [&str; 2] = ["vw_ActiveAgents", "vw_RecentMessages"];
const ROUTINES: [&str; 2] = ["sp_GetAgentStats", "sp_CleanupOldMemories"];

/// (parent table, parent column, child table, child column, constraint)
const RELATIONSHIPS: [(&str, &str, &str, &str, &str); 2] = [
    ("AI_Agents", "Agent", "AI_Messages", "User_To", "FK_Messages_Agent"),
    ("AI_Agents", "Agent", "AI_Memories", "Agent", "FK_Memories_Agent"),
];

/// (dependent object, kind, referenced table)
const DEPENDENCIES: [(&str, &str, &str); 2] = [
    ("vw_ActiveAgents", "VIEW", "AI_Agents"),
    ("sp_GetAgentStats", "PROCEDURE", "AI_Messages"),
];

/// (column, type, nullable, default)
type ColumnSpec = (&'static str, &'static str, bool, Option<&'static str>);

const AGENT_COLUMNS: &[ColumnSpec] = &[
    ("Agent", "varchar(15)", false, None),
    ("Description", "varchar(max)", true, None),
    ("Role", "varchar(100)", true, None),
    ("Model_API", "varchar(30)", true, None),
    ("Model", "varchar(100)", true, None),
    ("Polling_Interval", "int", true, None),
    ("Model_API_KEY", "varchar(500)", true, None),
];

const MESSAGE_COLUMNS: &[ColumnSpec] = &[
    ("Message_ID", "int", false, None),
    ("Posted", "datetime", false, Some("(getdate())")),
    ("User_From", "varchar(15)", false, None),
    ("User_To", "varchar(15)", false, None),
    ("Message", "varchar(max)", true, None),
    ("User_Read", "datetime", true, None),
];

const MEMORY_COLUMNS: &[ColumnSpec] = &[
    ("Memory_ID", "int", false, None),
    ("Agent", "varchar(15)", false, None),
    ("First_Posted", "datetime", false, Some("(getdate())")),
    ("Times_Recalled", "int", false, Some("((0))")),
    ("Last_Recalled", "datetime", true, None),
    ("Memory_Label", "varchar(100)", false, None),
    ("Memory", "varchar(max)", true, None),
    ("Related_To", "varchar(200)", false, None),
    ("Purge_After", "datetime", true, None),
];

const QUERY_HISTORY_COLUMNS: &[ColumnSpec] = &[
    ("Query_ID", "int", false, None),
    ("Agent", "varchar(15)", false, None),
    ("Database_Name", "varchar(128)", false, None),
    ("SQL_Query", "varchar(max)", false, None),
    ("Executed_Time", "datetime", false, Some("(getdate())")),
    ("Row_Count", "int", true, None),
    ("Execution_Time_MS", "int", true, None),
];

/// Reported for tables the store does not hold.
const GENERIC_COLUMNS: &[ColumnSpec] = &[
    ("ID", "int", false, None),
    ("Name", "varchar(100)", true, None),
    ("Created", "datetime", false, None),
];

fn row(value: JsonValue) -> Row {
    match value {
        JsonValue::Object(map) => map,
        _ => Row::new(),
    }
}

/// The catalog answer for `sql`, or `None` when it is not a catalog read.
pub(super) fn answer(store: &MockStore, sql: &str) -> Option<Vec<Row>> {
    let lower = sql.to_ascii_lowercase();
    let filter = TABLE_FILTER_RE
        .captures(sql)
        .map(|caps| caps[1].to_string());
    let named = |candidate: &str| {
        filter
            .as_deref()
            .is_none_or(|name| candidate.eq_ignore_ascii_case(name))
    };

    if lower.contains("sys.databases") || lower.contains("pg_database") {
        return Some(DATABASES.iter().map(|name| row(json!({ "name": name }))).collect());
    }

    if lower.contains("referential_constraints")
        || (lower.contains("table_constraints") && lower.contains("foreign key"))
    {
        return Some(
            RELATIONSHIPS
                .iter()
                .filter(|(parent, _, child, _, _)| named(parent) || named(child))
                .map(|(parent, parent_col, child, child_col, constraint)| {
                    row(json!({
                        "PARENT_TABLE": parent,
                        "PARENT_COLUMN": parent_col,
                        "CHILD_TABLE": child,
                        "CHILD_COLUMN": child_col,
                        "CONSTRAINT_NAME": constraint,
                    }))
                })
                .collect(),
        );
    }

    if lower.contains("sql_expression_dependencies") || lower.contains("view_table_usage") {
        return Some(
            DEPENDENCIES
                .iter()
                .filter(|(_, _, referenced)| named(referenced))
                .map(|(object, kind, referenced)| {
                    row(json!({
                        "DEPENDENT_OBJECT": object,
                        "DEPENDENCY_TYPE": kind,
                        "REFERENCED_TABLE": referenced,
                    }))
                })
                .collect(),
        );
    }

    if lower.contains("information_schema.columns") {
        let name = filter.unwrap_or_default();
        return Some(describe(store, &name));
    }

    if lower.contains("information_schema.routines") {
        return Some(
            ROUTINES
                .iter()
                .map(|name| {
                    row(json!({
                        "ROUTINE_SCHEMA": "dbo",
                        "ROUTINE_NAME": name,
                        "ROUTINE_TYPE": "PROCEDURE",
                    }))
                })
                .collect(),
        );
    }

    if lower.contains("information_schema.views")
        || (lower.contains("information_schema.tables") && lower.contains("'view'"))
    {
        return Some(
            VIEWS
                .iter()
                .map(|name| row(json!({ "TABLE_SCHEMA": "dbo", "TABLE_NAME": name, "TABLE_TYPE": "VIEW" })))
                .collect(),
        );
    }

    if lower.contains("information_schema.tables") {
        return Some(
            store
                .tables
                .iter()
                .map(|t| {
                    row(json!({
                        "TABLE_SCHEMA": "dbo",
                        "TABLE_NAME": t.name,
                        "TABLE_TYPE": "BASE TABLE",
                    }))
                })
                .collect(),
        );
    }

    None
}

fn column_row(name: &str, data_type: &str, nullable: bool, default: Option<&str>, primary: bool) -> Row {
    row(json!({
        "COLUMN_NAME": name,
        "DATA_TYPE": data_type,
        "IS_NULLABLE": if nullable { "YES" } else { "NO" },
        "COLUMN_DEFAULT": default,
        "IS_PRIMARY_KEY": if primary { 1 } else { 0 },
    }))
}

fn from_specs(specs: &[ColumnSpec], key: Option<&str>) -> Vec<Row> {
    specs
        .iter()
        .map(|(name, data_type, nullable, default)| {
            column_row(name, data_type, *nullable, *default, key == Some(*name))
        })
        .collect()
}

/// Column metadata for `table`: fixed definitions for the TriAI tables,
/// inferred from the stored rows for the rest.
fn describe(store: &MockStore, table: &str) -> Vec<Row> {
    let Some(found) = store.find(table) else {
        return from_specs(GENERIC_COLUMNS, Some("ID"));
    };
    let key = found.key_column.as_deref();
    match found.name.to_ascii_lowercase().as_str() {
        "ai_agents" => from_specs(AGENT_COLUMNS, key),
        "ai_messages" => from_specs(MESSAGE_COLUMNS, key),
        "ai_memories" => from_specs(MEMORY_COLUMNS, key),
        "ai_query_history" => from_specs(QUERY_HISTORY_COLUMNS, key),
        _ => inferred(found),
    }
}

fn inferred(table: &MockTable) -> Vec<Row> {
    let mut columns: Vec<String> = Vec::new();
    for r in &table.rows {
        for name in r.keys() {
            if !columns.iter().any(|c| c.eq_ignore_ascii_case(name)) {
                columns.push(name.clone());
            }
        }
    }
    columns
        .iter()
        .map(|name| {
            let values: Vec<&JsonValue> = table.rows.iter().filter_map(|r| lookup(r, name)).collect();
            let nullable = values.len() < table.rows.len() || values.iter().any(|v| v.is_null());
            let data_type = values
                .iter()
                .find(|v| !v.is_null())
                .map(|v| sql_type(v))
                .unwrap_or("varchar");
            let primary = table
                .key_column
                .as_deref()
                .is_some_and(|k| k.eq_ignore_ascii_case(name));
            column_row(name, data_type, nullable, None, primary)
        })
        .collect()
}

fn sql_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Bool(_) => "bit",
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => "int",
        JsonValue::Number(_) => "decimal",
        JsonValue::String(s) if s.len() == 10 && parse_timestamp(s).is_some() => "date",
        JsonValue::String(s) if parse_timestamp(s).is_some() => "datetime",
        _ => "varchar",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ask(sql: &str) -> Vec<Row> {
        answer(&MockStore::seeded(), sql).unwrap()
    }

    #[test]
    fn test_not_a_catalog_query() {
        assert!(answer(&MockStore::seeded(), "SELECT * FROM AI_Agents").is_none());
    }

    #[test]
    fn test_tables_lists_store_tables() {
        let rows = ask("SELECT TABLE_SCHEMA, TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE = 'BASE TABLE'");
        assert_eq!(rows.len(), 9);
        assert_eq!(rows[0]["TABLE_NAME"], "AI_Agents");
    }

    #[test]
    fn test_views_and_routines() {
        assert_eq!(ask("SELECT TABLE_NAME FROM INFORMATION_SCHEMA.VIEWS").len(), 2);
        let routines = ask("SELECT ROUTINE_NAME FROM INFORMATION_SCHEMA.ROUTINES");
        assert_eq!(routines[1]["ROUTINE_NAME"], "sp_CleanupOldMemories");
    }

    #[test]
    fn test_columns_for_memories() {
        let rows = ask(
            "SELECT COLUMN_NAME, DATA_TYPE FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_NAME = 'AI_Memories'",
        );
        assert_eq!(rows.len(), 9);
        assert_eq!(rows[0]["COLUMN_NAME"], "Memory_ID");
        assert_eq!(rows[0]["IS_PRIMARY_KEY"], 1);
        assert_eq!(rows[3]["COLUMN_DEFAULT"], "((0))");
    }

    #[test]
    fn test_columns_inferred_for_sample_tables() {
        let rows = ask("SELECT * FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_NAME = 'loans'");
        let amount = rows.iter().find(|r| r["COLUMN_NAME"] == "Loan_Amount").unwrap();
        assert_eq!(amount["DATA_TYPE"], "decimal");
        let date = rows.iter().find(|r| r["COLUMN_NAME"] == "Origination_Date").unwrap();
        assert_eq!(date["DATA_TYPE"], "date");
        assert_eq!(rows[0]["IS_PRIMARY_KEY"], 1);
    }

    #[test]
    fn test_columns_for_unknown_table_are_generic() {
        let rows = ask("SELECT * FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_NAME = 'Orders'");
        let names: Vec<_> = rows.iter().map(|r| r["COLUMN_NAME"].clone()).collect();
        assert_eq!(names, vec![json!("ID"), json!("Name"), json!("Created")]);
    }

    #[test]
    fn test_relationships_filtered_by_table() {
        let sql = "SELECT * FROM INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS rc";
        assert_eq!(ask(sql).len(), 2);
        let rows = ask(&format!("{} WHERE pk.TABLE_NAME = 'AI_Memories' OR fk.TABLE_NAME = 'AI_Memories'", sql));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["CONSTRAINT_NAME"], "FK_Memories_Agent");
    }

    #[test]
    fn test_dependencies() {
        let sql = "SELECT * FROM sys.sql_expression_dependencies d";
        assert_eq!(ask(sql).len(), 2);
        let rows = ask(&format!("{} WHERE d.referenced_entity_name = 'AI_Agents'", sql));
        assert_eq!(rows[0]["DEPENDENT_OBJECT"], "vw_ActiveAgents");
    }

    #[test]
    fn test_databases() {
        let rows = ask("SELECT name FROM sys.databases WHERE database_id > 4");
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0]["name"], "TriAI_Main");
    }
}
