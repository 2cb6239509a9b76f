//! SQL text rendering shared by every backend.
//!
//! Literals are inlined rather than bound: tools hand the links complete SQL
//! text, and the generated bulk statements have to be printable for dry runs.

use crate::db::BackendKind;
use crate::models::Row;
use serde_json::Value as JsonValue;

/// Turn a scalar into a SQL literal.
///
/// `NULL` for null; anything else is stringified, embedded single quotes are
/// doubled, and the result is quote-wrapped when `quote` is set.
pub fn escape(value: &JsonValue, quote: bool) -> String {
    let text = match value {
        JsonValue::Null => return "NULL".to_string(),
        JsonValue::String(s) => s.replace('\'', "''"),
        other => other.to_string().replace('\'', "''"),
    };
    if quote { format!("'{}'", text) } else { text }
}

/// Literal for generated DML: numbers bare, booleans per dialect, the rest escaped.
pub fn literal(kind: BackendKind, value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => match (kind, b) {
            (BackendKind::Postgres, true) => "TRUE".to_string(),
            (BackendKind::Postgres, false) => "FALSE".to_string(),
            (_, true) => "1".to_string(),
            (_, false) => "0".to_string(),
        },
        other => escape(other, true),
    }
}

/// Quote a possibly schema-qualified identifier for the dialect.
pub fn quote_ident(kind: BackendKind, name: &str) -> String {
    name.split('.')
        .map(|part| match kind {
            BackendKind::Postgres => format!("\"{}\"", part.replace('"', "\"\"")),
            BackendKind::SqlServer => format!("[{}]", part.replace(']', "]]")),
            BackendKind::Mock => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Column order for a batch: first appearance across all rows.
fn columns_of(rows: &[Row]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

fn value_tuple(kind: BackendKind, row: &Row, columns: &[String]) -> String {
    let values: Vec<String> = columns
        .iter()
        .map(|c| literal(kind, row.get(c).unwrap_or(&JsonValue::Null)))
        .collect();
    format!("({})", values.join(", "))
}

fn column_list(kind: BackendKind, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(kind, c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Multi-row INSERT statements, at most `chunk_size` rows each.
pub fn insert_statements(
    kind: BackendKind,
    table: &str,
    rows: &[Row],
    chunk_size: usize,
) -> Vec<String> {
    let table = quote_ident(kind, table);
    rows.chunks(chunk_size.max(1))
        .map(|chunk| {
            let columns = columns_of(chunk);
            let tuples: Vec<String> = chunk
                .iter()
                .map(|row| value_tuple(kind, row, &columns))
                .collect();
            format!(
                "INSERT INTO {} ({}) VALUES {}",
                table,
                column_list(kind, &columns),
                tuples.join(", ")
            )
        })
        .collect()
}

/// Single-row INSERT that hands back the value generated for `id_column`.
///
/// PostgreSQL appends `RETURNING`; SQL Server puts `OUTPUT INSERTED` ahead of
/// `VALUES`. The mock dialect has no such clause and gets a plain insert.
pub fn insert_returning_statement(
    kind: BackendKind,
    table: &str,
    row: &Row,
    id_column: &str,
) -> String {
    let columns: Vec<String> = row.keys().cloned().collect();
    let head = format!(
        "INSERT INTO {} ({})",
        quote_ident(kind, table),
        column_list(kind, &columns)
    );
    let values = value_tuple(kind, row, &columns);
    let id = quote_ident(kind, id_column);
    match kind {
        BackendKind::Postgres => format!("{} VALUES {} RETURNING {}", head, values, id),
        BackendKind::SqlServer => format!("{} OUTPUT INSERTED.{} VALUES {}", head, id, values),
        BackendKind::Mock => format!("{} VALUES {}", head, values),
    }
}

fn key_predicate(kind: BackendKind, row: &Row, keys: &[String]) -> String {
    keys.iter()
        .map(|k| match row.get(k) {
            None | Some(JsonValue::Null) => format!("{} IS NULL", quote_ident(kind, k)),
            Some(v) => format!("{} = {}", quote_ident(kind, k), literal(kind, v)),
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Merge statements keyed on `keys`. Callers route empty `keys` to plain insert.
///
/// PostgreSQL gets chunked `INSERT .. ON CONFLICT`; the other dialects get one
/// `IF EXISTS .. UPDATE .. ELSE INSERT` batch per row.
pub fn upsert_statements(
    kind: BackendKind,
    table: &str,
    rows: &[Row],
    keys: &[String],
    chunk_size: usize,
) -> Vec<String> {
    match kind {
        BackendKind::Postgres => insert_statements(kind, table, rows, chunk_size)
            .into_iter()
            .zip(rows.chunks(chunk_size.max(1)))
            .map(|(insert, chunk)| {
                let updates: Vec<String> = columns_of(chunk)
                    .iter()
                    .filter(|c| !keys.contains(c))
                    .map(|c| {
                        let col = quote_ident(kind, c);
                        format!("{} = EXCLUDED.{}", col, col)
                    })
                    .collect();
                let conflict = column_list(kind, keys);
                if updates.is_empty() {
                    format!("{} ON CONFLICT ({}) DO NOTHING", insert, conflict)
                } else {
                    format!(
                        "{} ON CONFLICT ({}) DO UPDATE SET {}",
                        insert,
                        conflict,
                        updates.join(", ")
                    )
                }
            })
            .collect(),
        BackendKind::SqlServer | BackendKind::Mock => {
            let quoted_table = quote_ident(kind, table);
            rows.iter()
                .map(|row| {
                    let predicate = key_predicate(kind, row, keys);
                    let columns: Vec<String> = row.keys().cloned().collect();
                    let insert = format!(
                        "INSERT INTO {} ({}) VALUES {}",
                        quoted_table,
                        column_list(kind, &columns),
                        value_tuple(kind, row, &columns)
                    );
                    let sets: Vec<String> = row
                        .iter()
                        .filter(|(c, _)| !keys.contains(c))
                        .map(|(c, v)| format!("{} = {}", quote_ident(kind, c), literal(kind, v)))
                        .collect();
                    if sets.is_empty() {
                        format!(
                            "IF NOT EXISTS (SELECT 1 FROM {} WHERE {}) {}",
                            quoted_table, predicate, insert
                        )
                    } else {
                        format!(
                            "IF EXISTS (SELECT 1 FROM {t} WHERE {p}) UPDATE {t} SET {s} WHERE {p} ELSE {i}",
                            t = quoted_table,
                            p = predicate,
                            s = sets.join(", "),
                            i = insert
                        )
                    }
                })
                .collect()
        }
    }
}

/// Join statements the way a dry run reports them.
pub fn join_statements(statements: &[String]) -> String {
    statements.join(";\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(values: JsonValue) -> Vec<Row> {
        values
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_literal_per_dialect() {
        assert_eq!(literal(BackendKind::Postgres, &json!(true)), "TRUE");
        assert_eq!(literal(BackendKind::SqlServer, &json!(true)), "1");
        assert_eq!(literal(BackendKind::Mock, &json!(false)), "0");
        assert_eq!(literal(BackendKind::Mock, &json!(1.5)), "1.5");
        assert_eq!(literal(BackendKind::Mock, &json!("a'b")), "'a''b'");
    }

    #[test]
    fn test_insert_returning_per_dialect() {
        let row = json!({"agent": "DataAnalyst", "memory": "it's noted", "times_recalled": 0});
        let row = row.as_object().unwrap();
        assert_eq!(
            insert_returning_statement(BackendKind::Postgres, "ai_memories", row, "memory_id"),
            "INSERT INTO \"ai_memories\" (\"agent\", \"memory\", \"times_recalled\") \
             VALUES ('DataAnalyst', 'it''s noted', 0) RETURNING \"memory_id\""
        );
        assert_eq!(
            insert_returning_statement(BackendKind::SqlServer, "AI_Memories", row, "Memory_ID"),
            "INSERT INTO [AI_Memories] ([agent], [memory], [times_recalled]) \
             OUTPUT INSERTED.[Memory_ID] VALUES ('DataAnalyst', 'it''s noted', 0)"
        );
        assert!(
            !insert_returning_statement(BackendKind::Mock, "AI_Memories", row, "Memory_ID")
                .contains("Memory_ID")
        );
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident(BackendKind::Postgres, "public.members"), "\"public\".\"members\"");
        assert_eq!(quote_ident(BackendKind::SqlServer, "dbo.AI_Memories"), "[dbo].[AI_Memories]");
        assert_eq!(quote_ident(BackendKind::Mock, "AI_Memories"), "AI_Memories");
    }

    #[test]
    fn test_insert_chunks() {
        let data = rows(json!([{"a": 1}, {"a": 2}, {"a": 3}]));
        let stmts = insert_statements(BackendKind::Mock, "t", &data, 2);
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0], "INSERT INTO t (a) VALUES (1), (2)");
        assert_eq!(stmts[1], "INSERT INTO t (a) VALUES (3)");
    }

    #[test]
    fn test_insert_fills_missing_columns_with_null() {
        let data = rows(json!([{"a": 1}, {"b": "x"}]));
        let stmts = insert_statements(BackendKind::Postgres, "t", &data, 500);
        assert_eq!(
            stmts[0],
            "INSERT INTO \"t\" (\"a\", \"b\") VALUES (1, NULL), (NULL, 'x')"
        );
    }

    #[test]
    fn test_postgres_upsert() {
        let data = rows(json!([{"id": 1, "name": "n"}]));
        let stmts = upsert_statements(BackendKind::Postgres, "t", &data, &["id".into()], 500);
        assert_eq!(
            stmts[0],
            "INSERT INTO \"t\" (\"id\", \"name\") VALUES (1, 'n') ON CONFLICT (\"id\") DO UPDATE SET \"name\" = EXCLUDED.\"name\""
        );

        let keys_only = rows(json!([{"id": 1}]));
        let stmts = upsert_statements(BackendKind::Postgres, "t", &keys_only, &["id".into()], 500);
        assert!(stmts[0].ends_with("ON CONFLICT (\"id\") DO NOTHING"));
    }

    #[test]
    fn test_sqlserver_upsert() {
        let data = rows(json!([{"id": 1, "name": "n"}, {"id": null}]));
        let stmts = upsert_statements(BackendKind::SqlServer, "t", &data, &["id".into()], 500);
        assert_eq!(stmts.len(), 2);
        assert_eq!(
            stmts[0],
            "IF EXISTS (SELECT 1 FROM [t] WHERE [id] = 1) UPDATE [t] SET [name] = 'n' WHERE [id] = 1 ELSE INSERT INTO [t] ([id], [name]) VALUES (1, 'n')"
        );
        assert_eq!(
            stmts[1],
            "IF NOT EXISTS (SELECT 1 FROM [t] WHERE [id] IS NULL) INSERT INTO [t] ([id]) VALUES (NULL)"
        );
    }
}
