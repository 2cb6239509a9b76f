//! In-memory data link seeded with credit-union sample data.
//!
//! `query` runs a deliberately small SQL interpreter (see `interpreter`) and
//! `execute` a matching DML interpreter (see `dml`). Statements outside the
//! supported shapes do not fail: SELECTs return the dispatched table's rows
//! unfiltered and DML is logged and ignored.

mod catalog;
mod dml;
mod interpreter;
mod seed;

use crate::db::link::{DataLink, LinkOptions, WriteOptions};
use crate::db::log::LinkLog;
use crate::db::{BackendKind, sql};
use crate::error::{DbError, DbResult};
use crate::models::{Row, now_timestamp};
use serde_json::Value as JsonValue;
use std::sync::{Mutex, MutexGuard};

/// Value a column gets when an insert leaves it out.
#[derive(Debug, Clone)]
pub(crate) enum ColumnDefault {
    Now,
    Value(JsonValue),
}

#[derive(Debug, Clone)]
pub(crate) struct MockTable {
    pub name: String,
    /// Primary key column, reported by the catalog.
    pub key_column: Option<String>,
    /// Set when `key_column` is an identity column.
    pub autoincrement: bool,
    pub next_id: i64,
    pub defaults: Vec<(String, ColumnDefault)>,
    pub rows: Vec<Row>,
}

impl MockTable {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            key_column: None,
            autoincrement: false,
            next_id: 1,
            defaults: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn keyed(mut self, column: &str) -> Self {
        self.key_column = Some(column.to_string());
        self
    }

    pub fn identity(mut self, column: &str) -> Self {
        self.key_column = Some(column.to_string());
        self.autoincrement = true;
        self
    }

    pub fn default_value(mut self, column: &str, default: ColumnDefault) -> Self {
        self.defaults.push((column.to_string(), default));
        self
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        for row in rows {
            self.insert(row);
        }
        self
    }

    /// Append a row, filling identity and default columns it leaves out.
    /// Returns the identity value when the table has one.
    pub fn insert(&mut self, mut row: Row) -> Option<i64> {
        let mut assigned = None;
        if self.autoincrement {
            if let Some(key) = &self.key_column {
                let existing = lookup(&row, key).and_then(JsonValue::as_i64);
                let id = match existing {
                    Some(id) => id,
                    None => {
                        let id = self.next_id;
                        row.insert(key.clone(), JsonValue::from(id));
                        id
                    }
                };
                self.next_id = self.next_id.max(id + 1);
                assigned = Some(id);
            }
        }
        for (column, default) in &self.defaults {
            if lookup(&row, column).is_none() {
                let value = match default {
                    ColumnDefault::Now => JsonValue::String(now_timestamp()),
                    ColumnDefault::Value(v) => v.clone(),
                };
                row.insert(column.clone(), value);
            }
        }
        self.rows.push(row);
        assigned
    }
}

/// Case-insensitive column lookup.
pub(crate) fn lookup<'a>(row: &'a Row, column: &str) -> Option<&'a JsonValue> {
    row.get(column).or_else(|| {
        row.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(column))
            .map(|(_, v)| v)
    })
}

/// Key under which `column` is stored in `row`, if present.
pub(crate) fn stored_key(row: &Row, column: &str) -> Option<String> {
    row.keys().find(|k| k.eq_ignore_ascii_case(column)).cloned()
}

#[derive(Debug)]
pub(crate) struct MockStore {
    /// Seed tables first, in dispatch order; tables created at runtime follow.
    pub tables: Vec<MockTable>,
}

impl MockStore {
    pub fn seeded() -> Self {
        Self {
            tables: seed::tables(),
        }
    }

    pub fn find(&self, name: &str) -> Option<&MockTable> {
        let name = bare_name(name);
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut MockTable> {
        let name = bare_name(name);
        self.tables
            .iter_mut()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// The named table, created empty when it does not exist yet.
    pub fn ensure(&mut self, name: &str) -> &mut MockTable {
        let bare = bare_name(name).to_string();
        let idx = match self
            .tables
            .iter()
            .position(|t| t.name.eq_ignore_ascii_case(&bare))
        {
            Some(idx) => idx,
            None => {
                self.tables.push(MockTable::new(&bare));
                self.tables.len() - 1
            }
        };
        &mut self.tables[idx]
    }
}

/// Strip quoting and schema qualification from a table reference.
pub(crate) fn bare_name(name: &str) -> &str {
    let last = name.rsplit('.').next().unwrap_or(name);
    last.trim_matches(|c| c == '"' || c == '[' || c == ']' || c == '`')
}

/// Seeded in-memory link. Ignores the target database.
#[derive(Debug)]
pub struct MockLink {
    home_database: String,
    store: Mutex<MockStore>,
    log: LinkLog,
}

impl MockLink {
    pub fn new(options: LinkOptions) -> Self {
        Self {
            home_database: options.home_database,
            store: Mutex::new(MockStore::seeded()),
            log: LinkLog::new(options.log_capacity),
        }
    }

    fn store(&self) -> MutexGuard<'_, MockStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of rows currently held by `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.store().find(table).map(|t| t.rows.len()).unwrap_or(0)
    }

    fn insert_rows(&self, table: &str, rows: &[Row]) {
        let mut store = self.store();
        let target = store.ensure(table);
        for row in rows {
            target.insert(row.clone());
        }
    }

    fn upsert_rows(&self, table: &str, rows: &[Row], keys: &[String]) -> (usize, usize) {
        let mut store = self.store();
        let target = store.ensure(table);
        let (mut updated, mut inserted) = (0, 0);
        for row in rows {
            let existing = target.rows.iter_mut().find(|candidate| {
                keys.iter().all(|k| {
                    interpreter::values_equal(
                        lookup(candidate, k).unwrap_or(&JsonValue::Null),
                        row.get(k).unwrap_or(&JsonValue::Null),
                    ) || (lookup(candidate, k).is_none_or(JsonValue::is_null)
                        && row.get(k).is_none_or(JsonValue::is_null))
                })
            });
            match existing {
                Some(candidate) => {
                    for (column, value) in row.iter().filter(|(c, _)| !keys.contains(c)) {
                        let key = stored_key(candidate, column).unwrap_or_else(|| column.clone());
                        candidate.insert(key, value.clone());
                    }
                    updated += 1;
                }
                None => {
                    target.insert(row.clone());
                    inserted += 1;
                }
            }
        }
        (updated, inserted)
    }
}

impl DataLink for MockLink {
    fn kind(&self) -> BackendKind {
        BackendKind::Mock
    }

    fn home_database(&self) -> &str {
        &self.home_database
    }

    fn link_log(&self) -> &LinkLog {
        &self.log
    }

    async fn query_in(&self, _database: Option<&str>, sql: &str) -> DbResult<Vec<Row>> {
        if sql.trim().is_empty() {
            let err = DbError::query("Empty statement", sql);
            self.log(&format!("Mock SQL GET Error: {}", err));
            return Err(err);
        }
        self.log(&format!("Mock executing query: {}", sql));
        let rows = interpreter::select(&self.store(), sql, &self.log);
        Ok(rows)
    }

    async fn execute_in(&self, _database: Option<&str>, sql: &str) -> DbResult<u64> {
        if sql.trim().is_empty() {
            let err = DbError::query("Empty statement", sql);
            self.log(&format!("Mock SQL RUN Error: {}", err));
            return Err(err);
        }
        self.log(&format!("Mock executing statement: {}", sql));
        let outcome = dml::execute(&mut self.store(), sql);
        self.log(&format!("Mock: {}", outcome.describe()));
        Ok(outcome.affected())
    }

    async fn bulk_insert(
        &self,
        table: &str,
        rows: &[Row],
        options: WriteOptions,
    ) -> DbResult<Option<String>> {
        if rows.is_empty() {
            return Ok(None);
        }
        if options.dry_run {
            let statements = sql::insert_statements(self.kind(), table, rows, options.chunk_size);
            return Ok(Some(sql::join_statements(&statements)));
        }
        self.insert_rows(table, rows);
        self.log(&format!("Mock: Bulk inserted {} rows into {}", rows.len(), table));
        Ok(None)
    }

    /// The table's own identity column is used; `id_column` is not consulted.
    async fn insert_returning(
        &self,
        table: &str,
        row: &Row,
        _id_column: &str,
    ) -> DbResult<Option<i64>> {
        let id = self.store().ensure(table).insert(row.clone());
        self.log(&format!("Mock: Inserted 1 row into {}", table));
        Ok(id)
    }

    async fn upsert(
        &self,
        table: &str,
        rows: &[Row],
        key_columns: &[String],
        options: WriteOptions,
    ) -> DbResult<Option<String>> {
        if key_columns.is_empty() {
            return self.bulk_insert(table, rows, options).await;
        }
        if rows.is_empty() {
            return Ok(None);
        }
        if options.dry_run {
            let statements =
                sql::upsert_statements(self.kind(), table, rows, key_columns, options.chunk_size);
            return Ok(Some(sql::join_statements(&statements)));
        }
        let (updated, inserted) = self.upsert_rows(table, rows, key_columns);
        self.log(&format!(
            "Mock: Upserted {} rows in {} ({} updated, {} inserted)",
            rows.len(),
            table,
            updated,
            inserted
        ));
        Ok(None)
    }
}
