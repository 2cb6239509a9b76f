//! INSERT / UPDATE / DELETE against the mock store.
//!
//! Values must be literals or `NOW()`/`GETDATE()`/`CURRENT_TIMESTAMP`; SET also
//! accepts `col = col + n`. WHERE uses the same conjunctive predicates as the
//! SELECT interpreter. Statements outside these shapes change nothing.

use super::interpreter::{Predicate, mask, parse_conjunction, parse_literal};
use super::{MockStore, MockTable, bare_name, lookup, stored_key};
use crate::models::{Row, now_timestamp};
use regex::Regex;
use serde_json::{Number, Value as JsonValue};
use std::sync::LazyLock;

static INSERT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^\s*insert\s+into\s+([\w.\[\]"]+)\s*\(([^)]*)\)\s*values\s*(.*?)\s*;?\s*$"#)
        .expect("valid regex")
});
static UPDATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*update\s+([\w.\[\]"]+)\s+set\s+"#).expect("valid regex")
});
static DELETE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*delete\s+(?:from\s+)?([\w.\[\]"]+)"#).expect("valid regex")
});
static WHERE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bwhere\b").expect("valid regex"));
static NOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(now\s*\(\s*\)|getdate\s*\(\s*\)|current_timestamp(\s*\(\s*\))?)$")
        .expect("valid regex")
});
static ASSIGN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)^\s*([\w.\[\]"]+)\s*=\s*(.+?)\s*$"#).expect("valid regex")
});
static ARITH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([\w.\[\]"]+)\s*([+-])\s*(\d+(?:\.\d+)?)$"#).expect("valid regex")
});
/// `COALESCE(col, n) + m`: arithmetic on a nullable column.
static COALESCE_ARITH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^coalesce\s*\(\s*([\w.\[\]"]+)\s*,\s*(-?\d+(?:\.\d+)?)\s*\)\s*([+-])\s*(\d+(?:\.\d+)?)$"#,
    )
    .expect("valid regex")
});

/// What a statement did to the store.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Outcome {
    Inserted { table: String, rows: usize },
    Updated { table: String, rows: usize },
    Deleted { table: String, rows: usize },
    Ignored(String),
}

impl Outcome {
    pub(super) fn affected(&self) -> u64 {
        match self {
            Outcome::Inserted { rows, .. }
            | Outcome::Updated { rows, .. }
            | Outcome::Deleted { rows, .. } => *rows as u64,
            Outcome::Ignored(_) => 0,
        }
    }

    pub(super) fn describe(&self) -> String {
        match self {
            Outcome::Inserted { table, rows } => format!("Inserted {} rows into {}", rows, table),
            Outcome::Updated { table, rows } => format!("Updated {} rows in {}", rows, table),
            Outcome::Deleted { table, rows } => format!("Deleted {} rows from {}", rows, table),
            Outcome::Ignored(reason) => reason.clone(),
        }
    }
}

pub(super) fn execute(store: &mut MockStore, sql: &str) -> Outcome {
    let statement = sql.trim().trim_end_matches(';').trim();
    let masked = mask(statement);
    let verb = masked.split_whitespace().next().unwrap_or_default();
    match verb {
        "insert" => insert(store, statement),
        "update" => update(store, statement, &masked),
        "delete" => delete(store, statement, &masked),
        "create" => Outcome::Ignored("Table creation simulated".to_string()),
        "drop" => Outcome::Ignored("Table drop simulated".to_string()),
        _ => Outcome::Ignored("Generic SQL statement simulated".to_string()),
    }
}

/// Value of a VALUES item or SET right-hand side that needs no row context.
fn value_of(expr: &str) -> Option<JsonValue> {
    let expr = expr.trim();
    if NOW_RE.is_match(expr) {
        return Some(JsonValue::String(now_timestamp()));
    }
    parse_literal(expr)
}

/// Spelling of `column` already used by the table, so rows keep one key per column.
fn canonical(table: &MockTable, column: &str) -> String {
    table
        .rows
        .iter()
        .find_map(|row| stored_key(row, column))
        .unwrap_or_else(|| column.to_string())
}

fn split_commas(text: &str) -> Vec<&str> {
    let masked = mask(text);
    let mut parts = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (i, c) in masked.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Contents of each top-level `( ... )` group in a VALUES list.
fn tuples(values: &str) -> Option<Vec<&str>> {
    let masked = mask(values);
    let mut groups = Vec::new();
    let mut depth = 0;
    let mut open = 0;
    for (i, c) in masked.char_indices() {
        match c {
            '(' => {
                if depth == 0 {
                    open = i + 1;
                }
                depth += 1;
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    groups.push(&values[open..i]);
                } else if depth < 0 {
                    return None;
                }
            }
            ',' | ' ' | '\n' | '\r' | '\t' if depth == 0 => {}
            _ if depth == 0 => return None,
            _ => {}
        }
    }
    (depth == 0 && !groups.is_empty()).then_some(groups)
}

fn insert(store: &mut MockStore, statement: &str) -> Outcome {
    let Some(caps) = INSERT_RE.captures(statement) else {
        return Outcome::Ignored("Unsupported INSERT shape".to_string());
    };
    let name = bare_name(&caps[1]).to_string();
    let columns: Vec<String> = split_commas(&caps[2])
        .into_iter()
        .map(|c| bare_name(c.trim()).to_string())
        .collect();
    let Some(groups) = tuples(&caps[3]) else {
        return Outcome::Ignored("Unsupported VALUES list".to_string());
    };

    let mut rows: Vec<Row> = Vec::with_capacity(groups.len());
    for group in groups {
        let values: Option<Vec<JsonValue>> = split_commas(group).into_iter().map(value_of).collect();
        let Some(values) = values.filter(|v| v.len() == columns.len()) else {
            return Outcome::Ignored(format!("Unsupported VALUES tuple: ({})", group.trim()));
        };
        rows.push(columns.iter().cloned().zip(values).collect());
    }

    let table = store.ensure(&name);
    let count = rows.len();
    for row in rows {
        let row: Row = row
            .into_iter()
            .map(|(column, value)| (canonical(table, &column), value))
            .collect();
        table.insert(row);
    }
    Outcome::Inserted {
        table: table.name.clone(),
        rows: count,
    }
}

/// Start of the WHERE keyword at or after `from`, and its predicates.
/// `Some(vec![])` when there is no WHERE; `None` when it cannot be parsed.
fn where_predicates(statement: &str, masked: &str, from: usize) -> (usize, Option<Vec<Predicate>>) {
    match WHERE_RE.find_at(masked, from) {
        Some(m) => (m.start(), parse_conjunction(&statement[m.end()..])),
        None => (statement.len(), Some(Vec::new())),
    }
}

enum Assignment {
    Set(String, JsonValue),
    /// target, source, amount, value used when the source is NULL
    Add(String, String, f64, Option<f64>),
}

fn parse_assignment(part: &str) -> Option<Assignment> {
    let caps = ASSIGN_RE.captures(part)?;
    let column = bare_name(&caps[1]).to_string();
    let expr = caps[2].trim();
    if let Some(value) = value_of(expr) {
        return Some(Assignment::Set(column, value));
    }
    if let Some(arith) = COALESCE_ARITH_RE.captures(expr) {
        let fallback: f64 = arith[2].parse().ok()?;
        let amount: f64 = arith[4].parse().ok()?;
        let amount = if &arith[3] == "-" { -amount } else { amount };
        let source = bare_name(&arith[1]).to_string();
        return Some(Assignment::Add(column, source, amount, Some(fallback)));
    }
    let arith = ARITH_RE.captures(expr)?;
    let amount: f64 = arith[3].parse().ok()?;
    let amount = if &arith[2] == "-" { -amount } else { amount };
    Some(Assignment::Add(column, bare_name(&arith[1]).to_string(), amount, None))
}

fn number(value: f64) -> JsonValue {
    if value.fract() == 0.0 {
        JsonValue::from(value as i64)
    } else {
        Number::from_f64(value).map(JsonValue::Number).unwrap_or(JsonValue::Null)
    }
}

fn apply(row: &mut Row, assignment: &Assignment) {
    let (column, value) = match assignment {
        Assignment::Set(column, value) => (column, value.clone()),
        Assignment::Add(column, source, amount, fallback) => {
            let current = match (lookup(row, source).cloned(), fallback) {
                (None | Some(JsonValue::Null), Some(fallback)) => number(*fallback),
                (current, _) => current.unwrap_or(JsonValue::Null),
            };
            let value = match current {
                JsonValue::Number(n) if n.is_i64() && amount.fract() == 0.0 => {
                    JsonValue::from(n.as_i64().unwrap_or_default() + *amount as i64)
                }
                JsonValue::Number(n) => n
                    .as_f64()
                    .and_then(|f| Number::from_f64(f + amount))
                    .map(JsonValue::Number)
                    .unwrap_or(JsonValue::Null),
                _ => JsonValue::Null,
            };
            (column, value)
        }
    };
    let key = stored_key(row, column).unwrap_or_else(|| column.clone());
    row.insert(key, value);
}

fn update(store: &mut MockStore, statement: &str, masked: &str) -> Outcome {
    let Some(caps) = UPDATE_RE.captures(masked) else {
        return Outcome::Ignored("Unsupported UPDATE shape".to_string());
    };
    let (Some(name), Some(head)) = (caps.get(1), caps.get(0)) else {
        return Outcome::Ignored("Unsupported UPDATE shape".to_string());
    };
    let name = bare_name(&statement[name.range()]).to_string();
    let (where_start, predicates) = where_predicates(statement, masked, head.end());
    let Some(predicates) = predicates else {
        return Outcome::Ignored(format!("Unsupported WHERE in UPDATE of {}", name));
    };
    let assignments: Option<Vec<Assignment>> = split_commas(&statement[head.end()..where_start])
        .into_iter()
        .map(parse_assignment)
        .collect();
    let Some(assignments) = assignments else {
        return Outcome::Ignored(format!("Unsupported SET list in UPDATE of {}", name));
    };
    let Some(table) = store.find_mut(&name) else {
        return Outcome::Ignored(format!("UPDATE of unknown table {}", name));
    };

    let mut count = 0;
    for row in table.rows.iter_mut() {
        if predicates.iter().all(|p| p.matches(row)) {
            for assignment in &assignments {
                apply(row, assignment);
            }
            count += 1;
        }
    }
    Outcome::Updated {
        table: table.name.clone(),
        rows: count,
    }
}

fn delete(store: &mut MockStore, statement: &str, masked: &str) -> Outcome {
    let Some(caps) = DELETE_RE.captures(masked) else {
        return Outcome::Ignored("Unsupported DELETE shape".to_string());
    };
    let (Some(name), Some(head)) = (caps.get(1), caps.get(0)) else {
        return Outcome::Ignored("Unsupported DELETE shape".to_string());
    };
    let name = bare_name(&statement[name.range()]).to_string();
    let (_, predicates) = where_predicates(statement, masked, head.end());
    let Some(predicates) = predicates else {
        return Outcome::Ignored(format!("Unsupported WHERE in DELETE from {}", name));
    };
    let Some(table) = store.find_mut(&name) else {
        return Outcome::Ignored(format!("DELETE from unknown table {}", name));
    };

    let before = table.rows.len();
    table
        .rows
        .retain(|row| !predicates.iter().all(|p| p.matches(row)));
    Outcome::Deleted {
        table: table.name.clone(),
        rows: before - table.rows.len(),
    }
}
