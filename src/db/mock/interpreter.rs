//! The scoped SELECT interpreter behind `MockLink::query`.
//!
//! Supported shapes:
//! - dispatch to the first table whose name appears outside string literals
//! - `WHERE` as a conjunction of `col <op> literal`, `col IS [NOT] NULL` and
//!   `col [NOT] IN (...)`, string comparisons ignoring case
//! - the two-user conversation shape
//!   `(user_from = 'a' AND user_to = 'b') OR (user_from = 'b' AND user_to = 'a')`
//! - `ORDER BY col [ASC|DESC]` on the first sort key
//! - `LIMIT n` and `SELECT TOP n`
//! - plain column projections and COUNT/MIN/MAX/SUM/AVG aggregates
//!
//! Anything else is loose on purpose: an unrecognised WHERE falls back to two
//! keyword heuristics (`agent = x`, `user_to = 'x'`) and otherwise keeps every
//! row, and an unrecognised projection returns whole rows.

use super::{MockStore, bare_name, catalog, lookup};
use crate::db::log::LinkLog;
use crate::models::{Row, now_timestamp};
use regex::Regex;
use serde_json::{Number, Value as JsonValue, json};
use std::cmp::Ordering;
use std::sync::LazyLock;

static WHERE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bwhere\b").expect("valid regex"));
static FROM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bfrom\b").expect("valid regex"));
static ORDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\border\s+by\b").expect("valid regex"));
static GROUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bgroup\s+by\b").expect("valid regex"));
static LIMIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\blimit\s+(\d+)").expect("valid regex"));
static TOP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*select\s+(?:distinct\s+)?top\s*\(?\s*(\d+)\s*\)?").expect("valid regex")
});
static SELECT_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*select\s+(distinct\s+)?(?:top\s*\(?\s*\d+\s*\)?\s+)?").expect("valid regex")
});
static AND_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\band\b").expect("valid regex"));
static OR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bor\b").expect("valid regex"));
static CONVERSATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)user_(?:from|to)\s*=\s*'([^']+)'").expect("valid regex")
});
static CONVERSATION_SHAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"user_from\s*=[\s\S]*user_to\s*=|user_to\s*=[\s\S]*user_from\s*=")
        .expect("valid regex")
});
static IS_NULL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^\s*([A-Za-z_][\w.\[\]"]*)\s+is\s+(not\s+)?null\s*$"#).expect("valid regex")
});
static IN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^\s*([A-Za-z_][\w.\[\]"]*)\s+(not\s+)?in\s*\((.*)\)\s*$"#)
        .expect("valid regex")
});
static COMPARE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)^\s*([A-Za-z_][\w.\[\]"]*)\s*(<>|!=|<=|>=|=|<|>)\s*(.+?)\s*$"#)
        .expect("valid regex")
});
static AGGREGATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)^\s*(count|min|max|sum|avg)\s*\(\s*(distinct\s+)?([^)]*?)\s*\)\s*(?:(?:as\s+)?([\w"\[\]]+))?\s*$"#,
    )
    .expect("valid regex")
});
static COLUMN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^\s*([A-Za-z_][\w.\[\]"]*)\s*(?:(?:as\s+)?([\w"\[\]]+))?\s*$"#)
        .expect("valid regex")
});

/// Lowercase copy of `sql` with string literal contents replaced by `x`.
///
/// Byte offsets match the input, so positions found in the mask slice the
/// original text.
pub(super) fn mask(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut in_string = false;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            if in_string && chars.peek() == Some(&'\'') {
                chars.next();
                out.push_str("xx");
                continue;
            }
            in_string = !in_string;
            out.push('\'');
        } else if in_string {
            out.extend(std::iter::repeat_n('x', c.len_utf8()));
        } else {
            out.push(c.to_ascii_lowercase());
        }
    }
    out
}

/// Split `text` at top-level occurrences of `re`, using the mask for both
/// keyword search and paren depth.
fn split_top_level<'a>(text: &'a str, masked: &str, re: &Regex) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for m in re.find_iter(masked) {
        let depth: i32 = masked[..m.start()]
            .chars()
            .map(|c| match c {
                '(' => 1,
                ')' => -1,
                _ => 0,
            })
            .sum();
        if depth == 0 {
            parts.push(&text[start..m.start()]);
            start = m.end();
        }
    }
    parts.push(&text[start..]);
    parts
}

fn split_commas<'a>(text: &'a str, masked: &str) -> Vec<&'a str> {
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

/// Parse a single SQL literal: quoted string, number, NULL, TRUE or FALSE.
pub(super) fn parse_literal(text: &str) -> Option<JsonValue> {
    let text = text.trim();
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        let inner = &text[1..text.len() - 1];
        if inner.replace("''", "").contains('\'') {
            return None;
        }
        return Some(JsonValue::String(inner.replace("''", "'")));
    }
    match text.to_ascii_lowercase().as_str() {
        "null" => return Some(JsonValue::Null),
        "true" => return Some(JsonValue::Bool(true)),
        "false" => return Some(JsonValue::Bool(false)),
        _ => {}
    }
    number(text)
}

fn number(text: &str) -> Option<JsonValue> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(JsonValue::from(i));
    }
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
        .map(JsonValue::Number)
}

fn as_f64(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// SQL equality: NULL equals nothing, strings compare ignoring case, numbers
/// compare numerically even when one side is text.
pub(super) fn values_equal(a: &JsonValue, b: &JsonValue) -> bool {
    compare(a, b) == Some(Ordering::Equal)
}

/// SQL comparison; `None` when either side is NULL.
pub(super) fn compare(a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
    match (a, b) {
        (JsonValue::Null, _) | (_, JsonValue::Null) => None,
        (JsonValue::String(x), JsonValue::String(y)) => {
            Some(x.to_lowercase().cmp(&y.to_lowercase()))
        }
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => Some(a.to_string().to_lowercase().cmp(&b.to_string().to_lowercase())),
        },
    }
}

/// Total order for sorting: NULL first, then booleans, numbers, text.
fn sort_order(a: &JsonValue, b: &JsonValue) -> Ordering {
    fn rank(v: &JsonValue) -> u8 {
        match v {
            JsonValue::Null => 0,
            JsonValue::Bool(_) => 1,
            JsonValue::Number(_) => 2,
            JsonValue::String(_) => 3,
            _ => 4,
        }
    }
    match rank(a).cmp(&rank(b)) {
        Ordering::Equal => compare(a, b).unwrap_or(Ordering::Equal),
        other => other,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Predicate {
    Compare {
        column: String,
        op: String,
        value: JsonValue,
    },
    IsNull {
        column: String,
        negated: bool,
    },
    In {
        column: String,
        values: Vec<JsonValue>,
        negated: bool,
    },
}

impl Predicate {
    pub(super) fn matches(&self, row: &Row) -> bool {
        let cell = |column: &str| lookup(row, column).cloned().unwrap_or(JsonValue::Null);
        match self {
            Predicate::IsNull { column, negated } => cell(column).is_null() != *negated,
            Predicate::In {
                column,
                values,
                negated,
            } => {
                let value = cell(column);
                if value.is_null() {
                    return false;
                }
                values.iter().any(|v| values_equal(&value, v)) != *negated
            }
            Predicate::Compare { column, op, value } => {
                let Some(ordering) = compare(&cell(column), value) else {
                    return false;
                };
                match op.as_str() {
                    "=" => ordering == Ordering::Equal,
                    "<>" | "!=" => ordering != Ordering::Equal,
                    "<" => ordering == Ordering::Less,
                    "<=" => ordering != Ordering::Greater,
                    ">" => ordering == Ordering::Greater,
                    ">=" => ordering != Ordering::Less,
                    _ => false,
                }
            }
        }
    }
}

fn column_name(raw: &str) -> String {
    bare_name(raw.trim()).to_string()
}

fn strip_outer_parens(text: &str) -> &str {
    let mut text = text.trim();
    while text.starts_with('(') && text.ends_with(')') {
        let inner = &text[1..text.len() - 1];
        let masked = mask(inner);
        let mut depth = 0;
        let balanced = masked.chars().all(|c| {
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            }
            depth >= 0
        });
        if !balanced || depth != 0 {
            break;
        }
        text = inner.trim();
    }
    text
}

fn parse_predicate(part: &str) -> Option<Predicate> {
    let part = strip_outer_parens(part);
    if let Some(caps) = IS_NULL_RE.captures(part) {
        return Some(Predicate::IsNull {
            column: column_name(&caps[1]),
            negated: caps.get(2).is_some(),
        });
    }
    if let Some(caps) = IN_RE.captures(part) {
        let list = caps.get(3)?.as_str();
        let values = split_commas(list, &mask(list))
            .into_iter()
            .map(parse_literal)
            .collect::<Option<Vec<_>>>()?;
        return Some(Predicate::In {
            column: column_name(&caps[1]),
            values,
            negated: caps.get(2).is_some(),
        });
    }
    let caps = COMPARE_RE.captures(part)?;
    Some(Predicate::Compare {
        column: column_name(&caps[1]),
        op: caps[2].to_string(),
        value: parse_literal(&caps[3])?,
    })
}

/// Parse a WHERE clause made only of AND-joined simple predicates.
pub(super) fn parse_conjunction(clause: &str) -> Option<Vec<Predicate>> {
    let clause = strip_outer_parens(clause);
    let masked = mask(clause);
    if clause.is_empty() || OR_RE.is_match(&masked) {
        return None;
    }
    split_top_level(clause, &masked, &AND_RE)
        .into_iter()
        .map(parse_predicate)
        .collect()
}

/// Byte ranges of the clauses in a SELECT, found on the masked text.
struct Clauses {
    masked: String,
    from: Option<usize>,
    where_start: Option<usize>,
    group: Option<usize>,
    order: Option<(usize, usize)>,
    limit: Option<usize>,
}

impl Clauses {
    fn scan(sql: &str) -> Self {
        let masked = mask(sql);
        let from = FROM_RE.find(&masked).map(|m| m.start());
        let where_start = WHERE_RE.find(&masked).map(|m| m.end());
        let group = GROUP_RE.find(&masked).map(|m| m.start());
        let order = ORDER_RE.find(&masked).map(|m| (m.start(), m.end()));
        let limit = LIMIT_RE.find(&masked).map(|m| m.start());
        Self {
            masked,
            from,
            where_start,
            group,
            order,
            limit,
        }
    }

    fn end_of(&self, start: usize, sql: &str) -> usize {
        [self.group, self.order.map(|o| o.0), self.limit]
            .into_iter()
            .flatten()
            .filter(|&pos| pos >= start)
            .min()
            .unwrap_or(sql.len())
    }

    fn where_clause<'a>(&self, sql: &'a str) -> Option<&'a str> {
        let start = self.where_start?;
        let end = self.end_of(start, sql);
        Some(sql[start..end].trim().trim_end_matches(';').trim())
    }

    fn order_clause<'a>(&self, sql: &'a str) -> Option<&'a str> {
        let (_, start) = self.order?;
        let end = self.limit.filter(|&l| l >= start).unwrap_or(sql.len());
        Some(sql[start..end].trim().trim_end_matches(';').trim())
    }

    fn row_limit(&self) -> Option<usize> {
        LIMIT_RE
            .captures(&self.masked)
            .or_else(|| TOP_RE.captures(&self.masked))
            .and_then(|caps| caps[1].parse().ok())
    }
}

/// Answer a SELECT from the store.
pub(super) fn select(store: &MockStore, sql: &str, log: &LinkLog) -> Vec<Row> {
    if let Some(rows) = catalog::answer(store, sql) {
        return rows;
    }
    let clauses = Clauses::scan(sql);
    let Some(table) = store.tables.iter().find(|t| mentions_table(&clauses.masked, &t.name)) else {
        return tableless(&clauses.masked);
    };

    let mut rows = match clauses.where_clause(sql) {
        Some(clause) => filter(table.rows.clone(), clause, log),
        None => table.rows.clone(),
    };
    if let Some(order) = clauses.order_clause(sql) {
        sort(&mut rows, order);
    }
    let mut rows = project(rows, sql, &clauses);
    if let Some(limit) = clauses.row_limit() {
        rows.truncate(limit);
    }
    rows
}

fn mentions_table(masked: &str, table: &str) -> bool {
    let needle = table.to_ascii_lowercase();
    let bytes = masked.as_bytes();
    let is_ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    masked.match_indices(&needle).any(|(pos, _)| {
        let before = pos.checked_sub(1).map(|i| bytes[i]);
        let after = bytes.get(pos + needle.len()).copied();
        !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
    })
}

fn tableless(masked: &str) -> Vec<Row> {
    let row = |v: JsonValue| match v {
        JsonValue::Object(map) => map,
        _ => Row::new(),
    };
    if masked.contains("select 1") {
        vec![row(json!({"result": 1}))]
    } else if masked.contains("count(*)") {
        vec![row(json!({"cnt": 0}))]
    } else {
        vec![
            row(json!({"column1": "Sample Value 1", "column2": 123, "column3": now_timestamp()})),
            row(json!({"column1": "Sample Value 2", "column2": 456, "column3": now_timestamp()})),
        ]
    }
}

fn filter(rows: Vec<Row>, clause: &str, log: &LinkLog) -> Vec<Row> {
    let masked = mask(clause);
    if CONVERSATION_SHAPE_RE.is_match(&masked) && OR_RE.is_match(&masked) {
        let users: Vec<String> = CONVERSATION_RE
            .captures_iter(clause)
            .map(|caps| caps[1].to_string())
            .collect();
        let mut rows = rows;
        if let [first, second, ..] = users.as_slice() {
            let before = rows.len();
            let party = |row: &Row, column: &str, name: &str| {
                lookup(row, column)
                    .and_then(JsonValue::as_str)
                    .is_some_and(|v| v.eq_ignore_ascii_case(name))
            };
            rows.retain(|row| {
                (party(row, "User_From", first) && party(row, "User_To", second))
                    || (party(row, "User_From", second) && party(row, "User_To", first))
            });
            log.push(&format!(
                "Mock: Conversation between {} and {} filtered {} to {} messages",
                first,
                second,
                before,
                rows.len()
            ));
        }
        return unread_only(rows, &masked);
    }

    if let Some(predicates) = parse_conjunction(clause) {
        return rows
            .into_iter()
            .filter(|row| predicates.iter().all(|p| p.matches(row)))
            .collect();
    }

    log.push(&format!("Mock: Unsupported WHERE clause, using heuristics: {}", clause));
    let rows = legacy_filter(rows, clause, &masked);
    unread_only(rows, &masked)
}

fn legacy_filter(rows: Vec<Row>, clause: &str, masked: &str) -> Vec<Row> {
    if let Some(pos) = masked.find("agent =") {
        let rest = clause[pos + "agent =".len()..].trim_start();
        let name = rest
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .trim_matches(|c| c == '\'' || c == '"' || c == ')' || c == '(');
        return rows
            .into_iter()
            .filter(|row| {
                lookup(row, "Agent")
                    .and_then(JsonValue::as_str)
                    .is_some_and(|a| a.eq_ignore_ascii_case(name))
            })
            .collect();
    }
    if let Some(pos) = masked.find("user_to =") {
        let rest = clause[pos + "user_to =".len()..].trim_start();
        if let Some(quoted) = rest.strip_prefix('\'') {
            if let Some(end) = quoted.find('\'') {
                let value = &quoted[..end];
                return rows
                    .into_iter()
                    .filter(|row| lookup(row, "User_To").and_then(JsonValue::as_str) == Some(value))
                    .collect();
            }
        }
    }
    rows
}

fn unread_only(rows: Vec<Row>, masked: &str) -> Vec<Row> {
    if masked.contains("user_read is null") {
        rows.into_iter()
            .filter(|row| lookup(row, "User_Read").is_none_or(JsonValue::is_null))
            .collect()
    } else {
        rows
    }
}

fn sort(rows: &mut [Row], order: &str) {
    let first = order.split(',').next().unwrap_or_default();
    let mut words = first.split_whitespace();
    let Some(column) = words.next().map(column_name) else {
        return;
    };
    let descending = words.next().is_some_and(|w| w.eq_ignore_ascii_case("desc"));
    let known = rows.first().is_none_or(|row| lookup(row, &column).is_some());
    if !known {
        return;
    }
    rows.sort_by(|a, b| {
        let x = lookup(a, &column).unwrap_or(&JsonValue::Null);
        let y = lookup(b, &column).unwrap_or(&JsonValue::Null);
        if descending { sort_order(y, x) } else { sort_order(x, y) }
    });
}

enum Item {
    Column { name: String, key: String },
    Aggregate {
        func: String,
        distinct: bool,
        arg: String,
        key: String,
    },
}

fn parse_items(list: &str) -> Option<Vec<Item>> {
    split_commas(list, &mask(list))
        .into_iter()
        .map(|raw| {
            let raw = raw.trim();
            if let Some(caps) = AGGREGATE_RE.captures(raw) {
                let func = caps[1].to_ascii_lowercase();
                let key = caps
                    .get(4)
                    .map(|m| column_name(m.as_str()))
                    .unwrap_or_else(|| raw.to_string());
                return Some(Item::Aggregate {
                    func,
                    distinct: caps.get(2).is_some(),
                    arg: caps[3].trim().to_string(),
                    key,
                });
            }
            let caps = COLUMN_RE.captures(raw)?;
            let name = column_name(&caps[1]);
            let key = caps
                .get(2)
                .map(|m| column_name(m.as_str()))
                .unwrap_or_else(|| name.clone());
            Some(Item::Column { name, key })
        })
        .collect()
}

fn project(rows: Vec<Row>, sql: &str, clauses: &Clauses) -> Vec<Row> {
    let Some(head) = SELECT_HEAD_RE.captures(&clauses.masked) else {
        return rows;
    };
    let distinct = head.get(1).is_some();
    let start = head.get(0).map(|m| m.end()).unwrap_or(0);
    let Some(end) = clauses.from.filter(|&f| f >= start) else {
        return rows;
    };
    let list = sql[start..end].trim();
    if list.contains('*') && !list.to_ascii_lowercase().contains("count(*)") {
        return rows;
    }
    let Some(items) = parse_items(list) else {
        return rows;
    };

    if items.iter().any(|i| matches!(i, Item::Aggregate { .. })) {
        if clauses.group.is_some() {
            return rows;
        }
        return vec![aggregate_row(&rows, &items)];
    }

    let mut projected: Vec<Row> = rows
        .iter()
        .map(|row| {
            items
                .iter()
                .filter_map(|item| match item {
                    Item::Column { name, key } => Some((
                        key.clone(),
                        lookup(row, name).cloned().unwrap_or(JsonValue::Null),
                    )),
                    Item::Aggregate { .. } => None,
                })
                .collect()
        })
        .collect();
    if distinct {
        let mut seen = std::collections::HashSet::new();
        projected.retain(|row| seen.insert(JsonValue::Object(row.clone()).to_string()));
    }
    projected
}

fn aggregate_row(rows: &[Row], items: &[Item]) -> Row {
    let mut out = Row::new();
    for item in items {
        match item {
            Item::Column { name, key } => {
                let value = rows
                    .first()
                    .and_then(|r| lookup(r, name).cloned())
                    .unwrap_or(JsonValue::Null);
                out.insert(key.clone(), value);
            }
            Item::Aggregate {
                func,
                distinct,
                arg,
                key,
            } => {
                out.insert(key.clone(), aggregate(rows, func, *distinct, arg));
            }
        }
    }
    out
}

fn aggregate(rows: &[Row], func: &str, distinct: bool, arg: &str) -> JsonValue {
    if func == "count" && arg == "*" {
        return JsonValue::from(rows.len());
    }
    let column = column_name(arg);
    let mut values: Vec<&JsonValue> = rows
        .iter()
        .filter_map(|r| lookup(r, &column))
        .filter(|v| !v.is_null())
        .collect();
    if distinct {
        let mut seen = std::collections::HashSet::new();
        values.retain(|v| seen.insert(v.to_string().to_lowercase()));
    }
    match func {
        "count" => JsonValue::from(values.len()),
        "min" => values
            .into_iter()
            .min_by(|a, b| sort_order(a, b))
            .cloned()
            .unwrap_or(JsonValue::Null),
        "max" => values
            .into_iter()
            .max_by(|a, b| sort_order(a, b))
            .cloned()
            .unwrap_or(JsonValue::Null),
        "sum" | "avg" => {
            let numbers: Vec<f64> = values.iter().filter_map(|v| as_f64(v)).collect();
            if numbers.is_empty() {
                return JsonValue::Null;
            }
            let total: f64 = numbers.iter().sum();
            if func == "sum" && values.iter().all(|v| v.is_i64()) {
                return JsonValue::from(total as i64);
            }
            let result = if func == "avg" { total / numbers.len() as f64 } else { total };
            Number::from_f64(result)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null)
        }
        _ => JsonValue::Null,
    }
}
