//! Logical entity types.
//!
//! Field names are the logical vocabulary from `SchemaCompatibility`; convert
//! with `row_to_logical` before deserializing a backend row into one of these.

use super::Row;
use crate::error::{DbError, DbResult};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

/// Timestamp format for values written by this server.
///
/// Fixed-width milliseconds keep lexicographic and chronological order equal,
/// and both PostgreSQL and SQL Server accept it as an ISO 8601 literal.
pub const STORE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Current local time in [`STORE_TIMESTAMP_FORMAT`].
pub fn now_timestamp() -> String {
    Local::now().naive_local().format(STORE_TIMESTAMP_FORMAT).to_string()
}

/// Parse the timestamp shapes the backends hand back.
///
/// Accepts RFC 3339 (with offset), ISO with `T` or a space separator and
/// optional fractional seconds, and a bare date (midnight).
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn to_row<T: Serialize>(value: &T) -> Row {
    match serde_json::to_value(value) {
        Ok(JsonValue::Object(map)) => map,
        _ => Row::new(),
    }
}

/// Read a nullable column as its default. SQL `NULL` and a missing key look the same.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn from_row<T: DeserializeOwned>(row: &Row, entity: &str) -> DbResult<T> {
    serde_json::from_value(JsonValue::Object(row.clone()))
        .map_err(|e| DbError::internal(format!("Malformed {} row: {}", entity, e)))
}

/// An agent memory (`ai_memories`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Memory {
    pub memory_id: i64,
    pub agent: String,
    #[serde(default)]
    pub first_posted: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub times_recalled: i64,
    #[serde(default)]
    pub last_recalled: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub memory_label: String,
    #[serde(default)]
    pub memory: Option<String>,
    /// Space-separated tags
    #[serde(default, deserialize_with = "null_as_default")]
    pub related_to: String,
    #[serde(default)]
    pub purge_after: Option<String>,
}

impl Memory {
    pub fn from_row(row: &Row) -> DbResult<Self> {
        from_row(row, "memory")
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.related_to.split_whitespace()
    }

    /// Case-insensitive substring match of any tag against the tag string.
    pub fn matches_any_tag(&self, tags: &[String]) -> bool {
        let related = self.related_to.to_lowercase();
        tags.iter().any(|tag| related.contains(&tag.to_lowercase()))
    }

    /// Case-insensitive substring match against content or label.
    pub fn mentions(&self, text: &str) -> bool {
        let needle = text.to_lowercase();
        self.memory_label.to_lowercase().contains(&needle)
            || self
                .memory
                .as_deref()
                .is_some_and(|m| m.to_lowercase().contains(&needle))
    }

    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.purge_after
            .as_deref()
            .and_then(parse_timestamp)
            .is_some_and(|purge_at| purge_at < now)
    }

    fn last_recalled_at(&self) -> Option<NaiveDateTime> {
        self.last_recalled.as_deref().and_then(parse_timestamp)
    }

    /// Recall ranking: most recalled first, then most recently recalled.
    pub fn recall_order(a: &Memory, b: &Memory) -> std::cmp::Ordering {
        b.times_recalled
            .cmp(&a.times_recalled)
            .then_with(|| b.last_recalled_at().cmp(&a.last_recalled_at()))
    }
}

/// One `execute_query` audit record (`ai_query_history`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueryHistoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_id: Option<i64>,
    pub agent: String,
    pub database_name: String,
    pub sql_query: String,
    pub executed_time: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub row_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub execution_time_ms: i64,
}

impl QueryHistoryEntry {
    pub fn to_row(&self) -> Row {
        to_row(self)
    }

    pub fn from_row(row: &Row) -> DbResult<Self> {
        from_row(row, "query history")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory(times: i64, last: Option<&str>) -> Memory {
        Memory {
            memory_id: 1,
            agent: "DataAnalyst".into(),
            first_posted: None,
            times_recalled: times,
            last_recalled: last.map(String::from),
            memory_label: "Quarterly Sales".into(),
            memory: Some("Sales analysis by quarter".into()),
            related_to: "sales analysis quarterly".into(),
            purge_after: None,
        }
    }

    #[test]
    fn test_parse_timestamp_shapes() {
        assert!(parse_timestamp("2024-03-01T10:15:00.123").is_some());
        assert!(parse_timestamp("2024-03-01 10:15:00").is_some());
        assert!(parse_timestamp("2024-03-01T10:15:00+02:00").is_some());
        assert!(parse_timestamp("2024-03-01").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_now_timestamp_round_trips() {
        assert!(parse_timestamp(&now_timestamp()).is_some());
    }

    #[test]
    fn test_memory_tag_match_is_case_insensitive_substring() {
        let m = memory(0, None);
        assert!(m.matches_any_tag(&["SALES".into()]));
        assert!(m.matches_any_tag(&["nope".into(), "quarter".into()]));
        assert!(!m.matches_any_tag(&["loans".into()]));
    }

    #[test]
    fn test_memory_mentions_label_or_content() {
        let m = memory(0, None);
        assert!(m.mentions("quarterly"));
        assert!(m.mentions("BY QUARTER"));
        assert!(!m.mentions("mortgage"));
    }

    #[test]
    fn test_recall_order() {
        let mut list = vec![
            memory(1, Some("2024-01-01T00:00:00.000")),
            memory(5, None),
            memory(1, Some("2024-02-01T00:00:00.000")),
        ];
        list.sort_by(Memory::recall_order);
        assert_eq!(list[0].times_recalled, 5);
        assert_eq!(list[1].last_recalled.as_deref(), Some("2024-02-01T00:00:00.000"));
    }

    #[test]
    fn test_memory_expiry() {
        let mut m = memory(0, None);
        let now = parse_timestamp("2024-06-01T00:00:00").unwrap();
        assert!(!m.is_expired(now));
        m.purge_after = Some("2024-05-31T23:59:59.000".into());
        assert!(m.is_expired(now));
        m.purge_after = Some("2024-06-02".into());
        assert!(!m.is_expired(now));
    }

    #[test]
    fn test_memory_from_row_tolerates_missing_optional_fields() {
        let row = json!({"memory_id": 7, "agent": "LoanAnalyst", "extra": true});
        let m = Memory::from_row(row.as_object().unwrap()).unwrap();
        assert_eq!(m.memory_id, 7);
        assert_eq!(m.times_recalled, 0);
        assert!(m.memory.is_none());
    }

    #[test]
    fn test_memory_from_row_reads_null_columns_as_defaults() {
        let row = json!({
            "memory_id": 9,
            "agent": "LoanAnalyst",
            "times_recalled": null,
            "memory_label": null,
            "related_to": null,
            "last_recalled": null,
        });
        let m = Memory::from_row(row.as_object().unwrap()).unwrap();
        assert_eq!(m.times_recalled, 0);
        assert_eq!(m.memory_label, "");
        assert_eq!(m.related_to, "");
        assert_eq!(m.tags().count(), 0);
        assert!(!m.matches_any_tag(&["loans".into()]));
    }

    #[test]
    fn test_memory_from_row_still_rejects_wrong_types() {
        let row = json!({"memory_id": 9, "agent": "LoanAnalyst", "times_recalled": "often"});
        let err = Memory::from_row(row.as_object().unwrap()).unwrap_err();
        assert!(err.to_string().contains("Malformed memory row"));
    }

    #[test]
    fn test_history_entry_skips_missing_id() {
        let entry = QueryHistoryEntry {
            query_id: None,
            agent: "system".into(),
            database_name: "TriAI_Main".into(),
            sql_query: "SELECT 1".into(),
            executed_time: now_timestamp(),
            row_count: 1,
            execution_time_ms: 3,
        };
        let row = entry.to_row();
        assert!(!row.contains_key("query_id"));
        assert_eq!(row["row_count"], 1);
    }
}
