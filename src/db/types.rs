//! Driver row → JSON conversion.
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies a PostgreSQL column type name
//! 2. Per-category decoders extract the value
//!
//! SQL Server rows arrive as self-describing `ColumnData`, so they are matched
//! directly. Temporal values render in the store timestamp format; exact
//! numerics keep their textual form so no precision is lost.

use crate::models::{Row, STORE_TIMESTAMP_FORMAT};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::{Column, Decode, Row as _, Type, TypeInfo};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Binary,
    Json,
    Uuid,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    Unknown,
}

/// Classify a PostgreSQL type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    match lower.as_str() {
        "int2" | "int4" | "int8" | "smallint" | "integer" | "int" | "bigint" | "serial"
        | "smallserial" | "bigserial" | "oid" => TypeCategory::Integer,
        "float4" | "float8" | "real" | "double precision" => TypeCategory::Float,
        "numeric" | "decimal" => TypeCategory::Decimal,
        "bool" | "boolean" => TypeCategory::Boolean,
        "bytea" => TypeCategory::Binary,
        "json" | "jsonb" => TypeCategory::Json,
        "uuid" => TypeCategory::Uuid,
        "timestamptz" | "timestamp with time zone" => TypeCategory::TimestampTz,
        "timestamp" | "timestamp without time zone" => TypeCategory::Timestamp,
        "date" => TypeCategory::Date,
        "time" | "time without time zone" => TypeCategory::Time,
        _ => TypeCategory::Unknown,
    }
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Raw NUMERIC value as the server printed it.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Base64 for binary columns, or UTF-8 text when `decode_binary` is set and valid.
pub fn decode_binary_value(bytes: &[u8], decode_binary: bool) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    if decode_binary {
        if let Ok(s) = std::str::from_utf8(bytes) {
            return JsonValue::String(s.to_string());
        }
    }
    JsonValue::String(STANDARD.encode(bytes))
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

fn timestamp_value(v: NaiveDateTime) -> JsonValue {
    JsonValue::String(v.format(STORE_TIMESTAMP_FORMAT).to_string())
}

fn timestamptz_value(v: DateTime<Utc>) -> JsonValue {
    JsonValue::String(v.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn date_value(v: NaiveDate) -> JsonValue {
    JsonValue::String(v.format("%Y-%m-%d").to_string())
}

fn time_value(v: NaiveTime) -> JsonValue {
    JsonValue::String(v.format("%H:%M:%S%.3f").to_string())
}

// =============================================================================
// PostgreSQL
// =============================================================================

/// Trait for converting database rows to JSON maps.
pub trait RowToJson {
    fn to_json_map(&self) -> Row;
}

impl RowToJson for PgRow {
    fn to_json_map(&self) -> Row {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name());
                let value = postgres::decode_column(self, idx, category);
                (col.name().to_string(), value)
            })
            .collect()
    }
}

mod postgres {
    use super::*;

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> JsonValue {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode::<bool>(row, idx, JsonValue::Bool),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => {
                decode::<Vec<u8>>(row, idx, |v| decode_binary_value(&v, false))
            }
            TypeCategory::Json => decode::<JsonValue>(row, idx, |v| v),
            TypeCategory::Uuid => decode::<uuid::Uuid>(row, idx, |v| JsonValue::String(v.to_string())),
            TypeCategory::Timestamp => decode::<NaiveDateTime>(row, idx, timestamp_value),
            TypeCategory::TimestampTz => decode::<DateTime<Utc>>(row, idx, timestamptz_value),
            TypeCategory::Date => decode::<NaiveDate>(row, idx, date_value),
            TypeCategory::Time => decode::<NaiveTime>(row, idx, time_value),
            TypeCategory::Unknown => decode_text(row, idx),
        }
    }

    fn decode<'r, T>(row: &'r PgRow, idx: usize, to_json: impl FnOnce(T) -> JsonValue) -> JsonValue
    where
        T: Decode<'r, sqlx::Postgres> + Type<sqlx::Postgres>,
    {
        match row.try_get::<Option<T>, _>(idx) {
            Ok(Some(v)) => to_json(v),
            Ok(None) => JsonValue::Null,
            Err(e) => {
                tracing::error!(column = idx, "Failed to decode column: {:?}", e);
                JsonValue::Null
            }
        }
    }

    fn decode_decimal(row: &PgRow, idx: usize) -> JsonValue {
        decode::<RawDecimal>(row, idx, |v| JsonValue::String(v.0))
    }

    fn decode_integer(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(None) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Null;
        }
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<sqlx::postgres::types::Oid>, _>(idx) {
            return JsonValue::Number(v.0.into());
        }
        JsonValue::Null
    }

    fn decode_float(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return float_value(v as f64);
        }
        JsonValue::Null
    }

    /// Text-like and unrecognised types. Falls back to an unchecked read so
    /// catalog types such as `name` or enums still come back as strings.
    fn decode_text(row: &PgRow, idx: usize) -> JsonValue {
        match row.try_get::<Option<String>, _>(idx) {
            Ok(Some(v)) => JsonValue::String(v),
            Ok(None) => JsonValue::Null,
            Err(_) => row
                .try_get_unchecked::<Option<String>, _>(idx)
                .ok()
                .flatten()
                .map(JsonValue::String)
                .unwrap_or(JsonValue::Null),
        }
    }
}

// =============================================================================
// SQL Server
// =============================================================================

/// Convert a SQL Server result row into a JSON map.
pub fn tds_row_to_json(row: tiberius::Row) -> Row {
    let names: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
    names
        .into_iter()
        .zip(row.into_iter())
        .map(|(name, data)| (name, tds_value(&data)))
        .collect()
}

fn tds_value(data: &tiberius::ColumnData<'static>) -> JsonValue {
    use tiberius::{ColumnData, FromSql};

    fn temporal<'a, T: FromSql<'a>>(
        data: &'a ColumnData<'static>,
        to_json: impl FnOnce(T) -> JsonValue,
    ) -> JsonValue {
        match T::from_sql(data) {
            Ok(Some(v)) => to_json(v),
            Ok(None) => JsonValue::Null,
            Err(e) => {
                tracing::error!("Failed to decode temporal column: {}", e);
                JsonValue::Null
            }
        }
    }

    match data {
        ColumnData::U8(v) => v.map(|v| JsonValue::Number(v.into())).unwrap_or(JsonValue::Null),
        ColumnData::I16(v) => v.map(|v| JsonValue::Number(v.into())).unwrap_or(JsonValue::Null),
        ColumnData::I32(v) => v.map(|v| JsonValue::Number(v.into())).unwrap_or(JsonValue::Null),
        ColumnData::I64(v) => v.map(|v| JsonValue::Number(v.into())).unwrap_or(JsonValue::Null),
        ColumnData::F32(v) => v.map(|v| float_value(v as f64)).unwrap_or(JsonValue::Null),
        ColumnData::F64(v) => v.map(float_value).unwrap_or(JsonValue::Null),
        ColumnData::Bit(v) => v.map(JsonValue::Bool).unwrap_or(JsonValue::Null),
        ColumnData::String(v) => v
            .as_ref()
            .map(|s| JsonValue::String(s.to_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::Guid(v) => v
            .as_ref()
            .map(|g| JsonValue::String(g.to_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::Binary(v) => v
            .as_ref()
            .map(|b| decode_binary_value(b, false))
            .unwrap_or(JsonValue::Null),
        ColumnData::Numeric(v) => v
            .as_ref()
            .map(|n| JsonValue::String(n.to_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::Xml(v) => v
            .as_ref()
            .map(|x| JsonValue::String(x.clone().into_owned().into_string()))
            .unwrap_or(JsonValue::Null),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            temporal::<NaiveDateTime>(data, timestamp_value)
        }
        ColumnData::DateTimeOffset(_) => temporal::<DateTime<Utc>>(data, timestamptz_value),
        ColumnData::Date(_) => temporal::<NaiveDate>(data, date_value),
        ColumnData::Time(_) => temporal::<NaiveTime>(data, time_value),
        #[allow(unreachable_patterns)]
        _ => JsonValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(categorize_type("INT4"), TypeCategory::Integer);
        assert_eq!(categorize_type("BIGINT"), TypeCategory::Integer);
        assert_eq!(categorize_type("SERIAL"), TypeCategory::Integer);
    }

    #[test]
    fn test_categorize_type_does_not_match_substrings() {
        assert_eq!(categorize_type("INTERVAL"), TypeCategory::Unknown);
        assert_eq!(categorize_type("POINT"), TypeCategory::Unknown);
    }

    #[test]
    fn test_categorize_temporal() {
        assert_eq!(categorize_type("TIMESTAMP"), TypeCategory::Timestamp);
        assert_eq!(categorize_type("TIMESTAMPTZ"), TypeCategory::TimestampTz);
        assert_eq!(categorize_type("DATE"), TypeCategory::Date);
        assert_eq!(categorize_type("TIME"), TypeCategory::Time);
        assert_eq!(categorize_type("TIMETZ"), TypeCategory::Unknown);
    }

    #[test]
    fn test_categorize_type_decimal_and_json() {
        assert_eq!(categorize_type("NUMERIC"), TypeCategory::Decimal);
        assert_eq!(categorize_type("jsonb"), TypeCategory::Json);
        assert_eq!(categorize_type("UUID"), TypeCategory::Uuid);
    }

    #[test]
    fn test_tds_scalar_values() {
        use std::borrow::Cow;
        use tiberius::ColumnData;

        assert_eq!(tds_value(&ColumnData::I32(Some(7))), JsonValue::from(7));
        assert_eq!(tds_value(&ColumnData::I32(None)), JsonValue::Null);
        assert_eq!(tds_value(&ColumnData::Bit(Some(true))), JsonValue::Bool(true));
        assert_eq!(
            tds_value(&ColumnData::String(Some(Cow::Borrowed("LoanAnalyst")))),
            JsonValue::from("LoanAnalyst")
        );
        assert_eq!(
            tds_value(&ColumnData::Binary(Some(Cow::Borrowed(&b"hi"[..])))),
            JsonValue::from("aGk=")
        );
    }

    #[test]
    fn test_temporal_formats() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_milli_opt(9, 5, 7, 42)
            .unwrap();
        assert_eq!(timestamp_value(ts), JsonValue::from("2024-03-01T09:05:07.042"));
        assert_eq!(date_value(ts.date()), JsonValue::from("2024-03-01"));
        assert_eq!(time_value(ts.time()), JsonValue::from("09:05:07.042"));
    }

    #[test]
    fn test_decode_binary_value() {
        assert_eq!(decode_binary_value(b"hello", true), JsonValue::from("hello"));
        assert_eq!(decode_binary_value(b"hello", false), JsonValue::from("aGVsbG8="));
        assert_eq!(
            decode_binary_value(&[0xFF, 0xFE, 0x00, 0x01], true),
            JsonValue::from("//4AAQ==")
        );
    }
}
