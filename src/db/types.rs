//! MySQL row decoding.
//!
//! Rows are decoded into positional `serde_json::Value` tuples in two steps:
//! 1. `TypeCategory` classifies the column type name into a logical category
//! 2. Per-category decoders extract the value
//!
//! Caller statements run as prepared statements, so cells arrive in MySQL's
//! binary encoding. Dates and times are rendered back into the server's own
//! text notation; DECIMAL stays a string so no precision is lost.

use crate::models::ColumnMetadata;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::{Column, Decode, Row, Type, TypeInfo};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for MySQL column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Binary,
    Json,
    Temporal,
    Text,
}

/// Classify a MySQL type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower.contains("decimal") || lower.contains("numeric") {
        return TypeCategory::Decimal;
    }

    if lower.contains("int") || lower == "year" {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower == "json" {
        return TypeCategory::Json;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bit" {
        return TypeCategory::Binary;
    }

    if matches!(lower.as_str(), "date" | "datetime" | "timestamp" | "time") {
        return TypeCategory::Temporal;
    }

    // varchar, text, char, enum, set, ...
    TypeCategory::Text
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Raw DECIMAL value as the server printed it. No precision is lost.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Binary Encoding
// =============================================================================

/// Decode binary data as UTF-8 text when valid, otherwise as base64.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

// =============================================================================
// Row Decoding
// =============================================================================

/// Column names and type names of a row, in select-list order.
pub fn column_metadata(row: &MySqlRow) -> Vec<ColumnMetadata> {
    row.columns()
        .iter()
        .map(|col| ColumnMetadata::new(col.name(), col.type_info().name()))
        .collect()
}

/// Decode every cell of a row, in select-list order.
pub fn decode_row(row: &MySqlRow) -> Vec<JsonValue> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let category = categorize_type(col.type_info().name());
            decode_column(row, idx, category)
        })
        .collect()
}

fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> JsonValue {
    match category {
        TypeCategory::Decimal => decode_decimal(row, idx),
        TypeCategory::Integer => decode_integer(row, idx),
        TypeCategory::Boolean => decode_boolean(row, idx),
        TypeCategory::Float => decode_float(row, idx),
        TypeCategory::Binary => decode_binary(row, idx),
        TypeCategory::Json => decode_json(row, idx),
        TypeCategory::Temporal => decode_temporal(row, idx),
        TypeCategory::Text => decode_text(row, idx),
    }
}

fn decode_decimal(row: &MySqlRow, idx: usize) -> JsonValue {
    match row.try_get::<Option<RawDecimal>, _>(idx) {
        Ok(Some(v)) => JsonValue::String(v.0),
        Ok(None) => JsonValue::Null,
        Err(e) => {
            tracing::error!("Failed to decode DECIMAL: {:?}", e);
            JsonValue::Null
        }
    }
}

fn decode_integer(row: &MySqlRow, idx: usize) -> JsonValue {
    if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
        return JsonValue::Number(v.into());
    }
    if let Ok(Some(v)) = row.try_get::<Option<u64>, _>(idx) {
        return JsonValue::Number(v.into());
    }
    // YEAR is refused by the checked integer decoders but is a plain integer on the wire.
    match row.try_get_unchecked::<Option<i64>, _>(idx) {
        Ok(Some(v)) => JsonValue::Number(v.into()),
        _ => JsonValue::Null,
    }
}

fn decode_boolean(row: &MySqlRow, idx: usize) -> JsonValue {
    row.try_get::<Option<bool>, _>(idx)
        .ok()
        .flatten()
        .map(JsonValue::Bool)
        .unwrap_or(JsonValue::Null)
}

fn decode_float(row: &MySqlRow, idx: usize) -> JsonValue {
    if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
        return serde_json::Number::from_f64(v)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(v.to_string()));
    }
    if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
        return serde_json::Number::from_f64(v as f64)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(v.to_string()));
    }
    JsonValue::Null
}

fn decode_binary(row: &MySqlRow, idx: usize) -> JsonValue {
    row.try_get_unchecked::<Option<Vec<u8>>, _>(idx)
        .ok()
        .flatten()
        .map(|v| decode_binary_value(&v))
        .unwrap_or(JsonValue::Null)
}

fn decode_json(row: &MySqlRow, idx: usize) -> JsonValue {
    if let Ok(Some(v)) = row.try_get::<Option<JsonValue>, _>(idx) {
        return v;
    }
    match row.try_get_unchecked::<Option<String>, _>(idx) {
        Ok(Some(text)) => serde_json::from_str(&text).unwrap_or(JsonValue::String(text)),
        _ => JsonValue::Null,
    }
}

fn decode_temporal(row: &MySqlRow, idx: usize) -> JsonValue {
    if let Ok(Some(v)) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
        return JsonValue::String(format_datetime(v));
    }
    if let Ok(Some(v)) = row.try_get::<Option<NaiveDate>, _>(idx) {
        return JsonValue::String(v.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(v)) = row.try_get::<Option<NaiveTime>, _>(idx) {
        return JsonValue::String(format_time(v));
    }
    // Zero dates ('0000-00-00') and TIME values outside a single day have no
    // chrono equivalent.
    tracing::debug!(column = idx, "Temporal value not representable; returning null");
    JsonValue::Null
}

/// `YYYY-MM-DD hh:mm:ss`, with microseconds when the value has a fraction.
pub fn format_datetime(v: NaiveDateTime) -> String {
    if v.nanosecond() == 0 {
        v.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        v.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }
}

/// `hh:mm:ss`, with microseconds when the value has a fraction.
pub fn format_time(v: NaiveTime) -> String {
    if v.nanosecond() == 0 {
        v.format("%H:%M:%S").to_string()
    } else {
        v.format("%H:%M:%S%.6f").to_string()
    }
}

fn decode_text(row: &MySqlRow, idx: usize) -> JsonValue {
    if let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) {
        return JsonValue::String(v);
    }
    match row.try_get_unchecked::<Option<Vec<u8>>, _>(idx) {
        Ok(Some(bytes)) => decode_binary_value(&bytes),
        _ => JsonValue::Null,
    }
}
