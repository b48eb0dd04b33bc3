//! Typed conversion of wire values by declared EDM type

use std::collections::HashMap;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose;
use chrono::DateTime;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value as Json;
use uuid::Uuid;

use crate::command::member_names;
use crate::error::ConversionError;
use crate::error::Error;
use crate::metadata::Catalog;
use crate::metadata::EdmType;
use crate::metadata::EnumType;
use crate::model::EnumValue;
use crate::model::Value;
use crate::protocol::literal::parse_duration;

fn mismatch(literal: impl Into<String>, edm_type: &EdmType) -> Error {
    ConversionError::new(literal, edm_type.to_string()).into()
}

/// Converts a JSON value, typed by `edm_type` when known.
pub(crate) fn from_json(
    json: &Json,
    edm_type: Option<&EdmType>,
    catalog: Option<&Catalog>,
) -> Result<Value, Error> {
    let Some(edm_type) = edm_type else {
        return Ok(untyped(json));
    };
    match (edm_type, json) {
        (_, Json::Null) => Ok(Value::Null),
        (EdmType::Collection(inner), Json::Array(items)) => items
            .iter()
            .map(|item| from_json(item, Some(inner), catalog))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Collection),
        // Legacy verbose collections are wrapped in `results`.
        (EdmType::Collection(_), Json::Object(map)) if map.contains_key("results") => {
            from_json(&map["results"], Some(edm_type), catalog)
        }
        (EdmType::Named(name), _) => named(json, edm_type, name, catalog),
        (_, Json::String(text)) => from_text(text, edm_type, catalog),
        (_, Json::Bool(b)) => match edm_type {
            EdmType::Boolean => Ok(Value::Bool(*b)),
            _ => Err(mismatch(b.to_string(), edm_type)),
        },
        (_, Json::Number(n)) => number(n, edm_type),
        _ => Ok(untyped(json)),
    }
}

fn named(json: &Json, edm_type: &EdmType, name: &str, catalog: Option<&Catalog>) -> Result<Value, Error> {
    let Some(catalog) = catalog else {
        return Ok(untyped(json));
    };
    if let Some(enum_type) = catalog.enum_type(name) {
        return match json {
            Json::String(text) => enum_from_text(text, enum_type, catalog),
            Json::Number(n) => n
                .as_i64()
                .map(|v| enum_from_number(v, enum_type, catalog))
                .ok_or_else(|| mismatch(n.to_string(), edm_type)),
            other => Err(mismatch(other.to_string(), edm_type)),
        };
    }
    if let (Some(complex), Json::Object(map)) = (catalog.complex_type(name), json) {
        let properties = catalog.complex_properties(complex);
        let mut fields = HashMap::new();
        for (key, value) in map {
            if is_annotation(key) {
                continue;
            }
            let declared = properties.iter().find(|p| p.name == *key).map(|p| &p.edm_type);
            fields.insert(key.clone(), from_json(value, declared, Some(catalog))?);
        }
        return Ok(Value::Complex(fields));
    }
    Ok(untyped(json))
}

pub(crate) fn is_annotation(key: &str) -> bool {
    key.starts_with('@') || key.starts_with("odata.") || key.starts_with("__") || key.contains('@')
}

fn number(n: &serde_json::Number, edm_type: &EdmType) -> Result<Value, Error> {
    let integral = n.as_i64();
    let out_of_range = || mismatch(n.to_string(), edm_type);
    match edm_type {
        EdmType::Byte => integral
            .and_then(|v| u8::try_from(v).ok())
            .map(Value::Byte)
            .ok_or_else(out_of_range),
        EdmType::SByte => integral
            .and_then(|v| i8::try_from(v).ok())
            .map(Value::SByte)
            .ok_or_else(out_of_range),
        EdmType::Int16 => integral
            .and_then(|v| i16::try_from(v).ok())
            .map(Value::Short)
            .ok_or_else(out_of_range),
        EdmType::Int32 => integral
            .and_then(|v| i32::try_from(v).ok())
            .map(Value::Int)
            .ok_or_else(out_of_range),
        EdmType::Int64 => integral.map(Value::Long).ok_or_else(out_of_range),
        EdmType::Single => n.as_f64().map(|v| Value::Single(v as f32)).ok_or_else(out_of_range),
        EdmType::Double => n.as_f64().map(Value::Float).ok_or_else(out_of_range),
        EdmType::Decimal => decimal(&n.to_string())
            .map(Value::Decimal)
            .ok_or_else(out_of_range),
        // Legacy services may send enum-like or string properties as numbers.
        EdmType::String => Ok(Value::String(n.to_string())),
        _ => Err(mismatch(n.to_string(), edm_type)),
    }
}

/// Converts a JSON value without type information.
pub(crate) fn untyped(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(v) => i32::try_from(v).map(Value::Int).unwrap_or(Value::Long(v)),
            None => n.as_f64().map(Value::Float).unwrap_or_else(|| Value::Json(json.clone())),
        },
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::Collection(items.iter().map(untyped).collect()),
        Json::Object(map) => Value::Complex(
            map.iter()
                .filter(|(k, _)| !is_annotation(k))
                .map(|(k, v)| (k.clone(), untyped(v)))
                .collect(),
        ),
    }
}

fn decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Converts a textual literal without protocol wrappers (`1`, `2024-01-01`,
/// `true`) by its declared type.
pub(crate) fn from_text(text: &str, edm_type: &EdmType, catalog: Option<&Catalog>) -> Result<Value, Error> {
    let fail = || mismatch(text, edm_type);
    match edm_type {
        EdmType::String | EdmType::Stream | EdmType::Other(_) => Ok(Value::String(text.to_string())),
        EdmType::Boolean => match text {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(fail()),
        },
        EdmType::Byte => text.parse().map(Value::Byte).map_err(|_| fail()),
        EdmType::SByte => text.parse().map(Value::SByte).map_err(|_| fail()),
        EdmType::Int16 => text.parse().map(Value::Short).map_err(|_| fail()),
        EdmType::Int32 => text.parse().map(Value::Int).map_err(|_| fail()),
        EdmType::Int64 => text.parse().map(Value::Long).map_err(|_| fail()),
        EdmType::Single => text.parse().map(Value::Single).map_err(|_| fail()),
        EdmType::Double => text.parse().map(Value::Float).map_err(|_| fail()),
        EdmType::Decimal => decimal(text).map(Value::Decimal).ok_or_else(fail),
        EdmType::Guid => Uuid::parse_str(text).map(Value::Guid).map_err(|_| fail()),
        EdmType::Binary => general_purpose::STANDARD
            .decode(text)
            .or_else(|_| general_purpose::URL_SAFE.decode(text))
            .or_else(|_| general_purpose::URL_SAFE_NO_PAD.decode(text))
            .map(Value::Binary)
            .map_err(|_| fail()),
        EdmType::DateTime => local_datetime(text).map(Value::LocalDateTime).ok_or_else(fail),
        EdmType::DateTimeOffset => datetime(text).map(Value::DateTime).ok_or_else(fail),
        EdmType::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|_| fail()),
        EdmType::TimeOfDay => NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
            .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
            .map(Value::TimeOfDay)
            .map_err(|_| fail()),
        EdmType::Time | EdmType::Duration => parse_duration(text)
            .or_else(|| {
                NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
                    .ok()
                    .map(|t| t - NaiveTime::MIN)
            })
            .map(Value::Duration)
            .ok_or_else(fail),
        EdmType::Named(name) => match catalog.and_then(|c| c.enum_type(name).map(|e| (c, e))) {
            Some((catalog, enum_type)) => enum_from_text(text, enum_type, catalog),
            None => Ok(Value::String(text.to_string())),
        },
        EdmType::Collection(_) => Err(fail()),
    }
}

/// Parses `/Date(ms)/` and `/Date(ms+offset)/` legacy JSON dates.
fn legacy_json_date(text: &str) -> Option<DateTime<Utc>> {
    let inner = text.strip_prefix("/Date(")?.strip_suffix(")/")?;
    // A leading sign belongs to the milliseconds, not the offset.
    let first = inner.chars().next()?.len_utf8();
    let end = inner
        .get(first..)?
        .find(['+', '-'])
        .map(|i| i + first)
        .unwrap_or(inner.len());
    let millis: i64 = inner[..end].parse().ok()?;
    DateTime::from_timestamp_millis(millis)
}

fn datetime(text: &str) -> Option<DateTime<Utc>> {
    if let Some(dt) = legacy_json_date(text) {
        return Some(dt);
    }
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| naive(text).map(|dt| dt.and_utc()))
}

fn local_datetime(text: &str) -> Option<NaiveDateTime> {
    if let Some(dt) = legacy_json_date(text) {
        return Some(dt.naive_utc());
    }
    naive(text).or_else(|| {
        DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).naive_utc())
    })
}

fn naive(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .ok()
}

/// Reads an enum from a member name, a comma-separated flag list or a
/// numeric string; flag members are or-ed together.
pub(crate) fn enum_from_text(text: &str, enum_type: &EnumType, catalog: &Catalog) -> Result<Value, Error> {
    let qualified = catalog.qualified_name(&enum_type.name);
    if let Ok(number) = text.trim().parse::<i64>() {
        return Ok(enum_from_number(number, enum_type, catalog));
    }
    let mut total = 0;
    let mut names = Vec::new();
    for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let member = enum_type
            .members
            .iter()
            .find(|m| m.name == part)
            .ok_or_else(|| ConversionError::new(text, qualified.clone()))?;
        total |= member.value;
        if !names.contains(&member.name.as_str()) {
            names.push(member.name.as_str());
        }
    }
    Ok(Value::Enum(EnumValue::new(qualified, names.join(","), total)))
}

fn enum_from_number(value: i64, enum_type: &EnumType, catalog: &Catalog) -> Value {
    Value::Enum(EnumValue {
        type_name: Some(catalog.qualified_name(&enum_type.name)),
        member: member_names(enum_type, value),
        value,
    })
}
