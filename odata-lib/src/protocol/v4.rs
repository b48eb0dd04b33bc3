//! Modern protocol (V4) syntax

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::Method;
use serde_json::Value as Json;
use serde_json::json;

use super::ExpandStyle;
use super::ProtocolAdapter;
use super::ProtocolVersion;
use super::literal;
use crate::error::Error;
use crate::expr::Function;
use crate::model::Value;

/// Adapter for the modern protocol.
///
/// Literals are unwrapped (`123`, `1.5`, plain guids and timestamps),
/// enums are namespace-qualified (`NS.Color'Red'`, or `'Red'` in prefix-free
/// mode) and expands nest.
#[derive(Debug, Clone, Copy, Default)]
pub struct V4Adapter {
    enum_prefix_free: bool,
}

impl V4Adapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Omits the type prefix from enum literals.
    pub fn with_enum_prefix_free(mut self, enabled: bool) -> Self {
        self.enum_prefix_free = enabled;
        self
    }
}

impl ProtocolAdapter for V4Adapter {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V4
    }

    fn format_literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Byte(n) => n.to_string(),
            Value::SByte(n) => n.to_string(),
            Value::Short(n) => n.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Long(n) => n.to_string(),
            Value::Single(n) => literal::format_float(*n as f64),
            Value::Float(n) => literal::format_float(*n),
            Value::Decimal(d) => d.to_string(),
            Value::String(s) => literal::escape_string(s),
            Value::Guid(g) => g.to_string(),
            Value::DateTime(dt) => literal::format_datetime(dt),
            Value::LocalDateTime(dt) => literal::format_datetime(&dt.and_utc()),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::TimeOfDay(t) => t.format("%H:%M:%S%.f").to_string(),
            Value::Duration(d) => format!("duration'{}'", literal::format_duration(d)),
            Value::Binary(bytes) => format!("binary'{}'", URL_SAFE_NO_PAD.encode(bytes)),
            Value::Enum(e) => {
                let member = e
                    .member
                    .clone()
                    .unwrap_or_else(|| e.value.to_string());
                match (&e.type_name, self.enum_prefix_free) {
                    (Some(type_name), false) => format!("{}'{}'", type_name, member),
                    _ => format!("'{}'", member),
                }
            }
            Value::Complex(_)
            | Value::Collection(_)
            | Value::Entry(_)
            | Value::Entries(_)
            | Value::Json(_) => self.payload_value(value).to_string(),
        }
    }

    fn format_function(&self, function: Function, args: &[String]) -> Result<String, Error> {
        let call = match function {
            Function::Cast | Function::IsOf => {
                // The trailing type name is an identifier, not a string literal.
                let mut args: Vec<&str> = args.iter().map(String::as_str).collect();
                if let Some(type_name) = args.last_mut() {
                    *type_name = type_name.trim_matches('\'');
                }
                format!("{}({})", function.name(), args.join(","))
            }
            other => format!("{}({})", other.name(), args.join(",")),
        };
        Ok(call)
    }

    fn expand_style(&self) -> ExpandStyle {
        ExpandStyle::Nested
    }

    fn inline_count_option(&self) -> (&'static str, &'static str) {
        ("$count", "true")
    }

    fn link_path(&self, navigation: &str, related_key: Option<&str>) -> String {
        format!("{}{}/$ref", navigation, related_key.unwrap_or_default())
    }

    fn link_payload(&self, target_uri: &str) -> Json {
        json!({ "@odata.id": target_uri })
    }

    fn function_call(
        &self,
        name: &str,
        parameters: &[(String, String)],
    ) -> (String, Vec<(String, String)>) {
        let args: Vec<String> = parameters
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        (format!("{}({})", name, args.join(",")), Vec::new())
    }

    fn payload_value(&self, value: &Value) -> Json {
        match value {
            Value::Null => Json::Null,
            Value::Bool(b) => json!(b),
            Value::Byte(n) => json!(n),
            Value::SByte(n) => json!(n),
            Value::Short(n) => json!(n),
            Value::Int(n) => json!(n),
            Value::Long(n) => json!(n),
            Value::Single(n) => json!(n),
            Value::Float(n) => json!(n),
            Value::Decimal(d) => d
                .to_string()
                .parse::<serde_json::Number>()
                .map(Json::Number)
                .unwrap_or_else(|_| Json::String(d.to_string())),
            Value::String(s) => Json::String(s.clone()),
            Value::Guid(g) => Json::String(g.to_string()),
            Value::DateTime(dt) => Json::String(literal::format_datetime(dt)),
            Value::LocalDateTime(dt) => Json::String(literal::format_datetime(&dt.and_utc())),
            Value::Date(d) => Json::String(d.format("%Y-%m-%d").to_string()),
            Value::TimeOfDay(t) => Json::String(t.format("%H:%M:%S%.f").to_string()),
            Value::Duration(d) => Json::String(literal::format_duration(d)),
            Value::Binary(bytes) => Json::String(STANDARD.encode(bytes)),
            Value::Enum(e) => match &e.member {
                Some(member) => Json::String(member.clone()),
                None => Json::String(e.value.to_string()),
            },
            Value::Complex(fields) => Json::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), self.payload_value(v)))
                    .collect(),
            ),
            Value::Collection(items) => {
                Json::Array(items.iter().map(|v| self.payload_value(v)).collect())
            }
            Value::Entry(entry) => Json::Object(self.entry_payload(entry)),
            Value::Entries(entries) => Json::Array(
                entries
                    .iter()
                    .map(|e| Json::Object(self.entry_payload(e)))
                    .collect(),
            ),
            Value::Json(v) => v.clone(),
        }
    }

    fn write_bindings(
        &self,
        payload: &mut serde_json::Map<String, Json>,
        navigation: &str,
        targets: &[String],
        is_collection: bool,
    ) {
        let key = format!("{}@odata.bind", navigation);
        let value = if is_collection {
            Json::Array(targets.iter().map(|t| Json::String(t.clone())).collect())
        } else {
            targets
                .first()
                .map(|t| Json::String(t.clone()))
                .unwrap_or(Json::Null)
        };
        payload.insert(key, value);
    }

    fn headers(&self, include_annotations: bool) -> Vec<(&'static str, &'static str)> {
        let accept = if include_annotations {
            "application/json;odata.metadata=full"
        } else {
            "application/json;odata.metadata=minimal"
        };
        vec![
            ("OData-Version", "4.0"),
            ("OData-MaxVersion", "4.0"),
            ("Accept", accept),
            ("Content-Type", "application/json"),
        ]
    }

    fn update_method(&self) -> Method {
        Method::PATCH
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EnumValue;
    use chrono::TimeDelta;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    #[test]
    fn test_plain_literals() {
        let v4 = V4Adapter::new();
        assert_eq!(v4.format_literal(&Value::Long(123)), "123");
        assert_eq!(v4.format_literal(&Value::Decimal(Decimal::new(15, 1))), "1.5");
        assert_eq!(
            v4.format_literal(&Value::Guid(Uuid::nil())),
            "00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            v4.format_literal(&Value::Duration(TimeDelta::minutes(90))),
            "duration'PT1H30M'"
        );
        assert_eq!(v4.format_literal(&Value::Binary(vec![0xfb, 0xff])), "binary'-_8'");
    }

    #[test]
    fn test_enum_literals() {
        let color = Value::Enum(EnumValue::new("NS.Color", "Red", 1));
        assert_eq!(V4Adapter::new().format_literal(&color), "NS.Color'Red'");
        assert_eq!(
            V4Adapter::new()
                .with_enum_prefix_free(true)
                .format_literal(&color),
            "'Red'"
        );
    }

    #[test]
    fn test_contains_and_cast() {
        let v4 = V4Adapter::new();
        let call = v4
            .format_function(Function::Contains, &["Name".into(), "'ai'".into()])
            .unwrap();
        assert_eq!(call, "contains(Name,'ai')");
        let cast = v4
            .format_function(Function::IsOf, &["'NS.Ship'".into()])
            .unwrap();
        assert_eq!(cast, "isof(NS.Ship)");
    }

    #[test]
    fn test_cast_keeps_quoted_operand() {
        let v4 = V4Adapter::new();
        let cast = v4
            .format_function(Function::Cast, &["'O''Neil'".into(), "'Edm.String'".into()])
            .unwrap();
        assert_eq!(cast, "cast('O''Neil',Edm.String)");
    }

    #[test]
    fn test_function_call_path() {
        let v4 = V4Adapter::new();
        let (path, query) = v4.function_call("GetProductsByRating", &[("rating".into(), "4".into())]);
        assert_eq!(path, "GetProductsByRating(rating=4)");
        assert!(query.is_empty());
    }

    #[test]
    fn test_bindings() {
        let v4 = V4Adapter::new();
        let mut payload = serde_json::Map::new();
        v4.write_bindings(&mut payload, "Category", &["Categories(1)".into()], false);
        v4.write_bindings(
            &mut payload,
            "Products",
            &["Products(1)".into(), "Products(2)".into()],
            true,
        );
        assert_eq!(
            Json::Object(payload),
            json!({
                "Category@odata.bind": "Categories(1)",
                "Products@odata.bind": ["Products(1)", "Products(2)"]
            })
        );
        assert_eq!(v4.link_path("Category", None), "Category/$ref");
    }
}
