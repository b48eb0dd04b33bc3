//! Legacy protocol (V3) syntax

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Method;
use serde_json::Value as Json;
use serde_json::json;

use super::ExpandStyle;
use super::ProtocolAdapter;
use super::ProtocolVersion;
use super::literal;
use crate::error::Error;
use crate::expr::BinaryOperator;
use crate::expr::Function;
use crate::model::Value;

/// Adapter for the legacy protocol.
///
/// Literals carry type wrappers and suffixes (`123L`, `1.5M`,
/// `guid'..'`, `datetime'..'`, `X'..'`), enums are sent as their numeric
/// value and expands are flattened into paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct V3Adapter;

fn date_json(millis: i64) -> Json {
    Json::String(format!("/Date({})/", millis))
}

impl ProtocolAdapter for V3Adapter {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V3
    }

    fn format_literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Byte(n) => n.to_string(),
            Value::SByte(n) => n.to_string(),
            Value::Short(n) => n.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Long(n) => format!("{}L", n),
            Value::Single(n) => literal::format_float(*n as f64),
            Value::Float(n) => literal::format_float(*n),
            Value::Decimal(d) => format!("{}M", d),
            Value::String(s) => literal::escape_string(s),
            Value::Guid(g) => format!("guid'{}'", g),
            Value::DateTime(dt) => format!("datetimeoffset'{}'", literal::format_datetime(dt)),
            Value::LocalDateTime(dt) => format!("datetime'{}'", literal::format_local_datetime(dt)),
            Value::Date(d) => format!("datetime'{}T00:00:00'", d.format("%Y-%m-%d")),
            Value::TimeOfDay(t) => {
                let since_midnight = *t - chrono::NaiveTime::MIN;
                format!("time'{}'", literal::format_duration(&since_midnight))
            }
            Value::Duration(d) => format!("time'{}'", literal::format_duration(d)),
            Value::Binary(bytes) => format!("X'{}'", literal::to_hex(bytes)),
            Value::Enum(e) => e.value.to_string(),
            Value::Complex(_)
            | Value::Collection(_)
            | Value::Entry(_)
            | Value::Entries(_)
            | Value::Json(_) => self.payload_value(value).to_string(),
        }
    }

    fn format_function(&self, function: Function, args: &[String]) -> Result<String, Error> {
        let call = match function {
            Function::Contains => match args {
                [haystack, needle] => format!("substringof({},{})", needle, haystack),
                _ => return Err(Error::invalid_command("contains takes two arguments")),
            },
            Function::Cast | Function::IsOf => {
                format!("{}({})", function.name(), args.join(","))
            }
            Function::FractionalSeconds
            | Function::Date
            | Function::Time
            | Function::Now => {
                return Err(Error::invalid_command(format!(
                    "{} is not supported by the legacy protocol",
                    function.name()
                )));
            }
            other => format!("{}({})", other.name(), args.join(",")),
        };
        Ok(call)
    }

    fn binary_operator(&self, op: BinaryOperator) -> Result<&'static str, Error> {
        match op {
            BinaryOperator::Has => Err(Error::invalid_command(
                "has is not supported by the legacy protocol",
            )),
            other => Ok(other.keyword()),
        }
    }

    fn expand_style(&self) -> ExpandStyle {
        ExpandStyle::Flattened
    }

    fn inline_count_option(&self) -> (&'static str, &'static str) {
        ("$inlinecount", "allpages")
    }

    fn link_path(&self, navigation: &str, related_key: Option<&str>) -> String {
        format!("$links/{}{}", navigation, related_key.unwrap_or_default())
    }

    fn link_payload(&self, target_uri: &str) -> Json {
        json!({ "uri": target_uri })
    }

    fn function_call(
        &self,
        name: &str,
        parameters: &[(String, String)],
    ) -> (String, Vec<(String, String)>) {
        (name.to_string(), parameters.to_vec())
    }

    fn payload_value(&self, value: &Value) -> Json {
        match value {
            Value::Null => Json::Null,
            Value::Bool(b) => json!(b),
            Value::Byte(n) => json!(n),
            Value::SByte(n) => json!(n),
            Value::Short(n) => json!(n),
            Value::Int(n) => json!(n),
            Value::Long(n) => Json::String(n.to_string()),
            Value::Single(n) => json!(n),
            Value::Float(n) => json!(n),
            Value::Decimal(d) => Json::String(d.to_string()),
            Value::String(s) => Json::String(s.clone()),
            Value::Guid(g) => Json::String(g.to_string()),
            Value::DateTime(dt) => Json::String(literal::format_datetime(dt)),
            Value::LocalDateTime(dt) => date_json(dt.and_utc().timestamp_millis()),
            Value::Date(d) => date_json(d.and_time(chrono::NaiveTime::MIN).and_utc().timestamp_millis()),
            Value::TimeOfDay(t) => {
                Json::String(literal::format_duration(&(*t - chrono::NaiveTime::MIN)))
            }
            Value::Duration(d) => Json::String(literal::format_duration(d)),
            Value::Binary(bytes) => Json::String(STANDARD.encode(bytes)),
            Value::Enum(e) => json!(e.value),
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
        let links: Vec<Json> = targets
            .iter()
            .map(|t| json!({ "__metadata": { "uri": t } }))
            .collect();
        let value = if is_collection {
            Json::Array(links)
        } else {
            links.into_iter().next().unwrap_or(Json::Null)
        };
        payload.insert(navigation.to_string(), value);
    }

    fn headers(&self, _include_annotations: bool) -> Vec<(&'static str, &'static str)> {
        vec![
            ("DataServiceVersion", "3.0"),
            ("MaxDataServiceVersion", "3.0"),
            ("Accept", "application/json;odata=verbose"),
            ("Content-Type", "application/json;odata=verbose"),
        ]
    }

    fn update_method(&self) -> Method {
        Method::from_bytes(b"MERGE").unwrap_or(Method::PUT)
    }
}
