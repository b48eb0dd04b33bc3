//! Protocol version adapters
//!
//! Everything that differs between the legacy (V3) and modern (V4) wire
//! syntax lives behind [`ProtocolAdapter`]: literal lexical forms, function
//! spellings, expand style, count/link/function-call syntax, JSON payload
//! shapes and request headers. Formatters and readers never branch on the
//! version themselves.

pub mod literal;
mod v3;
mod v4;

pub use v3::V3Adapter;
pub use v4::V4Adapter;

use std::fmt::Debug;

use reqwest::Method;
use serde::Deserialize;

use crate::error::Error;
use crate::expr::BinaryOperator;
use crate::expr::Function;
use crate::model::Entry;
use crate::model::Value;

/// Protocol version spoken with the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum ProtocolVersion {
    /// Legacy protocol (OData 1.0-3.0).
    V3,
    /// Modern protocol (OData 4.0+).
    #[default]
    V4,
}

/// How nested expand clauses are serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandStyle {
    /// `$expand=A/B,A/C` with nested select/orderby prefixed by path.
    Flattened,
    /// `$expand=A($select=..;$expand=B)`.
    Nested,
}

/// Version-specific wire syntax.
pub trait ProtocolAdapter: Debug + Send + Sync {
    fn version(&self) -> ProtocolVersion;

    /// Formats a value as a URI literal (filters, keys, function parameters).
    ///
    /// The result is not percent-escaped.
    fn format_literal(&self, value: &Value) -> String;

    /// Formats a canonical function call from already formatted arguments.
    fn format_function(&self, function: Function, args: &[String]) -> Result<String, Error>;

    /// Returns the keyword of a binary operator.
    fn binary_operator(&self, op: BinaryOperator) -> Result<&'static str, Error> {
        Ok(op.keyword())
    }

    fn expand_style(&self) -> ExpandStyle;

    /// Query option requesting an inline total count.
    fn inline_count_option(&self) -> (&'static str, &'static str);

    /// Path suffix addressing the link between an entity and a related one.
    ///
    /// `related_key` is the formatted key segment (`(2)`) when addressing one
    /// member of a to-many association.
    fn link_path(&self, navigation: &str, related_key: Option<&str>) -> String;

    /// Request body for creating a link to `target_uri`.
    fn link_payload(&self, target_uri: &str) -> serde_json::Value;

    /// Splits a function call into its path segment and query parameters.
    fn function_call(&self, name: &str, parameters: &[(String, String)])
    -> (String, Vec<(String, String)>);

    /// Converts a value to its JSON payload representation.
    fn payload_value(&self, value: &Value) -> serde_json::Value;

    /// Adds navigation bindings to a JSON payload object.
    ///
    /// `is_collection` reports whether the navigation targets many entities.
    fn write_bindings(
        &self,
        payload: &mut serde_json::Map<String, serde_json::Value>,
        navigation: &str,
        targets: &[String],
        is_collection: bool,
    );

    /// Headers sent with every request.
    fn headers(&self, include_annotations: bool) -> Vec<(&'static str, &'static str)>;

    /// Method used for partial updates.
    fn update_method(&self) -> Method;

    /// Serializes an entry (without annotations) to a JSON payload object.
    fn entry_payload(&self, entry: &Entry) -> serde_json::Map<String, serde_json::Value> {
        entry
            .fields()
            .iter()
            .map(|(name, value)| (name.clone(), self.payload_value(value)))
            .collect()
    }
}

/// Creates the adapter for a protocol version.
pub fn adapter_for(version: ProtocolVersion, enum_prefix_free: bool) -> Box<dyn ProtocolAdapter> {
    match version {
        ProtocolVersion::V3 => Box::new(V3Adapter),
        ProtocolVersion::V4 => Box::new(V4Adapter::new().with_enum_prefix_free(enum_prefix_free)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_for() {
        assert_eq!(adapter_for(ProtocolVersion::V3, false).version(), ProtocolVersion::V3);
        assert_eq!(adapter_for(ProtocolVersion::V4, true).version(), ProtocolVersion::V4);
    }
}
