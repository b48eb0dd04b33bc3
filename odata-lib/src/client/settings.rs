//! Session settings

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::naming::NameMatch;
use crate::protocol::ProtocolVersion;

/// Behavior of an [`ODataClient`](crate::ODataClient) session.
///
/// Every field has a default, so partial configuration files deserialize:
///
/// ```
/// use odata_lib::ClientSettings;
/// use odata_lib::protocol::ProtocolVersion;
///
/// let settings: ClientSettings =
///     serde_json::from_str(r#"{"protocol": "V3", "ignore_resource_not_found": true}"#).unwrap();
/// assert_eq!(settings.protocol, ProtocolVersion::V3);
/// assert!(settings.include_annotations);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Protocol version spoken with the service.
    ///
    /// Default: V4
    pub protocol: ProtocolVersion,

    /// How requested names are matched against catalog names.
    ///
    /// Default: best match
    pub name_match: NameMatch,

    /// Read a missing resource as an empty result instead of failing.
    ///
    /// Default: false
    pub ignore_resource_not_found: bool,

    /// Keep protocol annotations on returned entries and feeds.
    ///
    /// Default: true
    pub include_annotations: bool,

    /// Write enum literals without their type prefix (modern protocol only).
    ///
    /// Default: false
    pub enum_prefix_free: bool,

    /// Serialize nested expands as parenthesized options where the protocol
    /// allows it; otherwise expands are flattened into paths.
    ///
    /// Default: true
    pub prefer_nested_expand: bool,

    /// Headers added to every request.
    pub default_headers: BTreeMap<String, String>,

    /// Upper bound for a single exchange with the service.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            protocol: ProtocolVersion::V4,
            name_match: NameMatch::BestMatch,
            ignore_resource_not_found: false,
            include_annotations: true,
            enum_prefix_free: false,
            prefer_nested_expand: true,
            default_headers: BTreeMap::new(),
            request_timeout: None,
        }
    }
}

impl ClientSettings {
    /// Creates settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_protocol(mut self, protocol: ProtocolVersion) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_name_match(mut self, name_match: NameMatch) -> Self {
        self.name_match = name_match;
        self
    }

    pub fn with_ignore_resource_not_found(mut self, ignore: bool) -> Self {
        self.ignore_resource_not_found = ignore;
        self
    }

    pub fn with_include_annotations(mut self, include: bool) -> Self {
        self.include_annotations = include;
        self
    }

    pub fn with_enum_prefix_free(mut self, enabled: bool) -> Self {
        self.enum_prefix_free = enabled;
        self
    }

    pub fn with_prefer_nested_expand(mut self, enabled: bool) -> Self {
        self.prefer_nested_expand = enabled;
        self
    }

    /// Adds a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ClientSettings::default();
        assert_eq!(settings.protocol, ProtocolVersion::V4);
        assert_eq!(settings.name_match, NameMatch::BestMatch);
        assert!(!settings.ignore_resource_not_found);
        assert!(settings.prefer_nested_expand);
    }

    #[test]
    fn test_partial_deserialize() {
        let settings: ClientSettings = serde_json::from_str(
            r#"{"name_match": "strict", "default_headers": {"X-Tenant": "a"}}"#,
        )
        .unwrap();
        assert_eq!(settings.name_match, NameMatch::Strict);
        assert_eq!(settings.default_headers["X-Tenant"], "a");
        assert!(settings.include_annotations);
    }
}
