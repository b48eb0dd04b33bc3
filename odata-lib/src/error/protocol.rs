//! Protocol (HTTP status) errors

/// An error status returned by the service, either for a whole request or for
/// a single part of a batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("HTTP {status}: {message}")]
pub struct ProtocolError {
    /// HTTP status code.
    pub status: u16,
    /// Error message from the payload, or the status reason phrase.
    pub message: String,
    /// Service error code, if the payload carried one.
    pub code: Option<String>,
    /// Content-ID of the failing batch part, if any.
    pub content_id: Option<String>,
}

impl ProtocolError {
    /// Creates a new protocol error.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
            content_id: None,
        }
    }

    /// Builds an error from a response body, falling back to `reason` when
    /// the body carries no recognizable error payload.
    pub fn from_response(status: u16, reason: &str, body: &str) -> Self {
        let (code, message) = parse_error_payload(body).unwrap_or_else(|| {
            let message = if reason.trim().is_empty() {
                default_reason(status).to_string()
            } else {
                reason.trim().to_string()
            };
            (None, message)
        });
        Self {
            status,
            message,
            code,
            content_id: None,
        }
    }

    /// Attaches the batch Content-ID of the failing part.
    pub fn with_content_id(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }

    /// Returns `true` for 404 responses.
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// Extracts `(code, message)` from a JSON or XML error payload.
///
/// Handles the V4 shape `{"error":{"code","message"}}`, the V3 shape where
/// `message` is `{"lang","value"}`, and `<m:error>` XML documents.
fn parse_error_payload(body: &str) -> Option<(Option<String>, String)> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    if body.starts_with('<') {
        let doc = roxmltree::Document::parse(body).ok()?;
        let root = doc.root_element();
        if root.tag_name().name() != "error" {
            return None;
        }
        let text_of = |name: &str| {
            root.children()
                .find(|n| n.is_element() && n.tag_name().name() == name)
                .and_then(|n| n.text())
                .map(|s| s.to_string())
        };
        return Some((text_of("code"), text_of("message")?));
    }

    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = json.get("error").or_else(|| json.get("odata.error"))?;
    let code = error
        .get("code")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());
    let message = match error.get("message")? {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(m) => m.get("value")?.as_str()?.to_string(),
        _ => return None,
    };
    Some((code, message))
}

fn default_reason(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        412 => "Precondition Failed",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_fallback() {
        let err = ProtocolError::from_response(404, "Not Found", "");
        assert_eq!(err.status, 404);
        assert_eq!(err.message, "Not Found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_v4_json_payload() {
        let body = r#"{"error":{"code":"0x1","message":"Bad key"}}"#;
        let err = ProtocolError::from_response(400, "Bad Request", body);
        assert_eq!(err.code.as_deref(), Some("0x1"));
        assert_eq!(err.message, "Bad key");
    }

    #[test]
    fn test_v3_json_payload() {
        let body = r#"{"odata.error":{"code":"","message":{"lang":"en-US","value":"Resource not found"}}}"#;
        let err = ProtocolError::from_response(404, "", body);
        assert_eq!(err.code, None);
        assert_eq!(err.message, "Resource not found");
    }

    #[test]
    fn test_xml_payload() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?>
<m:error xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
  <m:code>E1</m:code>
  <m:message xml:lang="en-US">Boom</m:message>
</m:error>"#;
        let err = ProtocolError::from_response(500, "Internal Server Error", body);
        assert_eq!(err.code.as_deref(), Some("E1"));
        assert_eq!(err.message, "Boom");
    }

    #[test]
    fn test_empty_reason_uses_default() {
        let err = ProtocolError::from_response(412, "", "not json");
        assert_eq!(err.message, "Precondition Failed");
    }
}
