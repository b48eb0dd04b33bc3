//! Multipart MIME writing and parsing for `$batch` exchanges.

use std::ops::Range;

use uuid::Uuid;

use super::QueuedPart;
use crate::error::Error;

/// Generates a boundary such as `batch_<guid>`.
pub(crate) fn boundary(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4())
}

/// How queued operations are laid out on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Group {
    /// A read sent as its own part.
    Single(usize),
    /// Consecutive writes sharing one changeset.
    Changeset(Range<usize>),
}

/// Groups consecutive writes into changesets; reads stand alone.
pub(crate) fn groups(parts: &[QueuedPart]) -> Vec<Group> {
    let mut groups = Vec::new();
    let mut index = 0;
    while index < parts.len() {
        if !parts[index].is_write {
            groups.push(Group::Single(index));
            index += 1;
            continue;
        }
        let start = index;
        while index < parts.len() && parts[index].is_write {
            index += 1;
        }
        groups.push(Group::Changeset(start..index));
    }
    groups
}

/// Builds the multipart request body.
pub(crate) fn write_batch(parts: &[QueuedPart], groups: &[Group], batch_boundary: &str) -> String {
    let mut body = String::new();

    for group in groups {
        match group {
            Group::Single(index) => {
                body.push_str(&format!("--{}\r\n", batch_boundary));
                write_part(&mut body, &parts[*index], false);
            }
            Group::Changeset(range) => {
                let changeset_boundary = boundary("changeset");
                body.push_str(&format!("--{}\r\n", batch_boundary));
                body.push_str(&format!(
                    "Content-Type: multipart/mixed; boundary={}\r\n\r\n",
                    changeset_boundary
                ));
                for part in &parts[range.clone()] {
                    body.push_str(&format!("--{}\r\n", changeset_boundary));
                    write_part(&mut body, part, true);
                }
                body.push_str(&format!("--{}--\r\n", changeset_boundary));
            }
        }
    }

    body.push_str(&format!("--{}--\r\n", batch_boundary));
    body
}

/// Writes one `application/http` part holding an embedded request.
fn write_part(body: &mut String, part: &QueuedPart, with_content_id: bool) {
    body.push_str("Content-Type: application/http\r\n");
    body.push_str("Content-Transfer-Encoding: binary\r\n");
    if with_content_id {
        body.push_str(&format!("Content-ID: {}\r\n", part.content_id));
    }
    body.push_str("\r\n");

    let request = &part.request;
    body.push_str(&format!("{} {} HTTP/1.1\r\n", request.method, request.uri));
    for (name, value) in &request.headers {
        body.push_str(&format!("{}: {}\r\n", name, value));
    }
    if let Some(payload) = &request.body {
        body.push_str(&format!("Content-Length: {}\r\n", payload.len()));
    }
    body.push_str("\r\n");
    if let Some(payload) = &request.body {
        body.push_str(payload);
    }
    body.push_str("\r\n");
}

/// Extracts the boundary from a `Content-Type` header value.
pub(crate) fn boundary_of(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|param| param.trim().split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|boundary| !boundary.is_empty())
}

/// Reads the boundary from the first delimiter line of a body, for responses
/// whose `Content-Type` was lost.
pub(crate) fn leading_boundary(body: &str) -> Option<String> {
    body.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.strip_prefix("--"))
        .map(|boundary| boundary.to_string())
}

/// Splits a multipart body into the text between its delimiter lines.
///
/// The preamble and epilogue are dropped.
pub(crate) fn split_parts<'a>(body: &'a str, boundary: &str) -> Vec<&'a str> {
    let delimiter = format!("--{}", boundary);
    let mut parts = Vec::new();
    let mut start: Option<usize> = None;
    let mut offset = 0;

    for line in body.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if let Some(rest) = trimmed.strip_prefix(delimiter.as_str()) {
            if rest.is_empty() || rest == "--" {
                if let Some(begin) = start {
                    parts.push(body[begin..offset].trim_end_matches(['\r', '\n']));
                }
                if rest == "--" {
                    return parts;
                }
                start = Some(offset + line.len());
            }
        }
        offset += line.len();
    }

    // Unterminated body: keep the last part.
    if let Some(begin) = start {
        parts.push(body[begin..].trim_end_matches(['\r', '\n']));
    }
    parts
}

/// A MIME part: its headers and the content after the blank line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MimePart<'a> {
    pub headers: Vec<(&'a str, &'a str)>,
    pub body: &'a str,
}

impl<'a> MimePart<'a> {
    pub(crate) fn parse(text: &'a str) -> Self {
        let (headers, body) = split_headers(text);
        Self { headers, body }
    }

    /// Returns the first header named `name`, ignoring case.
    pub(crate) fn header(&self, name: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }

    pub(crate) fn content_id(&self) -> Option<u32> {
        self.header("Content-ID")?.trim().parse().ok()
    }

    /// Returns the nested boundary when this part is itself multipart.
    pub(crate) fn nested_boundary(&self) -> Option<String> {
        let content_type = self.header("Content-Type")?;
        match content_type.trim_start().to_ascii_lowercase().starts_with("multipart/") {
            true => boundary_of(content_type),
            false => None,
        }
    }
}

/// An HTTP response embedded in a batch part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EmbeddedResponse<'a> {
    pub status: u16,
    pub reason: &'a str,
    pub part: MimePart<'a>,
}

impl<'a> EmbeddedResponse<'a> {
    /// Parses `HTTP/1.1 <status> <reason>` followed by headers and body.
    pub(crate) fn parse(text: &'a str) -> Result<Self, Error> {
        let text = text.trim_start_matches(['\r', '\n']);
        let (status_line, rest) = match text.find('\n') {
            Some(end) => (&text[..end], &text[end + 1..]),
            None => (text, ""),
        };
        let status_line = status_line.trim_end();
        let mut pieces = status_line.splitn(3, ' ');
        let protocol = pieces.next().unwrap_or_default();
        if !protocol.starts_with("HTTP/") {
            return Err(Error::parse_with_body("Batch part is missing its HTTP status line", text));
        }
        let status = pieces
            .next()
            .and_then(|code| code.parse().ok())
            .ok_or_else(|| Error::parse_with_body("Batch part has an invalid status code", status_line))?;
        let reason = pieces.next().unwrap_or_default().trim();
        Ok(Self {
            status,
            reason,
            part: MimePart::parse(rest),
        })
    }

    pub(crate) fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Splits header lines from the content, which starts after the first blank
/// line.
fn split_headers(text: &str) -> (Vec<(&str, &str)>, &str) {
    let mut headers = Vec::new();
    let mut offset = 0;

    for raw in text.split_inclusive('\n') {
        let line = raw.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return (headers, &text[offset + raw.len()..]);
        }
        match line.split_once(':') {
            Some((name, value)) => headers.push((name.trim(), value.trim())),
            // No header block.
            None => return (headers, &text[offset..]),
        }
        offset += raw.len();
    }
    (headers, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = "--batchresponse_1\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\
\r\n\
HTTP/1.1 200 OK\r\n\
Content-Type: application/json\r\n\
\r\n\
{\"value\":[]}\r\n\
--batchresponse_1\r\n\
Content-Type: multipart/mixed; boundary=changesetresponse_2\r\n\
\r\n\
--changesetresponse_2\r\n\
Content-Type: application/http\r\n\
Content-ID: 2\r\n\
\r\n\
HTTP/1.1 404 Not Found\r\n\
\r\n\
--changesetresponse_2--\r\n\
--batchresponse_1--\r\n";

    #[test]
    fn test_boundary_of() {
        assert_eq!(
            boundary_of("multipart/mixed; boundary=batchresponse_abc").as_deref(),
            Some("batchresponse_abc")
        );
        assert_eq!(
            boundary_of("multipart/mixed; Boundary=\"b1\"").as_deref(),
            Some("b1")
        );
        assert_eq!(boundary_of("application/json"), None);
    }

    #[test]
    fn test_leading_boundary() {
        assert_eq!(leading_boundary(RESPONSE).as_deref(), Some("batchresponse_1"));
    }

    #[test]
    fn test_split_and_parse_nested() {
        let parts = split_parts(RESPONSE, "batchresponse_1");
        assert_eq!(parts.len(), 2);

        let read = MimePart::parse(parts[0]);
        assert_eq!(read.header("content-type"), Some("application/http"));
        let response = EmbeddedResponse::parse(read.body).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.part.body.trim(), "{\"value\":[]}");

        let changeset = MimePart::parse(parts[1]);
        let nested = changeset.nested_boundary().unwrap();
        assert_eq!(nested, "changesetresponse_2");
        let sub_parts = split_parts(changeset.body, &nested);
        assert_eq!(sub_parts.len(), 1);

        let sub_part = MimePart::parse(sub_parts[0]);
        assert_eq!(sub_part.content_id(), Some(2));
        let response = EmbeddedResponse::parse(sub_part.body).unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.reason, "Not Found");
        assert!(!response.is_success());
    }

    #[test]
    fn test_split_parts_lf_only() {
        let body = "--b\nContent-Type: application/http\n\nHTTP/1.1 204 No Content\n\n--b--\n";
        let parts = split_parts(body, "b");
        assert_eq!(parts.len(), 1);
        let response = EmbeddedResponse::parse(MimePart::parse(parts[0]).body).unwrap();
        assert_eq!(response.status, 204);
    }

    #[test]
    fn test_missing_status_line() {
        assert!(matches!(
            EmbeddedResponse::parse("Content-Type: text/plain\r\n\r\n"),
            Err(Error::Parse { .. })
        ));
    }
}
