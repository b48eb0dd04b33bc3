//! Batch response routing and results.

use super::PendingEntry;
use super::QueuedPart;
use super::multipart::EmbeddedResponse;
use super::multipart::Group;
use super::multipart::MimePart;
use super::multipart::split_parts;
use crate::error::Error;
use crate::error::ProtocolError;
use crate::model::Entry;
use crate::model::Feed;
use crate::reader::Payload;

// =============================================================================
// Part Results
// =============================================================================

/// Result of one successful operation in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPartResult {
    content_id: u32,
    status: u16,
    payload: Payload,
}

impl BatchPartResult {
    pub(crate) fn new(content_id: u32, status: u16, payload: Payload) -> Self {
        Self {
            content_id,
            status,
            payload,
        }
    }

    /// The Content-ID the operation was queued under.
    pub fn content_id(&self) -> u32 {
        self.content_id
    }

    /// The status of the embedded response.
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// The returned entry, or the first entry of a returned feed.
    pub fn entry(&self) -> Option<&Entry> {
        match &self.payload {
            Payload::Entry(entry) => Some(entry),
            Payload::Feed(feed) => feed.entries().first(),
            Payload::Value(_) => None,
        }
    }

    /// The returned feed, if the operation read a collection.
    pub fn feed(&self) -> Option<&Feed> {
        match &self.payload {
            Payload::Feed(feed) => Some(feed),
            _ => None,
        }
    }
}

// =============================================================================
// Batch Results
// =============================================================================

/// Results of a completed batch, in the order operations were queued.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResults {
    results: Vec<BatchPartResult>,
}

impl BatchResults {
    pub(crate) fn new(results: Vec<BatchPartResult>) -> Self {
        Self { results }
    }

    /// Returns the result of the operation `pending` refers to.
    pub fn get(&self, pending: &PendingEntry) -> Option<&BatchPartResult> {
        self.results.iter().find(|r| r.content_id == pending.content_id())
    }

    /// Returns the entry produced by the operation `pending` refers to.
    pub fn entry(&self, pending: &PendingEntry) -> Option<&Entry> {
        self.get(pending)?.entry()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BatchPartResult> {
        self.results.iter()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn into_vec(self) -> Vec<BatchPartResult> {
        self.results
    }
}

// =============================================================================
// Demultiplexing
// =============================================================================

/// Status and body of a successful embedded response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawOutcome {
    pub status: u16,
    pub body: String,
}

pub(crate) type PartOutcome = Result<RawOutcome, ProtocolError>;

/// Routes the parts of a batch response back to the queued operations.
///
/// Top-level parts follow the request groups in order. Inside a changeset,
/// sub-parts are matched by Content-ID, falling back to their position. A
/// changeset answered by a single response (a failed changeset) applies that
/// response to each of its operations. Operations without a response are
/// left as `None`.
pub(crate) fn demultiplex(
    body: &str,
    boundary: &str,
    parts: &[QueuedPart],
    groups: &[Group],
) -> Result<Vec<Option<PartOutcome>>, Error> {
    let sections = split_parts(body, boundary);
    if sections.len() < groups.len() {
        return Err(Error::parse_with_body(
            format!(
                "Batch response has {} parts for {} requests",
                sections.len(),
                groups.len()
            ),
            body,
        ));
    }

    let mut outcomes: Vec<Option<PartOutcome>> = vec![None; parts.len()];
    for (group, section) in groups.iter().zip(sections) {
        let part = MimePart::parse(section);
        match (group, part.nested_boundary()) {
            (Group::Single(index), _) => {
                let response = EmbeddedResponse::parse(part.body)?;
                log::debug!("routing batch part to operation {}", parts[*index].content_id);
                outcomes[*index] = Some(outcome(&response, parts[*index].content_id));
            }
            (Group::Changeset(range), Some(nested)) => {
                for (position, sub_section) in split_parts(part.body, &nested).into_iter().enumerate() {
                    let sub_part = MimePart::parse(sub_section);
                    let response = EmbeddedResponse::parse(sub_part.body)?;
                    let index = sub_part
                        .content_id()
                        .or_else(|| response.part.content_id())
                        .and_then(|id| range.clone().find(|&i| parts[i].content_id == id))
                        .unwrap_or(range.start + position);
                    if index >= range.end {
                        return Err(Error::parse_with_body(
                            "Changeset response has more parts than requests",
                            part.body,
                        ));
                    }
                    log::debug!(
                        "routing changeset part {} to operation {}",
                        position,
                        parts[index].content_id
                    );
                    outcomes[index] = Some(outcome(&response, parts[index].content_id));
                }
            }
            (Group::Changeset(range), None) => {
                let response = EmbeddedResponse::parse(part.body)?;
                for index in range.clone() {
                    outcomes[index] = Some(outcome(&response, parts[index].content_id));
                }
            }
        }
    }
    Ok(outcomes)
}

fn outcome(response: &EmbeddedResponse<'_>, content_id: u32) -> PartOutcome {
    match response.is_success() {
        true => Ok(RawOutcome {
            status: response.status,
            body: response.part.body.to_string(),
        }),
        false => Err(
            ProtocolError::from_response(response.status, response.reason, response.part.body)
                .with_content_id(content_id.to_string()),
        ),
    }
}
