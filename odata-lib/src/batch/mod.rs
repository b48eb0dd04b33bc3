//! Batch operations
//!
//! A [`Batch`] queues commands and sends them in one multipart `$batch`
//! exchange. Each queued operation is a closure that runs when the batch
//! executes, in queue order, against the session catalog and a map of the
//! inserts queued before it. A later write can therefore reference an
//! earlier insert of the same changeset through its Content-ID (`$1`)
//! before the service has assigned the new entity a key.
//!
//! Consecutive writes share one changeset; reads are sent as standalone
//! parts. Results are only available once the whole batch has completed.
//!
//! # Example
//!
//! ```ignore
//! let mut batch = client.batch();
//! let product = batch.insert_entry(
//!     Command::collection("Products").set(Entry::new().set("ProductName", "Chai")),
//! );
//! batch.link_entry(&product, "Category", Command::collection("Categories").key(1)?);
//! let results = batch.execute().await?;
//! let created = results.entry(&product);
//! ```

mod multipart;
mod response;

pub use response::BatchPartResult;
pub use response::BatchResults;

use std::collections::HashMap;

use reqwest::Method;
use tokio_util::sync::CancellationToken;

use crate::ODataClient;
use crate::command::Command;
use crate::command::ResolvedCommand;
use crate::error::Error;
use crate::metadata::Catalog;
use crate::metadata::CatalogView;
use crate::metadata::EntityType;
use crate::metadata::FunctionKind;
use crate::model::Entry;

/// Maximum number of operations in one batch.
pub const MAX_OPERATIONS: usize = 1000;

// =============================================================================
// Content-ID Reference
// =============================================================================

/// Handle to a queued operation and, after execution, to its result.
///
/// Content-IDs are assigned from 1 in queue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingEntry {
    content_id: u32,
}

impl PendingEntry {
    pub fn content_id(&self) -> u32 {
        self.content_id
    }

    /// Returns the reference string (e.g. `$1`), usable as a binding or link
    /// target by later operations of the same batch.
    pub fn reference(&self) -> String {
        format!("${}", self.content_id)
    }
}

/// The entity an operation acts on: an addressed command, or the entity an
/// earlier insert of the batch creates.
#[derive(Debug, Clone)]
pub enum BatchTarget {
    Command(Command),
    Pending(PendingEntry),
}

impl From<Command> for BatchTarget {
    fn from(command: Command) -> Self {
        BatchTarget::Command(command)
    }
}

impl From<PendingEntry> for BatchTarget {
    fn from(pending: PendingEntry) -> Self {
        BatchTarget::Pending(pending)
    }
}

impl From<&PendingEntry> for BatchTarget {
    fn from(pending: &PendingEntry) -> Self {
        BatchTarget::Pending(*pending)
    }
}

// =============================================================================
// Prepared Parts
// =============================================================================

/// An embedded request, ready to be written into the multipart body.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PreparedRequest {
    pub method: Method,
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    /// Entity type the response is read as.
    pub entity_type: Option<String>,
    /// Function import whose return type types the response.
    pub function: Option<String>,
}

impl PreparedRequest {
    /// Sets a header, replacing any header of the same name.
    fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    fn typed(mut self, resolved: &ResolvedCommand) -> Self {
        self.entity_type = resolved.entity_type().map(str::to_string);
        self.function = resolved.operation().map(|op| op.name.clone());
        self
    }
}

/// A prepared request with its place in the batch.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QueuedPart {
    pub content_id: u32,
    pub is_write: bool,
    pub request: PreparedRequest,
}

/// An entity addressed by a batch operation.
struct Addressed {
    uri: String,
    entity_type: String,
}

/// State shared by the operation closures while a batch is prepared.
struct BatchContext<'c> {
    client: &'c ODataClient,
    catalog: &'c Catalog,
    /// Entity type of each queued insert, by Content-ID.
    pending: HashMap<u32, String>,
}

impl<'c> BatchContext<'c> {
    fn resolve(&self, command: &Command) -> Result<ResolvedCommand, Error> {
        self.client.resolve_with(self.catalog, command)
    }

    fn entity_type(&self, name: &str) -> Result<&'c EntityType, Error> {
        self.catalog
            .entity_type(name)
            .ok_or_else(|| Error::unresolvable("entity type", name))
    }

    /// Content-ID references stay relative; anything else is made absolute.
    fn uri(&self, path: &str) -> String {
        match path.starts_with('$') {
            true => path.to_string(),
            false => self.client.absolute_url(path),
        }
    }

    fn request(&self, method: Method, uri: String) -> PreparedRequest {
        let headers = self
            .client
            .adapter()
            .headers(self.client.settings().include_annotations)
            .into_iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        PreparedRequest {
            method,
            uri,
            headers,
            body: None,
            entity_type: None,
            function: None,
        }
    }

    fn address(&self, target: &BatchTarget) -> Result<Addressed, Error> {
        match target {
            BatchTarget::Command(command) => {
                let resolved = self.resolve(command)?;
                if !resolved.is_single() {
                    return Err(Error::invalid_command("batch target must address a single entity"));
                }
                let entity_type = resolved
                    .entity_type()
                    .ok_or_else(|| Error::invalid_command("batch target does not address an entity"))?
                    .to_string();
                Ok(Addressed {
                    uri: self.uri(&self.client.formatter().path(&resolved)),
                    entity_type,
                })
            }
            BatchTarget::Pending(pending) => {
                let entity_type = self.pending.get(&pending.content_id).ok_or_else(|| {
                    Error::invalid_command(format!(
                        "{} does not refer to an earlier insert of this batch",
                        pending.reference()
                    ))
                })?;
                Ok(Addressed {
                    uri: pending.reference(),
                    entity_type: entity_type.clone(),
                })
            }
        }
    }

    /// Serializes `entry` as a write payload for `entity_type`.
    fn payload(&self, entity_type: &str, entry: Entry) -> Result<String, Error> {
        let entity_type = self.entity_type(entity_type)?;
        let set = self
            .catalog
            .entity_set_for_type(entity_type)
            .ok_or_else(|| Error::unresolvable("entity set", &entity_type.name))?;
        let resolved = self.resolve(&Command::collection(&set.name).set(entry))?;
        self.client.write_payload(&resolved)
    }
}

type BuildRequest = Box<dyn FnOnce(&mut BatchContext<'_>) -> Result<PreparedRequest, Error> + Send>;

struct Operation {
    content_id: u32,
    is_write: bool,
    build: BuildRequest,
}

// =============================================================================
// Batch
// =============================================================================

/// Operations queued for one `$batch` exchange.
///
/// Use [`ODataClient::batch()`] to create a batch bound to a client.
pub struct Batch<'a> {
    client: &'a ODataClient,
    operations: Vec<Operation>,
    etags: HashMap<u32, String>,
    cancel: Option<CancellationToken>,
}

impl std::fmt::Debug for Batch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("client", self.client)
            .field("operations", &self.operations.len())
            .finish()
    }
}

impl<'a> Batch<'a> {
    pub(crate) fn new(client: &'a ODataClient) -> Self {
        Self {
            client,
            operations: Vec::new(),
            etags: HashMap::new(),
            cancel: None,
        }
    }

    /// Aborts the batch when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Returns the number of queued operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    fn next_content_id(&self) -> u32 {
        u32::try_from(self.operations.len() + 1).unwrap_or(u32::MAX)
    }

    fn push<F>(&mut self, is_write: bool, build: F) -> PendingEntry
    where
        F: FnOnce(&mut BatchContext<'_>) -> Result<PreparedRequest, Error> + Send + 'static,
    {
        let content_id = self.next_content_id();
        self.operations.push(Operation {
            content_id,
            is_write,
            build: Box::new(build),
        });
        PendingEntry { content_id }
    }

    // -------------------------------------------------------------------------
    // Queueing operations
    // -------------------------------------------------------------------------

    /// Queues a read of the entries `command` addresses.
    pub fn find_entries(&mut self, command: Command) -> PendingEntry {
        self.push(false, move |ctx| {
            let resolved = ctx.resolve(&command)?;
            let uri = ctx.uri(&ctx.client.formatter().format(&resolved)?);
            Ok(ctx.request(Method::GET, uri).typed(&resolved))
        })
    }

    /// Queues an insert of the command's payload entry.
    ///
    /// The returned handle can be used as a target or binding reference by
    /// operations queued after it.
    pub fn insert_entry(&mut self, command: Command) -> PendingEntry {
        let content_id = self.next_content_id();
        self.push(true, move |ctx| {
            let resolved = ctx.resolve(&command)?;
            if resolved.is_single() {
                return Err(Error::invalid_command("insert must address a collection"));
            }
            let entity_type = resolved
                .entity_type()
                .ok_or_else(|| Error::invalid_command("insert does not address an entity set"))?
                .to_string();
            let uri = ctx.uri(&ctx.client.formatter().path(&resolved));
            let request = ctx
                .request(Method::POST, uri)
                .header("Prefer", "return=representation")
                .with_body(ctx.client.write_payload(&resolved)?)
                .typed(&resolved);
            ctx.pending.insert(content_id, entity_type);
            Ok(request)
        })
    }

    /// Queues an update of `target` with the fields of `entry`.
    ///
    /// The entry's etag, if any, is sent as `If-Match`.
    pub fn update_entry(&mut self, target: impl Into<BatchTarget>, entry: Entry) -> PendingEntry {
        let target = target.into();
        self.push(true, move |ctx| {
            let addressed = ctx.address(&target)?;
            let etag = entry.etag().map(str::to_string);
            let body = ctx.payload(&addressed.entity_type, entry)?;
            let method = ctx.client.adapter().update_method();
            let mut request = ctx
                .request(method, addressed.uri)
                .header("Prefer", "return=representation")
                .with_body(body);
            request.entity_type = Some(addressed.entity_type);
            if let Some(etag) = etag {
                request.set_header("If-Match", etag);
            }
            Ok(request)
        })
    }

    /// Queues a delete of `target`.
    pub fn delete_entry(&mut self, target: impl Into<BatchTarget>) -> PendingEntry {
        let target = target.into();
        self.push(true, move |ctx| {
            let addressed = ctx.address(&target)?;
            Ok(ctx.request(Method::DELETE, addressed.uri))
        })
    }

    /// Queues linking `target` to `source` through the association
    /// `navigation`.
    pub fn link_entry(
        &mut self,
        source: impl Into<BatchTarget>,
        navigation: impl Into<String>,
        target: impl Into<BatchTarget>,
    ) -> PendingEntry {
        let source = source.into();
        let navigation = navigation.into();
        let target = target.into();
        self.push(true, move |ctx| {
            let addressed = ctx.address(&source)?;
            let entity_type = ctx.entity_type(&addressed.entity_type)?;
            let view = CatalogView::new(ctx.catalog, ctx.client.matcher());
            let nav = view.navigation(entity_type, &navigation)?;
            let related = ctx.address(&target)?;

            let adapter = ctx.client.adapter();
            let uri = format!("{}/{}", addressed.uri, adapter.link_path(&nav.name, None));
            let method = match nav.is_collection() {
                true => Method::POST,
                false => Method::PUT,
            };
            let body = adapter.link_payload(&related.uri).to_string();
            Ok(ctx.request(method, uri).with_body(body))
        })
    }

    /// Queues removing a link. `target` names the related entity and is
    /// required for to-many associations.
    pub fn unlink_entry(
        &mut self,
        source: impl Into<BatchTarget>,
        navigation: impl Into<String>,
        target: Option<Command>,
    ) -> PendingEntry {
        let source = source.into();
        let navigation = navigation.into();
        self.push(true, move |ctx| {
            let addressed = ctx.address(&source)?;
            let entity_type = ctx.entity_type(&addressed.entity_type)?;
            let view = CatalogView::new(ctx.catalog, ctx.client.matcher());
            let nav = view.navigation(entity_type, &navigation)?;

            let related_key = match (nav.is_collection(), &target) {
                (true, Some(command)) => {
                    let resolved = ctx.resolve(command)?;
                    let key = resolved
                        .key()
                        .ok_or_else(|| Error::invalid_command("related entity must be addressed by key"))?;
                    Some(ctx.client.formatter().key_segment(key))
                }
                (true, None) => {
                    return Err(Error::invalid_command(
                        "removing a link of a to-many association needs the related entity",
                    ));
                }
                (false, _) => None,
            };
            let uri = format!(
                "{}/{}",
                addressed.uri,
                ctx.client.adapter().link_path(&nav.name, related_key.as_deref())
            );
            Ok(ctx.request(Method::DELETE, uri))
        })
    }

    /// Queues an action invocation.
    pub fn execute_action(&mut self, command: Command) -> PendingEntry {
        self.push(true, move |ctx| {
            let resolved = ctx.resolve(&command)?;
            let operation = match resolved.operation() {
                Some(op) if op.kind == FunctionKind::Action => op,
                _ => return Err(Error::invalid_command("command does not invoke an action")),
            };
            let adapter = ctx.client.adapter();
            let parameters: serde_json::Map<String, serde_json::Value> = operation
                .parameters
                .iter()
                .map(|(name, value)| (name.clone(), adapter.payload_value(value)))
                .collect();
            let uri = ctx.uri(&ctx.client.formatter().format(&resolved)?);
            Ok(ctx
                .request(Method::POST, uri)
                .with_body(serde_json::Value::Object(parameters).to_string())
                .typed(&resolved))
        })
    }

    /// Sends `If-Match: etag` with a queued operation.
    pub fn if_match(&mut self, operation: &PendingEntry, etag: impl Into<String>) -> &mut Self {
        self.etags.insert(operation.content_id, etag.into());
        self
    }

    // -------------------------------------------------------------------------
    // Execution
    // -------------------------------------------------------------------------

    /// Prepares every operation, sends the batch and routes the response
    /// parts back to their operations.
    ///
    /// Every part of the response is parsed. If any operation failed, the
    /// first failure is returned as [`Error::Protocol`] carrying that part's
    /// status and message.
    pub async fn execute(self) -> Result<BatchResults, Error> {
        let Batch {
            client,
            operations,
            mut etags,
            cancel,
        } = self;

        if operations.len() > MAX_OPERATIONS {
            return Err(Error::invalid_command(format!(
                "batch has {} operations; the maximum is {}",
                operations.len(),
                MAX_OPERATIONS
            )));
        }
        if operations.is_empty() {
            return Ok(BatchResults::default());
        }

        checkpoint(cancel.as_ref())?;
        let catalog = client.catalog().await?;
        let mut context = BatchContext {
            client,
            catalog: &catalog,
            pending: HashMap::new(),
        };

        let mut parts = Vec::with_capacity(operations.len());
        for operation in operations {
            checkpoint(cancel.as_ref())?;
            // A read closes the changeset; Content-IDs are only visible within one.
            if !operation.is_write {
                context.pending.clear();
            }
            let mut request = (operation.build)(&mut context)?;
            if let Some(etag) = etags.remove(&operation.content_id) {
                request.set_header("If-Match", etag);
            }
            log::trace!("batch operation {}: {} {}", operation.content_id, request.method, request.uri);
            parts.push(QueuedPart {
                content_id: operation.content_id,
                is_write: operation.is_write,
                request,
            });
        }

        let groups = multipart::groups(&parts);
        let boundary = multipart::boundary("batch");
        let body = multipart::write_batch(&parts, &groups, &boundary);
        log::debug!("sending batch of {} operations in {} parts", parts.len(), groups.len());

        let request = client
            .request(Method::POST, "$batch")
            .header("Content-Type", &format!("multipart/mixed; boundary={}", boundary))
            .header("Accept", "multipart/mixed")
            .body(body);
        let response = client.dispatch(request, cancel.as_ref()).await?;

        let text = response.text();
        let response_boundary = response
            .header("Content-Type")
            .and_then(multipart::boundary_of)
            .or_else(|| multipart::leading_boundary(&text))
            .ok_or_else(|| Error::parse_with_body("Batch response has no multipart boundary", text.as_str()))?;
        let outcomes = response::demultiplex(&text, &response_boundary, &parts, &groups)?;

        let mut successes = Vec::with_capacity(parts.len());
        let mut first_failure = None;
        let mut unanswered = None;
        for (part, outcome) in parts.iter().zip(outcomes) {
            match outcome {
                Some(Ok(raw)) => successes.push((part, raw)),
                Some(Err(error)) => {
                    log::warn!("batch operation {} failed: {}", part.content_id, error);
                    first_failure.get_or_insert(error);
                }
                None => {
                    log::warn!("batch operation {} has no response part", part.content_id);
                    unanswered.get_or_insert(part.content_id);
                }
            }
        }
        if let Some(error) = first_failure {
            return Err(Error::Protocol(error));
        }
        if let Some(content_id) = unanswered {
            return Err(Error::parse_with_body(
                format!("Batch response has no part for operation {}", content_id),
                text,
            ));
        }

        let mut results = Vec::with_capacity(successes.len());
        for (part, raw) in successes {
            let reader = client.typed_reader(
                &catalog,
                part.request.entity_type.as_deref(),
                part.request.function.as_deref(),
            );
            let payload = reader.read(raw.body.as_bytes())?;
            results.push(BatchPartResult::new(part.content_id, raw.status, payload));
        }
        Ok(BatchResults::new(results))
    }
}

fn checkpoint(cancel: Option<&CancellationToken>) -> Result<(), Error> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(Error::Cancelled),
        _ => Ok(()),
    }
}
