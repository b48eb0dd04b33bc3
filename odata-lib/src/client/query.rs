//! Commands bound to a session, with their terminal operations

use std::sync::Arc;

use async_stream::try_stream;
use futures::stream::BoxStream;
use reqwest::Method;
use tokio_util::sync::CancellationToken;

use super::ODataClient;
use crate::command::Command;
use crate::command::ResolvedCommand;
use crate::error::Error;
use crate::metadata::Catalog;
use crate::metadata::FunctionKind;
use crate::model::Entry;
use crate::model::Feed;
use crate::model::Value;
use crate::reader::Payload;
use crate::reader::RESULT_FIELD;
use crate::transport::HttpRequest;
use crate::transport::HttpResponse;

/// A [`Command`] bound to an [`ODataClient`].
///
/// Terminal methods resolve the command against the session catalog,
/// format it, dispatch it and read the response. Cancellation is checked
/// between steps: after the catalog is available, before each dispatch and
/// between the entries of multi-entry operations.
///
/// # Example
///
/// ```ignore
/// let feed = client
///     .query(Command::collection("Products").top(10)?)
///     .with_cancellation(token.clone())
///     .find_entries()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct Query<'a> {
    client: &'a ODataClient,
    command: Command,
    cancel: Option<CancellationToken>,
    if_match: Option<String>,
}

impl<'a> Query<'a> {
    pub(crate) fn new(client: &'a ODataClient, command: Command) -> Self {
        Self {
            client,
            command,
            cancel: None,
            if_match: None,
        }
    }

    /// Aborts the operation when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Sends `If-Match` with updates and deletes.
    pub fn if_match(mut self, etag: impl Into<String>) -> Self {
        self.if_match = Some(etag.into());
        self
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    fn with_command(&self, command: Command) -> Self {
        Self {
            client: self.client,
            command,
            cancel: self.cancel.clone(),
            if_match: self.if_match.clone(),
        }
    }

    fn checkpoint(&self) -> Result<(), Error> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }

    async fn prepare(&self) -> Result<(Arc<Catalog>, ResolvedCommand), Error> {
        self.checkpoint()?;
        let catalog = self.client.catalog().await?;
        self.checkpoint()?;
        let resolved = self.client.resolve_with(&catalog, &self.command)?;
        Ok((catalog, resolved))
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        self.checkpoint()?;
        self.client.dispatch(request, self.cancel.as_ref()).await
    }

    /// Sends a read; a tolerated 404 yields `None`.
    async fn send_read(&self, uri: &str) -> Result<Option<HttpResponse>, Error> {
        let result = self.send(self.client.request(Method::GET, uri)).await;
        self.client.tolerate_not_found(result.map(Some), || None)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Returns the first page of matching entries with its annotations.
    pub async fn find_entries(&self) -> Result<Feed, Error> {
        let (catalog, resolved) = self.prepare().await?;
        let uri = self.client.formatter().format(&resolved)?;
        let Some(response) = self.send_read(&uri).await? else {
            return Ok(Feed::default());
        };
        let payload = self.client.reader(&catalog, &resolved).read(&response.body)?;
        Ok(payload.into_feed())
    }

    /// Returns the addressed entry, or the first match.
    pub async fn find_entry(&self) -> Result<Option<Entry>, Error> {
        let (catalog, resolved) = self.prepare().await?;
        let uri = self.client.formatter().format(&resolved)?;
        let Some(response) = self.send_read(&uri).await? else {
            return Ok(None);
        };
        let payload = self.client.reader(&catalog, &resolved).read(&response.body)?;
        Ok(payload.into_entry())
    }

    /// Returns a single value: a scalar result, the only field of the first
    /// entry, or its first selected field.
    pub async fn find_scalar(&self) -> Result<Value, Error> {
        let (catalog, resolved) = self.prepare().await?;
        let uri = self.client.formatter().format(&resolved)?;
        let Some(response) = self.send_read(&uri).await? else {
            return Ok(Value::Null);
        };
        let payload = self.client.reader(&catalog, &resolved).read(&response.body)?;
        let mut entry = match payload {
            Payload::Value(value) => return Ok(value),
            other => match other.into_entry() {
                Some(entry) => entry,
                None => return Ok(Value::Null),
            },
        };
        if let Some(value) = entry.remove(RESULT_FIELD) {
            return Ok(value);
        }
        if let Some(first) = resolved.projection().select.first() {
            return Ok(entry.remove(&first.to_string()).unwrap_or(Value::Null));
        }
        match entry.fields().len() {
            0 => Ok(Value::Null),
            1 => Ok(entry.fields_mut().drain().next().map_or(Value::Null, |(_, v)| v)),
            _ => Err(Error::invalid_command("a scalar query must select a single field")),
        }
    }

    /// Returns the number of matching entities (`/$count`).
    pub async fn count(&self) -> Result<i64, Error> {
        let counted = self.with_command(self.command.count());
        let (_, resolved) = counted.prepare().await?;
        let uri = self.client.formatter().format(&resolved)?;
        let Some(response) = counted.send_read(&uri).await? else {
            return Ok(0);
        };
        let text = response.text();
        text.trim()
            .parse()
            .map_err(|_| Error::parse_with_body("Count response is not a number", text))
    }

    /// Streams every page of matching entries, following next links.
    ///
    /// The stream ends after the first error.
    pub fn into_pages(self) -> BoxStream<'a, Result<Feed, Error>> {
        Box::pin(try_stream! {
            let (catalog, resolved) = self.prepare().await?;
            let reader = self.client.reader(&catalog, &resolved);
            let mut uri = self.client.formatter().format(&resolved)?;
            loop {
                let Some(response) = self.send_read(&uri).await? else {
                    break;
                };
                let feed = reader.read(&response.body)?.into_feed();
                let next = feed.next_link().map(str::to_string);
                yield feed;
                match next {
                    Some(link) => uri = link,
                    None => break,
                }
            }
        })
    }

    /// Reads all pages into one list of entries.
    async fn collect_entries(&self, catalog: &Catalog, resolved: &ResolvedCommand) -> Result<Vec<Entry>, Error> {
        let reader = self.client.reader(catalog, resolved);
        let mut uri = self.client.formatter().format(resolved)?;
        let mut entries = Vec::new();
        loop {
            let Some(response) = self.send_read(&uri).await? else {
                break;
            };
            let feed = reader.read(&response.body)?.into_feed();
            let next = feed.next_link().map(str::to_string);
            entries.extend(feed);
            match next {
                Some(link) => uri = link,
                None => break,
            }
        }
        Ok(entries)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Creates the payload entry in the addressed collection and returns the
    /// created entry when the service sends it back.
    pub async fn insert_entry(&self) -> Result<Option<Entry>, Error> {
        let (catalog, resolved) = self.prepare().await?;
        if resolved.is_single() {
            return Err(Error::invalid_command("insert must address a collection"));
        }
        let uri = self.client.formatter().format(&resolved)?;
        let request = self
            .client
            .request(Method::POST, &uri)
            .header("Prefer", "return=representation")
            .body(self.client.write_payload(&resolved)?);
        let response = self.send(request).await?;
        Ok(self.client.reader(&catalog, &resolved).read(&response.body)?.into_entry())
    }

    /// Applies the payload entry to the addressed entity.
    pub async fn update_entry(&self) -> Result<Option<Entry>, Error> {
        let (catalog, resolved) = self.prepare().await?;
        if !resolved.is_single() {
            return Err(Error::invalid_command("update must address a single entity; use update_entries"));
        }
        let uri = self.client.formatter().format(&resolved)?;
        let mut request = self
            .client
            .request(self.client.adapter().update_method(), &uri)
            .header("Prefer", "return=representation")
            .body(self.client.write_payload(&resolved)?);
        if let Some(etag) = &self.if_match {
            request = request.header("If-Match", etag);
        }
        let result = self.send(request).await;
        let Some(response) = self.client.tolerate_not_found(result.map(Some), || None)? else {
            return Ok(None);
        };
        Ok(self.client.reader(&catalog, &resolved).read(&response.body)?.into_entry())
    }

    /// Applies the payload entry to every matching entity, one at a time and
    /// in the order the service returned them. Returns the number updated.
    ///
    /// A failure stops the run; entities after the failing one are left
    /// untouched.
    pub async fn update_entries(&self) -> Result<usize, Error> {
        let (catalog, resolved) = self.prepare().await?;
        let entries = self.collect_entries(&catalog, &resolved).await?;
        log::debug!("updating {} entries", entries.len());
        for entry in &entries {
            self.checkpoint()?;
            let mut target = self.keyed_command(&catalog, &resolved, entry)?;
            if let Some(payload) = self.command.entry() {
                target = target.set(payload.clone());
            }
            let mut query = self.with_command(target);
            query.if_match = entry.etag().map(str::to_string).or(query.if_match);
            query.update_entry().await?;
        }
        Ok(entries.len())
    }

    /// Deletes the addressed entity.
    pub async fn delete_entry(&self) -> Result<(), Error> {
        let (_, resolved) = self.prepare().await?;
        if !resolved.is_single() {
            return Err(Error::invalid_command("delete must address a single entity; use delete_entries"));
        }
        let uri = self.client.formatter().format(&resolved)?;
        let mut request = self.client.request(Method::DELETE, &uri);
        if let Some(etag) = &self.if_match {
            request = request.header("If-Match", etag);
        }
        let result = self.send(request).await.map(|_| ());
        self.client.tolerate_not_found(result, || ())
    }

    /// Deletes every matching entity, sequentially. Returns the number
    /// deleted.
    pub async fn delete_entries(&self) -> Result<usize, Error> {
        let (catalog, resolved) = self.prepare().await?;
        let entries = self.collect_entries(&catalog, &resolved).await?;
        log::debug!("deleting {} entries", entries.len());
        for entry in &entries {
            self.checkpoint()?;
            let target = self.keyed_command(&catalog, &resolved, entry)?;
            let mut query = self.with_command(target);
            query.if_match = entry.etag().map(str::to_string).or(query.if_match);
            query.delete_entry().await?;
        }
        Ok(entries.len())
    }

    /// Addresses `entry` by key in the entity set holding its type.
    fn keyed_command(&self, catalog: &Catalog, resolved: &ResolvedCommand, entry: &Entry) -> Result<Command, Error> {
        let entity_type = resolved
            .entity_type()
            .and_then(|name| catalog.entity_type(name))
            .ok_or_else(|| Error::invalid_command("command does not address entities"))?;
        let set = catalog
            .entity_set_for_type(entity_type)
            .ok_or_else(|| Error::unresolvable("entity set", &entity_type.name))?;
        let mut key = Vec::new();
        for property in catalog.key_properties(entity_type) {
            let value = entry
                .get(&property.name)
                .ok_or_else(|| Error::invalid_command(format!("entry has no value for key '{}'", property.name)))?;
            key.push((property.name.clone(), value.clone()));
        }
        Command::collection(&set.name).key_values(key)
    }

    // =========================================================================
    // Links
    // =========================================================================

    /// Links the entity addressed by `target` through the association this
    /// query addresses with [`Command::link`].
    pub async fn link_entry(&self, target: &Command) -> Result<(), Error> {
        let (catalog, resolved) = self.prepare().await?;
        let link = resolved
            .link()
            .ok_or_else(|| Error::invalid_command("link_entry needs a command addressing a link"))?;
        let target = self.client.resolve_with(&catalog, target)?;
        if !target.is_single() {
            return Err(Error::invalid_command("link target must be a single entity"));
        }
        let formatter = self.client.formatter();
        let uri = formatter.format(&resolved)?;
        let target_uri = self.client.absolute_url(&formatter.path(&target));
        let method = match link.is_collection {
            true => Method::POST,
            false => Method::PUT,
        };
        let body = self.client.adapter().link_payload(&target_uri).to_string();
        self.send(self.client.request(method, &uri).body(body)).await?;
        Ok(())
    }

    /// Removes a link. `target` names the related entity and is required for
    /// to-many associations.
    pub async fn unlink_entry(&self, target: Option<&Command>) -> Result<(), Error> {
        let (catalog, resolved) = self.prepare().await?;
        let link = resolved
            .link()
            .ok_or_else(|| Error::invalid_command("unlink_entry needs a command addressing a link"))?;
        let related = match (link.is_collection, target) {
            (true, Some(target)) => Some(self.client.resolve_with(&catalog, target)?),
            (true, None) => {
                return Err(Error::invalid_command(
                    "removing a link of a to-many association needs the related entity",
                ));
            }
            (false, _) => None,
        };
        let related_key = match &related {
            Some(related) => Some(
                related
                    .key()
                    .ok_or_else(|| Error::invalid_command("related entity must be addressed by key"))?,
            ),
            None => None,
        };
        let uri = self.client.formatter().link_path(&resolved, related_key)?;
        let result = self.send(self.client.request(Method::DELETE, &uri)).await.map(|_| ());
        self.client.tolerate_not_found(result, || ())
    }

    // =========================================================================
    // Operations and media
    // =========================================================================

    /// Calls a function import.
    pub async fn execute_function(&self) -> Result<Payload, Error> {
        let (catalog, resolved) = self.prepare().await?;
        match resolved.operation() {
            Some(op) if op.kind == FunctionKind::Function => {}
            _ => return Err(Error::invalid_command("command does not call a function")),
        }
        let uri = self.client.formatter().format(&resolved)?;
        let Some(response) = self.send_read(&uri).await? else {
            return Ok(Payload::Value(Value::Null));
        };
        self.client.reader(&catalog, &resolved).read(&response.body)
    }

    /// Invokes an action import with its parameters as a JSON body.
    pub async fn execute_action(&self) -> Result<Payload, Error> {
        let (catalog, resolved) = self.prepare().await?;
        let operation = match resolved.operation() {
            Some(op) if op.kind == FunctionKind::Action => op,
            _ => return Err(Error::invalid_command("command does not invoke an action")),
        };
        let adapter = self.client.adapter();
        let parameters: serde_json::Map<String, serde_json::Value> = operation
            .parameters
            .iter()
            .map(|(name, value)| (name.clone(), adapter.payload_value(value)))
            .collect();
        let uri = self.client.formatter().format(&resolved)?;
        let request = self
            .client
            .request(Method::POST, &uri)
            .body(serde_json::Value::Object(parameters).to_string());
        let response = self.send(request).await?;
        self.client.reader(&catalog, &resolved).read(&response.body)
    }

    /// Downloads the media stream of the addressed media-link entry.
    pub async fn get_media(&self) -> Result<Vec<u8>, Error> {
        let media = self.with_command(self.command.media());
        let (_, resolved) = media.prepare().await?;
        let uri = self.client.formatter().format(&resolved)?;
        let Some(response) = media.send_read(&uri).await? else {
            return Ok(Vec::new());
        };
        Ok(response.body)
    }
}
