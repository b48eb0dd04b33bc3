//! Main ODataClient

mod query;
mod settings;

pub use query::*;
pub use settings::*;

use std::sync::Arc;

use reqwest::Method;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::batch::Batch;
use crate::command::Command;
use crate::command::CommandFormatter;
use crate::command::ResolvedCommand;
use crate::error::Error;
use crate::error::ProtocolError;
use crate::error::TransportError;
use crate::metadata::Catalog;
use crate::metadata::CatalogSource;
use crate::metadata::CatalogView;
use crate::metadata::MetadataCache;
use crate::naming::NameMatcher;
use crate::naming::Pluralizer;
use crate::protocol::ExpandStyle;
use crate::protocol::ProtocolAdapter;
use crate::protocol::adapter_for;
use crate::reader::ResponseReader;
use crate::transport::HttpRequest;
use crate::transport::HttpResponse;
use crate::transport::Transport;

/// A session with one OData service.
///
/// The protocol adapter is chosen once from the settings; the catalog is
/// loaded on first use through the shared [`MetadataCache`] and reused for
/// the life of the cache entry. The client is cheap to clone (uses `Arc`
/// internally) and can be shared across tasks.
///
/// # Example
///
/// ```ignore
/// use odata_lib::ODataClient;
/// use odata_lib::command::Command;
/// use odata_lib::expr::prop;
/// use odata_lib::transport::ReqwestTransport;
///
/// let client = ODataClient::builder()
///     .url("https://services.odata.org/V4/Northwind/Northwind.svc")
///     .transport(ReqwestTransport::new())
///     .catalog_source(my_catalog)
///     .build();
///
/// let chai = client
///     .query(Command::collection("Products").filter(prop("ProductID").eq(1))?)
///     .find_entry()
///     .await?;
/// ```
#[derive(Clone)]
pub struct ODataClient {
    inner: Arc<ODataClientInner>,
}

struct ODataClientInner {
    service_url: String,
    transport: Arc<dyn Transport>,
    adapter: Box<dyn ProtocolAdapter>,
    matcher: NameMatcher,
    settings: ClientSettings,
    catalog_source: Option<Arc<dyn CatalogSource>>,
    metadata_cache: Arc<MetadataCache>,
}

impl std::fmt::Debug for ODataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ODataClient")
            .field("service_url", &self.inner.service_url)
            .field("protocol", &self.inner.settings.protocol)
            .finish()
    }
}

impl ODataClient {
    /// Creates a new builder for constructing a client.
    pub fn builder() -> ODataClientBuilder<Missing, Missing> {
        ODataClientBuilder::new()
    }

    /// Returns the service root URL, without trailing slash.
    pub fn service_url(&self) -> &str {
        &self.inner.service_url
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.inner.settings
    }

    /// Returns the protocol adapter of this session.
    pub fn adapter(&self) -> &dyn ProtocolAdapter {
        self.inner.adapter.as_ref()
    }

    /// Returns the session's name matcher.
    pub fn matcher(&self) -> &NameMatcher {
        &self.inner.matcher
    }

    /// Binds a command to this session.
    pub fn query(&self, command: Command) -> Query<'_> {
        Query::new(self, command)
    }

    /// Starts a batch that is sent as one multipart exchange.
    pub fn batch(&self) -> Batch<'_> {
        Batch::new(self)
    }

    /// Returns the service catalog, loading it on first use.
    ///
    /// Concurrent first callers share one load.
    pub async fn catalog(&self) -> Result<Arc<Catalog>, Error> {
        let inner = &self.inner;
        inner
            .metadata_cache
            .get_or_load(&inner.service_url, || async {
                let source = inner
                    .catalog_source
                    .as_ref()
                    .ok_or_else(|| Error::invalid_command("no catalog source configured"))?;
                source.load(inner.transport.as_ref(), &inner.service_url).await
            })
            .await
    }

    /// Drops the cached catalog so the next command reloads it.
    pub fn invalidate_metadata(&self) -> bool {
        self.inner.metadata_cache.invalidate(&self.inner.service_url)
    }

    /// Resolves `command` against the session catalog.
    pub async fn resolve(&self, command: &Command) -> Result<ResolvedCommand, Error> {
        let catalog = self.catalog().await?;
        self.resolve_with(&catalog, command)
    }

    /// Resolves and formats `command` into a URI relative to the service root.
    pub async fn format(&self, command: &Command) -> Result<String, Error> {
        let resolved = self.resolve(command).await?;
        self.formatter().format(&resolved)
    }

    // =========================================================================
    // Shared plumbing for queries and batches
    // =========================================================================

    pub(crate) fn resolve_with(&self, catalog: &Catalog, command: &Command) -> Result<ResolvedCommand, Error> {
        command.resolve(&CatalogView::new(catalog, &self.inner.matcher))
    }

    pub(crate) fn formatter(&self) -> CommandFormatter<'_> {
        let style = match self.inner.settings.prefer_nested_expand {
            true => ExpandStyle::Nested,
            false => ExpandStyle::Flattened,
        };
        CommandFormatter::new(self.adapter()).with_expand_style(style)
    }

    /// A reader typed by the entity or return type `resolved` addresses.
    pub(crate) fn reader<'c>(&self, catalog: &'c Catalog, resolved: &ResolvedCommand) -> ResponseReader<'c> {
        self.typed_reader(
            catalog,
            resolved.entity_type(),
            resolved.operation().map(|op| op.name.as_str()),
        )
    }

    /// A reader typed by entity type and function import names.
    pub(crate) fn typed_reader<'c>(
        &self,
        catalog: &'c Catalog,
        entity_type: Option<&str>,
        function: Option<&str>,
    ) -> ResponseReader<'c> {
        let mut reader = ResponseReader::new()
            .with_catalog(catalog)
            .with_annotations(self.inner.settings.include_annotations);
        if let Some(entity_type) = entity_type.and_then(|name| catalog.entity_type(name)) {
            reader = reader.with_entity_type(entity_type);
        }
        if let Some(return_type) = function
            .and_then(|name| catalog.function(name))
            .and_then(|f| f.return_type.as_ref())
        {
            reader = reader.with_value_type(return_type);
        }
        reader
    }

    /// Serializes the write payload of `resolved`, navigation bindings
    /// included.
    pub(crate) fn write_payload(&self, resolved: &ResolvedCommand) -> Result<String, Error> {
        let adapter = self.adapter();
        let mut payload = resolved
            .entry()
            .map(|entry| adapter.entry_payload(entry))
            .unwrap_or_default();
        for binding in resolved.bindings() {
            let targets: Vec<String> = binding
                .targets
                .iter()
                .map(|target| self.binding_target(target))
                .collect();
            adapter.write_bindings(&mut payload, &binding.navigation, &targets, binding.is_collection);
        }
        serde_json::to_string(&payload).map_err(|e| Error::parse(format!("Cannot serialize payload: {}", e)))
    }

    /// Batch references (`$1`) stay as they are; entity paths become absolute.
    fn binding_target(&self, target: &str) -> String {
        match target.starts_with('$') {
            true => target.to_string(),
            false => self.absolute_url(target),
        }
    }

    /// Makes `uri` absolute against the service root.
    pub(crate) fn absolute_url(&self, uri: &str) -> String {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            uri.to_string()
        } else {
            format!("{}/{}", self.inner.service_url, uri.trim_start_matches('/'))
        }
    }

    /// Creates a request carrying the session's protocol and default headers.
    pub(crate) fn request(&self, method: Method, uri: &str) -> HttpRequest {
        let mut request = HttpRequest::new(method, self.absolute_url(uri));
        for (name, value) in self.adapter().headers(self.inner.settings.include_annotations) {
            request = request.header(name, value);
        }
        for (name, value) in &self.inner.settings.default_headers {
            request = request.header(name, value);
        }
        request
    }

    /// Sends `request`; statuses of 400 and above become
    /// [`Error::Protocol`]. Failed calls are never retried.
    pub(crate) async fn dispatch(
        &self,
        request: HttpRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<HttpResponse, Error> {
        let method = request.method.clone();
        let url = request.url.clone();
        log::trace!(
            "{} {} ({} byte body)",
            method,
            url,
            request.body.as_ref().map_or(0, String::len)
        );

        let send = self.send_with_timeout(request);
        let response = match cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => return Err(Error::Cancelled),
                response = send => response?,
            },
            None => send.await?,
        };
        log::debug!("{} {} -> {}", method, url, response.status);

        if response.status >= 400 {
            let reason = StatusCode::from_u16(response.status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or_default();
            return Err(ProtocolError::from_response(response.status, reason, &response.text()).into());
        }
        Ok(response)
    }

    async fn send_with_timeout(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let transport = self.inner.transport.as_ref();
        match self.inner.settings.request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, transport.send(request))
                .await
                .map_err(|_| TransportError::Timeout(timeout))?
                .map_err(Error::from),
            None => transport.send(request).await.map_err(Error::from),
        }
    }

    /// Turns a 404 into `empty` when the session tolerates missing resources.
    pub(crate) fn tolerate_not_found<T>(&self, result: Result<T, Error>, empty: impl FnOnce() -> T) -> Result<T, Error> {
        match result {
            Err(Error::Protocol(e)) if e.is_not_found() && self.inner.settings.ignore_resource_not_found => {
                log::debug!("ignoring missing resource: {}", e.message);
                Ok(empty())
            }
            other => other,
        }
    }
}

// =============================================================================
// Typestate Builder
// =============================================================================

/// Marker type for missing required builder fields.
pub struct Missing;

/// Marker type for set builder fields.
pub struct Set<T>(T);

/// Builder for constructing an [`ODataClient`].
///
/// Uses the typestate pattern to ensure required fields are set at compile time.
///
/// # Required Fields
///
/// - `url` - The service root URL
/// - `transport` - A [`Transport`] implementation
///
/// # Example
///
/// ```ignore
/// let client = ODataClient::builder()
///     .url("https://host/service.svc")
///     .transport(ReqwestTransport::new())
///     .settings(ClientSettings::new().with_protocol(ProtocolVersion::V3))
///     .catalog_source(catalog)
///     .build();
/// ```
pub struct ODataClientBuilder<Url, Tr> {
    url: Url,
    transport: Tr,
    settings: ClientSettings,
    catalog_source: Option<Arc<dyn CatalogSource>>,
    metadata_cache: Option<Arc<MetadataCache>>,
    pluralizer: Option<Arc<Pluralizer>>,
}

impl ODataClientBuilder<Missing, Missing> {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            url: Missing,
            transport: Missing,
            settings: ClientSettings::default(),
            catalog_source: None,
            metadata_cache: None,
            pluralizer: None,
        }
    }
}

impl Default for ODataClientBuilder<Missing, Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ODataClientBuilder<Missing, T> {
    /// Sets the service root URL.
    pub fn url(self, url: impl Into<String>) -> ODataClientBuilder<Set<String>, T> {
        ODataClientBuilder {
            url: Set(url.into()),
            transport: self.transport,
            settings: self.settings,
            catalog_source: self.catalog_source,
            metadata_cache: self.metadata_cache,
            pluralizer: self.pluralizer,
        }
    }
}

impl<U> ODataClientBuilder<U, Missing> {
    /// Sets the transport used for every exchange.
    pub fn transport<T: Transport + 'static>(self, transport: T) -> ODataClientBuilder<U, Set<Arc<dyn Transport>>> {
        ODataClientBuilder {
            url: self.url,
            transport: Set(Arc::new(transport) as Arc<dyn Transport>),
            settings: self.settings,
            catalog_source: self.catalog_source,
            metadata_cache: self.metadata_cache,
            pluralizer: self.pluralizer,
        }
    }
}

impl<U, T> ODataClientBuilder<U, T> {
    pub fn settings(mut self, settings: ClientSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets where the catalog comes from.
    pub fn catalog_source(mut self, source: impl CatalogSource + 'static) -> Self {
        self.catalog_source = Some(Arc::new(source));
        self
    }

    /// Shares a catalog registry with other sessions.
    ///
    /// If not set, the session gets a private registry.
    pub fn metadata_cache(mut self, cache: Arc<MetadataCache>) -> Self {
        self.metadata_cache = Some(cache);
        self
    }

    /// Shares a pluralizer (with custom words) with other sessions.
    pub fn pluralizer(mut self, pluralizer: Arc<Pluralizer>) -> Self {
        self.pluralizer = Some(pluralizer);
        self
    }
}

impl ODataClientBuilder<Set<String>, Set<Arc<dyn Transport>>> {
    /// Builds the [`ODataClient`].
    ///
    /// This method is only available when both `url` and `transport` have been set.
    pub fn build(self) -> ODataClient {
        let settings = self.settings;
        let pluralizer = self.pluralizer.unwrap_or_else(|| Arc::new(Pluralizer::new()));
        ODataClient {
            inner: Arc::new(ODataClientInner {
                service_url: self.url.0.trim_end_matches('/').to_string(),
                transport: self.transport.0,
                adapter: adapter_for(settings.protocol, settings.enum_prefix_free),
                matcher: NameMatcher::new(settings.name_match, pluralizer),
                catalog_source: self.catalog_source,
                metadata_cache: self.metadata_cache.unwrap_or_default(),
                settings,
            }),
        }
    }
}
