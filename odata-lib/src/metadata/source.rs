//! Catalog collaborator

use std::sync::Arc;

use async_trait::async_trait;

use super::Catalog;
use crate::error::Error;
use crate::transport::Transport;

/// Supplies the catalog of a service.
///
/// Reading the service's schema document is left to implementors; the
/// client only consumes the resulting [`Catalog`].
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Loads the catalog for the service at `service_url`.
    async fn load(&self, transport: &dyn Transport, service_url: &str) -> Result<Catalog, Error>;
}

#[async_trait]
impl CatalogSource for Catalog {
    async fn load(&self, _transport: &dyn Transport, _service_url: &str) -> Result<Catalog, Error> {
        Ok(self.clone())
    }
}

#[async_trait]
impl<T: CatalogSource + ?Sized> CatalogSource for Arc<T> {
    async fn load(&self, transport: &dyn Transport, service_url: &str) -> Result<Catalog, Error> {
        (**self).load(transport, service_url).await
    }
}
