//! Process-scoped catalog registry

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use super::Catalog;
use crate::error::Error;

/// Catalogs keyed by service address, loaded at most once per address.
///
/// Concurrent callers asking for the same address await the same in-flight
/// load. A failed load leaves the slot empty so the next caller retries.
/// Entries live until [`invalidate`](Self::invalidate) or
/// [`clear`](Self::clear).
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use odata_lib::metadata::MetadataCache;
///
/// let cache = Arc::new(MetadataCache::new());
/// assert!(cache.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct MetadataCache {
    store: DashMap<String, Arc<OnceCell<Arc<Catalog>>>>,
}

impl MetadataCache {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            store: DashMap::new(),
        }
    }

    /// Returns the catalog for `address`, running `load` if no catalog is
    /// cached and no load is in flight.
    pub async fn get_or_load<F, Fut>(&self, address: &str, load: F) -> Result<Arc<Catalog>, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Catalog, Error>>,
    {
        let cell = self
            .store
            .entry(address.to_string())
            .or_default()
            .value()
            .clone();

        let catalog = cell
            .get_or_try_init(|| async {
                log::debug!("Loading catalog for {}", address);
                load().await.map(Arc::new)
            })
            .await?;
        Ok(catalog.clone())
    }

    /// Returns the cached catalog for `address`, if loaded.
    pub fn get(&self, address: &str) -> Option<Arc<Catalog>> {
        self.store.get(address)?.get().cloned()
    }

    /// Stores a catalog for `address`, replacing any cached one.
    pub fn insert(&self, address: &str, catalog: Catalog) {
        let cell = OnceCell::new_with(Some(Arc::new(catalog)));
        self.store.insert(address.to_string(), Arc::new(cell));
    }

    /// Drops the catalog for `address`. Returns `true` if one was cached.
    pub fn invalidate(&self, address: &str) -> bool {
        log::debug!("Invalidating catalog for {}", address);
        self.store.remove(address).is_some()
    }

    /// Drops every cached catalog.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Returns the number of addresses with a cached or loading catalog.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_single_flight() {
        let cache = MetadataCache::new();
        let counter = AtomicUsize::new(0);
        let loads = &counter;

        let load = move || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(Catalog::new("NS"))
        };

        let (a, b) = tokio::join!(
            cache.get_or_load("http://svc/", load),
            cache.get_or_load("http://svc/", load)
        );
        assert_eq!(a.unwrap().namespace, "NS");
        assert_eq!(b.unwrap().namespace, "NS");
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let cache = MetadataCache::new();

        let result = cache
            .get_or_load("http://svc/", || async { Err(Error::parse("boom")) })
            .await;
        assert!(result.is_err());
        assert!(cache.get("http://svc/").is_none());

        let catalog = cache
            .get_or_load("http://svc/", || async { Ok(Catalog::new("NS")) })
            .await
            .unwrap();
        assert_eq!(catalog.namespace, "NS");
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let cache = MetadataCache::new();
        cache.insert("http://svc/", Catalog::new("Old"));
        assert_eq!(cache.get("http://svc/").unwrap().namespace, "Old");

        assert!(cache.invalidate("http://svc/"));
        let catalog = cache
            .get_or_load("http://svc/", || async { Ok(Catalog::new("New")) })
            .await
            .unwrap();
        assert_eq!(catalog.namespace, "New");
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
