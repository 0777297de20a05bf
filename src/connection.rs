//! Connection-scoped state.
//!
//! A [`Connection`] stands for one open storage connection. State derived
//! from the connection's schemas, such as the display specification cache,
//! lives on the connection and is dropped with it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::display_spec::RelatedItemsDisplaySpecificationsCache;
use crate::schema_catalog::SchemaCatalog;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub struct Connection {
    id: u64,
    catalog: Arc<SchemaCatalog>,
    display_specs: OnceLock<Arc<RelatedItemsDisplaySpecificationsCache>>,
}

impl Connection {
    pub fn new(catalog: Arc<SchemaCatalog>) -> Self {
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::SeqCst);
        log::debug!("Opened connection {}", id);
        Connection {
            id,
            catalog,
            display_specs: OnceLock::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn catalog(&self) -> &Arc<SchemaCatalog> {
        &self.catalog
    }

    /// The connection's display specification cache, built on first access.
    /// Concurrent first calls build at most one cache that gets stored.
    pub fn display_specifications(&self) -> Arc<RelatedItemsDisplaySpecificationsCache> {
        self.display_specs
            .get_or_init(|| {
                log::debug!("Building display specification cache for connection {}", self.id);
                Arc::new(RelatedItemsDisplaySpecificationsCache::build(&self.catalog))
            })
            .clone()
    }
}

/// Display specification cache of `connection`; repeated calls return the
/// same instance.
pub fn get_cache(connection: &Connection) -> Arc<RelatedItemsDisplaySpecificationsCache> {
    connection.display_specifications()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_catalog;
    use std::thread;

    #[test]
    fn test_cache_identity_per_connection() {
        let connection = Connection::new(Arc::new(test_catalog()));
        let first = get_cache(&connection);
        let second = get_cache(&connection);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_connections_do_not_share_caches() {
        let catalog = Arc::new(test_catalog());
        let a = Connection::new(catalog.clone());
        let b = Connection::new(catalog);
        assert_ne!(a.id(), b.id());
        assert!(!Arc::ptr_eq(&get_cache(&a), &get_cache(&b)));
    }

    #[test]
    fn test_concurrent_first_access_stores_one_cache() {
        let connection = Arc::new(Connection::new(Arc::new(test_catalog())));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let connection = connection.clone();
                thread::spawn(move || get_cache(&connection))
            })
            .collect();
        let caches: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for cache in &caches[1..] {
            assert!(Arc::ptr_eq(&caches[0], cache));
        }
    }
}
