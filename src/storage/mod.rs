//! Cache store abstraction, with in-memory and on-disk implementations.

mod disk;
mod memory;

use async_trait::async_trait;
use reqwest::Method;

use crate::error::{Error, Result};
use crate::http::{RequestKey, Response};

pub use disk::DiskStorage;
pub use memory::MemoryStorage;

/// A set of named stores, each mapping request keys to responses.
///
/// Every individual read or write is atomic; there are no transactions
/// spanning several calls. Concurrent writes of the same key leave whichever
/// finished last.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Creates the store if it does not exist yet.
    async fn open(&self, store: &str) -> Result<()>;

    /// Checks whether a store exists.
    async fn has(&self, store: &str) -> Result<bool>;

    /// Lists the names of all stores.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Deletes a store and everything in it. Returns `false` if it did not exist.
    async fn delete(&self, store: &str) -> Result<bool>;

    /// Looks up an exact key. A missing store is a miss, not an error.
    async fn lookup(&self, store: &str, key: &RequestKey) -> Result<Option<Response>>;

    /// Stores a response, creating the store if needed.
    ///
    /// Fails with [`Error::NotCacheable`] for anything but `GET`.
    async fn put(&self, store: &str, key: &RequestKey, response: &Response) -> Result<()>;

    /// Lists the keys held by a store.
    async fn entries(&self, store: &str) -> Result<Vec<RequestKey>>;
}

/// Rejects keys the cache may not hold.
fn ensure_cacheable(key: &RequestKey) -> Result<()> {
    if key.method == Method::GET {
        Ok(())
    } else {
        Err(Error::NotCacheable {
            method: key.method.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;

    #[test]
    fn only_get_is_cacheable() {
        let url = Url::parse("https://example.org/form").unwrap();
        assert!(ensure_cacheable(&RequestKey::get(url.clone())).is_ok());
        assert!(matches!(
            ensure_cacheable(&RequestKey::new(Method::POST, url)),
            Err(Error::NotCacheable { .. })
        ));
    }

    #[test]
    fn implementations_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MemoryStorage>();
        assert_send_sync::<DiskStorage>();
    }
}
