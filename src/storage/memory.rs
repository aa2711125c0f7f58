//! Process-local cache storage.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::Result;
use crate::http::{RequestKey, Response};

use super::{CacheStorage, ensure_cacheable};

type Store = HashMap<RequestKey, Response>;

/// Stores kept in memory, listed in creation order.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    stores: Mutex<Vec<(String, Store)>>,
}

impl MemoryStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn stores(&self) -> MutexGuard<'_, Vec<(String, Store)>> {
        self.stores.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn find<'a>(stores: &'a [(String, Store)], name: &str) -> Option<&'a Store> {
    stores.iter().find(|(n, _)| n == name).map(|(_, s)| s)
}

fn find_or_create<'a>(stores: &'a mut Vec<(String, Store)>, name: &str) -> &'a mut Store {
    let idx = match stores.iter().position(|(n, _)| n == name) {
        Some(idx) => idx,
        None => {
            stores.push((name.to_string(), Store::new()));
            stores.len() - 1
        }
    };
    &mut stores[idx].1
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, store: &str) -> Result<()> {
        find_or_create(&mut self.stores(), store);
        Ok(())
    }

    async fn has(&self, store: &str) -> Result<bool> {
        Ok(find(&self.stores(), store).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.stores().iter().map(|(n, _)| n.clone()).collect())
    }

    async fn delete(&self, store: &str) -> Result<bool> {
        let mut stores = self.stores();
        let before = stores.len();
        stores.retain(|(n, _)| n != store);
        Ok(stores.len() != before)
    }

    async fn lookup(&self, store: &str, key: &RequestKey) -> Result<Option<Response>> {
        Ok(find(&self.stores(), store).and_then(|s| s.get(key).cloned()))
    }

    async fn put(&self, store: &str, key: &RequestKey, response: &Response) -> Result<()> {
        ensure_cacheable(key)?;
        find_or_create(&mut self.stores(), store).insert(key.clone(), response.clone());
        Ok(())
    }

    async fn entries(&self, store: &str) -> Result<Vec<RequestKey>> {
        Ok(find(&self.stores(), store)
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default())
    }
}
