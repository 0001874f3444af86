use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{StoreRegistry, VersionStore};
use crate::error::{StoreError, StoreResult};
use crate::request::Identifier;
use crate::response::StoredResponse;

type Entries = Arc<RwLock<HashMap<Identifier, StoredResponse>>>;

fn poisoned() -> StoreError {
    StoreError::Unavailable {
        message: "memory store lock poisoned".to_string(),
    }
}

/// In-process registry. Clones share the same stores.
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    stores: Arc<RwLock<BTreeMap<String, Entries>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Clone)]
pub struct MemoryStore {
    name: String,
    entries: Entries,
}

#[async_trait]
impl StoreRegistry for MemoryRegistry {
    type Store = MemoryStore;

    async fn open(&self, name: &str) -> StoreResult<MemoryStore> {
        let mut stores = self.stores.write().map_err(|_| poisoned())?;
        let entries = stores.entry(name.to_string()).or_default().clone();
        Ok(MemoryStore {
            name: name.to_string(),
            entries,
        })
    }

    async fn list_names(&self) -> StoreResult<Vec<String>> {
        let stores = self.stores.read().map_err(|_| poisoned())?;
        Ok(stores.keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> StoreResult<bool> {
        let mut stores = self.stores.write().map_err(|_| poisoned())?;
        Ok(stores.remove(name).is_some())
    }
}

#[async_trait]
impl VersionStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, identifier: &Identifier) -> StoreResult<Option<StoredResponse>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(identifier).cloned())
    }

    async fn put(&self, response: StoredResponse) -> StoreResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(response.identifier.clone(), response);
        Ok(())
    }

    async fn keys(&self) -> StoreResult<Vec<Identifier>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        let mut keys: Vec<Identifier> = entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn len(&self) -> StoreResult<usize> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.len())
    }
}
