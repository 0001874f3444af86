//! Version store registry.
//!
//! A registry holds named stores; each store maps identifiers to stored
//! responses. Exactly one store name is "current" for a running engine, the
//! rest are leftovers from earlier versions waiting to be pruned.
//!
//! Two backends are provided:
//! - [`MemoryRegistry`]: in-process, for tests and embedders
//! - [`FsRegistry`]: one directory per store, one atomically written file per entry
//!
//! Every operation may fail with [`StoreError`](crate::error::StoreError); the
//! registry reports failures and leaves tolerance to its callers.

pub mod fs;
pub mod memory;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::request::Identifier;
use crate::response::StoredResponse;

pub use fs::FsRegistry;
pub use memory::MemoryRegistry;

/// A single named store.
///
/// Handles are cheap to clone and share the same underlying entries.
#[async_trait]
pub trait VersionStore: Clone + Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn get(&self, identifier: &Identifier) -> StoreResult<Option<StoredResponse>>;

    /// Replace any entry for `response.identifier`. The write is all or
    /// nothing: on failure the previous entry is left intact.
    async fn put(&self, response: StoredResponse) -> StoreResult<()>;

    async fn keys(&self) -> StoreResult<Vec<Identifier>>;

    async fn len(&self) -> StoreResult<usize> {
        Ok(self.keys().await?.len())
    }

    async fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len().await? == 0)
    }
}

#[async_trait]
pub trait StoreRegistry: Send + Sync + 'static {
    type Store: VersionStore;

    /// Open a store, creating it empty if absent. Idempotent.
    async fn open(&self, name: &str) -> StoreResult<Self::Store>;

    async fn list_names(&self) -> StoreResult<Vec<String>>;

    /// Remove a store and all its entries. Returns whether it existed.
    async fn delete(&self, name: &str) -> StoreResult<bool>;
}
