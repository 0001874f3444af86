//! Pruner: on activation, delete every superseded store.
//!
//! Deletion is unconditional. Handlers still running against an old version
//! are not waited for.

use tracing::{debug, info};

use crate::config::{EngineConfig, PruneScope};
use crate::error::StoreResult;
use crate::store::StoreRegistry;

/// Delete every store other than the current one (within the configured
/// scope). Returns the names that were deleted.
pub async fn prune<R: StoreRegistry>(registry: &R, config: &EngineConfig) -> StoreResult<Vec<String>> {
    let current = config.store_name();
    let mut deleted = Vec::new();

    for name in registry.list_names().await? {
        if name == current {
            continue;
        }
        if config.prune_scope == PruneScope::Owned && !config.owns_store(&name) {
            debug!(store = %name, "Leaving store owned by another application");
            continue;
        }
        if registry.delete(&name).await? {
            info!(store = %name, "Deleted stale store");
            deleted.push(name);
        }
    }

    Ok(deleted)
}
