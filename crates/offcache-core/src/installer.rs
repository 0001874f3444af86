//! Installer: populates the current version's store from the asset manifest.
//!
//! Mandatory assets are all-or-nothing: every one is fetched first, and only
//! if all of them came back 2xx are they written. Any failure fails the
//! install. Optional assets are fetched and stored in the background; their
//! failures are logged and never reach the caller.

use futures::future;
use tracing::{debug, info, warn};
use url::Url;

use crate::engine::{write_back, Engine};
use crate::error::{InstallError, InstallResult};
use crate::request::{self, Identifier, ResourceRequest};
use crate::response::Response;
use crate::store::{StoreRegistry, VersionStore};
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub store: String,
    /// Mandatory identifiers written, in manifest order.
    pub mandatory: Vec<Identifier>,
    /// Optional assets handed to the background.
    pub optional_scheduled: usize,
}

fn resolve_asset(reference: &str, base: &Url) -> Result<(Url, Identifier), String> {
    let url = request::resolve(reference, base)
        .map_err(|e| format!("unresolvable reference: {}", e))?;
    let (identifier, _) = request::identify(&url, base);
    Ok((url, identifier))
}

async fn fetch_asset<T: Transport>(transport: &T, url: Url) -> Result<Response, String> {
    let response = transport
        .fetch(&ResourceRequest::get(url))
        .await
        .map_err(|e| e.to_string())?;
    if response.is_success() {
        Ok(response)
    } else {
        Err(format!("unexpected status {}", response.status))
    }
}

/// Install the manifest into the engine's current store.
pub async fn install<R: StoreRegistry, T: Transport>(
    engine: &Engine<R, T>,
) -> InstallResult<InstallReport> {
    let config = engine.config();
    let base = &config.app_origin;
    info!(store = engine.store_name(), "Installing");

    let store = engine.current_store().await?;

    let mut targets = Vec::with_capacity(config.manifest.mandatory.len());
    for reference in &config.manifest.mandatory {
        let (url, identifier) =
            resolve_asset(reference, base).map_err(|reason| InstallError::MandatoryAsset {
                identifier: Identifier::new(reference.as_str()),
                reason,
            })?;
        targets.push((url, identifier));
    }

    let fetched = future::try_join_all(targets.into_iter().map(|(url, identifier)| async move {
        match fetch_asset(engine.transport(), url).await {
            Ok(response) => Ok(response.into_stored(identifier)),
            Err(reason) => Err(InstallError::MandatoryAsset { identifier, reason }),
        }
    }))
    .await?;

    let mut mandatory = Vec::with_capacity(fetched.len());
    for stored in fetched {
        let identifier = stored.identifier.clone();
        store.put(stored).await?;
        debug!(identifier = %identifier, "Mandatory asset stored");
        mandatory.push(identifier);
    }

    let optional_scheduled = config.manifest.optional.len();
    for reference in config.manifest.optional.iter().cloned() {
        let task_engine = engine.clone();
        engine
            .background()
            .spawn(async move { install_optional(&task_engine, &reference).await });
    }

    info!(
        store = engine.store_name(),
        mandatory = mandatory.len(),
        optional = optional_scheduled,
        "Install complete"
    );
    Ok(InstallReport {
        store: engine.store_name().to_string(),
        mandatory,
        optional_scheduled,
    })
}

async fn install_optional<R: StoreRegistry, T: Transport>(engine: &Engine<R, T>, reference: &str) {
    let (url, identifier) = match resolve_asset(reference, &engine.config().app_origin) {
        Ok(target) => target,
        Err(reason) => {
            warn!(asset = reference, reason = %reason, "Skipping optional asset");
            return;
        }
    };
    let response = match fetch_asset(engine.transport(), url).await {
        Ok(response) => response,
        Err(reason) => {
            warn!(identifier = %identifier, reason = %reason, "Optional asset unavailable");
            return;
        }
    };
    let stored = response.into_stored(identifier.clone());
    match write_back(engine.registry(), engine.store_name(), stored).await {
        Ok(()) => debug!(identifier = %identifier, "Optional asset stored"),
        Err(e) => warn!(identifier = %identifier, error = %e, "Optional asset could not be stored"),
    }
}
