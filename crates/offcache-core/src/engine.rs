//! Fetch policy engine.
//!
//! Decides, per intercepted request, whether to answer from the current store,
//! go to the network, write the network response back, or synthesize a
//! failure response.
//!
//! # Policy
//!
//! - Non-GET: pass through untouched. No store access happens.
//! - Local GET, cache-first: store hit is returned without touching the
//!   network. On a miss the network is tried; a 2xx response is returned
//!   and written back in the background. If the network fails the store is
//!   checked again, then the offline fallback document is served.
//! - External GET, network-first: a 2xx response is returned immediately and
//!   written back in the background. If the network fails the stored copy is
//!   served, or a plain-text 503 when there is none.
//!
//! Write-backs never delay the response; [`Engine::settle`] waits for them.
//! Store read failures count as misses. Write-back failures are logged and
//! never affect the response already produced.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::StoreResult;
use crate::request::{self, Identifier, OriginClass, ResourceRequest};
use crate::response::{Response, ResponseSource, StoredResponse, OFFLINE_BODY, UNAVAILABLE_BODY};
use crate::store::{StoreRegistry, VersionStore};
use crate::tasks::BackgroundTasks;
use crate::transport::Transport;

/// Result of handing a request to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The engine declined; the host should perform its default handling.
    Passthrough,
    Respond {
        response: Response,
        source: ResponseSource,
    },
}

impl FetchOutcome {
    fn respond(response: Response, source: ResponseSource) -> Self {
        FetchOutcome::Respond { response, source }
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::Respond { response, .. } => Some(response),
            FetchOutcome::Passthrough => None,
        }
    }

    pub fn source(&self) -> Option<ResponseSource> {
        match self {
            FetchOutcome::Respond { source, .. } => Some(*source),
            FetchOutcome::Passthrough => None,
        }
    }
}

/// The engine and everything it needs: configuration, the store registry,
/// the network transport and the tracker for background work.
///
/// Clone is cheap - every part is behind an Arc.
pub struct Engine<R, T> {
    config: Arc<EngineConfig>,
    registry: Arc<R>,
    transport: Arc<T>,
    background: Arc<BackgroundTasks>,
    store_name: Arc<str>,
}

impl<R, T> Clone for Engine<R, T> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            registry: Arc::clone(&self.registry),
            transport: Arc::clone(&self.transport),
            background: Arc::clone(&self.background),
            store_name: Arc::clone(&self.store_name),
        }
    }
}

impl<R: StoreRegistry, T: Transport> Engine<R, T> {
    pub fn new(config: EngineConfig, registry: R, transport: T) -> Self {
        Self::from_shared(Arc::new(config), Arc::new(registry), Arc::new(transport))
    }

    pub fn from_shared(config: Arc<EngineConfig>, registry: Arc<R>, transport: Arc<T>) -> Self {
        let store_name: Arc<str> = config.store_name().into();
        Self {
            config,
            registry,
            transport,
            background: Arc::new(BackgroundTasks::new()),
            store_name,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn background(&self) -> &BackgroundTasks {
        &self.background
    }

    /// Name of the store this engine serves from.
    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub async fn current_store(&self) -> StoreResult<R::Store> {
        self.registry.open(&self.store_name).await
    }

    /// Wait for outstanding write-backs and optional installs.
    pub async fn settle(&self) {
        self.background.settle().await;
    }

    /// Decide how to answer `request`.
    pub async fn handle(&self, request: &ResourceRequest) -> FetchOutcome {
        if !request.is_get() {
            return FetchOutcome::Passthrough;
        }

        let (identifier, class) = request::normalize(request, &self.config.app_origin);
        match class {
            OriginClass::Local => self.cache_first(request, identifier).await,
            OriginClass::External => self.network_first(request, identifier).await,
        }
    }

    async fn cache_first(&self, request: &ResourceRequest, identifier: Identifier) -> FetchOutcome {
        if let Some(hit) = self.lookup(&identifier).await {
            debug!(identifier = %identifier, "Serving local request from store");
            return FetchOutcome::respond(hit.to_response(), ResponseSource::Store);
        }

        match self.transport.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.spawn_write_back(response.clone().into_stored(identifier));
                }
                FetchOutcome::respond(response, ResponseSource::Network)
            }
            Err(e) => {
                debug!(identifier = %identifier, error = %e, "Network failed for local request");
                // A concurrent write-back may have landed while we waited
                if let Some(hit) = self.lookup(&identifier).await {
                    return FetchOutcome::respond(hit.to_response(), ResponseSource::Store);
                }
                self.offline_fallback().await
            }
        }
    }

    async fn network_first(&self, request: &ResourceRequest, identifier: Identifier) -> FetchOutcome {
        match self.transport.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.spawn_write_back(response.clone().into_stored(identifier));
                }
                FetchOutcome::respond(response, ResponseSource::Network)
            }
            Err(e) => {
                debug!(identifier = %identifier, error = %e, "Network failed for external request");
                match self.lookup(&identifier).await {
                    Some(hit) => FetchOutcome::respond(hit.to_response(), ResponseSource::Store),
                    None => FetchOutcome::respond(
                        Response::service_unavailable(UNAVAILABLE_BODY),
                        ResponseSource::Synthetic,
                    ),
                }
            }
        }
    }

    async fn offline_fallback(&self) -> FetchOutcome {
        let fallback = match self.config.fallback_identifier() {
            Some(identifier) => self.lookup(&identifier).await,
            None => None,
        };
        match fallback {
            Some(document) => {
                FetchOutcome::respond(document.to_response(), ResponseSource::Fallback)
            }
            None => {
                warn!("Offline fallback document is not in the store");
                FetchOutcome::respond(
                    Response::service_unavailable(OFFLINE_BODY),
                    ResponseSource::Synthetic,
                )
            }
        }
    }

    /// Store lookup where any storage failure reads as a miss.
    async fn lookup(&self, identifier: &Identifier) -> Option<StoredResponse> {
        let result = match self.current_store().await {
            Ok(store) => store.get(identifier).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(entry) => entry,
            Err(e) => {
                warn!(identifier = %identifier, error = %e, "Store read failed, treating as miss");
                None
            }
        }
    }

    fn spawn_write_back(&self, stored: StoredResponse) {
        let registry = Arc::clone(&self.registry);
        let store_name = Arc::clone(&self.store_name);
        self.background.spawn(async move {
            let identifier = stored.identifier.clone();
            if let Err(e) = write_back(registry.as_ref(), &store_name, stored).await {
                warn!(identifier = %identifier, error = %e, "Background write-back failed");
            }
        });
    }
}

/// Write a successful response into the named store.
pub(crate) async fn write_back<R: StoreRegistry>(
    registry: &R,
    store_name: &str,
    stored: StoredResponse,
) -> StoreResult<()> {
    debug_assert!((200..300).contains(&stored.status));
    let store = registry.open(store_name).await?;
    store.put(stored).await
}
