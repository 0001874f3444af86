//! Lifecycle and event dispatch.
//!
//! The [`Worker`] is what a host talks to. It owns the engine and a lifecycle
//! state, and maps each [`Event`] kind to its handler:
//!
//! ```text
//! Parsed --install--> Installing --ok--> Installed --activate--> Activating --> Activated
//!                          |
//!                          +--err--> Redundant
//! ```
//!
//! Install must finish before activation prunes, and pruning must finish
//! before the worker starts answering fetches. Until then fetch events pass
//! through untouched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::control::{ControlMessage, ReplyPort, SizeReply};
use crate::engine::{Engine, FetchOutcome};
use crate::error::{LifecycleError, LifecycleResult, StoreResult};
use crate::installer::{self, InstallReport};
use crate::pruner;
use crate::request::ResourceRequest;
use crate::store::{StoreRegistry, VersionStore};
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; this version will never take control.
    Redundant,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Activated => "activated",
            LifecycleState::Redundant => "redundant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub store: String,
    pub deleted: Vec<String>,
}

/// Events delivered by the host.
#[derive(Debug)]
pub enum Event {
    Install,
    Activate,
    Fetch(ResourceRequest),
    Message {
        data: Value,
        reply: Option<ReplyPort>,
    },
    /// Background-sync tag; completes without doing anything.
    Sync(String),
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Install => "install",
            Event::Activate => "activate",
            Event::Fetch(_) => "fetch",
            Event::Message { .. } => "message",
            Event::Sync(_) => "sync",
        }
    }

    fn is_lifecycle(&self) -> bool {
        matches!(self, Event::Install | Event::Activate)
    }
}

#[derive(Debug)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivationReport),
    Fetched(FetchOutcome),
    MessageHandled,
    SyncComplete,
}

/// An event plus the channel its outcome is reported on.
pub struct Envelope {
    pub event: Event,
    pub done: Option<oneshot::Sender<LifecycleResult<EventOutcome>>>,
}

impl Envelope {
    pub fn new(event: Event) -> (Self, oneshot::Receiver<LifecycleResult<EventOutcome>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                event,
                done: Some(tx),
            },
            rx,
        )
    }
}

pub struct Worker<R, T> {
    engine: Engine<R, T>,
    state: Mutex<LifecycleState>,
    skip_waiting: AtomicBool,
    controlling: AtomicBool,
}

impl<R: StoreRegistry, T: Transport> Worker<R, T> {
    pub fn new(engine: Engine<R, T>) -> Self {
        Self {
            engine,
            state: Mutex::new(LifecycleState::Parsed),
            skip_waiting: AtomicBool::new(false),
            controlling: AtomicBool::new(false),
        }
    }

    pub fn engine(&self) -> &Engine<R, T> {
        &self.engine
    }

    pub fn state(&self) -> LifecycleState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_state(&self, next: LifecycleState) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        debug!(from = state.as_str(), to = next.as_str(), "Lifecycle transition");
        *state = next;
    }

    /// Move `from -> to` atomically, or report the state we were actually in.
    fn transition(&self, from: &[LifecycleState], to: LifecycleState) -> Result<(), LifecycleState> {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if from.contains(&state) {
            debug!(from = state.as_str(), to = to.as_str(), "Lifecycle transition");
            *state = to;
            Ok(())
        } else {
            Err(*state)
        }
    }

    pub fn is_waiting_skipped(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Whether this version has taken control of application instances.
    pub fn is_controlling(&self) -> bool {
        self.controlling.load(Ordering::SeqCst)
    }

    /// Route an event to its handler and wait for it to finish.
    pub async fn dispatch(&self, event: Event) -> LifecycleResult<EventOutcome> {
        match event {
            Event::Install => self.install().await.map(EventOutcome::Installed),
            Event::Activate => self.activate().await.map(EventOutcome::Activated),
            Event::Fetch(request) => Ok(EventOutcome::Fetched(self.fetch(&request).await)),
            Event::Message { data, reply } => {
                self.message(&data, reply).await;
                Ok(EventOutcome::MessageHandled)
            }
            Event::Sync(tag) => {
                debug!(tag = %tag, "Background sync requested, nothing to do");
                Ok(EventOutcome::SyncComplete)
            }
        }
    }

    pub async fn install(&self) -> LifecycleResult<InstallReport> {
        self.transition(
            &[LifecycleState::Parsed, LifecycleState::Redundant],
            LifecycleState::Installing,
        )
        .map_err(|state| LifecycleError::InvalidState {
            event: "install",
            state: state.as_str(),
        })?;

        match installer::install(&self.engine).await {
            Ok(report) => {
                self.set_state(LifecycleState::Installed);
                if self.is_waiting_skipped() {
                    info!("Skip-waiting requested during install, activating now");
                    if let Err(e) = self.activate().await {
                        warn!(error = %e, "Activation after install failed");
                    }
                }
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Install failed, previous version stays in control");
                self.set_state(LifecycleState::Redundant);
                Err(e.into())
            }
        }
    }

    pub async fn activate(&self) -> LifecycleResult<ActivationReport> {
        if let Err(state) = self.transition(&[LifecycleState::Installed], LifecycleState::Activating) {
            return match state {
                LifecycleState::Activated => Ok(ActivationReport {
                    store: self.engine.store_name().to_string(),
                    deleted: Vec::new(),
                }),
                LifecycleState::Parsed | LifecycleState::Installing | LifecycleState::Redundant => {
                    Err(LifecycleError::NotInstalled)
                }
                other => Err(LifecycleError::InvalidState {
                    event: "activate",
                    state: other.as_str(),
                }),
            };
        }

        match pruner::prune(self.engine.registry(), self.engine.config()).await {
            Ok(deleted) => {
                self.set_state(LifecycleState::Activated);
                self.controlling.store(true, Ordering::SeqCst);
                info!(store = self.engine.store_name(), pruned = deleted.len(), "Activated");
                Ok(ActivationReport {
                    store: self.engine.store_name().to_string(),
                    deleted,
                })
            }
            Err(e) => {
                self.set_state(LifecycleState::Installed);
                Err(e.into())
            }
        }
    }

    pub async fn fetch(&self, request: &ResourceRequest) -> FetchOutcome {
        if self.state() != LifecycleState::Activated {
            debug!(url = %request.url(), "Not yet in control, passing request through");
            return FetchOutcome::Passthrough;
        }
        self.engine.handle(request).await
    }

    pub async fn message(&self, data: &Value, reply: Option<ReplyPort>) {
        match ControlMessage::parse(data) {
            Some(ControlMessage::SkipWaiting) => self.skip_waiting().await,
            Some(ControlMessage::GetCacheSize) => match self.cache_size().await {
                Ok(size) => {
                    if let Some(reply) = reply {
                        // The requester may have gone away
                        let _ = reply.send(SizeReply { size }.to_value());
                    }
                }
                Err(e) => warn!(error = %e, "Could not read cache size"),
            },
            None => debug!(message = %data, "Ignoring unrecognized control message"),
        }
    }

    async fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
        if self.state() == LifecycleState::Installed {
            if let Err(e) = self.activate().await {
                warn!(error = %e, "Activation after skip-waiting failed");
            }
        }
    }

    /// Entry count of the current store.
    pub async fn cache_size(&self) -> StoreResult<usize> {
        self.engine.current_store().await?.len().await
    }

    /// Reactor loop: lifecycle events run to completion in order, fetches and
    /// messages are spawned so they interleave. Returns when the channel closes.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<Envelope>) {
        while let Some(Envelope { event, done }) = events.recv().await {
            if event.is_lifecycle() {
                let outcome = self.dispatch(event).await;
                if let Some(done) = done {
                    let _ = done.send(outcome);
                }
            } else {
                let worker = Arc::clone(&self);
                tokio::spawn(async move {
                    let outcome = worker.dispatch(event).await;
                    if let Some(done) = done {
                        let _ = done.send(outcome);
                    }
                });
            }
        }
        debug!("Event channel closed, worker stopping");
    }
}
