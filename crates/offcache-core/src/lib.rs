//! Offline resource cache for a browser-hosted application.
//!
//! The crate intercepts resource requests, answers them from a versioned
//! store when it can, and keeps that store populated and pruned so the
//! application keeps working without a network.
//!
//! - [`request`]: turns a request into a cache identifier and origin class
//! - [`store`]: named version stores ([`MemoryRegistry`], [`FsRegistry`])
//! - [`installer`]: fills the current store from the [`AssetManifest`]
//! - [`pruner`]: deletes superseded stores on activation
//! - [`engine`]: the per-request cache-first / network-first policy
//! - [`control`]: `SKIP_WAITING` / `GET_CACHE_SIZE` commands
//! - [`worker`]: lifecycle state and event dispatch for a host
//!
//! # Example
//!
//! ```no_run
//! use offcache_core::{Engine, EngineConfig, Event, HttpTransport, MemoryRegistry, Url, Worker};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = EngineConfig::new(Url::parse("https://app.example/")?, "1.0.0")?;
//! let engine = Engine::new(config, MemoryRegistry::new(), HttpTransport::new()?);
//! let worker = Worker::new(engine);
//!
//! worker.dispatch(Event::Install).await?;
//! worker.dispatch(Event::Activate).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod installer;
pub mod manifest;
pub mod pruner;
pub mod request;
pub mod response;
pub mod store;
pub mod tasks;
pub mod transport;
pub mod worker;

pub use config::{EngineConfig, PruneScope};
pub use control::{ControlMessage, ReplyPort, SizeReply};
pub use engine::{Engine, FetchOutcome};
pub use error::{ConfigError, InstallError, LifecycleError, StoreError, TransportError};
pub use installer::InstallReport;
pub use manifest::AssetManifest;
pub use request::{Identifier, OriginClass, ResourceRequest};
pub use response::{Response, ResponseSource, StoredResponse};
pub use store::{FsRegistry, MemoryRegistry, StoreRegistry, VersionStore};
pub use transport::{HttpTransport, Transport};
pub use url::Url;
pub use worker::{ActivationReport, Envelope, Event, EventOutcome, LifecycleState, Worker};
