//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use offcache_core::error::{StoreError, StoreResult, TransportError, TransportResult};
use offcache_core::store::memory::MemoryStore;
use offcache_core::{
    AssetManifest, Engine, EngineConfig, Identifier, MemoryRegistry, ResourceRequest, Response,
    StoreRegistry, StoredResponse, Transport, Url, VersionStore,
};

pub const APP_ORIGIN: &str = "https://app.example/";

pub fn url(s: &str) -> Url {
    Url::parse(APP_ORIGIN).unwrap().join(s).unwrap()
}

pub fn config(version: &str, manifest: AssetManifest) -> EngineConfig {
    EngineConfig::new(Url::parse(APP_ORIGIN).unwrap(), version)
        .unwrap()
        .with_store_prefix("app")
        .with_manifest(manifest)
}

pub fn stored(id: &str, body: &str) -> StoredResponse {
    Response::new(200, body).into_stored(Identifier::new(id))
}

/// Transport answering from a fixed table; anything not in the table fails
/// as if the network were unreachable. Counts every call.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, Response>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &Url, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Response::new(status, body));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, url: &Url) -> usize {
        let url = url.to_string();
        self.calls.lock().unwrap().iter().filter(|c| **c == url).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, request: &ResourceRequest) -> TransportResult<Response> {
        let key = request.url().to_string();
        self.calls.lock().unwrap().push(key.clone());
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Network {
                message: "offline".to_string(),
            });
        }
        self.routes
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or(TransportError::Network {
                message: format!("no route to {}", key),
            })
    }
}

#[derive(Default)]
pub struct Faults {
    pub reads: AtomicBool,
    pub writes: AtomicBool,
    /// Writes never complete.
    pub stall: AtomicBool,
}

fn unavailable() -> StoreError {
    StoreError::Unavailable {
        message: "storage disabled".to_string(),
    }
}

/// Memory registry whose reads and writes can be switched to fail or stall.
#[derive(Clone, Default)]
pub struct FlakyRegistry {
    pub inner: MemoryRegistry,
    pub faults: Arc<Faults>,
    pub accesses: Arc<Mutex<Vec<&'static str>>>,
}

impl FlakyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.faults.reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.faults.writes.store(fail, Ordering::SeqCst);
    }

    pub fn stall_writes(&self, stall: bool) {
        self.faults.stall.store(stall, Ordering::SeqCst);
    }

    pub fn access_count(&self) -> usize {
        self.accesses.lock().unwrap().len()
    }
}

#[derive(Clone)]
pub struct FlakyStore {
    inner: MemoryStore,
    faults: Arc<Faults>,
    accesses: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl StoreRegistry for FlakyRegistry {
    type Store = FlakyStore;

    async fn open(&self, name: &str) -> StoreResult<FlakyStore> {
        self.accesses.lock().unwrap().push("open");
        Ok(FlakyStore {
            inner: self.inner.open(name).await?,
            faults: Arc::clone(&self.faults),
            accesses: Arc::clone(&self.accesses),
        })
    }

    async fn list_names(&self) -> StoreResult<Vec<String>> {
        self.inner.list_names().await
    }

    async fn delete(&self, name: &str) -> StoreResult<bool> {
        self.inner.delete(name).await
    }
}

#[async_trait]
impl VersionStore for FlakyStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get(&self, identifier: &Identifier) -> StoreResult<Option<StoredResponse>> {
        self.accesses.lock().unwrap().push("get");
        if self.faults.reads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.get(identifier).await
    }

    async fn put(&self, response: StoredResponse) -> StoreResult<()> {
        self.accesses.lock().unwrap().push("put");
        if self.faults.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.faults.writes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.put(response).await
    }

    async fn keys(&self) -> StoreResult<Vec<Identifier>> {
        if self.faults.reads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.keys().await
    }
}

pub type TestEngine = Engine<FlakyRegistry, Arc<ScriptedTransport>>;

/// Engine over a flaky memory registry and a scripted transport. Both are
/// returned so tests can seed and inspect them.
pub fn engine(
    version: &str,
    manifest: AssetManifest,
) -> (TestEngine, FlakyRegistry, Arc<ScriptedTransport>) {
    let registry = FlakyRegistry::new();
    let transport = Arc::new(ScriptedTransport::new());
    let engine = Engine::new(
        config(version, manifest),
        registry.clone(),
        Arc::clone(&transport),
    );
    (engine, registry, transport)
}
