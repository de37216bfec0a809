//! Shared test doubles for the configuration backup workspace.
//!
//! Provides scripted stand-ins for every host collaborator:
//! - `ScriptedExporter`: configurable export snapshots and failures
//! - `ManualLifecycle`: readiness and termination flipped by the test
//! - `RecordingDefaultProducer`: counts default document requests
//! - `FaultyStore`: injects storage failures for chosen paths

mod fixtures;

pub use fixtures::*;

use async_trait::async_trait;
use doc_core::{ConfigExporter, DefaultDocumentProducer, DocumentStore, HostLifecycle};
use errors::StoreError;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Route `tracing` output to the test harness. `RUST_LOG` overrides the
/// default `debug` level; repeated calls are harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn unique_id(prefix: &str) -> String {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}", prefix, id)
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Exporter returning a fixed document, with queued one-shot failures.
#[derive(Debug)]
pub struct ScriptedExporter {
    document: Mutex<Vec<u8>>,
    failures: Mutex<VecDeque<String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedExporter {
    pub fn new(document: impl Into<Vec<u8>>) -> Self {
        Self {
            document: Mutex::new(document.into()),
            failures: Mutex::new(VecDeque::new()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep for `delay` inside every export.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replace the document returned by subsequent exports.
    pub fn set_document(&self, document: impl Into<Vec<u8>>) {
        *self.document.lock() = document.into();
    }

    /// Make the next export fail with `reason`.
    pub fn fail_next(&self, reason: impl Into<String>) {
        self.failures.lock().push_back(reason.into());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigExporter for ScriptedExporter {
    async fn export(&self) -> Result<Vec<u8>, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.failures.lock().pop_front() {
            return Err(reason.into());
        }
        Ok(self.document.lock().clone())
    }
}

/// Lifecycle whose readiness and termination the test controls.
#[derive(Debug, Default)]
pub struct ManualLifecycle {
    ready: AtomicBool,
    terminating: AtomicBool,
}

impl ManualLifecycle {
    pub fn new(ready: bool) -> Self {
        Self {
            ready: AtomicBool::new(ready),
            terminating: AtomicBool::new(false),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn begin_terminating(&self) {
        self.terminating.store(true, Ordering::SeqCst);
    }
}

impl HostLifecycle for ManualLifecycle {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::SeqCst)
    }
}

/// Default document producer that records its targets and writes a fixed
/// document through the given store.
pub struct RecordingDefaultProducer {
    store: Arc<dyn DocumentStore>,
    document: Vec<u8>,
    fail: bool,
    targets: Mutex<Vec<PathBuf>>,
}

impl RecordingDefaultProducer {
    pub fn new(store: Arc<dyn DocumentStore>, document: impl Into<Vec<u8>>) -> Self {
        Self {
            store,
            document: document.into(),
            fail: false,
            targets: Mutex::new(Vec::new()),
        }
    }

    /// Producer that records the request and then fails.
    pub fn failing(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            fail: true,
            ..Self::new(store, Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.targets.lock().len()
    }

    pub fn targets(&self) -> Vec<PathBuf> {
        self.targets.lock().clone()
    }
}

#[async_trait]
impl DefaultDocumentProducer for RecordingDefaultProducer {
    async fn produce_default(&self, target: &Path) -> Result<(), BoxError> {
        self.targets.lock().push(target.to_path_buf());
        if self.fail {
            return Err("default document unavailable".into());
        }
        self.store.write(target, &self.document).await?;
        Ok(())
    }
}

/// Store wrapper failing selected operations with `PermissionDenied`.
pub struct FaultyStore {
    inner: Arc<dyn DocumentStore>,
    deny_create_dir: Mutex<HashSet<PathBuf>>,
    deny_write: Mutex<HashSet<PathBuf>>,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            deny_create_dir: Mutex::new(HashSet::new()),
            deny_write: Mutex::new(HashSet::new()),
        }
    }

    pub fn deny_create_dir(&self, path: impl Into<PathBuf>) {
        self.deny_create_dir.lock().insert(path.into());
    }

    pub fn deny_write(&self, path: impl Into<PathBuf>) {
        self.deny_write.lock().insert(path.into());
    }
}

fn denied(operation: &'static str, path: &Path) -> StoreError {
    tracing::debug!(operation, path = %path.display(), "Injected storage failure");
    StoreError::io(
        operation,
        path,
        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "injected failure"),
    )
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn exists(&self, path: &Path) -> Result<bool, StoreError> {
        self.inner.exists(path).await
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, StoreError> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        if self.deny_write.lock().contains(path) {
            return Err(denied("write", path));
        }
        self.inner.write(path, contents).await
    }

    async fn remove(&self, path: &Path) -> Result<(), StoreError> {
        self.inner.remove(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), StoreError> {
        if self.deny_create_dir.lock().contains(path) {
            return Err(denied("create_dir_all", path));
        }
        self.inner.create_dir_all(path).await
    }

    async fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
        self.inner.list(dir).await
    }
}
