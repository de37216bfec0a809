//! Collaborator traits the reconciliation core consumes.
//!
//! The host supplies implementations; the core never reaches for globals.

use async_trait::async_trait;
use errors::StoreError;
use std::path::{Path, PathBuf};

/// Named byte-stream storage for configuration documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn exists(&self, path: &Path) -> Result<bool, StoreError>;

    async fn read(&self, path: &Path) -> Result<Vec<u8>, StoreError>;

    /// Replace the contents at `path`. The parent directory must exist.
    async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), StoreError>;

    async fn remove(&self, path: &Path) -> Result<(), StoreError>;

    /// Create `path` and all missing ancestors. Succeeds if it already exists.
    async fn create_dir_all(&self, path: &Path) -> Result<(), StoreError>;

    /// Files directly inside `dir`, sorted by name. A missing directory is
    /// reported as empty.
    async fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, StoreError>;
}

/// Produces a full snapshot of the live configuration in the on-disk format.
#[async_trait]
pub trait ConfigExporter: Send + Sync {
    async fn export(&self) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Invoked when neither a system nor a user document exists.
#[async_trait]
pub trait DefaultDocumentProducer: Send + Sync {
    async fn produce_default(
        &self,
        target: &Path,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Host lifecycle queries used to gate reconciliation.
pub trait HostLifecycle: Send + Sync {
    /// Whether host initialization reached the milestone after which
    /// configuration saves are meaningful.
    fn is_ready(&self) -> bool;

    /// Whether the host has begun terminating.
    fn is_terminating(&self) -> bool {
        false
    }
}

/// Lifecycle that is always ready and never terminates.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReady;

impl HostLifecycle for AlwaysReady {
    fn is_ready(&self) -> bool {
        true
    }
}
