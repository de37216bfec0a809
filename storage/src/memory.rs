use async_trait::async_trait;
use doc_core::DocumentStore;
use errors::StoreError;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
}

/// In-process document store.
///
/// Mirrors filesystem semantics closely enough for reconciliation: a write
/// needs its parent directory to exist unless the path has no parent.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document, creating its parent directories.
    pub async fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        let path = path.into();
        let mut state = self.state.write().await;
        if let Some(parent) = path.parent() {
            add_ancestors(&mut state.dirs, parent);
        }
        state.files.insert(path, contents.into());
    }

    /// Current contents of a document as UTF-8 text.
    pub async fn text(&self, path: &Path) -> Option<String> {
        self.state
            .read()
            .await
            .files
            .get(path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub async fn paths(&self) -> Vec<PathBuf> {
        self.state.read().await.files.keys().cloned().collect()
    }
}

fn add_ancestors(dirs: &mut BTreeSet<PathBuf>, dir: &Path) {
    for ancestor in dir.ancestors() {
        if ancestor.as_os_str().is_empty() {
            continue;
        }
        dirs.insert(ancestor.to_path_buf());
    }
}

fn parent_exists(dirs: &BTreeSet<PathBuf>, path: &Path) -> bool {
    match path.parent() {
        None => true,
        Some(parent) if parent.as_os_str().is_empty() => true,
        Some(parent) => parent.parent().is_none() || dirs.contains(parent),
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn exists(&self, path: &Path) -> Result<bool, StoreError> {
        Ok(self.state.read().await.files.contains_key(path))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, StoreError> {
        self.state
            .read()
            .await
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_path_buf(),
            })
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !parent_exists(&state.dirs, path) {
            return Err(StoreError::io(
                "write",
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "parent directory missing"),
            ));
        }
        state.files.insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }

    async fn remove(&self, path: &Path) -> Result<(), StoreError> {
        self.state.write().await.files.remove(path);
        Ok(())
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), StoreError> {
        add_ancestors(&mut self.state.write().await.dirs, path);
        Ok(())
    }

    async fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect())
    }
}
