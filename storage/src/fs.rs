use async_trait::async_trait;
use doc_core::DocumentStore;
use errors::StoreError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Document store backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDocumentStore;

impl FsDocumentStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn exists(&self, path: &Path) -> Result<bool, StoreError> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io("stat", path, e)),
        }
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, StoreError> {
        tokio::fs::read(path)
            .await
            .map_err(|e| StoreError::io("read", path, e))
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        let target = path.to_path_buf();
        let bytes = contents.to_vec();
        tokio::task::spawn_blocking(move || replace_file(&target, &bytes))
            .await
            .map_err(|e| StoreError::io("write", path, std::io::Error::other(e)))?
            .map_err(|e| StoreError::io("write", path, e))?;
        debug!(path = %path.display(), bytes = contents.len(), "Document written");
        Ok(())
    }

    async fn remove(&self, path: &Path) -> Result<(), StoreError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io("remove", path, e)),
        }
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| StoreError::io("create_dir", path, e))
    }

    async fn list(&self, dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io("list", dir, e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io("list", dir, e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Write into a temporary sibling and rename it over `path`; the previous
/// document stays intact until the new one is complete.
fn replace_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    if let Ok(existing) = std::fs::metadata(path) {
        file.as_file().set_permissions(existing.permissions())?;
    }
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
