use chrono::{DateTime, Utc};
use config::{BackupLayoutConfig, ResolvedPaths};
use doc_core::DocumentStore;
use errors::StoreError;
use std::path::{Path, PathBuf};

const VERSIONED_PREFIX: &str = "jenkins.backup.";
const VERSIONED_SUFFIX: &str = ".yaml";
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";

/// Where each cycle writes its backup document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupLayout {
    /// One backup file, removed once folded into the target.
    Single { path: PathBuf },
    /// Timestamped backups accumulating in `directory`. With a non-zero
    /// `retain`, only the newest `retain` survive a cycle.
    Versioned { directory: PathBuf, retain: usize },
}

impl BackupLayout {
    pub fn from_config(layout: &BackupLayoutConfig, paths: &ResolvedPaths) -> Self {
        match layout {
            BackupLayoutConfig::Single => BackupLayout::Single {
                path: paths.backup.clone(),
            },
            BackupLayoutConfig::Versioned { directory, retain } => BackupLayout::Versioned {
                directory: paths.root.join(directory),
                retain: *retain,
            },
        }
    }

    /// Backup path for a cycle starting at `at`.
    pub fn backup_path(&self, at: DateTime<Utc>) -> PathBuf {
        match self {
            BackupLayout::Single { path } => path.clone(),
            BackupLayout::Versioned { directory, .. } => directory.join(format!(
                "{VERSIONED_PREFIX}{}{VERSIONED_SUFFIX}",
                at.format(TIMESTAMP_FORMAT)
            )),
        }
    }

    /// Remove versioned backups beyond the retention limit, oldest first.
    ///
    /// Timestamps sort lexicographically, so the store's name order is age
    /// order. Unrelated files in the directory are never touched.
    pub async fn prune(&self, store: &dyn DocumentStore) -> Result<Vec<PathBuf>, StoreError> {
        let BackupLayout::Versioned { directory, retain } = self else {
            return Ok(Vec::new());
        };
        if *retain == 0 {
            return Ok(Vec::new());
        }

        let backups: Vec<PathBuf> = store
            .list(directory)
            .await?
            .into_iter()
            .filter(|p| is_versioned_backup(p))
            .collect();

        let excess = backups.len().saturating_sub(*retain);
        let mut removed = Vec::with_capacity(excess);
        for path in backups.into_iter().take(excess) {
            store.remove(&path).await?;
            tracing::debug!("Pruned backup {}", path.display());
            removed.push(path);
        }
        Ok(removed)
    }
}

fn is_versioned_backup(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(VERSIONED_PREFIX) && n.ends_with(VERSIONED_SUFFIX))
}
