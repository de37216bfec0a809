use crate::layout::BackupLayout;
use chrono::Utc;
use config::{AutoConfig, MergeConfig, ResolvedPaths};
use doc_core::{ConfigExporter, DefaultDocumentProducer, DocumentStore};
use errors::{BackupError, ReconcileError};
use reconcile::{DocumentPaths, ReconcileOutcome, Reconciler};
use std::path::PathBuf;
use std::sync::Arc;

/// Result of one successful cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Where the export snapshot was written.
    pub backup: PathBuf,
    pub outcome: ReconcileOutcome,
    /// Versioned backups removed by retention.
    pub pruned: Vec<PathBuf>,
}

/// One reconciliation cycle: export, backup write, merge into the target.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Requests a fresh snapshot from the exporter, persists it according to the
/// backup layout, then reconciles it (as the system document) with the user
/// document into the target.
///
/// ## Failure
/// Any failing step aborts the cycle and is returned; nothing is retried. In
/// the single layout the backup is removed only after a successful fold-in,
/// so a failed cycle leaves it behind for inspection.
#[derive(Clone)]
pub struct BackupCycle {
    exporter: Arc<dyn ConfigExporter>,
    reconciler: Reconciler,
    layout: BackupLayout,
    user: PathBuf,
    target: PathBuf,
}

impl std::fmt::Debug for BackupCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupCycle")
            .field("reconciler", &self.reconciler)
            .field("layout", &self.layout)
            .field("user", &self.user)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl BackupCycle {
    pub fn new(
        exporter: Arc<dyn ConfigExporter>,
        reconciler: Reconciler,
        layout: BackupLayout,
        user: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
    ) -> Self {
        Self {
            exporter,
            reconciler,
            layout,
            user: user.into(),
            target: target.into(),
        }
    }

    /// Cycle over the configured document layout.
    pub fn from_config(
        config: &AutoConfig,
        exporter: Arc<dyn ConfigExporter>,
        reconciler: Reconciler,
    ) -> Self {
        let paths = config.paths.resolve();
        Self::new(
            exporter,
            reconciler,
            BackupLayout::from_config(&config.backup.layout, &paths),
            paths.user,
            paths.target,
        )
    }

    pub async fn run(&self) -> Result<CycleReport, BackupError> {
        tracing::info!("Starting configuration backup");

        let snapshot = self
            .exporter
            .export()
            .await
            .map_err(|e| BackupError::Export {
                reason: e.to_string(),
            })?;

        let store = self.reconciler.store();
        let backup = self.layout.backup_path(Utc::now());
        if let Some(parent) = backup.parent().filter(|p| !p.as_os_str().is_empty()) {
            store.create_dir_all(parent).await?;
        }
        store.write(&backup, &snapshot).await?;
        tracing::debug!("Backup written to {}", backup.display());

        let paths = DocumentPaths::new(&backup, &self.user, &self.target);
        let outcome = self.reconciler.reconcile(&paths).await?;

        let pruned = match &self.layout {
            BackupLayout::Single { .. } => {
                store.remove(&backup).await?;
                Vec::new()
            }
            BackupLayout::Versioned { .. } => self.layout.prune(&**store).await?,
        };

        tracing::info!(
            "Configuration backup finished ({}), target {}",
            outcome,
            self.target.display()
        );
        Ok(CycleReport {
            backup,
            outcome,
            pruned,
        })
    }
}

/// Reconciler using the configured merge strategy.
///
/// Falls back to the deep merge for an unknown name; `validate` rejects such
/// configurations up front.
pub fn reconciler_from_config(
    config: &MergeConfig,
    store: Arc<dyn DocumentStore>,
    default_producer: Arc<dyn DefaultDocumentProducer>,
) -> Reconciler {
    let strategy = merge::strategy_for(&config.strategy).unwrap_or_else(|| {
        tracing::warn!(
            "Unknown merge strategy {}, using {}",
            config.strategy,
            merge::DeepMerge::NAME
        );
        let fallback: Arc<dyn merge::MergeStrategy> = Arc::new(merge::DeepMerge);
        fallback
    });
    Reconciler::new(store, default_producer, strategy)
}

/// Startup promotion of a delivered system document.
///
/// When `paths.incoming` is configured and present, it replaces the staged
/// system document, which is then reconciled with the user document into the
/// target. Runs once, after the host reached readiness.
pub async fn promote_incoming(
    reconciler: &Reconciler,
    paths: &ResolvedPaths,
) -> Result<Option<ReconcileOutcome>, ReconcileError> {
    let Some(incoming) = &paths.incoming else {
        return Ok(None);
    };
    let documents = DocumentPaths::new(&paths.staged_system, &paths.user, &paths.target);
    reconciler.promote_and_reconcile(incoming, &documents).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{BackupLayoutConfig, PathConfig};
    use storage::InMemoryDocumentStore;
    use testing::{RecordingDefaultProducer, SYSTEM_DOCUMENT, ScriptedExporter, USER_DOCUMENT};

    struct Fixture {
        store: InMemoryDocumentStore,
        exporter: Arc<ScriptedExporter>,
        config: AutoConfig,
    }

    impl Fixture {
        fn new(layout: BackupLayoutConfig) -> Self {
            let mut config = AutoConfig::default();
            config.paths = PathConfig {
                root: PathBuf::from("/home"),
                ..Default::default()
            };
            config.backup.layout = layout;
            Self {
                store: InMemoryDocumentStore::new(),
                exporter: Arc::new(ScriptedExporter::new(SYSTEM_DOCUMENT)),
                config,
            }
        }

        fn reconciler(&self) -> Reconciler {
            let store: Arc<dyn DocumentStore> = Arc::new(self.store.clone());
            reconciler_from_config(
                &self.config.merge,
                store.clone(),
                Arc::new(RecordingDefaultProducer::new(store, "jenkins: {}\n")),
            )
        }

        fn cycle(&self) -> BackupCycle {
            BackupCycle::from_config(&self.config, self.exporter.clone(), self.reconciler())
        }
    }

    #[tokio::test]
    async fn test_single_layout_removes_backup_after_fold_in() {
        let f = Fixture::new(BackupLayoutConfig::Single);
        f.store.insert("/home/jenkins.yaml", USER_DOCUMENT).await;

        let report = f.cycle().run().await.unwrap();

        assert_eq!(report.backup, PathBuf::from("/home/jenkins.backup.yaml"));
        assert_eq!(report.outcome, ReconcileOutcome::Merged);
        assert!(!f.store.exists(&report.backup).await.unwrap());
        let target = f
            .store
            .text(std::path::Path::new("/home/casc_config_auto/jenkins.yaml"))
            .await
            .unwrap();
        assert!(target.contains("agent-2"));
        assert_eq!(f.exporter.calls(), 1);
    }

    #[tokio::test]
    async fn test_first_cycle_without_user_document_copies_export() {
        let f = Fixture::new(BackupLayoutConfig::Single);

        let report = f.cycle().run().await.unwrap();

        assert_eq!(report.outcome, ReconcileOutcome::CopiedSystem);
        assert_eq!(
            f.store
                .text(std::path::Path::new("/home/casc_config_auto/jenkins.yaml"))
                .await
                .as_deref(),
            Some(SYSTEM_DOCUMENT)
        );
    }

    #[tokio::test]
    async fn test_export_failure_aborts_without_writes() {
        let f = Fixture::new(BackupLayoutConfig::Single);
        f.exporter.fail_next("exporter offline");

        let err = f.cycle().run().await.unwrap_err();

        assert!(matches!(err, BackupError::Export { ref reason } if reason == "exporter offline"));
        assert!(f.store.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_versioned_layout_keeps_and_prunes_backups() {
        let f = Fixture::new(BackupLayoutConfig::Versioned {
            directory: PathBuf::from("casc_backups"),
            retain: 2,
        });
        for name in [
            "jenkins.backup.20000101T000000.000Z.yaml",
            "jenkins.backup.20000101T000001.000Z.yaml",
        ] {
            f.store
                .insert(PathBuf::from("/home/casc_backups").join(name), "old: true\n")
                .await;
        }

        let report = f.cycle().run().await.unwrap();

        assert!(report.backup.starts_with("/home/casc_backups"));
        assert!(f.store.exists(&report.backup).await.unwrap());
        assert_eq!(
            report.pruned,
            vec![PathBuf::from(
                "/home/casc_backups/jenkins.backup.20000101T000000.000Z.yaml"
            )]
        );
        assert_eq!(
            f.store
                .list(std::path::Path::new("/home/casc_backups"))
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_promote_incoming_uses_staged_system_document() {
        let mut f = Fixture::new(BackupLayoutConfig::Single);
        f.config.paths.incoming_file = Some(PathBuf::from("incoming/jenkins.yaml"));
        f.store
            .insert("/home/incoming/jenkins.yaml", SYSTEM_DOCUMENT)
            .await;
        let paths = f.config.paths.resolve();

        let outcome = promote_incoming(&f.reconciler(), &paths).await.unwrap();

        assert_eq!(outcome, Some(ReconcileOutcome::CopiedSystem));
        assert_eq!(
            f.store.text(&paths.staged_system).await.as_deref(),
            Some(SYSTEM_DOCUMENT)
        );
        assert!(!f.store.exists(&paths.incoming.unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn test_promote_incoming_not_configured() {
        let f = Fixture::new(BackupLayoutConfig::Single);
        let paths = f.config.paths.resolve();

        let outcome = promote_incoming(&f.reconciler(), &paths).await.unwrap();

        assert_eq!(outcome, None);
    }
}
