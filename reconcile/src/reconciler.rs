use doc_core::{DefaultDocumentProducer, DocumentStore, Node};
use errors::ReconcileError;
use merge::MergeStrategy;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The three document roles of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPaths {
    /// Freshly exported state; wins on conflicts.
    pub system: PathBuf,
    /// Hand-edited customizations; keys only it has are preserved.
    pub user: PathBuf,
    /// Effective document, regenerated on every run.
    pub target: PathBuf,
}

impl DocumentPaths {
    pub fn new(
        system: impl Into<PathBuf>,
        user: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
    ) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            target: target.into(),
        }
    }

    /// Same user and target, with `system` swapped in.
    pub fn with_system(&self, system: impl Into<PathBuf>) -> Self {
        Self {
            system: system.into(),
            ..self.clone()
        }
    }
}

/// Which action a reconciliation took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Neither source existed; the default document producer ran.
    ProducedDefault,
    /// Only the user document existed and was copied verbatim.
    CopiedUser,
    /// Only the system document existed (or the user document was empty)
    /// and was copied verbatim.
    CopiedSystem,
    /// Both documents were merged and the result written.
    Merged,
    /// Both documents merged down to nothing; the target was left as is.
    MergedEmpty,
}

/// Folds a system document into a user document and writes the effective
/// document.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Sequences existence checks, delegates to the merge strategy and the codec,
/// and manages file placement. It holds no state between runs.
///
/// ## Decision Table
/// | system | user | action |
/// |---|---|---|
/// | absent | absent | default document producer writes the target |
/// | absent | present | user copied verbatim |
/// | present | absent | system copied verbatim |
/// | present | present | `merge(user, system)` rendered to the target |
///
/// A user document that parses to nothing (empty file, comments only) counts
/// as absent. A merge that renders to nothing leaves the target untouched.
///
/// ## Usage
/// ```rust,no_run
/// use reconcile::{DocumentPaths, Reconciler};
/// use std::sync::Arc;
///
/// # async fn run(
/// #     store: Arc<dyn doc_core::DocumentStore>,
/// #     producer: Arc<dyn doc_core::DefaultDocumentProducer>,
/// # ) -> Result<(), errors::ReconcileError> {
/// let reconciler = Reconciler::new(store, producer, Arc::new(merge::DeepMerge));
/// let paths = DocumentPaths::new(
///     "jenkins.backup.yaml",
///     "jenkins.yaml",
///     "casc_config_auto/jenkins.yaml",
/// );
/// let outcome = reconciler.reconcile(&paths).await?;
/// println!("reconciled: {outcome}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn DocumentStore>,
    default_producer: Arc<dyn DefaultDocumentProducer>,
    strategy: Arc<dyn MergeStrategy>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("strategy", &self.strategy.name())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        default_producer: Arc<dyn DefaultDocumentProducer>,
        strategy: Arc<dyn MergeStrategy>,
    ) -> Self {
        Self {
            store,
            default_producer,
            strategy,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    #[tracing::instrument(skip(self), fields(strategy = self.strategy.name()))]
    pub async fn reconcile(&self, paths: &DocumentPaths) -> Result<ReconcileOutcome, ReconcileError> {
        let system_exists = self.store.exists(&paths.system).await?;
        let user_exists = self.store.exists(&paths.user).await?;

        let outcome = match (system_exists, user_exists) {
            (false, false) => {
                self.ensure_parent(&paths.target).await?;
                self.default_producer
                    .produce_default(&paths.target)
                    .await
                    .map_err(|e| ReconcileError::DefaultDocument {
                        reason: e.to_string(),
                    })?;
                ReconcileOutcome::ProducedDefault
            }
            (false, true) => {
                self.copy(&paths.user, &paths.target).await?;
                ReconcileOutcome::CopiedUser
            }
            (true, false) => {
                self.copy(&paths.system, &paths.target).await?;
                ReconcileOutcome::CopiedSystem
            }
            (true, true) => self.merge_documents(paths).await?,
        };

        tracing::info!(
            "Reconciled {} into {}: {}",
            paths.system.display(),
            paths.target.display(),
            outcome
        );
        Ok(outcome)
    }

    /// Promote a freshly delivered system document, then reconcile.
    ///
    /// The incoming document is copied over `paths.system` and deleted, even
    /// when the copy failed. Returns `None` when there is nothing to promote.
    pub async fn promote_and_reconcile(
        &self,
        incoming: &Path,
        paths: &DocumentPaths,
    ) -> Result<Option<ReconcileOutcome>, ReconcileError> {
        if !self.store.exists(incoming).await? {
            tracing::info!("No incoming system document at {}", incoming.display());
            return Ok(None);
        }

        tracing::info!(
            "Promoting incoming system document {} to {}",
            incoming.display(),
            paths.system.display()
        );
        let promoted = self.copy(incoming, &paths.system).await;

        if let Err(e) = self.store.remove(incoming).await {
            tracing::warn!(
                "Failed to remove incoming system document {}: {}",
                incoming.display(),
                e
            );
        }

        promoted?;
        self.reconcile(paths).await.map(Some)
    }

    async fn merge_documents(
        &self,
        paths: &DocumentPaths,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let user = self.load(&paths.user).await?;
        if user.is_null() {
            tracing::debug!(
                "User document {} is empty, treating it as absent",
                paths.user.display()
            );
            self.copy(&paths.system, &paths.target).await?;
            return Ok(ReconcileOutcome::CopiedSystem);
        }

        let system = self.load(&paths.system).await?;
        let merged = self.strategy.merge(&user, &system);

        let Some(text) = merge::render(&merged) else {
            tracing::info!(
                "Merged document is empty, leaving {} untouched",
                paths.target.display()
            );
            return Ok(ReconcileOutcome::MergedEmpty);
        };

        self.ensure_parent(&paths.target).await?;
        self.store.write(&paths.target, text.as_bytes()).await?;
        Ok(ReconcileOutcome::Merged)
    }

    async fn load(&self, path: &Path) -> Result<Node, ReconcileError> {
        let bytes = self.store.read(path).await?;
        merge::parse_bytes(&bytes).map_err(|source| ReconcileError::Document {
            path: path.to_path_buf(),
            source,
        })
    }

    async fn copy(&self, from: &Path, to: &Path) -> Result<(), ReconcileError> {
        let bytes = self.store.read(from).await?;
        self.ensure_parent(to).await?;
        self.store.write(to, &bytes).await?;
        Ok(())
    }

    async fn ensure_parent(&self, path: &Path) -> Result<(), ReconcileError> {
        let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };

        self.store.create_dir_all(parent).await.map_err(|e| {
            tracing::warn!(
                "Cannot create directory {} for {}: {}",
                parent.display(),
                path.display(),
                e
            );
            ReconcileError::MissingDirectory {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            }
        })
    }
}
