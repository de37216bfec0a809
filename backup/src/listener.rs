use crate::scheduler::BackupHandle;
use doc_core::HostLifecycle;
use std::sync::Arc;

/// Host classification of a saved object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SaveKind {
    /// System-wide configuration; the only kind that triggers a backup.
    GlobalConfiguration,
    /// A job, folder or other item.
    Item,
    Other,
}

/// Entry point for host save notifications.
///
/// Applies, in order, the activation gate, the readiness gate and the save
/// kind filter, then enqueues a signal. Saves observed before the host is
/// ready are ignored, not deferred.
#[derive(Clone)]
pub struct ChangeListener {
    enabled: bool,
    lifecycle: Arc<dyn HostLifecycle>,
    handle: BackupHandle,
}

impl ChangeListener {
    pub fn new(enabled: bool, lifecycle: Arc<dyn HostLifecycle>, handle: BackupHandle) -> Self {
        Self {
            enabled,
            lifecycle,
            handle,
        }
    }

    /// Returns whether a signal was enqueued.
    pub async fn on_change(&self, kind: SaveKind) -> bool {
        if !self.accepts(kind) {
            return false;
        }
        match self.handle.signal().await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Dropping {} save: {}", kind, e);
                false
            }
        }
    }

    /// Blocking variant of [`on_change`](Self::on_change) for host threads
    /// outside the async runtime.
    pub fn blocking_on_change(&self, kind: SaveKind) -> bool {
        if !self.accepts(kind) {
            return false;
        }
        match self.handle.blocking_signal() {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Dropping {} save: {}", kind, e);
                false
            }
        }
    }

    fn accepts(&self, kind: SaveKind) -> bool {
        if !self.enabled {
            return false;
        }
        if !self.lifecycle.is_ready() {
            tracing::debug!("Ignoring {} save before host is ready", kind);
            return false;
        }
        if kind != SaveKind::GlobalConfiguration {
            tracing::trace!("Ignoring {} save", kind);
            return false;
        }
        true
    }
}
