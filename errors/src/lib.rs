//! # Reconciliation Errors
//!
//! Error taxonomy for configuration reconciliation and backup.
//!
//! - Uses `thiserror` for structured error definitions
//! - Named fields carry the path and operation needed to diagnose a failure
//! - Nothing here is fatal to the host process; every error is contained to
//!   the cycle that raised it

use std::path::PathBuf;
use thiserror::Error;

/// Document codec errors
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Failed to parse document: {reason}")]
    Parse { reason: String },
}

/// Document storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Storage {operation} failed for {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound && operation == "read" {
            return StoreError::NotFound { path };
        }
        StoreError::Io {
            operation,
            path,
            source,
        }
    }

    pub fn path(&self) -> &PathBuf {
        match self {
            StoreError::NotFound { path } | StoreError::Io { path, .. } => path,
        }
    }
}

/// Reconciler errors
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid document {path}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },

    #[error("Cannot create directory {path}: {reason}")]
    MissingDirectory { path: PathBuf, reason: String },

    #[error("Default document production failed: {reason}")]
    DefaultDocument { reason: String },
}

/// Backup scheduler errors
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Export failed: {reason}")]
    Export { reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("Backup scheduler already started")]
    AlreadyStarted,

    #[error("Backup scheduler is stopped")]
    Stopped,

    #[error("Automatic backup is disabled")]
    Disabled,
}
