//! # Configuration Backup
//!
//! Coalesces bursts of configuration saves into single export-and-reconcile
//! cycles.
//!
//! This crate provides:
//! - `BackupScheduler`: bounded signal queue and the single worker that
//!   drains it
//! - `BackupHandle` and `ChangeListener`: the producer side
//! - `BackupCycle`: export, backup write, reconciliation
//! - `BackupLayout`: single-file or versioned backup placement
//!
//! Only one cycle is ever in flight. Producers never touch documents; they
//! enqueue interchangeable signals and block when the queue is full.

pub mod cycle;
pub mod layout;
pub mod listener;
pub mod scheduler;

pub use cycle::{BackupCycle, CycleReport, promote_incoming, reconciler_from_config};
pub use layout::BackupLayout;
pub use listener::{ChangeListener, SaveKind};
pub use scheduler::{
    BackupHandle, BackupScheduler, BackupSignal, SchedulerState, SchedulerStats, ShutdownReport,
};
