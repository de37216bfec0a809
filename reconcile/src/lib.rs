//! # Reconciler
//!
//! Decides, from which source documents exist, whether to merge, copy
//! through, or fall back to a default document, and writes the effective
//! document.

pub mod reconciler;

pub use reconciler::{DocumentPaths, ReconcileOutcome, Reconciler};
