//! # Configuration Document Core
//!
//! Shared document model and collaborator traits for the configuration
//! reconciliation system.
//!
//! This crate provides:
//! - The `Node` tree (mapping, sequence, scalar, null)
//! - Traits for the host collaborators: document storage, export, default
//!   document production, and lifecycle gating

pub mod traits;
pub mod types;

pub use traits::{
    AlwaysReady, ConfigExporter, DefaultDocumentProducer, DocumentStore, HostLifecycle,
};
pub use types::{Mapping, Node, Scalar, ScalarKind};
