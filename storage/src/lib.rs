//! # Storage Layer
//!
//! `DocumentStore` backends: the local filesystem and an in-process map.

pub mod fs;
pub mod memory;

pub use fs::FsDocumentStore;
pub use memory::InMemoryDocumentStore;
