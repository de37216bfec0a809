//! # Document Merge
//!
//! Deep merge of configuration documents and the YAML codec the reconciler
//! reads and writes them with.
//!
//! This crate provides:
//! - The recursive deep merge (`merge`) and the `MergeStrategy` seam
//! - Parsing of YAML text and generic JSON trees into `Node`
//! - Rendering of `Node` trees back to YAML with stable key order

pub mod codec;
pub mod engine;

pub use codec::{from_json, parse, parse_bytes, render};
pub use engine::{DeepMerge, MergeStrategy, merge, merge_into, strategy_for};
