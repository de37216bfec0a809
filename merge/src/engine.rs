//! # Deep Merge
//!
//! Recursive merge of two document trees.
//!
//! # Rules
//! 1. A null `update` (or a null `main`) leaves `main` as it is
//! 2. Mapping fields of `update` are applied one by one:
//!    - sequence onto sequence merges element by index
//!    - mapping onto mapping recurses
//!    - anything else replaces the field, and a null field deletes it
//! 3. A scalar `update` replaces the whole result

use doc_core::Node;
use std::sync::Arc;

/// Merge `update` over `main` and return the merged tree.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// `main` is the previously accepted document, `update` the newly observed
/// one. Values from `update` win on conflict while fields present only in
/// `main` survive. Neither input is modified.
///
/// ## Usage
/// ```rust
/// use doc_core::Node;
/// use merge::merge;
///
/// let main = Node::mapping([("x", Node::number(1)), ("y", Node::number(2))]);
/// let update = Node::mapping([("x", Node::Null)]);
///
/// assert_eq!(merge(&main, &update), Node::mapping([("y", Node::number(2))]));
/// ```
///
/// ## Sequences
/// Elements are aligned by position, not by identity. Elements of `main`
/// past the end of `update` are kept.
pub fn merge(main: &Node, update: &Node) -> Node {
    let mut merged = main.clone();
    merge_into(&mut merged, update);
    merged
}

/// In-place variant of [`merge`] for callers that own the working copy.
pub fn merge_into(main: &mut Node, update: &Node) {
    if main.is_null() || update.is_null() {
        return;
    }

    match update {
        Node::Scalar(_) => *main = update.clone(),
        Node::Sequence(items) => match main {
            Node::Sequence(existing) => merge_sequence(existing, items),
            _ => *main = update.without_tombstones(),
        },
        Node::Mapping(fields) => {
            let Node::Mapping(entries) = main else {
                *main = update.without_tombstones();
                return;
            };

            for (key, value) in fields {
                let merged_in_place = match (entries.get_mut(key), value) {
                    (Some(Node::Sequence(existing)), Node::Sequence(items)) => {
                        merge_sequence(existing, items);
                        true
                    }
                    (Some(existing), Node::Mapping(_)) if existing.is_mapping() => {
                        merge_into(existing, value);
                        true
                    }
                    _ => false,
                };
                if merged_in_place {
                    continue;
                }

                if value.is_null() {
                    entries.shift_remove(key);
                } else {
                    entries.insert(key.clone(), value.without_tombstones());
                }
            }
        }
        Node::Null => {}
    }
}

fn merge_sequence(existing: &mut Vec<Node>, items: &[Node]) {
    for (index, item) in items.iter().enumerate() {
        match existing.get_mut(index) {
            Some(slot) => merge_into(slot, item),
            None => existing.push(item.without_tombstones()),
        }
    }
}

/// Pluggable document merge.
pub trait MergeStrategy: Send + Sync {
    /// Unique strategy name, as used in configuration.
    fn name(&self) -> &'static str;

    fn merge(&self, main: &Node, update: &Node) -> Node;
}

/// The recursive deep merge implemented by [`merge`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DeepMerge;

impl DeepMerge {
    pub const NAME: &'static str = "deep-merge";
}

impl MergeStrategy for DeepMerge {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn merge(&self, main: &Node, update: &Node) -> Node {
        merge(main, update)
    }
}

/// Look up a merge strategy by its configured name.
pub fn strategy_for(name: &str) -> Option<Arc<dyn MergeStrategy>> {
    match name {
        DeepMerge::NAME => Some(Arc::new(DeepMerge)),
        _ => None,
    }
}
