use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Ordered key to node map. Keys are unique; insertion order is kept.
pub type Mapping = IndexMap<String, Node>;

/// How a scalar is tagged and quoted when it is written back to disk.
///
/// The kind never changes merge behavior.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ScalarKind {
    #[default]
    String,
    MultilineString,
    Number,
    Float,
    Boolean,
}

/// Typed leaf value.
///
/// The value is always kept in its textual form so that a number read from
/// disk is written back exactly as it was read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scalar {
    pub value: String,
    pub kind: ScalarKind,
    /// Render plain, without quotes or tags.
    pub raw: bool,
}

impl Scalar {
    pub fn new(value: impl Into<String>, kind: ScalarKind) -> Self {
        Self {
            value: value.into(),
            kind,
            raw: false,
        }
    }

    /// String scalar; picks the multi-line kind when the text spans lines.
    pub fn string(value: impl Into<String>) -> Self {
        let value = value.into();
        let kind = if value.contains('\n') {
            ScalarKind::MultilineString
        } else {
            ScalarKind::String
        };
        Self::new(value, kind)
    }

    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// A value in a structured configuration document.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Closed tree representation shared by the codec, the merge engine and the
/// reconciler. Every consumer matches exhaustively on the four variants.
///
/// ## Usage
/// ```rust
/// use doc_core::Node;
///
/// let doc = Node::mapping([
///     ("jenkins", Node::mapping([("numExecutors", Node::number(2))])),
///     ("tool", Node::Null),
/// ]);
/// assert_eq!(doc.get("jenkins").and_then(|n| n.get("numExecutors")), Some(&Node::number(2)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Node {
    Mapping(Mapping),
    Sequence(Vec<Node>),
    Scalar(Scalar),
    #[default]
    Null,
}

impl Node {
    pub fn mapping<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Node)>,
    {
        Node::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn sequence<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Node>,
    {
        Node::Sequence(items.into_iter().collect())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Node::Scalar(Scalar::string(value))
    }

    pub fn number(value: i64) -> Self {
        Node::Scalar(Scalar::new(value.to_string(), ScalarKind::Number).raw())
    }

    pub fn float(value: f64) -> Self {
        Node::Scalar(Scalar::new(value.to_string(), ScalarKind::Float).raw())
    }

    pub fn boolean(value: bool) -> Self {
        Node::Scalar(Scalar::new(value.to_string(), ScalarKind::Boolean).raw())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, Node::Mapping(_))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, Node::Sequence(_))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Node::Scalar(_))
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Node::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Node::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Node::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// Scalar text, if this is a scalar.
    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().map(|s| s.value.as_str())
    }

    /// Value stored under `key` when this node is a mapping.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping().and_then(|entries| entries.get(key))
    }

    /// Element at `index` when this node is a sequence.
    pub fn at(&self, index: usize) -> Option<&Node> {
        self.as_sequence().and_then(|items| items.get(index))
    }

    /// Whether the node carries nothing worth writing: null, an empty
    /// scalar, or a container whose children are all empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Node::Null => true,
            Node::Scalar(scalar) => scalar.is_empty(),
            Node::Mapping(entries) => entries.values().all(Node::is_empty),
            Node::Sequence(items) => items.iter().all(Node::is_empty),
        }
    }

    /// Copy of this tree with every null mapping entry removed, recursively.
    ///
    /// Null sequence elements are kept so positions stay aligned.
    pub fn without_tombstones(&self) -> Node {
        match self {
            Node::Mapping(entries) => Node::Mapping(
                entries
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), v.without_tombstones()))
                    .collect(),
            ),
            Node::Sequence(items) => {
                Node::Sequence(items.iter().map(Node::without_tombstones).collect())
            }
            other => other.clone(),
        }
    }
}

impl From<Scalar> for Node {
    fn from(scalar: Scalar) -> Self {
        Node::Scalar(scalar)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::string(value)
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::string(value)
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::boolean(value)
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Node::number(value)
    }
}
