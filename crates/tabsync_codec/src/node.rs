//! Document node type.

/// A document node.
///
/// The format is string-only: there is no null, boolean or numeric node.
/// Anything that is not a collection is a [`Node::Scalar`] holding the exact
/// text it spells, so `1`, `true` and `~` all decode as strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A string scalar.
    Scalar(String),
    /// An ordered sequence of nodes.
    Sequence(Vec<Node>),
    /// An ordered mapping from string keys to nodes.
    ///
    /// Insertion order is preserved by both the encoder and the decoder.
    Mapping(Vec<(String, Node)>),
}

impl Node {
    /// Create a scalar node.
    pub fn scalar(text: impl Into<String>) -> Self {
        Node::Scalar(text.into())
    }

    /// Create an empty mapping.
    pub fn mapping() -> Self {
        Node::Mapping(Vec::new())
    }

    /// Returns a short name for the node kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Scalar(_) => "scalar",
            Node::Sequence(_) => "sequence",
            Node::Mapping(_) => "mapping",
        }
    }

    /// Get this node as a string, if it is a scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Get this node as a sequence, if it is one.
    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Node::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Get this node's entries, if it is a mapping.
    pub fn as_mapping(&self) -> Option<&[(String, Node)]> {
        match self {
            Node::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a key in a mapping node.
    ///
    /// Returns `None` for non-mapping nodes and missing keys.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Append an entry to a mapping node.
    ///
    /// Does nothing on non-mapping nodes.
    pub fn insert(&mut self, key: impl Into<String>, value: Node) {
        if let Node::Mapping(entries) = self {
            entries.push((key.into(), value));
        }
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Scalar(s.to_string())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Scalar(s)
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Node::Sequence(items)
    }
}
