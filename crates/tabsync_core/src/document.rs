//! Table document model.
//!
//! A table document is what one table file holds: a version tag and an
//! ordered list of rows, each row an ordered list of `column: text` pairs.
//! Every value is a string; sentinel decoding happens later, in the loader.
//!
//! ```text
//! version: 1.0
//! rows:
//!   - id: 1
//!     name: Ada
//! ```

use tabsync_codec::{from_text, to_text, CodecError, Node};
use thiserror::Error;

/// Key of the version tag.
pub const VERSION_KEY: &str = "version";

/// Version key written by older releases. Read, never written.
pub const LEGACY_VERSION_KEY: &str = "_naay_version";

/// Key of the row sequence.
pub const ROWS_KEY: &str = "rows";

/// A row as it appears in a document.
pub type DocumentRow = Vec<(String, String)>;

/// Errors that turn text into something other than a table document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The text is not valid document syntax.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The text parsed but does not have the table document shape.
    #[error("{0}")]
    Shape(String),
}

/// The contents of one table file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDocument {
    /// Version tag, if the file carries one.
    pub version: Option<String>,
    /// Rows in file order.
    pub rows: Vec<DocumentRow>,
}

impl TableDocument {
    /// Creates a document stamped with `version`.
    pub fn new(version: impl Into<String>, rows: Vec<DocumentRow>) -> Self {
        Self {
            version: Some(version.into()),
            rows,
        }
    }

    /// Builds the document node: version first, then rows.
    pub fn to_node(&self) -> Node {
        let mut node = Node::mapping();
        if let Some(version) = &self.version {
            node.insert(VERSION_KEY, Node::scalar(version.as_str()));
        }
        let rows = self
            .rows
            .iter()
            .map(|row| {
                Node::Mapping(
                    row.iter()
                        .map(|(column, text)| (column.clone(), Node::scalar(text.as_str())))
                        .collect(),
                )
            })
            .collect();
        node.insert(ROWS_KEY, Node::Sequence(rows));
        node
    }

    /// Reads a document from a decoded node.
    ///
    /// A missing `rows` key, or an empty `rows:` value, means no rows.
    /// Unknown top-level keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns `Shape` if the node is not a mapping, the version is not a
    /// scalar, `rows` is not a sequence of mappings, or a row value is not
    /// a scalar.
    pub fn from_node(node: &Node) -> Result<Self, DocumentError> {
        if node.as_mapping().is_none() {
            return Err(shape(format!(
                "expected a mapping at the top level, found a {}",
                node.kind()
            )));
        }

        let version = match node.get(VERSION_KEY).or_else(|| node.get(LEGACY_VERSION_KEY)) {
            None => None,
            Some(Node::Scalar(v)) => Some(v.clone()),
            Some(other) => {
                return Err(shape(format!(
                    "version must be a scalar, found a {}",
                    other.kind()
                )))
            }
        };

        let items = match node.get(ROWS_KEY) {
            None => &[][..],
            Some(Node::Scalar(s)) if s.is_empty() => &[][..],
            Some(Node::Sequence(items)) => items.as_slice(),
            Some(other) => {
                return Err(shape(format!(
                    "rows must be a sequence, found a {}",
                    other.kind()
                )))
            }
        };

        let rows = items
            .iter()
            .enumerate()
            .map(|(index, item)| row_from_node(index, item))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { version, rows })
    }

    /// Renders the document as text.
    pub fn to_text(&self) -> String {
        to_text(&self.to_node())
    }

    /// Parses a document from text.
    ///
    /// # Errors
    ///
    /// Returns `Codec` for syntax errors and `Shape` for a well-formed
    /// document of the wrong shape.
    pub fn from_text(text: &str) -> Result<Self, DocumentError> {
        let node = from_text(text)?;
        Self::from_node(&node)
    }
}

fn row_from_node(index: usize, item: &Node) -> Result<DocumentRow, DocumentError> {
    let entries = item.as_mapping().ok_or_else(|| {
        shape(format!(
            "row {index} must be a mapping, found a {}",
            item.kind()
        ))
    })?;

    entries
        .iter()
        .map(|(column, value)| match value {
            Node::Scalar(text) => Ok((column.clone(), text.clone())),
            other => Err(shape(format!(
                "row {index}, column '{column}' must be a scalar, found a {}",
                other.kind()
            ))),
        })
        .collect()
}

fn shape(message: String) -> DocumentError {
    DocumentError::Shape(message)
}
