//! # tabsync Codec
//!
//! Strict, string-only structured text for tabsync table files.
//!
//! The format is a small subset of block-style YAML. It exists so that table
//! files stay readable and diffable while decoding never guesses at types:
//!
//! - Every scalar decodes as a string (`1`, `true`, `~` included)
//! - Mappings keep their key order; duplicate keys are rejected
//! - Encoding is deterministic: identical nodes produce identical text
//! - Anchors, aliases, tags, flow collections and folded scalars are
//!   rejected instead of being interpreted
//!
//! Typing is left to the caller, which knows the declared column types.
//!
//! ## Usage
//!
//! ```
//! use tabsync_codec::{from_text, to_text, Node};
//!
//! let mut doc = Node::mapping();
//! doc.insert("version", Node::scalar("1.0"));
//! doc.insert("rows", Node::Sequence(vec![]));
//!
//! let text = to_text(&doc);
//! assert_eq!(text, "version: 1.0\nrows: []\n");
//!
//! let decoded = from_text(&text).unwrap();
//! assert_eq!(decoded, doc);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod node;

pub use decoder::{from_text, CanonicalDecoder};
pub use encoder::{to_text, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use node::Node;
