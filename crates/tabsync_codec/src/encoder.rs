//! Canonical document encoder.

use crate::node::Node;

/// Number of spaces added per nesting level.
const INDENT_STEP: usize = 2;

/// Encode a node to document text.
///
/// The output is deterministic: identical nodes always produce identical
/// text. Mapping entries keep their insertion order. The text always ends
/// with a newline.
pub fn to_text(node: &Node) -> String {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(node);
    encoder.into_text()
}

/// A canonical document encoder.
///
/// Writes two-space indented block style. Scalars are written plain when
/// that is unambiguous, as a literal block when they span lines, and
/// double-quoted otherwise.
pub struct CanonicalEncoder {
    out: String,
}

impl CanonicalEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { out: String::new() }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            out: String::with_capacity(capacity),
        }
    }

    /// Encode a node as a complete document.
    pub fn encode(&mut self, node: &Node) {
        match node {
            Node::Mapping(entries) if !entries.is_empty() => {
                for (key, value) in entries {
                    self.write_entry("", 0, key, value);
                }
            }
            Node::Sequence(items) if !items.is_empty() => {
                for item in items {
                    self.write_item(0, item);
                }
            }
            Node::Scalar(text) if is_block_candidate(text) => {
                self.write_block(0, text);
            }
            other => {
                self.write_inline(other);
                self.out.push('\n');
            }
        }
    }

    /// Consume this encoder and return the text.
    pub fn into_text(self) -> String {
        self.out
    }

    /// Get a reference to the text written so far.
    pub fn as_str(&self) -> &str {
        &self.out
    }

    /// Writes `key: value` where the key starts at column `indent`.
    ///
    /// `lead` replaces the indentation on the first line; sequence items
    /// use it to place the first entry after `- `.
    fn write_entry(&mut self, lead: &str, indent: usize, key: &str, value: &Node) {
        if lead.is_empty() {
            self.push_indent(indent);
        } else {
            self.out.push_str(lead);
        }
        self.write_key(key);
        self.out.push(':');

        match value {
            Node::Mapping(entries) if !entries.is_empty() => {
                self.out.push('\n');
                for (k, v) in entries {
                    self.write_entry("", indent + INDENT_STEP, k, v);
                }
            }
            Node::Sequence(items) if !items.is_empty() => {
                self.out.push('\n');
                for item in items {
                    self.write_item(indent + INDENT_STEP, item);
                }
            }
            Node::Scalar(text) if is_block_candidate(text) => {
                self.out.push(' ');
                self.write_block(indent + INDENT_STEP, text);
            }
            other => {
                self.out.push(' ');
                self.write_inline(other);
                self.out.push('\n');
            }
        }
    }

    /// Writes one `- item` line (plus continuation lines) at column `indent`.
    fn write_item(&mut self, indent: usize, item: &Node) {
        match item {
            Node::Mapping(entries) if !entries.is_empty() => {
                let lead = format!("{}- ", " ".repeat(indent));
                let inner = indent + INDENT_STEP;
                let mut iter = entries.iter();
                if let Some((k, v)) = iter.next() {
                    self.write_entry(&lead, inner, k, v);
                }
                for (k, v) in iter {
                    self.write_entry("", inner, k, v);
                }
            }
            Node::Sequence(items) if !items.is_empty() => {
                self.push_indent(indent);
                self.out.push_str("-\n");
                for nested in items {
                    self.write_item(indent + INDENT_STEP, nested);
                }
            }
            Node::Scalar(text) if is_block_candidate(text) => {
                self.push_indent(indent);
                self.out.push_str("- ");
                self.write_block(indent + INDENT_STEP, text);
            }
            other => {
                self.push_indent(indent);
                self.out.push_str("- ");
                self.write_inline(other);
                self.out.push('\n');
            }
        }
    }

    /// Writes a literal block header followed by its content lines.
    fn write_block(&mut self, content_indent: usize, text: &str) {
        let (body, header) = match text.strip_suffix('\n') {
            Some(body) => (body, "|"),
            None => (text, "|-"),
        };
        self.out.push_str(header);
        self.out.push('\n');
        for line in body.split('\n') {
            if !line.is_empty() {
                self.push_indent(content_indent);
                self.out.push_str(line);
            }
            self.out.push('\n');
        }
    }

    /// Writes a node that fits on the current line.
    fn write_inline(&mut self, node: &Node) {
        match node {
            Node::Scalar(text) => self.write_scalar(text),
            Node::Sequence(_) => self.out.push_str("[]"),
            Node::Mapping(_) => self.out.push_str("{}"),
        }
    }

    fn write_key(&mut self, key: &str) {
        self.write_scalar(key);
    }

    fn write_scalar(&mut self, text: &str) {
        if is_plain_safe(text) {
            self.out.push_str(text);
        } else {
            write_double_quoted(&mut self.out, text);
        }
    }

    fn push_indent(&mut self, indent: usize) {
        for _ in 0..indent {
            self.out.push(' ');
        }
    }
}

impl Default for CanonicalEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Characters that may not start a plain scalar.
const INDICATORS: &[char] = &[
    '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@',
    '`', '~',
];

/// Returns true if `text` can be written without quotes and read back as
/// exactly the same string.
pub(crate) fn is_plain_safe(text: &str) -> bool {
    let Some(first) = text.chars().next() else {
        return false;
    };
    if first.is_whitespace() || text.ends_with(char::is_whitespace) {
        return false;
    }
    if INDICATORS.contains(&first) {
        // `-5` and `-.5` stay plain; a leading `- ` would start a sequence item.
        let negative_number = first == '-'
            && text[1..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit() || c == '.');
        if !negative_number {
            return false;
        }
    }
    if text.chars().any(needs_escape) {
        return false;
    }
    !(text.contains(": ") || text.contains(" #") || text.ends_with(':'))
}

/// Returns true if `text` should be written as a literal block.
fn is_block_candidate(text: &str) -> bool {
    if !text.contains('\n') {
        return false;
    }
    // Only a single trailing newline can be expressed with `|`; more needs `|+`.
    let body = text.strip_suffix('\n').unwrap_or(text);
    if body.ends_with('\n') || body.is_empty() {
        return false;
    }
    if text.chars().any(|c| c != '\n' && needs_escape(c)) {
        return false;
    }
    let mut lines = body.split('\n');
    // The first line fixes the content indentation, so it must not start
    // with a space; whitespace-only lines would be read back as empty.
    if lines
        .next()
        .is_some_and(|first| first.is_empty() || first.starts_with(' '))
    {
        return false;
    }
    body.split('\n')
        .all(|line| line.is_empty() || !line.trim().is_empty())
}

fn needs_escape(c: char) -> bool {
    c.is_control() || matches!(c, '\u{2028}' | '\u{2029}' | '\u{feff}')
}

fn write_double_quoted(out: &mut String, text: &str) {
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if (c as u32) < 0x80 && needs_escape(c) => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c if needs_escape(c) => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
