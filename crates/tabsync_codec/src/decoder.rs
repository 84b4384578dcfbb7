//! Line-based document decoder.

use crate::error::{CodecError, CodecResult};
use crate::node::Node;

/// Decode document text into a node.
///
/// An empty document (or one holding only comments) decodes as an empty
/// mapping.
///
/// # Errors
///
/// Returns an error if the text is not valid document syntax or uses a
/// construct outside the supported subset (anchors, tags, flow collections,
/// folded scalars).
pub fn from_text(text: &str) -> CodecResult<Node> {
    let mut decoder = CanonicalDecoder::new(text);
    decoder.decode()
}

/// Maximum nesting depth accepted by the decoder.
///
/// Guards the recursive descent against stack exhaustion on hostile input.
const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    /// 1-based line number.
    number: usize,
    /// Count of leading spaces.
    indent: usize,
    /// Everything after the leading spaces.
    text: &'a str,
    /// The full line, used by literal blocks.
    raw: &'a str,
}

impl Line<'_> {
    fn is_ignorable(&self) -> bool {
        let trimmed = self.text.trim();
        trimmed.is_empty() || trimmed.starts_with('#')
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chomp {
    Clip,
    Strip,
    Keep,
}

/// A document decoder.
///
/// Reads block-style text one line at a time. Every scalar, quoted or not,
/// becomes a [`Node::Scalar`].
pub struct CanonicalDecoder<'a> {
    lines: Vec<Line<'a>>,
    pos: usize,
    depth: usize,
}

impl<'a> CanonicalDecoder<'a> {
    /// Create a new decoder for the given text.
    pub fn new(text: &'a str) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let lines = text
            .lines()
            .enumerate()
            .map(|(idx, raw)| {
                let indent = raw.len() - raw.trim_start_matches(' ').len();
                Line {
                    number: idx + 1,
                    indent,
                    text: &raw[indent..],
                    raw,
                }
            })
            .collect();
        Self {
            lines,
            pos: 0,
            depth: 0,
        }
    }

    /// Decode the whole document.
    pub fn decode(&mut self) -> CodecResult<Node> {
        if let Some(line) = self.peek()? {
            if is_document_marker(&line) && line.text.starts_with("---") {
                self.pos += 1;
            }
        }

        let node = match self.peek()? {
            Some(line) => self.parse_block(line.indent)?,
            None => Node::Mapping(Vec::new()),
        };

        if let Some(line) = self.peek()? {
            if is_document_marker(&line) && line.text.starts_with("...") {
                self.pos += 1;
            }
        }
        if let Some(line) = self.peek()? {
            return Err(CodecError::syntax(
                line.number,
                "unexpected content after document",
            ));
        }
        Ok(node)
    }

    /// Returns the next structural line, skipping blanks and comments.
    fn peek(&mut self) -> CodecResult<Option<Line<'a>>> {
        while let Some(line) = self.lines.get(self.pos) {
            if line.is_ignorable() {
                self.pos += 1;
                continue;
            }
            if line.text.starts_with('\t') {
                return Err(CodecError::TabIndentation { line: line.number });
            }
            return Ok(Some(*line));
        }
        Ok(None)
    }

    fn parse_block(&mut self, indent: usize) -> CodecResult<Node> {
        let Some(line) = self.peek()? else {
            return Ok(Node::Scalar(String::new()));
        };

        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(CodecError::NestingTooDeep {
                line: line.number,
                max: MAX_DEPTH,
            });
        }

        let node = if is_sequence_item(line.text) {
            self.parse_sequence(indent)
        } else if split_key(line.text, line.number)?.is_some() {
            self.parse_mapping(indent)
        } else {
            self.pos += 1;
            self.parse_value(line.text, line.number, line.indent)
        };

        self.depth -= 1;
        node
    }

    fn parse_mapping(&mut self, indent: usize) -> CodecResult<Node> {
        let mut entries: Vec<(String, Node)> = Vec::new();

        while let Some(line) = self.peek()? {
            if line.indent < indent || is_document_marker(&line) {
                break;
            }
            if line.indent > indent {
                return Err(CodecError::syntax(line.number, "unexpected indentation"));
            }
            if is_sequence_item(line.text) {
                return Err(CodecError::syntax(
                    line.number,
                    "expected a mapping entry, found a sequence item",
                ));
            }
            let Some((key, rest)) = split_key(line.text, line.number)? else {
                return Err(CodecError::syntax(line.number, "expected a mapping entry"));
            };
            if entries.iter().any(|(existing, _)| *existing == key) {
                return Err(CodecError::duplicate_key(line.number, key));
            }

            self.pos += 1;
            let value = if is_empty_value(rest) {
                match self.peek()? {
                    Some(next) if next.indent > indent => self.parse_block(next.indent)?,
                    Some(next) if next.indent == indent && is_sequence_item(next.text) => {
                        self.parse_sequence(indent)?
                    }
                    _ => Node::Scalar(String::new()),
                }
            } else {
                self.parse_value(rest, line.number, indent + 1)?
            };
            entries.push((key, value));
        }

        Ok(Node::Mapping(entries))
    }

    fn parse_sequence(&mut self, indent: usize) -> CodecResult<Node> {
        let mut items = Vec::new();

        while let Some(line) = self.peek()? {
            if line.indent < indent || !is_sequence_item(line.text) {
                break;
            }
            if line.indent > indent {
                return Err(CodecError::syntax(line.number, "unexpected indentation"));
            }

            let after_dash = &line.text[1..];
            let rest = after_dash.trim_start_matches(' ');
            let item_col = indent + 1 + (after_dash.len() - rest.len());

            if is_empty_value(rest) {
                self.pos += 1;
                let item = match self.peek()? {
                    Some(next) if next.indent > indent => self.parse_block(next.indent)?,
                    _ => Node::Scalar(String::new()),
                };
                items.push(item);
            } else if is_sequence_item(rest) || split_key(rest, line.number)?.is_some() {
                // `- key: value` and `- - x`: re-read the remainder as a line
                // of its own starting at the item's column.
                self.lines[self.pos] = Line {
                    indent: item_col,
                    text: rest,
                    ..line
                };
                items.push(self.parse_block(item_col)?);
            } else {
                self.pos += 1;
                items.push(self.parse_value(rest, line.number, indent + 1)?);
            }
        }

        Ok(Node::Sequence(items))
    }

    /// Parses the value part of an entry or item.
    ///
    /// `min_indent` is the smallest indentation a literal block's content
    /// may use.
    fn parse_value(&mut self, text: &str, number: usize, min_indent: usize) -> CodecResult<Node> {
        if let Some(header) = text.strip_prefix('|') {
            let chomp = parse_block_header(header, number)?;
            return Ok(Node::Scalar(self.read_literal_block(chomp, min_indent)?));
        }

        match strip_comment(text) {
            "[]" => return Ok(Node::Sequence(Vec::new())),
            "{}" => return Ok(Node::Mapping(Vec::new())),
            _ => {}
        }

        parse_inline_scalar(text, number).map(Node::Scalar)
    }

    fn read_literal_block(&mut self, chomp: Chomp, min_indent: usize) -> CodecResult<String> {
        let mut content_indent: Option<usize> = None;
        let mut collected: Vec<&str> = Vec::new();

        while let Some(line) = self.lines.get(self.pos) {
            if line.raw.trim_matches(' ').is_empty() {
                let kept = content_indent
                    .and_then(|ci| line.raw.get(ci..))
                    .unwrap_or("");
                collected.push(kept);
                self.pos += 1;
                continue;
            }

            let ci = match content_indent {
                Some(ci) if line.indent >= ci => ci,
                Some(_) if line.indent >= min_indent => {
                    return Err(CodecError::syntax(
                        line.number,
                        "inconsistent indentation in literal block",
                    ));
                }
                Some(_) => break,
                None if line.indent >= min_indent => {
                    content_indent = Some(line.indent);
                    line.indent
                }
                None => break,
            };
            collected.push(&line.raw[ci..]);
            self.pos += 1;
        }

        let end = collected
            .iter()
            .rposition(|l| !l.is_empty())
            .map_or(0, |idx| idx + 1);
        let mut value = collected[..end].join("\n");

        match chomp {
            Chomp::Strip => {}
            Chomp::Clip => {
                if end > 0 {
                    value.push('\n');
                }
            }
            Chomp::Keep => {
                if end > 0 {
                    value.push('\n');
                }
                for _ in end..collected.len() {
                    value.push('\n');
                }
            }
        }
        Ok(value)
    }
}

fn is_document_marker(line: &Line<'_>) -> bool {
    line.indent == 0 && matches!(line.text.trim_end(), "---" | "...")
}

fn is_sequence_item(text: &str) -> bool {
    text.trim_end() == "-" || text.starts_with("- ")
}

fn is_empty_value(rest: &str) -> bool {
    let trimmed = rest.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Removes a trailing ` # comment` and surrounding blanks.
fn strip_comment(text: &str) -> &str {
    let bytes = text.as_bytes();
    let cut = (0..bytes.len())
        .find(|&i| bytes[i] == b'#' && (i == 0 || bytes[i - 1] == b' ' || bytes[i - 1] == b'\t'))
        .unwrap_or(bytes.len());
    text[..cut].trim_matches(|c| c == ' ' || c == '\t')
}

fn parse_block_header(header: &str, number: usize) -> CodecResult<Chomp> {
    match strip_comment(header) {
        "" => Ok(Chomp::Clip),
        "-" => Ok(Chomp::Strip),
        "+" => Ok(Chomp::Keep),
        other if other.chars().any(|c| c.is_ascii_digit()) => Err(CodecError::Unsupported {
            line: number,
            construct: "block indentation indicator",
        }),
        _ => Err(CodecError::syntax(number, "invalid literal block header")),
    }
}

/// Splits `key: rest` off a line.
///
/// Returns `None` if the line is not a mapping entry.
fn split_key(text: &str, number: usize) -> CodecResult<Option<(String, &str)>> {
    let (key, after) = match text.chars().next() {
        Some('"') => {
            let (key, remainder) = parse_double_quoted(text, number)?;
            (key, remainder.trim_start_matches(' '))
        }
        Some('\'') => {
            let (key, remainder) = parse_single_quoted(text, number)?;
            (key, remainder.trim_start_matches(' '))
        }
        _ => {
            let bytes = text.as_bytes();
            let mut split = None;
            for i in 0..bytes.len() {
                if bytes[i] == b'#' && (i == 0 || bytes[i - 1] == b' ') {
                    break;
                }
                if bytes[i] == b':' && matches!(bytes.get(i + 1), None | Some(b' ' | b'\t')) {
                    split = Some(i);
                    break;
                }
            }
            let Some(idx) = split else {
                return Ok(None);
            };
            let key = text[..idx].trim_end_matches([' ', '\t']);
            if key.is_empty() {
                return Err(CodecError::syntax(number, "missing mapping key"));
            }
            check_plain_start(key, number)?;
            return Ok(Some((key.to_string(), text[idx + 1..].trim_start_matches(' '))));
        }
    };

    match after.strip_prefix(':') {
        Some(rest) if rest.is_empty() || rest.starts_with([' ', '\t']) => {
            Ok(Some((key, rest.trim_start_matches(' '))))
        }
        _ => Ok(None),
    }
}

fn parse_inline_scalar(text: &str, number: usize) -> CodecResult<String> {
    let (value, remainder) = match text.chars().next() {
        Some('"') => parse_double_quoted(text, number)?,
        Some('\'') => parse_single_quoted(text, number)?,
        _ => {
            check_plain_start(text, number)?;
            let value = strip_comment(text);
            if value == "-" || value.starts_with("- ") {
                return Err(CodecError::syntax(
                    number,
                    "sequence entries are not allowed here",
                ));
            }
            if value.contains(": ") || value.ends_with(':') {
                return Err(CodecError::syntax(
                    number,
                    "mapping values are not allowed here",
                ));
            }
            return Ok(value.to_string());
        }
    };

    if !is_empty_value(remainder) {
        return Err(CodecError::syntax(
            number,
            "unexpected text after quoted scalar",
        ));
    }
    Ok(value)
}

fn check_plain_start(text: &str, number: usize) -> CodecResult<()> {
    let unsupported = |construct: &'static str| -> CodecResult<()> {
        Err(CodecError::Unsupported {
            line: number,
            construct,
        })
    };
    match text.chars().next() {
        Some('&') => unsupported("anchor"),
        Some('*') => unsupported("alias"),
        Some('!') => unsupported("tag"),
        Some('[' | '{') => unsupported("flow collection"),
        Some('>') => unsupported("folded block scalar"),
        Some('?') => unsupported("complex mapping key"),
        Some('%') => unsupported("directive"),
        Some(c @ ('|' | ',' | ']' | '}' | '@' | '`' | ':')) => Err(CodecError::syntax(
            number,
            format!("plain scalar cannot start with '{c}'"),
        )),
        _ => Ok(()),
    }
}

/// Parses a double-quoted scalar at the start of `text`.
///
/// Returns the unescaped value and whatever follows the closing quote.
fn parse_double_quoted(text: &str, number: usize) -> CodecResult<(String, &str)> {
    let mut out = String::new();
    let mut chars = text.char_indices().skip(1);

    while let Some((idx, c)) = chars.next() {
        match c {
            '"' => return Ok((out, &text[idx + 1..])),
            '\\' => {
                let Some((_, esc)) = chars.next() else {
                    break;
                };
                let decoded = match esc {
                    '0' => '\0',
                    'a' => '\u{7}',
                    'b' => '\u{8}',
                    't' | '\t' => '\t',
                    'n' => '\n',
                    'v' => '\u{b}',
                    'f' => '\u{c}',
                    'r' => '\r',
                    'e' => '\u{1b}',
                    ' ' => ' ',
                    '"' => '"',
                    '/' => '/',
                    '\\' => '\\',
                    'N' => '\u{85}',
                    '_' => '\u{a0}',
                    'L' => '\u{2028}',
                    'P' => '\u{2029}',
                    'x' | 'u' | 'U' => {
                        let width = match esc {
                            'x' => 2,
                            'u' => 4,
                            _ => 8,
                        };
                        let mut code = 0u32;
                        for _ in 0..width {
                            let digit = chars
                                .next()
                                .and_then(|(_, h)| h.to_digit(16))
                                .ok_or_else(|| {
                                    CodecError::syntax(number, "invalid hexadecimal escape")
                                })?;
                            code = code * 16 + digit;
                        }
                        char::from_u32(code).ok_or_else(|| {
                            CodecError::syntax(number, format!("invalid code point {code:#x}"))
                        })?
                    }
                    other => {
                        return Err(CodecError::syntax(
                            number,
                            format!("unknown escape sequence '\\{other}'"),
                        ));
                    }
                };
                out.push(decoded);
            }
            c => out.push(c),
        }
    }

    Err(CodecError::syntax(
        number,
        "unterminated double-quoted scalar",
    ))
}

/// Parses a single-quoted scalar at the start of `text`.
fn parse_single_quoted(text: &str, number: usize) -> CodecResult<(String, &str)> {
    let mut out = String::new();
    let mut chars = text.char_indices().skip(1).peekable();

    while let Some((idx, c)) = chars.next() {
        if c == '\'' {
            if matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                out.push('\'');
                continue;
            }
            return Ok((out, &text[idx + 1..]));
        }
        out.push(c);
    }

    Err(CodecError::syntax(
        number,
        "unterminated single-quoted scalar",
    ))
}
