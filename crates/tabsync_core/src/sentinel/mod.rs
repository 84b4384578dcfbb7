//! Sentinel codec: typed cells to and from strings.
//!
//! Table files hold strings only. Everything else is spelled as a string
//! here and parsed back using the column's declared type:
//!
//! - null becomes the configured null token
//! - blobs become a sentinel line followed by the payload, wrapped at
//!   [`BLOB_LINE_WIDTH`] characters
//! - integers, reals and booleans use their canonical text
//!
//! A text cell that literally equals the null token decodes as null. The
//! collision is not detected.

mod ascii85;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tabsync_store::{CellValue, ColumnType};
use thiserror::Error;

/// Default null token.
pub const NULL_SENTINEL: &str = "<:__NULL__:>";

/// Prefix of an Ascii85 blob payload.
pub const BLOB_SENTINEL_BASE85: &str = "<:__BASE85__:>";

/// Prefix of a base64 blob payload.
pub const BLOB_SENTINEL_BASE64: &str = "<:__BASE64__:>";

/// Default document version tag.
pub const DEFAULT_VERSION: &str = "1.0";

/// Characters per payload line in an encoded blob.
pub const BLOB_LINE_WIDTH: usize = 64;

/// Errors from decoding a cell string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SentinelError {
    /// The text is not a valid value of the declared type.
    #[error("cannot parse {text:?} as {expected}")]
    Unparsable {
        /// The offending text.
        text: String,
        /// The declared column type.
        expected: ColumnType,
    },

    /// A blob column holds text without a blob sentinel.
    #[error("blob text must start with <:__BASE85__:> or <:__BASE64__:>")]
    MissingBlobSentinel,

    /// The blob payload is malformed.
    #[error("malformed {encoding} payload: {message}")]
    MalformedBlob {
        /// The alphabet named by the payload's sentinel.
        encoding: BlobEncoding,
        /// Description of the problem.
        message: String,
    },

    /// Unknown blob encoding name.
    #[error("unknown blob encoding '{0}' (expected base85 or base64)")]
    UnknownEncoding(String),
}

/// Binary-to-text alphabet used for blob columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobEncoding {
    /// Ascii85.
    #[default]
    Base85,
    /// Standard padded base64.
    Base64,
}

impl BlobEncoding {
    /// Returns the sentinel that prefixes payloads in this alphabet.
    #[must_use]
    pub fn sentinel(self) -> &'static str {
        match self {
            BlobEncoding::Base85 => BLOB_SENTINEL_BASE85,
            BlobEncoding::Base64 => BLOB_SENTINEL_BASE64,
        }
    }

    fn encode_payload(self, bytes: &[u8]) -> String {
        match self {
            BlobEncoding::Base85 => ascii85::encode(bytes),
            BlobEncoding::Base64 => STANDARD.encode(bytes),
        }
    }

    fn decode_payload(self, payload: &str) -> Result<Vec<u8>, SentinelError> {
        let result = match self {
            BlobEncoding::Base85 => ascii85::decode(payload),
            BlobEncoding::Base64 => {
                let compact: String = payload.split_ascii_whitespace().collect();
                STANDARD.decode(compact).map_err(|e| e.to_string())
            }
        };
        result.map_err(|message| SentinelError::MalformedBlob {
            encoding: self,
            message,
        })
    }
}

impl fmt::Display for BlobEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobEncoding::Base85 => f.write_str("base85"),
            BlobEncoding::Base64 => f.write_str("base64"),
        }
    }
}

impl FromStr for BlobEncoding {
    type Err = SentinelError;

    /// Accepts `base85`, `ascii85`, `base64` (any case) or a sentinel.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            BLOB_SENTINEL_BASE85 => Ok(BlobEncoding::Base85),
            BLOB_SENTINEL_BASE64 => Ok(BlobEncoding::Base64),
            other if other.eq_ignore_ascii_case("base85") || other.eq_ignore_ascii_case("ascii85") => {
                Ok(BlobEncoding::Base85)
            }
            other if other.eq_ignore_ascii_case("base64") => Ok(BlobEncoding::Base64),
            other => Err(SentinelError::UnknownEncoding(other.to_string())),
        }
    }
}

const TRUE_WORDS: &[&str] = &["1", "true", "t", "yes", "y", "on"];
const FALSE_WORDS: &[&str] = &["0", "false", "f", "no", "n", "off"];

/// Converts cells to and from their string form.
///
/// One codec is shared by every table of a synchronizer; the blob alphabet
/// and null token apply uniformly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelCodec {
    null_token: String,
    blob_encoding: BlobEncoding,
}

impl Default for SentinelCodec {
    fn default() -> Self {
        Self::new(NULL_SENTINEL, BlobEncoding::default())
    }
}

impl SentinelCodec {
    /// Creates a codec.
    pub fn new(null_token: impl Into<String>, blob_encoding: BlobEncoding) -> Self {
        Self {
            null_token: null_token.into(),
            blob_encoding,
        }
    }

    /// The null token.
    #[must_use]
    pub fn null_token(&self) -> &str {
        &self.null_token
    }

    /// The alphabet used when encoding blobs.
    #[must_use]
    pub fn blob_encoding(&self) -> BlobEncoding {
        self.blob_encoding
    }

    /// Encodes a cell for a column of the declared type.
    ///
    /// The declared type only steers values the store handed back in a
    /// different storage class: blob columns always get blob text, and
    /// booleans in numeric columns are written as `1`/`0`. Bytes are always
    /// written as blob text; stores refuse to return them for a scalar
    /// column.
    #[must_use]
    pub fn encode(&self, value: &CellValue, declared: ColumnType) -> String {
        match (value, declared) {
            (CellValue::Null, _) => self.null_token.clone(),
            (CellValue::Blob(bytes), _) => self.encode_blob(bytes),
            (other, ColumnType::Blob) => self.encode_blob(scalar_text(other).as_bytes()),
            (CellValue::Boolean(b), ColumnType::Integer | ColumnType::Real) => {
                String::from(if *b { "1" } else { "0" })
            }
            (CellValue::Integer(i), ColumnType::Boolean) => bool_text(*i != 0),
            (CellValue::Real(r), ColumnType::Boolean) => bool_text(*r != 0.0),
            (other, _) => scalar_text(other),
        }
    }

    /// Decodes a cell string for a column of the declared type.
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not parse as the declared type or
    /// a blob payload is malformed.
    pub fn decode(&self, text: &str, declared: ColumnType) -> Result<CellValue, SentinelError> {
        if text == self.null_token {
            return Ok(CellValue::Null);
        }

        let unparsable = || SentinelError::Unparsable {
            text: text.to_string(),
            expected: declared,
        };

        Ok(match declared {
            ColumnType::Text => CellValue::Text(text.to_string()),
            ColumnType::Integer => {
                CellValue::Integer(text.trim().parse().map_err(|_| unparsable())?)
            }
            ColumnType::Real => CellValue::Real(text.trim().parse().map_err(|_| unparsable())?),
            ColumnType::Boolean => {
                let word = text.trim().to_ascii_lowercase();
                if TRUE_WORDS.contains(&word.as_str()) {
                    CellValue::Boolean(true)
                } else if FALSE_WORDS.contains(&word.as_str()) {
                    CellValue::Boolean(false)
                } else {
                    return Err(unparsable());
                }
            }
            ColumnType::Blob => CellValue::Blob(decode_blob(text)?),
        })
    }

    /// Encodes bytes as blob text in the configured alphabet.
    #[must_use]
    pub fn encode_blob(&self, bytes: &[u8]) -> String {
        let sentinel = self.blob_encoding.sentinel();
        let payload = self.blob_encoding.encode_payload(bytes);
        if payload.is_empty() {
            return sentinel.to_string();
        }

        let mut out = String::with_capacity(sentinel.len() + payload.len() + payload.len() / BLOB_LINE_WIDTH + 1);
        out.push_str(sentinel);
        // Both alphabets are ASCII, so byte chunks are char boundaries.
        for line in payload.as_bytes().chunks(BLOB_LINE_WIDTH) {
            out.push('\n');
            out.extend(line.iter().map(|&b| char::from(b)));
        }
        out
    }
}

/// Decodes blob text in either alphabet, chosen by its sentinel.
///
/// # Errors
///
/// Returns an error if the text carries no known sentinel or the payload is
/// malformed.
pub fn decode_blob(text: &str) -> Result<Vec<u8>, SentinelError> {
    for encoding in [BlobEncoding::Base85, BlobEncoding::Base64] {
        if let Some(payload) = text.strip_prefix(encoding.sentinel()) {
            return encoding.decode_payload(payload);
        }
    }
    Err(SentinelError::MissingBlobSentinel)
}

fn bool_text(b: bool) -> String {
    String::from(if b { "true" } else { "false" })
}

/// Canonical text of a non-null scalar; `encode` handles null and bytes.
fn scalar_text(value: &CellValue) -> String {
    match value {
        CellValue::Integer(i) => i.to_string(),
        // `Debug` is the shortest text that parses back to the same f64.
        CellValue::Real(r) => format!("{r:?}"),
        CellValue::Text(s) => s.clone(),
        CellValue::Boolean(b) => bool_text(*b),
        CellValue::Null | CellValue::Blob(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn codec(encoding: BlobEncoding) -> SentinelCodec {
        SentinelCodec::new(NULL_SENTINEL, encoding)
    }

    #[test]
    fn null_round_trips_for_every_type() {
        let codec = SentinelCodec::default();
        for ty in [
            ColumnType::Integer,
            ColumnType::Real,
            ColumnType::Text,
            ColumnType::Blob,
            ColumnType::Boolean,
        ] {
            let text = codec.encode(&CellValue::Null, ty);
            assert_eq!(text, NULL_SENTINEL);
            assert_eq!(codec.decode(&text, ty).unwrap(), CellValue::Null);
        }
    }

    #[test]
    fn literal_null_token_decodes_as_null() {
        let codec = SentinelCodec::default();
        let text = codec.encode(&CellValue::Text(NULL_SENTINEL.into()), ColumnType::Text);
        assert_eq!(codec.decode(&text, ColumnType::Text).unwrap(), CellValue::Null);
    }

    #[test]
    fn custom_null_token() {
        let codec = SentinelCodec::new("~", BlobEncoding::Base85);
        assert_eq!(codec.encode(&CellValue::Null, ColumnType::Text), "~");
        assert_eq!(codec.decode("~", ColumnType::Integer).unwrap(), CellValue::Null);
        assert_eq!(
            codec.decode(NULL_SENTINEL, ColumnType::Text).unwrap(),
            CellValue::Text(NULL_SENTINEL.into())
        );
    }

    #[test]
    fn scalars_use_canonical_text() {
        let codec = SentinelCodec::default();
        assert_eq!(codec.encode(&CellValue::Integer(-42), ColumnType::Integer), "-42");
        assert_eq!(codec.encode(&CellValue::Real(0.1), ColumnType::Real), "0.1");
        assert_eq!(codec.encode(&CellValue::Real(3.0), ColumnType::Real), "3.0");
        assert_eq!(codec.encode(&CellValue::Boolean(true), ColumnType::Boolean), "true");
        assert_eq!(codec.encode(&CellValue::Text("Ada".into()), ColumnType::Text), "Ada");
    }

    #[test]
    fn declared_type_steers_mismatched_values() {
        let codec = SentinelCodec::default();
        assert_eq!(codec.encode(&CellValue::Boolean(true), ColumnType::Integer), "1");
        assert_eq!(codec.encode(&CellValue::Integer(5), ColumnType::Boolean), "true");
        let text = codec.encode(&CellValue::Text("raw".into()), ColumnType::Blob);
        assert_eq!(
            codec.decode(&text, ColumnType::Blob).unwrap(),
            CellValue::Blob(b"raw".to_vec())
        );
    }

    #[test]
    fn decode_scalars() {
        let codec = SentinelCodec::default();
        assert_eq!(codec.decode(" 17 ", ColumnType::Integer).unwrap(), CellValue::Integer(17));
        assert_eq!(codec.decode("2.5", ColumnType::Real).unwrap(), CellValue::Real(2.5));
        assert_eq!(codec.decode("1e3", ColumnType::Real).unwrap(), CellValue::Real(1000.0));
        assert_eq!(codec.decode(" 12 ", ColumnType::Text).unwrap(), CellValue::Text(" 12 ".into()));
    }

    #[test]
    fn decode_boolean_words() {
        let codec = SentinelCodec::default();
        for word in ["1", "TRUE", "t", "Yes", "y", "on"] {
            assert_eq!(codec.decode(word, ColumnType::Boolean).unwrap(), CellValue::Boolean(true));
        }
        for word in ["0", "false", "F", "no", "N", " off "] {
            assert_eq!(codec.decode(word, ColumnType::Boolean).unwrap(), CellValue::Boolean(false));
        }
        assert!(codec.decode("maybe", ColumnType::Boolean).is_err());
    }

    #[test]
    fn unparsable_scalars_are_errors() {
        let codec = SentinelCodec::default();
        let err = codec.decode("abc", ColumnType::Integer).unwrap_err();
        assert_eq!(
            err,
            SentinelError::Unparsable {
                text: "abc".into(),
                expected: ColumnType::Integer
            }
        );
        assert!(codec.decode("", ColumnType::Real).is_err());
        assert!(codec.decode("1.5", ColumnType::Integer).is_err());
    }

    #[test]
    fn empty_blob_is_bare_sentinel() {
        for encoding in [BlobEncoding::Base85, BlobEncoding::Base64] {
            let codec = codec(encoding);
            let text = codec.encode_blob(&[]);
            assert_eq!(text, encoding.sentinel());
            assert_eq!(decode_blob(&text).unwrap(), Vec::<u8>::new());
        }
    }

    #[test]
    fn blob_payload_is_wrapped() {
        let codec = codec(BlobEncoding::Base64);
        let text = codec.encode_blob(&[7u8; 100]);
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(BLOB_SENTINEL_BASE64));
        let payload: Vec<&str> = lines.collect();
        assert_eq!(payload.len(), 3);
        assert!(payload[..2].iter().all(|l| l.len() == BLOB_LINE_WIDTH));
        assert_eq!(payload[2].len(), 136 - 2 * BLOB_LINE_WIDTH);
    }

    #[test]
    fn blob_alphabet_is_detected_from_sentinel() {
        let bytes: Vec<u8> = (0..=255).collect();
        let base64_text = codec(BlobEncoding::Base64).encode_blob(&bytes);
        let base85_text = codec(BlobEncoding::Base85).encode_blob(&bytes);

        let reader = codec(BlobEncoding::Base85);
        assert_eq!(reader.decode(&base64_text, ColumnType::Blob).unwrap(), CellValue::Blob(bytes.clone()));
        assert_eq!(reader.decode(&base85_text, ColumnType::Blob).unwrap(), CellValue::Blob(bytes));
    }

    #[test]
    fn malformed_blobs_are_errors() {
        assert_eq!(decode_blob("AAAA"), Err(SentinelError::MissingBlobSentinel));
        assert!(matches!(
            decode_blob("<:__BASE64__:>\n!!!!"),
            Err(SentinelError::MalformedBlob { encoding: BlobEncoding::Base64, .. })
        ));
        assert!(matches!(
            decode_blob("<:__BASE85__:>\n~~"),
            Err(SentinelError::MalformedBlob { encoding: BlobEncoding::Base85, .. })
        ));
    }

    #[test]
    fn blob_encoding_from_str() {
        assert_eq!("base85".parse::<BlobEncoding>().unwrap(), BlobEncoding::Base85);
        assert_eq!("ASCII85".parse::<BlobEncoding>().unwrap(), BlobEncoding::Base85);
        assert_eq!(BLOB_SENTINEL_BASE64.parse::<BlobEncoding>().unwrap(), BlobEncoding::Base64);
        assert!("hex".parse::<BlobEncoding>().is_err());
    }

    proptest! {
        #[test]
        fn blobs_round_trip_in_both_alphabets(
            bytes in prop::collection::vec(any::<u8>(), 0..300),
            base64 in any::<bool>(),
        ) {
            let encoding = if base64 { BlobEncoding::Base64 } else { BlobEncoding::Base85 };
            let codec = codec(encoding);
            let text = codec.encode(&CellValue::Blob(bytes.clone()), ColumnType::Blob);
            prop_assert_eq!(codec.decode(&text, ColumnType::Blob).unwrap(), CellValue::Blob(bytes));
        }

        #[test]
        fn integers_round_trip(v in any::<i64>()) {
            let codec = SentinelCodec::default();
            let text = codec.encode(&CellValue::Integer(v), ColumnType::Integer);
            prop_assert_eq!(codec.decode(&text, ColumnType::Integer).unwrap(), CellValue::Integer(v));
        }

        #[test]
        fn finite_reals_round_trip(v in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
            let codec = SentinelCodec::default();
            let text = codec.encode(&CellValue::Real(v), ColumnType::Real);
            prop_assert_eq!(codec.decode(&text, ColumnType::Real).unwrap(), CellValue::Real(v));
        }

        #[test]
        fn text_other_than_the_token_round_trips(s in any::<String>()) {
            prop_assume!(s != NULL_SENTINEL);
            let codec = SentinelCodec::default();
            let text = codec.encode(&CellValue::Text(s.clone()), ColumnType::Text);
            prop_assert_eq!(codec.decode(&text, ColumnType::Text).unwrap(), CellValue::Text(s));
        }
    }
}
