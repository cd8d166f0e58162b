//! Strict percent-decoding for identifiers carried in URL path segments.
//!
//! Unlike lenient decoders (which pass malformed escapes through unchanged), a
//! truncated or non-hex escape is an error here: a workflow id of `invalid%2`
//! must be rejected, not silently forwarded to the backend as `invalid%2`.
//! `+` is a literal plus in a path segment and is left untouched.

use thiserror::Error;

/// Why a path segment could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A `%` not followed by two hex digits.
    #[error("invalid URL escape {escape:?}")]
    InvalidEscape {
        /// The offending escape, as it appeared in the input (at most three chars).
        escape: String,
    },

    /// The escapes decoded to a byte sequence that is not UTF-8.
    #[error("decoded identifier is not valid UTF-8")]
    InvalidUtf8,
}

/// Percent-decode a single URL path segment.
///
/// ```rust,ignore
/// assert_eq!(decode_path_segment("test%2Fworkflow%2Bid")?, "test/workflow+id");
/// assert!(decode_path_segment("invalid%2").is_err());
/// ```
pub fn decode_path_segment(raw: &str) -> Result<String, DecodeError> {
    // Fast path: nothing to decode.
    if !raw.contains('%') {
        return Ok(raw.to_owned());
    }

    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        let hi = bytes.get(i + 1).copied().and_then(hex_value);
        let lo = bytes.get(i + 2).copied().and_then(hex_value);
        match (hi, lo) {
            (Some(hi), Some(lo)) => {
                out.push((hi << 4) | lo);
                i += 3;
            }
            _ => {
                let end = (i + 3).min(bytes.len());
                return Err(DecodeError::InvalidEscape {
                    escape: String::from_utf8_lossy(&bytes[i..end]).into_owned(),
                });
            }
        }
    }

    String::from_utf8(out).map_err(|_| DecodeError::InvalidUtf8)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
