//! Literal, string, and whitespace wire primitives (§4.2).
//!
//! Like [`crate::number`], scanning functions here report
//! [`crate::number::Scan::Incomplete`] rather than assuming the caller
//! knows whether the source is at true EOF; the decoder's window-refill
//! loop is the single place that turns a lingering `Incomplete` into
//! [`SyntaxError::UnexpectedEof`].

use crate::error::{ErrorContext, SyntaxError};
use crate::number::Scan;

/// Match a byte literal (`null`, `true`, or `false`) against `src`,
/// starting at `src[0]`, which is itself positioned at absolute stream
/// offset `base_offset`. `name` is used only to label a
/// [`ErrorContext::WithinLiteral`] on mismatch.
pub(crate) fn consume_literal(src: &[u8], lit: &'static [u8], name: &'static str, base_offset: u64) -> Result<Scan, SyntaxError> {
    let n = src.len().min(lit.len());
    for i in 0..n {
        if src[i] != lit[i] {
            return Err(SyntaxError::InvalidCharacter {
                offset: base_offset + i as u64,
                context: ErrorContext::WithinLiteral(name),
                found: Some(src[i]),
            });
        }
    }
    if src.len() >= lit.len() {
        Ok(Scan::Complete(lit.len()))
    } else {
        Ok(Scan::Incomplete)
    }
}

pub(crate) fn consume_null(src: &[u8], base_offset: u64) -> Result<Scan, SyntaxError> {
    consume_literal(src, b"null", "null", base_offset)
}

pub(crate) fn consume_false(src: &[u8], base_offset: u64) -> Result<Scan, SyntaxError> {
    consume_literal(src, b"false", "false", base_offset)
}

pub(crate) fn consume_true(src: &[u8], base_offset: u64) -> Result<Scan, SyntaxError> {
    consume_literal(src, b"true", "true", base_offset)
}

/// Fast, non-resumable match of a quoted string with no escapes and only
/// printable ASCII content. Returns `0` (rather than falling back) if the
/// string isn't fully present in `src` yet — the caller always has
/// [`consume_string`] as the general-case fallback.
#[must_use]
pub(crate) fn consume_simple_string(src: &[u8]) -> usize {
    if src.first() != Some(&b'"') {
        return 0;
    }
    let mut i = 1;
    while let Some(&b) = src.get(i) {
        if b == b'"' {
            return i + 1;
        }
        if b == b'\\' || !(0x20..=0x7E).contains(&b) {
            return 0;
        }
        i += 1;
    }
    0
}

/// Scan a full JSON string, including surrounding quotes, validating
/// control-character and UTF-8/escape-sequence well-formedness but without
/// decoding escapes. `src[0]` is positioned at absolute stream offset
/// `base_offset`. Returns the byte length of the quoted string (including
/// both quote characters) on success.
pub(crate) fn consume_string(src: &[u8], allow_invalid_utf8: bool, base_offset: u64) -> Result<Scan, SyntaxError> {
    debug_assert_eq!(src.first(), Some(&b'"'));
    let mut i = 1;
    loop {
        let Some(&b) = src.get(i) else {
            return Ok(Scan::Incomplete);
        };
        match b {
            b'"' => return Ok(Scan::Complete(i + 1)),
            b'\\' => {
                let Some(&esc) = src.get(i + 1) else {
                    return Ok(Scan::Incomplete);
                };
                match esc {
                    b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't' => i += 2,
                    b'u' => {
                        let needed = i + 6;
                        if src.len() < needed {
                            return Ok(Scan::Incomplete);
                        }
                        for (k, &h) in src[i + 2..needed].iter().enumerate() {
                            if !h.is_ascii_hexdigit() {
                                return Err(SyntaxError::InvalidCharacter {
                                    offset: base_offset + (i + 2 + k) as u64,
                                    context: ErrorContext::WithinString,
                                    found: Some(h),
                                });
                            }
                        }
                        i = needed;
                    }
                    _ => {
                        return Err(SyntaxError::InvalidCharacter {
                            offset: base_offset + (i + 1) as u64,
                            context: ErrorContext::WithinString,
                            found: Some(esc),
                        });
                    }
                }
            }
            0x00..=0x1F => {
                return Err(SyntaxError::InvalidCharacter {
                    offset: base_offset + i as u64,
                    context: ErrorContext::WithinString,
                    found: Some(b),
                });
            }
            0x80..=0xFF => {
                // Validate the UTF-8 continuation run starting here without
                // decoding it; stop the scan if it runs past what's
                // buffered so far (resumable).
                match validate_utf8_run(&src[i..], allow_invalid_utf8) {
                    Ok(Some(len)) => i += len,
                    Ok(None) => return Ok(Scan::Incomplete),
                    Err(offset) => return Err(SyntaxError::InvalidUtf8 { offset: base_offset + (i as u64) + offset }),
                }
            }
            _ => i += 1,
        }
    }
}

/// Validate one UTF-8 scalar's byte sequence at the start of `buf`.
/// Returns `Ok(Some(len))` on a complete, valid sequence, `Ok(None)` if
/// `buf` doesn't yet contain the full sequence, or `Err(offset)` (relative
/// to `buf`) for an invalid sequence, unless `allow_invalid_utf8` is set —
/// in which case a single invalid lead byte is treated as a one-byte
/// `U+FFFD` placeholder and always accepted.
fn validate_utf8_run(buf: &[u8], allow_invalid_utf8: bool) -> Result<Option<usize>, u64> {
    let lead = buf[0];
    let len = match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => {
            if allow_invalid_utf8 {
                return Ok(Some(1));
            }
            return Err(0);
        }
    };
    if buf.len() < len {
        return Ok(None);
    }
    match std::str::from_utf8(&buf[..len]) {
        Ok(_) => Ok(Some(len)),
        Err(_) if allow_invalid_utf8 => Ok(Some(1)),
        Err(e) => Err(e.valid_up_to() as u64),
    }
}

/// Consume whitespace (space, `\n`, `\r`, `\t`, and, if `unicode` is set,
/// any Unicode `White_Space` code point). Returns the number of bytes
/// consumed; never errors.
#[must_use]
pub(crate) fn consume_whitespace(src: &[u8], unicode: bool) -> usize {
    if !unicode {
        let mut i = 0;
        while matches!(src.get(i), Some(b' ' | b'\n' | b'\r' | b'\t')) {
            i += 1;
        }
        return i;
    }
    let s = std::str::from_utf8(src).unwrap_or("");
    let mut consumed = 0;
    for ch in s.chars() {
        if ch.is_whitespace() {
            consumed += ch.len_utf8();
        } else {
            break;
        }
    }
    consumed
}

#[cfg(test)]
mod tests {
    use super::{consume_null, consume_simple_string, consume_string, consume_whitespace};
    use crate::number::Scan;

    #[test]
    fn null_matches_prefix_and_reports_mismatch() {
        assert_eq!(consume_null(b"null,", 0).unwrap(), Scan::Complete(4));
        assert_eq!(consume_null(b"nul", 0).unwrap(), Scan::Incomplete);
        let err = consume_null(b"nxll", 0).unwrap_err();
        assert_eq!(err.offset(), 1);
    }

    #[test]
    fn literal_mismatch_offset_is_relative_to_base() {
        let err = consume_null(b"nxll", 100).unwrap_err();
        assert_eq!(err.offset(), 101);
    }

    #[test]
    fn simple_string_rejects_escapes() {
        assert_eq!(consume_simple_string(br#""hello""#), 7);
        assert_eq!(consume_simple_string(br#""he\"llo""#), 0);
    }

    #[test]
    fn full_string_scan_validates_unicode_escape_digits() {
        assert_eq!(consume_string(br#""aAb""#, false, 0).unwrap(), Scan::Complete(5));
        assert!(consume_string(br#""a\u00Zzb""#, false, 0).is_err());
    }

    #[test]
    fn full_string_scan_is_resumable() {
        assert_eq!(consume_string(br#""abc"#, false, 0).unwrap(), Scan::Incomplete);
        assert_eq!(consume_string(br#""a\"#, false, 0).unwrap(), Scan::Incomplete);
    }

    #[test]
    fn string_scan_error_offset_is_relative_to_base() {
        let err = consume_string(br#""a\u00Zzb""#, false, 50).unwrap_err();
        assert_eq!(err.offset(), 50 + 6);
    }

    #[test]
    fn whitespace_default_is_json_four() {
        assert_eq!(consume_whitespace(b" \t\r\nX", false), 4);
        assert_eq!(consume_whitespace("\u{00A0}X".as_bytes(), false), 0);
        assert_eq!(consume_whitespace("\u{00A0}X".as_bytes(), true), 2);
    }
}
