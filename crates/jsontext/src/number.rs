//! Number wire primitives (§4.2): scanning, canonical formatting, and
//! parsing of the JSON number grammar.
//!
//! Scanning never needs to know whether the caller is at true end-of-input:
//! it reports [`Scan::Complete`] only when it has seen a byte that cannot
//! continue the number, and [`Scan::Incomplete`] when the buffer ran out at
//! a position where more bytes could still extend the number. The decoder
//! is the one place that knows whether the source is exhausted, and turns a
//! lingering `Incomplete` at true EOF into [`SyntaxError::UnexpectedEof`].

use crate::error::{ErrorContext, SyntaxError};

/// Result of scanning a byte prefix against a grammar rule that may need
/// more input to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scan {
    /// The rule matched; the match is exactly this many bytes and cannot be
    /// extended by any further input.
    Complete(usize),
    /// The buffer was exhausted while the rule could still extend; the
    /// caller must supply more bytes (or, at true EOF, treat this as
    /// [`SyntaxError::UnexpectedEof`]).
    Incomplete,
}

/// Fast, non-resumable match of `-?(0|[1-9][0-9]*)` with no fraction or
/// exponent. Returns `0` if the prefix doesn't even match that much (the
/// caller falls back to [`consume_number`] for the general grammar).
#[must_use]
pub(crate) fn consume_simple_number(src: &[u8]) -> usize {
    let mut i = 0;
    if src.first() == Some(&b'-') {
        i += 1;
    }
    match src.get(i) {
        Some(b'0') => i + 1,
        Some(b'1'..=b'9') => {
            i += 1;
            while matches!(src.get(i), Some(b'0'..=b'9')) {
                i += 1;
            }
            i
        }
        _ => 0,
    }
}

/// Scan the full JSON number grammar: `-?(0|[1-9][0-9]*)(\.[0-9]+)?
/// ([eE][-+]?[0-9]+)?`. `src[0]` is positioned at absolute stream offset
/// `base_offset`.
pub(crate) fn consume_number(src: &[u8], base_offset: u64) -> Result<Scan, SyntaxError> {
    let mut i = 0;
    if src.first() == Some(&b'-') {
        i += 1;
    }
    if i >= src.len() {
        return Ok(Scan::Incomplete);
    }
    match src[i] {
        b'0' => i += 1,
        b'1'..=b'9' => {
            i += 1;
            while matches!(src.get(i), Some(b'0'..=b'9')) {
                i += 1;
            }
        }
        other => {
            return Err(SyntaxError::InvalidCharacter {
                offset: base_offset + i as u64,
                context: ErrorContext::AtStartOfValue,
                found: Some(other),
            });
        }
    }

    if src.get(i) == Some(&b'.') {
        i += 1;
        match src.get(i) {
            None => return Ok(Scan::Incomplete),
            Some(b'0'..=b'9') => {
                while matches!(src.get(i), Some(b'0'..=b'9')) {
                    i += 1;
                }
            }
            Some(&other) => {
                return Err(SyntaxError::InvalidCharacter {
                    offset: base_offset + i as u64,
                    context: ErrorContext::WithinNumber,
                    found: Some(other),
                });
            }
        }
    }

    if matches!(src.get(i), Some(b'e' | b'E')) {
        i += 1;
        if matches!(src.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        match src.get(i) {
            None => return Ok(Scan::Incomplete),
            Some(b'0'..=b'9') => {
                while matches!(src.get(i), Some(b'0'..=b'9')) {
                    i += 1;
                }
            }
            Some(&other) => {
                return Err(SyntaxError::InvalidCharacter {
                    offset: base_offset + i as u64,
                    context: ErrorContext::WithinNumber,
                    found: Some(other),
                });
            }
        }
    }

    // If we ran off the end of the buffer while still accumulating digits
    // (integer, fraction, or exponent), another digit could still arrive.
    if i == src.len() {
        return Ok(Scan::Incomplete);
    }
    Ok(Scan::Complete(i))
}

/// Append the shortest round-tripping base-10 form of `v` (RFC 8785
/// §3.2.2.3 thresholds), as a bare token: `NaN`/`Infinity`/`-Infinity` for
/// non-finite values (the caller is responsible for quoting those, since
/// they are never valid bare JSON numbers).
pub(crate) fn append_float(dst: &mut String, v: f64) {
    if v.is_nan() {
        dst.push_str("NaN");
        return;
    }
    if v.is_infinite() {
        dst.push_str(if v > 0.0 { "Infinity" } else { "-Infinity" });
        return;
    }
    let mut buf = ryu::Buffer::new();
    let formatted = buf.format_finite(v);
    dst.push_str(&canonicalize_ryu(formatted));
}

/// `ryu` always emits a decimal point and, for large/small magnitudes, an
/// exponent with an explicit `+`/no leading zero suppression that doesn't
/// quite match RFC 8785's preferred shape. Normalize: drop a trailing
/// `.0`, and strip a `+` from the exponent.
fn canonicalize_ryu(s: &str) -> String {
    let s = s.replace("e+", "e").replace("E+", "e").replace('E', "e");
    if let Some(dot) = s.find('.') {
        if let Some(e) = s.find('e') {
            let (mantissa, exp) = s.split_at(e);
            if mantissa.ends_with(".0") {
                return format!("{}{}", &mantissa[..mantissa.len() - 2], exp);
            }
            return s;
        }
        if s.ends_with(".0") {
            return s[..dot].to_string();
        }
    }
    s
}

/// Parse a JSON number's textual form (as scanned by [`consume_number`])
/// into an `f64`. The slice must already be a syntactically valid JSON
/// number.
#[must_use]
pub(crate) fn parse_float(src: &str) -> f64 {
    src.parse().expect("caller validated src via consume_number")
}

/// Parse a JSON number's textual form into an `i64`, failing if it has a
/// fraction/exponent or does not fit.
pub(crate) fn parse_int(src: &str) -> Option<i64> {
    if src.contains(['.', 'e', 'E']) {
        return None;
    }
    src.parse().ok()
}

/// Parse a JSON number's textual form into a `u64`, failing if it has a
/// fraction/exponent, a sign, or does not fit.
pub(crate) fn parse_uint(src: &str) -> Option<u64> {
    if src.contains(['.', 'e', 'E', '-']) {
        return None;
    }
    src.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::{Scan, append_float, consume_number, consume_simple_number, parse_float, parse_int, parse_uint};

    #[test]
    fn simple_number_rejects_fraction() {
        assert_eq!(consume_simple_number(b"123"), 3);
        assert_eq!(consume_simple_number(b"-0"), 2);
        assert_eq!(consume_simple_number(b"0.5"), 1);
        assert_eq!(consume_simple_number(b"abc"), 0);
    }

    #[test]
    fn full_number_grammar_accepts_exponent_and_fraction() {
        assert_eq!(consume_number(b"3.14159,", 0).unwrap(), Scan::Complete(7));
        assert_eq!(consume_number(b"-1.5e10 ", 0).unwrap(), Scan::Complete(7));
        assert_eq!(consume_number(b"0e0]", 0).unwrap(), Scan::Complete(3));
    }

    #[test]
    fn incomplete_number_at_digit_boundary() {
        assert_eq!(consume_number(b"123", 0).unwrap(), Scan::Incomplete);
        assert_eq!(consume_number(b"0.", 0).unwrap(), Scan::Incomplete);
        assert_eq!(consume_number(b"0.5e", 0).unwrap(), Scan::Incomplete);
    }

    #[test]
    fn invalid_character_after_point_is_immediate_error() {
        let err = consume_number(b"0.e", 0).unwrap_err();
        assert_eq!(err.offset(), 2);
    }

    #[test]
    fn number_scan_error_offset_is_relative_to_base() {
        let err = consume_number(b"0.e", 200).unwrap_err();
        assert_eq!(err.offset(), 202);
    }

    #[test]
    fn float_round_trips_through_append_and_parse() {
        for v in [0.0, -0.0, 1.0, 3.14159, 1e300, -1e-300, f64::MIN_POSITIVE, 123_456_789.0] {
            let mut s = String::new();
            append_float(&mut s, v);
            let parsed = parse_float(&s);
            assert_eq!(parsed.to_bits(), v.to_bits(), "round trip of {v} via {s}");
        }
    }

    #[test]
    fn integer_canonical_form_has_no_decimal_point() {
        let mut s = String::new();
        append_float(&mut s, 42.0);
        assert_eq!(s, "42");
    }

    #[test]
    fn int_and_uint_parsing_reject_fractions() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("-42"), Some(-42));
        assert_eq!(parse_int("4.2"), None);
        assert_eq!(parse_uint("42"), Some(42));
        assert_eq!(parse_uint("-42"), None);
    }
}
