//! The streaming decoder (§4.7): JSON bytes in, tokens or raw values out.
//!
//! Unlike the encoder's scratch-then-commit discipline, the decoder keeps
//! exactly one buffer: the unconsumed tail of the source, refilled as
//! needed. [`Decoder::advance`] is the single chokepoint every byte passes
//! through on its way out of that buffer, which is also where
//! [`Decoder::read_value`]'s raw-value capture hooks in.

use std::io::Read;

use crate::error::{DuplicateNameError, ErrorContext, IoError, JsonTextError, SyntaxError};
use crate::escape;
use crate::names::PointerStack;
use crate::number::{self, Scan};
use crate::options::DecodeOptions;
use crate::state::{GrammarState, Kind};
use crate::token::Token;
use crate::wire;

/// A lookahead failure cached by [`Decoder::peek_kind`] for delivery to the
/// next `read_token`/`read_value` call. Covers both kinds of error that can
/// arise purely from classifying the next token, as opposed to an I/O
/// failure (not cacheable, see [`Decoder::peeked`]).
#[derive(Debug, Clone)]
enum CachedError {
    Syntax(SyntaxError),
    DuplicateName(DuplicateNameError),
}

impl From<CachedError> for JsonTextError {
    fn from(e: CachedError) -> Self {
        match e {
            CachedError::Syntax(e) => e.into(),
            CachedError::DuplicateName(e) => e.into(),
        }
    }
}

/// A streaming JSON decoder reading from a caller-supplied source.
pub struct Decoder<R: Read> {
    source: R,
    buf: Vec<u8>,
    base_offset: u64,
    state: GrammarState,
    pointer: PointerStack,
    options: DecodeOptions,
    /// The outcome of the next token's lookahead, cached by
    /// [`Decoder::peek_kind`] (or by [`Decoder::read_value`]'s own
    /// lookahead) so the following `read_token`/`read_value` doesn't redo
    /// whitespace/delimiter consumption — or, on an error, doesn't redo the
    /// work that already produced it. `CachedError` covers both
    /// `SyntaxError` and `DuplicateNameError`, each `Clone`, so either can
    /// be cached and handed out by value; an `IoError` cannot (it wraps
    /// `std::io::Error`, which isn't `Clone`), so an I/O failure during
    /// lookahead is left uncached — the next call re-polls `source` and
    /// naturally reproduces the same failure.
    peeked: Option<Result<Kind, CachedError>>,
    /// When `Some`, every byte [`Decoder::advance`] drops is also appended
    /// here; used by `read_value` to recover the exact raw bytes of the
    /// value it just walked token-by-token.
    capture: Option<Vec<u8>>,
}

impl<R: Read> Decoder<R> {
    /// A decoder positioned at the start of `source` with an empty stack.
    #[must_use]
    pub fn new(source: R, options: DecodeOptions) -> Self {
        Self {
            source,
            buf: Vec::new(),
            base_offset: 0,
            state: GrammarState::new(options.common.allow_duplicate_names),
            pointer: PointerStack::new(),
            options,
            peeked: None,
            capture: None,
        }
    }

    /// Absolute byte offset of the first not-yet-consumed byte.
    #[must_use]
    pub fn input_offset(&self) -> u64 {
        self.base_offset
    }

    /// Number of currently open composite scopes.
    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.state.depth()
    }

    /// RFC 6901 pointer to the most recently read value.
    #[must_use]
    pub fn stack_pointer(&self) -> String {
        self.pointer.pointer()
    }

    /// The opening delimiter kind and token count for the `i`th stack entry,
    /// where `0` is the top-level scope.
    #[must_use]
    pub fn stack_index(&self, i: usize) -> (Kind, i64) {
        self.state.stack_index(i)
    }

    /// Discard all open scopes and buffered lookahead, returning to the top
    /// level.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state.reset();
        self.pointer.reset();
        self.peeked = None;
        self.capture = None;
    }

    fn advance(&mut self, n: usize) {
        if let Some(cap) = self.capture.as_mut() {
            cap.extend_from_slice(&self.buf[..n]);
        }
        self.buf.drain(0..n);
        self.base_offset += n as u64;
    }

    /// Read one more chunk from the source. Returns `false` at true EOF.
    fn grow_more(&mut self) -> Result<bool, JsonTextError> {
        let mut tmp = [0u8; 8192];
        let n = self.source.read(&mut tmp).map_err(|e| IoError {
            offset: self.base_offset + self.buf.len() as u64,
            source: e,
        })?;
        if n == 0 {
            return Ok(false);
        }
        self.buf.extend_from_slice(&tmp[..n]);
        Ok(true)
    }

    fn ensure_at_least(&mut self, n: usize) -> Result<bool, JsonTextError> {
        while self.buf.len() < n {
            if !self.grow_more()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Retry `f` against the growing buffer until it reports
    /// [`Scan::Complete`] or the source is truly exhausted.
    fn scan_resumable(&mut self, offset: u64, mut f: impl FnMut(&[u8]) -> Result<Scan, SyntaxError>) -> Result<usize, JsonTextError> {
        loop {
            match f(&self.buf)? {
                Scan::Complete(n) => return Ok(n),
                Scan::Incomplete => {
                    if !self.grow_more()? {
                        return Err(SyntaxError::UnexpectedEof { offset }.into());
                    }
                }
            }
        }
    }

    fn skip_whitespace(&mut self) -> Result<(), JsonTextError> {
        loop {
            let n = wire::consume_whitespace(&self.buf, false);
            self.advance(n);
            if !self.buf.is_empty() || !self.grow_more()? {
                return Ok(());
            }
        }
    }

    fn consume_delim_if_needed(&mut self, next_kind: Kind) -> Result<(), JsonTextError> {
        let Some(expected) = self.state.need_delim(next_kind) else {
            return Ok(());
        };
        self.ensure_at_least(1)?;
        if self.buf.first() != Some(&expected) {
            let offset = self.input_offset();
            return Err(if expected == b':' {
                SyntaxError::MissingColon { offset }
            } else {
                SyntaxError::MissingComma { offset }
            }
            .into());
        }
        self.advance(1);
        self.skip_whitespace()
    }

    /// Consume whitespace and any required delimiter, then report the kind
    /// of the next token without consuming it. Returns `None` at a clean
    /// top-level EOF.
    ///
    /// Whether a delimiter is required at all depends on what kind of token
    /// follows it (a close delimiter matching the open scope never needs
    /// one), so the lead byte is classified once before deciding, and again
    /// after consuming the delimiter and any whitespace that follows it.
    fn prepare_next_token(&mut self) -> Result<Option<Kind>, JsonTextError> {
        self.skip_whitespace()?;
        if self.buf.is_empty() {
            if self.state.depth() == 0 {
                return Ok(None);
            }
            return Err(SyntaxError::UnexpectedEof { offset: self.input_offset() }.into());
        }
        let lookahead = Kind::from_lead_byte(self.buf[0]);
        self.consume_delim_if_needed(lookahead)?;
        if self.buf.is_empty() {
            if self.state.depth() == 0 {
                return Ok(None);
            }
            return Err(SyntaxError::UnexpectedEof { offset: self.input_offset() }.into());
        }
        Ok(Some(Kind::from_lead_byte(self.buf[0])))
    }

    /// The normalized kind of the next token, without consuming it. A
    /// successful peek, or a syntax/duplicate-name error raised while
    /// computing it, is cached and delivered to the next
    /// `peek_kind`/`read_token`/`read_value` call instead of being
    /// recomputed. An I/O error is not cached: since `source` is re-polled
    /// on the next call, a persistently broken or exhausted source surfaces
    /// the same failure again naturally.
    pub fn peek_kind(&mut self) -> Result<Option<Kind>, JsonTextError> {
        if let Some(cached) = self.peeked.clone() {
            return cached.map(Some).map_err(Into::into);
        }
        match self.prepare_next_token() {
            Ok(k) => {
                if let Some(kind) = k {
                    self.peeked = Some(Ok(kind));
                }
                Ok(k)
            }
            Err(JsonTextError::Syntax(e)) => {
                self.peeked = Some(Err(CachedError::Syntax(e)));
                Err(e.into())
            }
            Err(other) => Err(other),
        }
    }

    fn consume_literal_token(&mut self, lit: &'static [u8], name: &'static str, offset: u64) -> Result<(), JsonTextError> {
        let len = self.scan_resumable(offset, |buf| wire::consume_literal(buf, lit, name, offset))?;
        self.advance(len);
        Ok(())
    }

    fn read_string_token(&mut self, offset: u64) -> Result<Token, JsonTextError> {
        let allow_invalid = self.options.common.allow_invalid_utf8;
        let len = self.scan_resumable(offset, |buf| wire::consume_string(buf, allow_invalid, offset))?;
        let quoted = self.buf[..len].to_vec();
        let is_name = self.state.needs_object_name();
        if is_name {
            let mut unescaped = String::new();
            escape::append_unquote(&mut unescaped, &quoted, offset, allow_invalid)?;
            if let Some(names) = self.state.names_mut() {
                if !names.insert(&unescaped) {
                    let err = DuplicateNameError { name: unescaped, offset };
                    self.peeked = Some(Err(CachedError::DuplicateName(err.clone())));
                    return Err(err.into());
                }
            }
            self.state.append_string(offset)?;
            self.advance(len);
            self.pointer.record_name(&unescaped);
        } else {
            self.state.append_string(offset)?;
            self.advance(len);
            self.pointer.advance_index();
        }
        Ok(Token::Raw(quoted.into_boxed_slice()))
    }

    fn read_number_token(&mut self, offset: u64) -> Result<Token, JsonTextError> {
        let len = self.scan_resumable(offset, |buf| number::consume_number(buf, offset))?;
        let bytes = self.buf[..len].to_vec();
        self.state.append_literal_or_number(offset)?;
        self.advance(len);
        self.pointer.advance_index();
        Ok(Token::Raw(bytes.into_boxed_slice()))
    }

    fn read_token_inner(&mut self) -> Result<Option<Token>, JsonTextError> {
        let kind = match self.peeked.take() {
            Some(Ok(k)) => k,
            Some(Err(e)) => return Err(e.into()),
            None => match self.prepare_next_token()? {
                Some(k) => k,
                None => return Ok(None),
            },
        };
        let offset = self.input_offset();
        match kind {
            Kind::ObjectStart => {
                self.advance(1);
                self.state.push_object(offset)?;
                self.pointer.push_object();
                Ok(Some(Token::Literal(Kind::ObjectStart)))
            }
            Kind::ArrayStart => {
                self.advance(1);
                self.state.push_array(offset)?;
                self.pointer.push_array();
                Ok(Some(Token::Literal(Kind::ArrayStart)))
            }
            Kind::ObjectEnd => {
                self.advance(1);
                self.state.pop_object(offset)?;
                self.pointer.pop();
                Ok(Some(Token::Literal(Kind::ObjectEnd)))
            }
            Kind::ArrayEnd => {
                self.advance(1);
                self.state.pop_array(offset)?;
                self.pointer.pop();
                Ok(Some(Token::Literal(Kind::ArrayEnd)))
            }
            Kind::Null => {
                self.consume_literal_token(b"null", "null", offset)?;
                self.state.append_literal_or_number(offset)?;
                self.pointer.advance_index();
                Ok(Some(Token::Literal(Kind::Null)))
            }
            Kind::True => {
                self.consume_literal_token(b"true", "true", offset)?;
                self.state.append_literal_or_number(offset)?;
                self.pointer.advance_index();
                Ok(Some(Token::Literal(Kind::True)))
            }
            Kind::False => {
                self.consume_literal_token(b"false", "false", offset)?;
                self.state.append_literal_or_number(offset)?;
                self.pointer.advance_index();
                Ok(Some(Token::Literal(Kind::False)))
            }
            Kind::String => self.read_string_token(offset).map(Some),
            Kind::Number => self.read_number_token(offset).map(Some),
            Kind::Invalid => Err(SyntaxError::InvalidCharacter {
                offset,
                context: ErrorContext::AtStartOfValue,
                found: self.buf.first().copied(),
            }
            .into()),
        }
    }

    /// Read the next token, or `Ok(None)` at a clean end-of-stream between
    /// top-level values.
    pub fn read_token(&mut self) -> Result<Option<Token>, JsonTextError> {
        self.read_token_inner()
    }

    /// Read the next complete JSON value (a single scalar, or an entire
    /// array/object subtree) as raw, unvalidated-beyond-syntax bytes,
    /// exactly as they appeared in the source.
    pub fn read_value(&mut self) -> Result<Option<Vec<u8>>, JsonTextError> {
        let kind = match self.peeked.take() {
            Some(Ok(k)) => k,
            Some(Err(e)) => return Err(e.into()),
            None => match self.prepare_next_token()? {
                Some(k) => k,
                None => return Ok(None),
            },
        };
        self.peeked = Some(Ok(kind));
        self.capture = Some(Vec::new());
        let start_depth = self.state.depth();
        let mut first = true;
        let result = self.drain_value(start_depth, &mut first);
        let bytes = self.capture.take().unwrap_or_default();
        result?;
        Ok(Some(bytes))
    }

    fn drain_value(&mut self, start_depth: usize, first: &mut bool) -> Result<(), JsonTextError> {
        loop {
            let offset = self.input_offset();
            let tok = self
                .read_token_inner()?
                .ok_or(SyntaxError::UnexpectedEof { offset })?;
            let is_open = matches!(tok, Token::Literal(Kind::ObjectStart | Kind::ArrayStart));
            if *first && !is_open {
                return Ok(());
            }
            *first = false;
            if self.state.depth() == start_depth {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Decoder;
    use crate::options::DecodeOptions;
    use crate::state::Kind;
    use crate::token::Token;

    #[test]
    fn reads_flat_object_tokens() {
        let mut dec = Decoder::new(br#"{"a":1,"b":true}"#.as_slice(), DecodeOptions::default());
        let mut kinds = Vec::new();
        while let Some(tok) = dec.read_token().unwrap() {
            kinds.push(tok.kind());
        }
        assert_eq!(
            kinds,
            vec![
                Kind::ObjectStart,
                Kind::String,
                Kind::Number,
                Kind::String,
                Kind::True,
                Kind::ObjectEnd,
            ]
        );
    }

    #[test]
    fn peek_kind_does_not_consume_and_matches_following_read() {
        let mut dec = Decoder::new(br#"{"a":1}"#.as_slice(), DecodeOptions::default());
        assert_eq!(dec.peek_kind().unwrap(), Some(Kind::ObjectStart));
        // Peeking again before reading returns the same cached kind.
        assert_eq!(dec.peek_kind().unwrap(), Some(Kind::ObjectStart));
        let tok = dec.read_token().unwrap().unwrap();
        assert_eq!(tok.kind(), Kind::ObjectStart);
    }

    #[test]
    fn peek_kind_caches_syntax_error_for_the_next_read() {
        let mut dec = Decoder::new(b"{\"a\" 1}".as_slice(), DecodeOptions::default());
        assert_eq!(dec.read_token().unwrap().unwrap().kind(), Kind::ObjectStart);
        assert_eq!(dec.read_token().unwrap().unwrap().kind(), Kind::String);
        // Missing ':' between name and value: peeking surfaces the error...
        let peek_err = dec.peek_kind().unwrap_err();
        // ...and reading immediately after gets the same cached error rather
        // than re-scanning (which would otherwise see a fresh `1` value).
        let read_err = dec.read_token().unwrap_err();
        assert_eq!(peek_err.offset(), read_err.offset());
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut dec = Decoder::new(br#"{"a":1,"a":2}"#.as_slice(), DecodeOptions::default());
        let mut saw_error = false;
        loop {
            match dec.read_token() {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(_) => {
                    saw_error = true;
                    break;
                }
            }
        }
        assert!(saw_error);
    }

    #[test]
    fn duplicate_name_error_is_cached_for_repeated_peeks() {
        let mut dec = Decoder::new(br#"{"0":{},"1":{},"0":{}}"#.as_slice(), DecodeOptions::default());
        let mut first_err = None;
        loop {
            match dec.read_token() {
                Ok(Some(_)) => {}
                Ok(None) => panic!("expected a duplicate-name error"),
                Err(e) => {
                    first_err = Some(e);
                    break;
                }
            }
        }
        let first_err = first_err.unwrap();
        assert_eq!(first_err.offset(), 15);
        // Re-entry surfaces the same cached error, not a derived MissingComma.
        let peek_err = dec.peek_kind().unwrap_err();
        assert_eq!(peek_err.offset(), 15);
        let read_err = dec.read_token().unwrap_err();
        assert_eq!(read_err.offset(), 15);
    }

    #[test]
    fn stack_index_reports_open_kind_and_length() {
        let mut dec = Decoder::new(br#"{"a":[1,2]}"#.as_slice(), DecodeOptions::default());
        while !matches!(dec.peek_kind().unwrap(), Some(Kind::Number)) {
            dec.read_token().unwrap();
        }
        assert_eq!(dec.stack_index(0), (Kind::Invalid, 1));
        assert_eq!(dec.stack_index(1), (Kind::ObjectStart, 2));
        assert_eq!(dec.stack_index(2), (Kind::ArrayStart, 0));
        assert_eq!(dec.stack_index(3), (Kind::Invalid, 0));
    }

    #[test]
    fn read_value_captures_nested_subtree_verbatim() {
        let mut dec = Decoder::new(br#"{"a":[1,2,3]} "#.as_slice(), DecodeOptions::default());
        let value = dec.read_value().unwrap().unwrap();
        assert_eq!(value, br#"{"a":[1,2,3]}"#.to_vec());
    }

    #[test]
    fn resumable_across_byte_at_a_time_reads() {
        struct OneByteAtATime<'a>(&'a [u8]);
        impl std::io::Read for OneByteAtATime<'_> {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.0.is_empty() || buf.is_empty() {
                    return Ok(0);
                }
                buf[0] = self.0[0];
                self.0 = &self.0[1..];
                Ok(1)
            }
        }
        let mut dec = Decoder::new(OneByteAtATime(br#"{"k":"value"}"#), DecodeOptions::default());
        let mut count = 0;
        while dec.read_token().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 4);
    }

    #[test]
    fn stack_pointer_tracks_position() {
        let mut dec = Decoder::new(br#"{"items":[10,20]}"#.as_slice(), DecodeOptions::default());
        loop {
            let tok = dec.read_token().unwrap();
            if matches!(tok, Some(Token::Raw(ref b)) if b.as_ref() == b"20") {
                break;
            }
            if tok.is_none() {
                panic!("ran out of tokens");
            }
        }
        assert_eq!(dec.stack_pointer(), "/items/1");
    }
}
