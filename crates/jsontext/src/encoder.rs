//! The streaming encoder (§4.6): tokens/values in, canonical JSON bytes out.
//!
//! An `Encoder<W>` builds each token's bytes into a scratch `Vec<u8>` first
//! and only appends that scratch buffer to the committed [`Buffer`] once the
//! token is known to be well-formed — this is what gives `write_token` its
//! "no bytes committed on error" guarantee without needing to support
//! truncating an already-committed segmented buffer.

use std::io::{self, Write};

use crate::buffer::Buffer;
use crate::error::{DuplicateNameError, ErrorContext, JsonTextError, SyntaxError};
use crate::escape::{self, EscapeTable};
use crate::names::PointerStack;
use crate::number::{self, Scan};
use crate::options::EncodeOptions;
use crate::state::{GrammarState, Kind};
use crate::token::Token;
use crate::wire;

/// Flush is attempted once the committed buffer reaches this many bytes.
const FLUSH_THRESHOLD: usize = 4096;

/// A streaming JSON encoder writing into a caller-supplied sink.
pub struct Encoder<W: Write> {
    sink: W,
    buf: Buffer,
    pending: Vec<u8>,
    state: GrammarState,
    pointer: PointerStack,
    options: EncodeOptions,
    offset: u64,
}

impl<W: Write> Encoder<W> {
    /// An encoder positioned at the start of `sink` with an empty stack.
    #[must_use]
    pub fn new(sink: W, options: EncodeOptions) -> Self {
        Self {
            sink,
            buf: Buffer::new(),
            pending: Vec::new(),
            state: GrammarState::new(options.common.allow_duplicate_names),
            pointer: PointerStack::new(),
            options,
            offset: 0,
        }
    }

    fn escape_table(&self) -> EscapeTable<'_> {
        EscapeTable::new(self.options.escape_for_html, self.options.escape_for_js, None)
    }

    /// Current nesting depth (open arrays/objects).
    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.state.depth()
    }

    /// RFC 6901 pointer to the most recently written value.
    #[must_use]
    pub fn stack_pointer(&self) -> String {
        self.pointer.pointer()
    }

    /// Absolute byte offset in the output stream written so far (including
    /// anything still buffered but not yet flushed).
    #[must_use]
    pub fn output_offset(&self) -> u64 {
        self.offset + self.buf.len() as u64
    }

    fn append_whitespace_before(&mut self, is_close: bool) {
        if !self.options.multiline {
            return;
        }
        if !is_close && self.state.depth() == 0 && self.state.length() == 0 {
            // The very first token of a fresh top-level value needs no
            // leading separator.
            return;
        }
        let depth = if is_close { self.state.depth().saturating_sub(1) } else { self.state.depth() };
        self.pending.push(b'\n');
        self.pending.extend_from_slice(self.options.indent_prefix.as_bytes());
        for _ in 0..depth {
            self.pending.extend_from_slice(self.options.indent.as_bytes());
        }
    }

    fn append_delim(&mut self, delim: u8) {
        self.pending.push(delim);
        if delim == b':' {
            // A member value always sits on the same line as its name, so
            // multiline mode still wants a space here even though it skips
            // the usual newline-before-token treatment for values.
            if self.options.multiline || self.options.space_after_colon {
                self.pending.push(b' ');
            }
            return;
        }
        if self.options.multiline {
            return;
        }
        if self.options.space_after_comma {
            self.pending.push(b' ');
        }
    }

    /// Emit the delimiter (if any) and positional whitespace required before
    /// a token of `kind`. A value following a `:` never gets the
    /// newline-before-token treatment — `append_delim` already placed it on
    /// the same line as its name.
    fn append_separator(&mut self, kind: Kind, is_close: bool) {
        let delim = self.state.need_delim(kind);
        if let Some(d) = delim {
            self.append_delim(d);
        }
        if delim == Some(b':') {
            return;
        }
        if is_close && self.state.length() == 0 {
            return;
        }
        self.append_whitespace_before(is_close);
    }

    /// Write one token, updating grammar state. On any error no bytes are
    /// committed to the sink or the committed buffer.
    pub fn write_token(&mut self, token: &Token) -> Result<(), JsonTextError> {
        self.pending.clear();
        let kind = token.kind();
        let offset = self.output_offset();
        let is_close = matches!(kind, Kind::ObjectEnd | Kind::ArrayEnd);
        self.append_separator(kind, is_close);

        let result = self.write_token_payload(token, kind, offset);
        match result {
            Ok(()) => {
                self.buf.write(&self.pending);
                self.pending.clear();
                self.maybe_flush()?;
                Ok(())
            }
            Err(e) => {
                self.pending.clear();
                Err(e)
            }
        }
    }

    fn write_token_payload(&mut self, token: &Token, kind: Kind, offset: u64) -> Result<(), JsonTextError> {
        match token {
            Token::Literal(Kind::ObjectStart) => {
                self.state.push_object(offset)?;
                self.pointer.push_object();
                self.pending.push(b'{');
            }
            Token::Literal(Kind::ArrayStart) => {
                self.state.push_array(offset)?;
                self.pointer.push_array();
                self.pending.push(b'[');
            }
            Token::Literal(Kind::ObjectEnd) => {
                self.state.pop_object(offset)?;
                self.pointer.pop();
                self.pending.push(b'}');
            }
            Token::Literal(Kind::ArrayEnd) => {
                self.state.pop_array(offset)?;
                self.pointer.pop();
                self.pending.push(b']');
            }
            Token::Literal(Kind::Null) => {
                self.state.append_literal_or_number(offset)?;
                self.pending.extend_from_slice(b"null");
            }
            Token::Literal(Kind::True) => {
                self.state.append_literal_or_number(offset)?;
                self.pending.extend_from_slice(b"true");
            }
            Token::Literal(Kind::False) => {
                self.state.append_literal_or_number(offset)?;
                self.pending.extend_from_slice(b"false");
            }
            Token::Literal(other) => {
                unreachable!("Kind::{other:?} is not a valid structural/scalar literal")
            }
            Token::ExactString(s) => self.write_string_payload(s, offset)?,
            Token::Raw(bytes) => {
                // A raw token from a decoder: re-emit verbatim (it was
                // already validated on read).
                if kind == Kind::String {
                    self.write_raw_string_payload(bytes, offset)?;
                } else {
                    self.state.append_literal_or_number(offset)?;
                    self.pending.extend_from_slice(bytes);
                }
            }
            Token::ExactFloat(v) => {
                self.state.append_literal_or_number(offset)?;
                let mut s = String::new();
                number::append_float(&mut s, *v);
                self.pending.extend_from_slice(s.as_bytes());
            }
            Token::ExactInt(v) => {
                self.state.append_literal_or_number(offset)?;
                self.pending.extend_from_slice(v.to_string().as_bytes());
            }
            Token::ExactUint(v) => {
                self.state.append_literal_or_number(offset)?;
                self.pending.extend_from_slice(v.to_string().as_bytes());
            }
        }
        Ok(())
    }

    fn write_string_payload(&mut self, s: &str, offset: u64) -> Result<(), JsonTextError> {
        let is_name = self.state.needs_object_name();
        if is_name {
            if let Some(names) = self.state.names_mut() {
                if !names.insert(s) {
                    return Err(DuplicateNameError {
                        name: s.to_string(),
                        offset,
                    }
                    .into());
                }
            }
        }
        self.state.append_string(offset)?;
        let table = self.escape_table();
        escape::append_quote(&mut self.pending, s, &table);
        if is_name {
            self.pointer.record_name(s);
        } else {
            self.pointer.advance_index();
        }
        Ok(())
    }

    /// Fast path for re-emitting an already-quoted string (from a decoder's
    /// raw token, or [`Encoder::append_raw`]): write `quoted` verbatim once
    /// it's confirmed the active escape table (HTML/JS/user-fn) needs
    /// nothing beyond what's already there; otherwise fall back to a full
    /// unescape-then-requote so the active table's escapes are applied.
    fn write_raw_string_payload(&mut self, quoted: &[u8], offset: u64) -> Result<(), JsonTextError> {
        let mut unescaped = String::new();
        escape::append_unquote(&mut unescaped, quoted, offset, self.options.common.allow_invalid_utf8)?;
        let is_name = self.state.needs_object_name();
        if is_name {
            if let Some(names) = self.state.names_mut() {
                if !names.insert(&unescaped) {
                    return Err(DuplicateNameError {
                        name: unescaped,
                        offset,
                    }
                    .into());
                }
            }
        }
        self.state.append_string(offset)?;
        let table = self.escape_table();
        if table.needs_escape(&unescaped) {
            escape::reformat_unescaped(&mut self.pending, &unescaped, &table);
        } else {
            self.pending.extend_from_slice(quoted);
        }
        if is_name {
            self.pointer.record_name(&unescaped);
        } else {
            self.pointer.advance_index();
        }
        Ok(())
    }

    /// Attempt a flush once the committed buffer is large enough, or once a
    /// complete top-level value has just been written.
    fn maybe_flush(&mut self) -> Result<(), JsonTextError> {
        let top_level_complete = self.state.depth() == 0 && self.state.length() > 0;
        if self.buf.len() >= FLUSH_THRESHOLD || top_level_complete {
            self.flush()?;
            if top_level_complete {
                self.finish_top_level_value()?;
            }
        }
        Ok(())
    }

    fn finish_top_level_value(&mut self) -> Result<(), JsonTextError> {
        if !self.options.omit_top_level_newline {
            self.write_bytes(b"\n")?;
        }
        self.state.reset();
        self.pointer.reset();
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), JsonTextError> {
        self.sink.write_all(bytes).map_err(|e| {
            JsonTextError::from(crate::error::IoError {
                offset: self.offset,
                source: e,
            })
        })?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    /// Write the committed buffer to the sink.
    pub fn flush(&mut self) -> Result<(), JsonTextError> {
        if self.buf.is_empty() {
            return self.sink.flush().map_err(|e| {
                crate::error::IoError {
                    offset: self.offset,
                    source: e,
                }
                .into()
            });
        }
        let bytes = self.buf.bytes_clone();
        self.write_bytes(&bytes)?;
        self.buf.reset();
        self.sink.flush().map_err(|e| {
            crate::error::IoError {
                offset: self.offset,
                source: e,
            }
            .into()
        })
    }

    /// Write a single complete JSON value, reformatted through the encoder's
    /// escape/number-canonicalization rules. `src` may carry leading and
    /// trailing whitespace, but nothing else beyond the one value.
    pub fn write_value(&mut self, src: &[u8]) -> Result<(), JsonTextError> {
        self.pending.clear();
        let mut pos = 0usize;
        pos += wire::consume_whitespace(&src[pos..], false);
        let result = self.reformat_value(src, &mut pos);
        if let Err(e) = result {
            self.pending.clear();
            return Err(e.into());
        }
        pos += wire::consume_whitespace(&src[pos..], false);
        if pos != src.len() {
            self.pending.clear();
            return Err(SyntaxError::InvalidCharacter {
                offset: pos as u64,
                context: ErrorContext::AfterTopLevelValue,
                found: src.get(pos).copied(),
            }
            .into());
        }
        self.buf.write(&self.pending);
        self.pending.clear();
        self.maybe_flush()
    }

    /// Recursive-descent reformatter for `write_value`. Recursion depth is
    /// bounded by `MAX_NESTING_DEPTH` (enforced by `GrammarState::push_*`),
    /// so this never outruns a reasonable host stack.
    fn reformat_value(&mut self, src: &[u8], pos: &mut usize) -> Result<(), SyntaxError> {
        *pos += wire::consume_whitespace(&src[*pos..], false);
        let offset_before = self.output_offset() + self.pending.len() as u64;
        let b = *src.get(*pos).ok_or(SyntaxError::UnexpectedEof { offset: offset_before })?;
        match b {
            b'n' => {
                self.match_literal_at(src, pos, b"null")?;
                self.emit_literal(Kind::Null, offset_before)
            }
            b't' => {
                self.match_literal_at(src, pos, b"true")?;
                self.emit_literal(Kind::True, offset_before)
            }
            b'f' => {
                self.match_literal_at(src, pos, b"false")?;
                self.emit_literal(Kind::False, offset_before)
            }
            b'"' => self.reformat_string(src, pos),
            b'-' | b'0'..=b'9' => self.reformat_number(src, pos, offset_before),
            b'{' => self.reformat_object(src, pos),
            b'[' => self.reformat_array(src, pos),
            other => Err(SyntaxError::InvalidCharacter {
                offset: offset_before,
                context: ErrorContext::AtStartOfValue,
                found: Some(other),
            }),
        }
    }

    fn match_literal_at(&self, src: &[u8], pos: &mut usize, lit: &'static [u8]) -> Result<(), SyntaxError> {
        let offset = *pos as u64;
        if src[*pos..].len() < lit.len() {
            return Err(SyntaxError::UnexpectedEof { offset });
        }
        if &src[*pos..*pos + lit.len()] != lit {
            return Err(SyntaxError::InvalidCharacter {
                offset,
                context: ErrorContext::AtStartOfValue,
                found: Some(src[*pos]),
            });
        }
        *pos += lit.len();
        Ok(())
    }

    fn emit_literal(&mut self, kind: Kind, offset: u64) -> Result<(), SyntaxError> {
        self.append_separator(kind, false);
        self.state.append_literal_or_number(offset)?;
        self.pending.extend_from_slice(match kind {
            Kind::Null => &b"null"[..],
            Kind::True => &b"true"[..],
            Kind::False => &b"false"[..],
            _ => unreachable!(),
        });
        self.pointer.advance_index();
        Ok(())
    }

    fn reformat_number(&mut self, src: &[u8], pos: &mut usize, offset: u64) -> Result<(), SyntaxError> {
        let scan = number::consume_number(&src[*pos..], *pos as u64)?;
        let len = match scan {
            Scan::Complete(n) => n,
            Scan::Incomplete => return Err(SyntaxError::UnexpectedEof { offset: src.len() as u64 }),
        };
        let text = std::str::from_utf8(&src[*pos..*pos + len]).expect("consume_number validated ASCII digits");
        self.append_separator(Kind::Number, false);
        self.state.append_literal_or_number(offset)?;
        if self.options.canonicalize_numbers {
            let v = number::parse_float(text);
            let mut formatted = String::new();
            number::append_float(&mut formatted, v);
            self.pending.extend_from_slice(formatted.as_bytes());
        } else {
            self.pending.extend_from_slice(text.as_bytes());
        }
        self.pointer.advance_index();
        *pos += len;
        Ok(())
    }

    fn reformat_string(&mut self, src: &[u8], pos: &mut usize) -> Result<(), SyntaxError> {
        let offset = *pos as u64;
        let scan = wire::consume_string(&src[*pos..], self.options.common.allow_invalid_utf8, offset)?;
        let len = match scan {
            Scan::Complete(n) => n,
            Scan::Incomplete => return Err(SyntaxError::UnexpectedEof { offset: offset + (src.len() - *pos) as u64 }),
        };
        let quoted = &src[*pos..*pos + len];
        let mut unescaped = String::new();
        escape::append_unquote(&mut unescaped, quoted, offset, self.options.common.allow_invalid_utf8)?;
        let is_name = self.state.needs_object_name();
        if is_name {
            if let Some(names) = self.state.names_mut() {
                if !names.insert(&unescaped) {
                    return Err(SyntaxError::InvalidNamespace { offset });
                }
            }
        }
        self.append_separator(Kind::String, false);
        self.state.append_string(offset)?;
        let table = self.escape_table();
        escape::append_quote(&mut self.pending, &unescaped, &table);
        if is_name {
            self.pointer.record_name(&unescaped);
        } else {
            self.pointer.advance_index();
        }
        *pos += len;
        Ok(())
    }

    fn reformat_object(&mut self, src: &[u8], pos: &mut usize) -> Result<(), SyntaxError> {
        let offset = *pos as u64;
        self.append_separator(Kind::ObjectStart, false);
        self.state.push_object(offset)?;
        self.pointer.push_object();
        self.pending.push(b'{');
        *pos += 1;
        loop {
            *pos += wire::consume_whitespace(&src[*pos..], false);
            if src.get(*pos) == Some(&b'}') {
                *pos += 1;
                break;
            }
            self.reformat_string(src, pos)?;
            *pos += wire::consume_whitespace(&src[*pos..], false);
            if src.get(*pos) != Some(&b':') {
                return Err(SyntaxError::MissingColon { offset: *pos as u64 });
            }
            *pos += 1;
            *pos += wire::consume_whitespace(&src[*pos..], false);
            self.reformat_value(src, pos)?;
            *pos += wire::consume_whitespace(&src[*pos..], false);
            match src.get(*pos) {
                Some(b',') => *pos += 1,
                Some(b'}') => {}
                _ => {
                    return Err(SyntaxError::InvalidCharacter {
                        offset: *pos as u64,
                        context: ErrorContext::AfterObjectValue,
                        found: src.get(*pos).copied(),
                    });
                }
            }
        }
        let close_offset = self.output_offset() + self.pending.len() as u64;
        self.append_separator(Kind::ObjectEnd, true);
        self.state.pop_object(close_offset)?;
        self.pointer.pop();
        self.pending.push(b'}');
        Ok(())
    }

    fn reformat_array(&mut self, src: &[u8], pos: &mut usize) -> Result<(), SyntaxError> {
        let offset = *pos as u64;
        self.append_separator(Kind::ArrayStart, false);
        self.state.push_array(offset)?;
        self.pointer.push_array();
        self.pending.push(b'[');
        *pos += 1;
        loop {
            *pos += wire::consume_whitespace(&src[*pos..], false);
            if src.get(*pos) == Some(&b']') {
                *pos += 1;
                break;
            }
            self.reformat_value(src, pos)?;
            *pos += wire::consume_whitespace(&src[*pos..], false);
            match src.get(*pos) {
                Some(b',') => *pos += 1,
                Some(b']') => {}
                _ => {
                    return Err(SyntaxError::InvalidCharacter {
                        offset: *pos as u64,
                        context: ErrorContext::AfterArrayValue,
                        found: src.get(*pos).copied(),
                    });
                }
            }
        }
        let close_offset = self.output_offset() + self.pending.len() as u64;
        self.append_separator(Kind::ArrayEnd, true);
        self.state.pop_array(close_offset)?;
        self.pointer.pop();
        self.pending.push(b']');
        Ok(())
    }

    /// Remove the most recently written object member if its value is one
    /// of the canonical "empty" forms (`null`, `""`, `{}`, `[]`). Only valid
    /// to call immediately after writing that value inside an object.
    pub fn unwrite_empty_object_member(&mut self, prev_name: Option<&str>) -> Result<bool, JsonTextError> {
        self.flush_pending_noop();
        let committed = self.buf.bytes_clone();
        for suffix in [&b"null"[..], &b"\"\""[..], &b"{}"[..], &b"[]"[..]] {
            if committed.ends_with(suffix) {
                let value_len = suffix.len();
                let tail = &committed[..committed.len() - value_len];
                if let Some(trimmed) = trim_member(tail) {
                    self.rebuild_buf(trimmed);
                    self.pointer.restore_name(prev_name);
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Remove the sole written name from a one-length object (i.e. an
    /// object for which only a name, no value, has been written yet),
    /// returning the unquoted name.
    pub fn unwrite_only_object_member_name(&mut self) -> Result<String, JsonTextError> {
        self.flush_pending_noop();
        let committed = self.buf.bytes_clone();
        let Some(quote_start) = committed.iter().rposition(|&b| b == b'{') else {
            return Err(SyntaxError::InvalidCharacter {
                offset: self.output_offset(),
                context: ErrorContext::AtStartOfValue,
                found: None,
            }
            .into());
        };
        let tail = &committed[quote_start + 1..];
        let tail_offset = self.offset + (quote_start + 1) as u64;
        let Scan::Complete(len) = wire::consume_string(tail, self.options.common.allow_invalid_utf8, tail_offset)? else {
            return Err(SyntaxError::UnexpectedEof { offset: self.output_offset() });
        };
        let mut name = String::new();
        escape::append_unquote(&mut name, &tail[..len], 0, self.options.common.allow_invalid_utf8)?;
        self.rebuild_buf(&committed[..quote_start + 1]);
        self.pointer.restore_name(None);
        Ok(name)
    }

    fn flush_pending_noop(&mut self) {
        debug_assert!(self.pending.is_empty(), "unwrite_* must not be called mid-token");
    }

    fn rebuild_buf(&mut self, kept: &[u8]) {
        self.buf.reset();
        self.buf.write(kept);
    }

    /// Fast path for a reflective marshaler: append a string or number
    /// value whose bytes are already known to need no further validation
    /// beyond the dedup/grammar checks. For a string, `bytes` is the
    /// already-quoted form; it is written verbatim unless the active escape
    /// table requires more than it already has, in which case it's
    /// reformatted.
    pub fn append_raw(&mut self, kind: Kind, bytes: &[u8]) -> Result<(), JsonTextError> {
        self.pending.clear();
        let offset = self.output_offset();
        self.append_separator(kind, false);
        let result = match kind {
            Kind::String => self.write_raw_string_payload(bytes, offset),
            Kind::Number => match self.state.append_literal_or_number(offset) {
                Ok(()) => {
                    self.pending.extend_from_slice(bytes);
                    self.pointer.advance_index();
                    Ok(())
                }
                Err(e) => Err(e.into()),
            },
            other => unreachable!("append_raw only supports string/number, got {other:?}"),
        };
        match result {
            Ok(()) => {
                self.buf.write(&self.pending);
                self.pending.clear();
                self.maybe_flush()
            }
            Err(e) => {
                self.pending.clear();
                Err(e)
            }
        }
    }
}

/// Trim the trailing `,"name":` (or, at the start of an object, just
/// `"name":`) preceding a removed value from `tail`, returning the bytes to
/// keep. Relies on the encoder never emitting an unescaped `"` byte except
/// as a string delimiter (interior quotes are always written as `\"`).
fn trim_member(tail: &[u8]) -> Option<&[u8]> {
    let after_colon = tail.strip_suffix(b":")?;
    let close_quote = after_colon.iter().rposition(|&b| b == b'"')?;
    let open_quote = after_colon[..close_quote].iter().rposition(|&b| b == b'"')?;
    let before_name = &after_colon[..open_quote];
    Some(before_name.strip_suffix(b",").unwrap_or(before_name))
}

impl<W: Write> io::Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Encoder::flush(self).map_err(io::Error::other)
    }
}
