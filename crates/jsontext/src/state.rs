//! The grammar pushdown state machine shared by the encoder and decoder.
//!
//! A [`GrammarState`] is a stack of [`Scope`] frames, one per nesting level,
//! tracking whether the next token may be a name, a value, or a close
//! delimiter, and (for object scopes) the set of member names already
//! written so duplicates can be rejected. This mirrors the teacher parser
//! crate's `ParseState` enum, generalized from a single current state to a
//! stack so nested objects/arrays are tracked precisely rather than by a
//! single flat state.

use crate::error::SyntaxError;
use crate::names::NameSet;

/// Maximum nesting depth before `push_object`/`push_array` fail.
pub const MAX_NESTING_DEPTH: usize = 10_000;

/// A one-byte tag identifying the kind of value at the current position.
///
/// `Invalid` (`0`) is used both for "no token yet" and to normalize any
/// numeric lead byte (`-` or a digit) before a number has been fully lexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    Invalid = 0,
    Null = b'n',
    False = b'f',
    True = b't',
    String = b'"',
    Number = b'0',
    ObjectStart = b'{',
    ObjectEnd = b'}',
    ArrayStart = b'[',
    ArrayEnd = b']',
}

impl Kind {
    /// The byte this kind is tagged with.
    #[must_use]
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Classify a lead byte as it would appear at the start of a token.
    ///
    /// Any digit or `-` normalizes to [`Kind::Number`] (`'0'`), matching the
    /// numeric-kind normalization in the data model.
    #[must_use]
    pub fn from_lead_byte(b: u8) -> Self {
        match b {
            b'n' => Self::Null,
            b'f' => Self::False,
            b't' => Self::True,
            b'"' => Self::String,
            b'{' => Self::ObjectStart,
            b'}' => Self::ObjectEnd,
            b'[' => Self::ArrayStart,
            b']' => Self::ArrayEnd,
            b'-' | b'0'..=b'9' => Self::Number,
            _ => Self::Invalid,
        }
    }

    /// Whether this kind can begin a value (as opposed to only a close
    /// delimiter).
    #[must_use]
    pub fn is_value_start(self) -> bool {
        matches!(
            self,
            Self::Null | Self::False | Self::True | Self::String | Self::Number | Self::ObjectStart | Self::ArrayStart
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScopeKind {
    Top,
    Array,
    Object,
}

#[derive(Debug, Clone)]
pub(crate) struct Scope {
    pub(crate) kind: ScopeKind,
    pub(crate) length: u64,
    /// Present only for `ScopeKind::Object`; `None` when
    /// `allow_duplicate_names` disables namespace tracking.
    pub(crate) names: Option<NameSet>,
}

impl Scope {
    fn top() -> Self {
        Self {
            kind: ScopeKind::Top,
            length: 0,
            names: None,
        }
    }

    /// True at an object scope positioned to accept a member name (i.e. an
    /// even number of tokens have been written so far).
    fn needs_object_name(&self) -> bool {
        self.kind == ScopeKind::Object && self.length % 2 == 0
    }
}

/// The pushdown stack of open scopes, plus the running byte offset used to
/// stamp errors and to compute `need_delim`.
#[derive(Debug, Clone)]
pub struct GrammarState {
    pub(crate) stack: Vec<Scope>,
    allow_duplicate_names: bool,
}

impl GrammarState {
    /// A fresh state at the top level, with no scopes open.
    #[must_use]
    pub fn new(allow_duplicate_names: bool) -> Self {
        Self {
            stack: vec![Scope::top()],
            allow_duplicate_names,
        }
    }

    /// Discard all open scopes, returning to the top level.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.stack.push(Scope::top());
    }

    /// Number of currently open composite scopes (the sentinel top scope is
    /// not counted).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    /// Number of tokens written/read in the innermost scope.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.stack.last().map_or(0, |s| s.length)
    }

    #[must_use]
    pub(crate) fn top(&self) -> &Scope {
        self.stack.last().expect("sentinel top scope always present")
    }

    fn top_mut(&mut self) -> &mut Scope {
        self.stack.last_mut().expect("sentinel top scope always present")
    }

    /// True when the innermost scope is an object expecting a member name
    /// next (rather than a value).
    #[must_use]
    pub fn needs_object_name(&self) -> bool {
        self.top().needs_object_name()
    }

    /// True when the innermost scope is an object expecting a member value
    /// next.
    #[must_use]
    pub fn needs_object_value(&self) -> bool {
        self.top().kind == ScopeKind::Object && self.top().length % 2 == 1
    }

    /// Whether a `,` or `:` must precede the next token of kind `next_kind`,
    /// given the innermost scope's state.
    ///
    /// `next_kind` matters in exactly one case: a close delimiter that
    /// matches the innermost scope never needs a preceding separator, no
    /// matter how many members/elements came before it (the closing `}`/`]`
    /// itself is the final token, not one more member).
    #[must_use]
    pub fn need_delim(&self, next_kind: Kind) -> Option<u8> {
        let top = self.top();
        let closes_this_scope = matches!(
            (top.kind, next_kind),
            (ScopeKind::Object, Kind::ObjectEnd) | (ScopeKind::Array, Kind::ArrayEnd)
        );
        if closes_this_scope {
            return None;
        }
        match top.kind {
            ScopeKind::Top => None,
            ScopeKind::Array => (top.length > 0).then_some(b','),
            ScopeKind::Object => {
                if top.length % 2 == 1 {
                    Some(b':')
                } else {
                    (top.length > 0).then_some(b',')
                }
            }
        }
    }

    fn check_value_position(&self, offset: u64) -> Result<(), SyntaxError> {
        if self.needs_object_name() {
            return Err(SyntaxError::MissingName { offset });
        }
        Ok(())
    }

    /// Record a scalar value (literal or number) at the current position.
    pub(crate) fn append_literal_or_number(&mut self, offset: u64) -> Result<(), SyntaxError> {
        if self.top().kind == ScopeKind::Top && self.top().length > 0 {
            return Err(SyntaxError::InvalidCharacter {
                offset,
                context: crate::error::ErrorContext::AfterTopLevelValue,
                found: None,
            });
        }
        self.check_value_position(offset)?;
        self.top_mut().length += 1;
        Ok(())
    }

    /// Record a string value, which may legally appear at a name position
    /// (becoming the member name) or a value position.
    pub(crate) fn append_string(&mut self, offset: u64) -> Result<(), SyntaxError> {
        if self.top().kind == ScopeKind::Top && self.top().length > 0 {
            return Err(SyntaxError::InvalidCharacter {
                offset,
                context: crate::error::ErrorContext::AfterTopLevelValue,
                found: None,
            });
        }
        self.top_mut().length += 1;
        Ok(())
    }

    /// Push a new object scope. Fails if the depth limit would be exceeded
    /// or if a value is not expected here.
    pub(crate) fn push_object(&mut self, offset: u64) -> Result<(), SyntaxError> {
        self.check_value_position(offset)?;
        if self.stack.len() > MAX_NESTING_DEPTH {
            return Err(SyntaxError::MaxDepth { offset });
        }
        self.top_mut().length += 1;
        self.stack.push(Scope {
            kind: ScopeKind::Object,
            length: 0,
            names: if self.allow_duplicate_names {
                None
            } else {
                Some(NameSet::new())
            },
        });
        Ok(())
    }

    pub(crate) fn push_array(&mut self, offset: u64) -> Result<(), SyntaxError> {
        self.check_value_position(offset)?;
        if self.stack.len() > MAX_NESTING_DEPTH {
            return Err(SyntaxError::MaxDepth { offset });
        }
        self.top_mut().length += 1;
        self.stack.push(Scope {
            kind: ScopeKind::Array,
            length: 0,
            names: None,
        });
        Ok(())
    }

    pub(crate) fn pop_object(&mut self, offset: u64) -> Result<(), SyntaxError> {
        let top = self.top();
        if top.kind != ScopeKind::Object {
            return Err(SyntaxError::MismatchedDelim {
                offset,
                open: self.open_kind(),
                close: Kind::ObjectEnd,
            });
        }
        if top.length % 2 != 0 {
            return Err(SyntaxError::MissingColon { offset });
        }
        self.stack.pop();
        Ok(())
    }

    pub(crate) fn pop_array(&mut self, offset: u64) -> Result<(), SyntaxError> {
        if self.top().kind != ScopeKind::Array {
            return Err(SyntaxError::MismatchedDelim {
                offset,
                open: self.open_kind(),
                close: Kind::ArrayEnd,
            });
        }
        self.stack.pop();
        Ok(())
    }

    fn open_kind(&self) -> Kind {
        match self.top().kind {
            ScopeKind::Top => Kind::Invalid,
            ScopeKind::Array => Kind::ArrayStart,
            ScopeKind::Object => Kind::ObjectStart,
        }
    }

    /// Per-object duplicate-name set for the innermost scope, if namespace
    /// tracking is active there.
    pub(crate) fn names_mut(&mut self) -> Option<&mut NameSet> {
        self.stack.last_mut().and_then(|s| s.names.as_mut())
    }

    /// The opening delimiter kind and token count for the `i`th stack entry,
    /// where `0` is the top-level scope. Returns `(Kind::Invalid, 0)` if `i`
    /// is at or beyond the current depth.
    #[must_use]
    pub fn stack_index(&self, i: usize) -> (Kind, i64) {
        match self.stack.get(i) {
            Some(scope) => {
                let kind = match scope.kind {
                    ScopeKind::Top => Kind::Invalid,
                    ScopeKind::Array => Kind::ArrayStart,
                    ScopeKind::Object => Kind::ObjectStart,
                };
                (kind, scope.length as i64)
            }
            None => (Kind::Invalid, 0),
        }
    }
}
