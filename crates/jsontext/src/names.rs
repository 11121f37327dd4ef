//! Per-object duplicate-name detection and the cross-scope name/index stack
//! used to compute RFC 6901 JSON Pointers.
//!
//! [`NameSet`] is the append-only arena described in §4.5 of the spec: one
//! instance lives per open object scope, and insertion is rejected iff the
//! logical string (post-unescaping) already exists in the set. [`PointerStack`]
//! is the cross-scope structure from §4.6/§4.7: it tracks, for every open
//! scope, either the most recently written/read member name or the next
//! array index, so `stack_pointer()` can be computed in O(depth) without
//! re-walking the grammar stack's scope kinds.

/// Insertion-ordered, append-only set of object member names.
///
/// Names are compared by their *logical* (unescaped) string value. A
/// secondary sorted index is built lazily on first lookup after a batch of
/// insertions, trading a linear scan for small objects against an
/// `O(n log n)` sort for larger ones — the same amortized-growth trade the
/// spec calls out.
#[derive(Debug, Clone, Default)]
pub(crate) struct NameSet {
    /// Names in insertion order.
    names: Vec<Box<str>>,
    /// Indices into `names`, sorted by the referenced string. Rebuilt
    /// whenever `dirty` is set and a lookup is requested.
    sorted: Vec<u32>,
    dirty: bool,
}

impl NameSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn rebuild_index(&mut self) {
        self.sorted = (0..self.names.len() as u32).collect();
        self.sorted.sort_unstable_by(|&a, &b| self.names[a as usize].cmp(&self.names[b as usize]));
        self.dirty = false;
    }

    fn find(&mut self, name: &str) -> Result<usize, usize> {
        if self.dirty {
            self.rebuild_index();
        }
        self.sorted
            .binary_search_by(|&idx| self.names[idx as usize].as_ref().cmp(name))
    }

    /// Insert `name`, returning `false` if an equal name is already present.
    pub(crate) fn insert(&mut self, name: &str) -> bool {
        if self.find(name).is_ok() {
            return false;
        }
        self.names.push(name.into());
        // Small sets: keep the index in sync directly. Larger sets defer the
        // sort to the next `find`, batching inserts.
        if self.names.len() <= 16 {
            self.rebuild_index();
        } else {
            self.dirty = true;
        }
        true
    }
}

/// One frame of the cross-scope pointer-tracking stack.
#[derive(Debug, Clone)]
enum PointerFrame {
    Array { next_index: u64 },
    Object { last_name: Option<Box<str>> },
}

/// Tracks enough information, across every open scope, to render the
/// RFC 6901 pointer to the most recently produced or consumed value.
#[derive(Debug, Clone, Default)]
pub(crate) struct PointerStack {
    frames: Vec<PointerFrame>,
}

impl PointerStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reset(&mut self) {
        self.frames.clear();
    }

    pub(crate) fn push_array(&mut self) {
        self.frames.push(PointerFrame::Array { next_index: 0 });
    }

    pub(crate) fn push_object(&mut self) {
        self.frames.push(PointerFrame::Object { last_name: None });
    }

    pub(crate) fn pop(&mut self) {
        self.frames.pop();
    }

    /// Record that the innermost object scope just wrote/read `name`.
    pub(crate) fn record_name(&mut self, name: &str) {
        if let Some(PointerFrame::Object { last_name }) = self.frames.last_mut() {
            *last_name = Some(name.into());
        }
    }

    /// Advance the innermost array scope's next index (called after each
    /// array element is produced or consumed).
    pub(crate) fn advance_index(&mut self) {
        if let Some(PointerFrame::Array { next_index }) = self.frames.last_mut() {
            *next_index += 1;
        }
    }

    /// Restore the innermost object scope's last-written name, used by
    /// `unwrite_empty_object_member` to put back the name that preceded the
    /// member being removed.
    pub(crate) fn restore_name(&mut self, name: Option<&str>) {
        if let Some(PointerFrame::Object { last_name }) = self.frames.last_mut() {
            *last_name = name.map(Into::into);
        }
    }

    /// Render the RFC 6901 pointer to the most recently produced/consumed
    /// value, escaping `~` as `~0` and `/` as `~1` in each reference token.
    pub(crate) fn pointer(&self) -> String {
        let mut out = String::new();
        for frame in &self.frames {
            out.push('/');
            match frame {
                PointerFrame::Array { next_index } => {
                    // The pointer to the *last produced* element is one
                    // behind the next index to be written/read.
                    let idx = next_index.saturating_sub(1);
                    out.push_str(&idx.to_string());
                }
                PointerFrame::Object { last_name } => {
                    if let Some(name) = last_name {
                        for ch in name.chars() {
                            match ch {
                                '~' => out.push_str("~0"),
                                '/' => out.push_str("~1"),
                                other => out.push(other),
                            }
                        }
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{NameSet, PointerStack};

    #[test]
    fn name_set_rejects_duplicates() {
        let mut set = NameSet::new();
        assert!(set.insert("a"));
        assert!(set.insert("b"));
        assert!(!set.insert("a"));
        assert!(set.insert("c"));
    }

    #[test]
    fn name_set_amortized_growth_still_dedups() {
        let mut set = NameSet::new();
        for i in 0..64 {
            assert!(set.insert(&i.to_string()));
        }
        assert!(!set.insert("10"));
        assert!(!set.insert("63"));
    }

    #[test]
    fn pointer_stack_renders_object_then_array() {
        let mut stack = PointerStack::new();
        stack.push_object();
        stack.record_name("a");
        stack.push_array();
        stack.advance_index();
        stack.advance_index();
        assert_eq!(stack.pointer(), "/a/1");
    }

    #[test]
    fn pointer_stack_escapes_tilde_and_slash() {
        let mut stack = PointerStack::new();
        stack.push_object();
        stack.record_name("a/b~c");
        assert_eq!(stack.pointer(), "/a~1b~0c");
    }

    #[test]
    fn pointer_stack_restore_name_after_unwrite() {
        let mut stack = PointerStack::new();
        stack.push_object();
        stack.record_name("first");
        stack.record_name("second");
        stack.restore_name(Some("first"));
        assert_eq!(stack.pointer(), "/first");
    }
}
