//! Configuration structs (§6/§6.1): plain `Copy` option bags built with
//! struct-update syntax, mirroring the teacher parser crate's
//! `ParserOptions`. No builder type, no runtime validation beyond what each
//! operation already checks.

/// Flags shared by both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextOptions {
    /// Disable per-object duplicate member-name detection.
    pub allow_duplicate_names: bool,
    /// Accept (decode) or emit (encode) `U+FFFD` in place of invalid UTF-8
    /// instead of treating it as a syntax error.
    pub allow_invalid_utf8: bool,
}

/// Options controlling [`crate::Decoder`] behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeOptions {
    /// Flags shared with [`EncodeOptions`].
    pub common: TextOptions,
}

impl DecodeOptions {
    /// Set [`TextOptions::allow_duplicate_names`].
    #[must_use]
    pub fn allow_duplicate_names(mut self, v: bool) -> Self {
        self.common.allow_duplicate_names = v;
        self
    }

    /// Set [`TextOptions::allow_invalid_utf8`].
    #[must_use]
    pub fn allow_invalid_utf8(mut self, v: bool) -> Self {
        self.common.allow_invalid_utf8 = v;
        self
    }
}

/// Options controlling [`crate::Encoder`] behavior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeOptions {
    /// Flags shared with [`DecodeOptions`].
    pub common: TextOptions,
    /// Escape `<`, `>`, `&` as `<`/`>`/`&`.
    pub escape_for_html: bool,
    /// Escape `U+2028`/`U+2029` (JS line/paragraph separators).
    pub escape_for_js: bool,
    /// Re-emit numbers in shortest-round-trip `f64` form (RFC 8785
    /// §3.2.2.3) rather than copying the input text verbatim.
    pub canonicalize_numbers: bool,
    /// Pretty-print with newlines and indentation instead of compact form.
    pub multiline: bool,
    /// Indentation unit repeated once per nesting depth under `multiline`.
    pub indent: &'static str,
    /// String prepended to every indented line under `multiline`.
    pub indent_prefix: &'static str,
    /// Emit a space after `:` in compact mode.
    pub space_after_colon: bool,
    /// Emit a space after `,` in compact mode.
    pub space_after_comma: bool,
    /// Suppress the trailing newline normally appended after each top-level
    /// value.
    pub omit_top_level_newline: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            common: TextOptions::default(),
            escape_for_html: false,
            escape_for_js: false,
            canonicalize_numbers: false,
            multiline: false,
            indent: "\t",
            indent_prefix: "",
            space_after_colon: false,
            space_after_comma: false,
            omit_top_level_newline: false,
        }
    }
}

impl EncodeOptions {
    /// Set [`TextOptions::allow_duplicate_names`].
    #[must_use]
    pub fn allow_duplicate_names(mut self, v: bool) -> Self {
        self.common.allow_duplicate_names = v;
        self
    }

    /// Set [`TextOptions::allow_invalid_utf8`].
    #[must_use]
    pub fn allow_invalid_utf8(mut self, v: bool) -> Self {
        self.common.allow_invalid_utf8 = v;
        self
    }

    /// Set [`EncodeOptions::indent`].
    #[must_use]
    pub fn with_indent(mut self, indent: &'static str) -> Self {
        self.indent = indent;
        self
    }

    /// Set [`EncodeOptions::indent_prefix`].
    #[must_use]
    pub fn with_indent_prefix(mut self, prefix: &'static str) -> Self {
        self.indent_prefix = prefix;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{DecodeOptions, EncodeOptions};

    #[test]
    fn struct_update_overrides_single_field() {
        let opts = DecodeOptions {
            common: super::TextOptions {
                allow_duplicate_names: true,
                ..Default::default()
            },
        };
        assert!(opts.common.allow_duplicate_names);
        assert!(!opts.common.allow_invalid_utf8);
    }

    #[test]
    fn encode_options_default_indent_is_tab() {
        assert_eq!(EncodeOptions::default().indent, "\t");
    }
}
