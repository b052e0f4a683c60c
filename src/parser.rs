//! Lexing primitives shared by all three dialects' `grammar` modules:
//! a byte-offset `Cursor`, the marker skipper every dialect's "plain text"
//! rule uses, and line/column computation for `Error::ParseError`.
//!
//! An earlier revision of this crate also carried a generic `RuleId`/`Match`
//! tree modeled directly on spec §4.2's "match tree... nodes identified by
//! grammar-rule identity" and its `unnest`/`select_nested`/`is`/`get_match`
//! helpers. It was removed: every dialect's `grammar` module builds its own
//! concrete, typed `Node`/`Clause` tree instead (`dialects::d::grammar::Node`,
//! `dialects::s::grammar::Node`, `dialects::t::grammar::Node`) and dispatches
//! on those types directly (`tags.rs` matches `tag.name.as_str()`), because
//! each dialect's nesting shape (an `if`'s `elif`/`else` arms, a `for`'s
//! `empty` arm, dialect S's `if`/`elif`/`else`/`endif` state machine) is one
//! of a small fixed set known ahead of parse time — a generic rule-id handle
//! plus a runtime dispatch table bought nothing over a typed enum the
//! compiler already checks exhaustively, and nothing in any dialect ever
//! needed the generic form. Only the primitives genuinely shared across all
//! three lexers — `Cursor`, `find_next_marker`, `line_col` — stayed here; see
//! DESIGN.md and SPEC_FULL.md §C for the full account.

/// A cursor over source bytes, used while lexing. Tracks only a byte offset;
/// line/column are computed on demand for error reporting, since templates
/// are parsed whole and errors are rare relative to successful scans.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'s> {
    source: &'s str,
    pos: usize,
}

impl<'s> Cursor<'s> {
    pub fn new(source: &'s str) -> Self {
        Cursor { source, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn source(&self) -> &'s str {
        self.source
    }

    pub fn rest(&self) -> &'s str {
        &self.source[self.pos..]
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.source.len()
    }

    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.source.len());
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn starts_with(&self, pat: &str) -> bool {
        self.rest().starts_with(pat)
    }

    pub fn find(&self, pat: &str) -> Option<usize> {
        self.rest().find(pat)
    }

    /// 1-based `(line, column)` of the current position.
    pub fn line_col(&self) -> (usize, usize) {
        line_col(self.source, self.pos)
    }

    /// A short snippet starting at the current position, for error messages.
    pub fn snippet(&self, max_chars: usize) -> String {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        rest[..end].replace('\n', "\\n")
    }
}

/// 1-based `(line, column)` of byte offset `pos` within `source`.
pub fn line_col(source: &str, pos: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for ch in source[..pos.min(source.len())].chars() {
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// The skipper: scans forward from `cursor` for the nearest occurrence of any
/// marker in `markers`, returning its index into `markers` and its byte
/// offset from the cursor's current position. Each dialect's top-level
/// `plain` rule uses this to find where plain text ends.
pub fn find_next_marker(cursor: &Cursor, markers: &[&str]) -> Option<(usize, usize)> {
    markers
        .iter()
        .enumerate()
        .filter_map(|(i, m)| cursor.find(m).map(|off| (i, off)))
        .min_by_key(|&(_, off)| off)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_line_col_counts_newlines() {
        let src = "a\nb\nc";
        assert_eq!(line_col(src, 0), (1, 1));
        assert_eq!(line_col(src, 2), (2, 1));
        assert_eq!(line_col(src, 4), (3, 1));
    }

    #[test]
    fn find_next_marker_picks_nearest() {
        let cursor = Cursor::new("plain {% tag %} {{ var }}");
        let (idx, off) = find_next_marker(&cursor, &["{{", "{%", "{#"]).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(off, 6);
    }
}
