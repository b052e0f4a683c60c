//! Dialect T's top-level grammar (spec §4.2): `<TMPL_NAME attr=...>`,
//! `<TMPL_NAME NAME=...>`, `</TMPL_NAME>`, and `<!-- TMPL_... -->` as an
//! alternate spelling of the same tags; names are matched case-insensitively.
//!
//! Grounded in the same shape `dialects::s::grammar` uses (a small typed
//! `Node` tree with a hand-written `Cursor`-based lexer, no generic
//! `parser::Match` tree) since, like dialect S, the only nested shape here
//! (`TMPL_IF`'s `TMPL_ELSE` arm) is fixed and known ahead of time.

use crate::error::{Error, Result};
use crate::parser::Cursor;

#[derive(Debug, Clone)]
pub enum Node {
    Text(String),
    Var(VarNode),
    Include(IncludeNode),
    If(IfNode),
    Unless(UnlessNode),
    Loop(LoopNode),
}

#[derive(Debug, Clone)]
pub struct VarNode {
    pub name: String,
    pub default: Option<String>,
    pub escape: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IncludeNode {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct IfNode {
    pub name: String,
    pub body: Vec<Node>,
    pub else_body: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct UnlessNode {
    pub name: String,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone)]
pub struct LoopNode {
    pub name: String,
    pub body: Vec<Node>,
}

/// Parse-time configuration: dialect T's `shortcut_syntax` is fixed at
/// construction of the original `HTML::Template` object, not per-render, so
/// it is a parameter to `parse`/`Template::parse_source_with` rather than a
/// field on the render-time `Options` (spec §9 Open Questions: "encoded at
/// type-construction time" — we keep it there, unlike `case_sensitive`,
/// which genuinely can vary per render and is handled in `context::Context`
/// instead).
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// When set, `<TMPL_VAR foo>` is accepted as shorthand for
    /// `<TMPL_VAR NAME=foo>` (spec §4.2). Defaults to on, matching
    /// `HTML::Template`'s documented default.
    pub shortcut_syntax: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions { shortcut_syntax: true }
    }
}

struct Lexer<'s> {
    cursor: Cursor<'s>,
}

enum RawTag {
    Open { name: String, attrs: Vec<(String, String)> },
    Close { name: String },
}

enum RawToken<'s> {
    Text(&'s str),
    Tag(RawTag),
    Eof,
}

/// Finds the next tag opener — `<` or `<!--` immediately followed by
/// (optional whitespace,) an optional `/`, then `TMPL_` case-insensitively —
/// returning its byte offset from `cursor`'s current position and whether it
/// used the comment spelling.
fn find_next_tag(rest: &str) -> Option<usize> {
    let bytes = rest.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'<' {
            if looks_like_tag_start(&rest[i..]) {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

fn looks_like_tag_start(s: &str) -> bool {
    let s = s.strip_prefix('<').unwrap_or(s);
    let s = s.strip_prefix("!--").unwrap_or(s).trim_start();
    let s = s.strip_prefix('/').unwrap_or(s);
    s.len() >= 5 && s[..5].eq_ignore_ascii_case("tmpl_")
}

impl<'s> Lexer<'s> {
    fn new(source: &'s str) -> Self {
        Lexer { cursor: Cursor::new(source) }
    }

    fn next_token(&mut self) -> Result<RawToken<'s>> {
        let rest = self.cursor.rest();
        if rest.is_empty() {
            return Ok(RawToken::Eof);
        }
        match find_next_tag(rest) {
            None => {
                self.cursor.advance(rest.len());
                Ok(RawToken::Text(rest))
            }
            Some(0) => {
                let tag = self.consume_tag()?;
                Ok(RawToken::Tag(tag))
            }
            Some(offset) => {
                let text = &rest[..offset];
                self.cursor.advance(offset);
                Ok(RawToken::Text(text))
            }
        }
    }

    /// Consumes one tag starting at the cursor's current position (already
    /// known, via `find_next_tag`, to be a `TMPL_` opener), in whichever of
    /// the two spellings it used.
    fn consume_tag(&mut self) -> Result<RawTag> {
        let comment_form = self.cursor.starts_with("<!--");
        if comment_form {
            self.cursor.advance(4);
        } else {
            self.cursor.advance(1);
        }
        // skip whitespace the comment form permits before the name.
        let trimmed = self.cursor.rest().trim_start();
        self.cursor.advance(self.cursor.rest().len() - trimmed.len());
        let closing = self.cursor.starts_with("/");
        if closing {
            self.cursor.advance(1);
        }
        debug_assert!(self.cursor.rest()[..5].eq_ignore_ascii_case("tmpl_"));
        let rest = self.cursor.rest();
        let close_marker = if comment_form { "-->" } else { ">" };
        let end = rest.find(close_marker).ok_or_else(|| {
            let (line, column) = self.cursor.line_col();
            Error::parse(line, column, "unterminated TMPL tag".to_string())
        })?;
        let inner = rest[..end].trim_end();
        self.cursor.advance(end + close_marker.len());
        if closing {
            return Ok(RawTag::Close { name: inner.trim().to_ascii_uppercase() });
        }
        let (name, attr_src) = split_name(inner);
        let attrs = parse_attrs(attr_src)?;
        Ok(RawTag::Open { name: name.to_ascii_uppercase(), attrs })
    }

    fn line_col(&self) -> (usize, usize) {
        self.cursor.line_col()
    }
}

fn split_name(inner: &str) -> (&str, &str) {
    match inner.find(|c: char| c.is_whitespace()) {
        Some(i) => (&inner[..i], inner[i..].trim_start()),
        None => (inner, ""),
    }
}

fn is_attr_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

/// Parses a whitespace-separated `NAME=value` / `NAME="value"` /
/// `NAME='value'` attribute list, or — when no `=` is found on the first
/// token and nothing follows — a bare shortcut-syntax name (returned as a
/// single `("", name)` pair the caller recognizes).
fn parse_attrs(src: &str) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    let mut rest = src.trim();
    if rest.is_empty() {
        return Ok(out);
    }
    // Shortcut syntax (spec §4.2): a leading bare token not immediately
    // followed by '=' is the tag's NAME, and any further `KEY=value` pairs
    // (e.g. a trailing `DEFAULT="..."`) still parse normally afterward —
    // spec scenario 6 relies on exactly this combination.
    let tok_end = rest.find(|c: char| !is_attr_name_char(c)).unwrap_or(rest.len());
    if tok_end > 0 {
        let after = rest[tok_end..].trim_start();
        if !after.starts_with('=') {
            out.push(("".to_string(), rest[..tok_end].to_string()));
            rest = after;
        }
    }
    while !rest.is_empty() {
        let name_end = rest.find(|c: char| !is_attr_name_char(c)).unwrap_or(rest.len());
        if name_end == 0 {
            return Err(Error::parse(0, 0, format!("malformed TMPL attribute: {rest}")));
        }
        let name = rest[..name_end].to_ascii_uppercase();
        rest = rest[name_end..].trim_start();
        rest = rest
            .strip_prefix('=')
            .ok_or_else(|| Error::parse(0, 0, format!("expected '=' after attribute '{name}'")))?
            .trim_start();
        let quote = rest.chars().next().filter(|c| matches!(c, '"' | '\''));
        let value = if let Some(q) = quote {
            let body = &rest[1..];
            let end = body
                .find(q)
                .ok_or_else(|| Error::parse(0, 0, format!("unterminated attribute value for '{name}'")))?;
            let value = body[..end].to_string();
            rest = body[end + 1..].trim_start();
            value
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            let value = rest[..end].to_string();
            rest = rest[end..].trim_start();
            value
        };
        out.push((name, value));
    }
    Ok(out)
}

fn attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Resolves an attribute list (possibly shortcut-syntax) into the tag's
/// `NAME=` value.
fn name_of(attrs: &[(String, String)], shortcut_syntax: bool) -> Result<String> {
    if let Some(v) = attr(attrs, "NAME") {
        return Ok(v.to_string());
    }
    if shortcut_syntax {
        if let Some((_, v)) = attrs.iter().find(|(k, _)| k.is_empty()) {
            return Ok(v.clone());
        }
    }
    Err(Error::MissingArgument)
}

fn parse_until(
    lexer: &mut Lexer,
    stop_names: &[&str],
    opts: ParseOptions,
) -> Result<(Vec<Node>, Option<String>)> {
    let mut nodes = Vec::new();
    loop {
        match lexer.next_token()? {
            RawToken::Eof => return Ok((nodes, None)),
            RawToken::Text(t) => {
                if !t.is_empty() {
                    nodes.push(Node::Text(t.to_string()));
                }
            }
            RawToken::Tag(RawTag::Close { name }) => {
                if stop_names.contains(&name.as_str()) {
                    return Ok((nodes, Some(name)));
                }
                let (line, column) = lexer.line_col();
                return Err(Error::parse(line, column, format!("unexpected </{name}> with no matching opener")));
            }
            RawToken::Tag(RawTag::Open { name, attrs }) => {
                match name.as_str() {
                    "TMPL_VAR" => nodes.push(Node::Var(VarNode {
                        name: name_of(&attrs, opts.shortcut_syntax)?,
                        default: attr(&attrs, "DEFAULT").map(str::to_string),
                        escape: attr(&attrs, "ESCAPE").map(str::to_string),
                    })),
                    "TMPL_INCLUDE" => nodes.push(Node::Include(IncludeNode {
                        name: name_of(&attrs, opts.shortcut_syntax)?,
                    })),
                    "TMPL_IF" => {
                        let cond_name = name_of(&attrs, opts.shortcut_syntax)?;
                        let (body, stop) = parse_until(lexer, &["TMPL_IF", "TMPL_ELSE"], opts)?;
                        let else_body = match stop.as_deref() {
                            Some("TMPL_ELSE") => {
                                let (else_body, stop2) = parse_until(lexer, &["TMPL_IF"], opts)?;
                                if stop2.is_none() {
                                    let (line, column) = lexer.line_col();
                                    return Err(Error::parse(line, column, "unterminated <TMPL_IF>: expected </TMPL_IF>".to_string()));
                                }
                                else_body
                            }
                            Some("TMPL_IF") => Vec::new(),
                            _ => {
                                let (line, column) = lexer.line_col();
                                return Err(Error::parse(line, column, "unterminated <TMPL_IF>: expected </TMPL_IF>".to_string()));
                            }
                        };
                        nodes.push(Node::If(IfNode { name: cond_name, body, else_body }));
                    }
                    "TMPL_UNLESS" => {
                        let cond_name = name_of(&attrs, opts.shortcut_syntax)?;
                        let (body, stop) = parse_until(lexer, &["TMPL_UNLESS"], opts)?;
                        if stop.is_none() {
                            let (line, column) = lexer.line_col();
                            return Err(Error::parse(line, column, "unterminated <TMPL_UNLESS>: expected </TMPL_UNLESS>".to_string()));
                        }
                        nodes.push(Node::Unless(UnlessNode { name: cond_name, body }));
                    }
                    "TMPL_LOOP" => {
                        let loop_name = name_of(&attrs, opts.shortcut_syntax)?;
                        let (body, stop) = parse_until(lexer, &["TMPL_LOOP"], opts)?;
                        if stop.is_none() {
                            let (line, column) = lexer.line_col();
                            return Err(Error::parse(line, column, "unterminated <TMPL_LOOP>: expected </TMPL_LOOP>".to_string()));
                        }
                        nodes.push(Node::Loop(LoopNode { name: loop_name, body }));
                    }
                    "TMPL_ELSE" => {
                        if stop_names.contains(&"TMPL_ELSE") {
                            return Ok((nodes, Some("TMPL_ELSE".to_string())));
                        }
                        let (line, column) = lexer.line_col();
                        return Err(Error::parse(line, column, "<TMPL_ELSE> outside of <TMPL_IF>".to_string()));
                    }
                    other => {
                        let (line, column) = lexer.line_col();
                        return Err(Error::parse(line, column, format!("unknown tag <{other}>")));
                    }
                }
            }
        }
    }
}

pub fn parse(source: &str, opts: ParseOptions) -> Result<Vec<Node>> {
    let mut lexer = Lexer::new(source);
    let (nodes, stop) = parse_until(&mut lexer, &[], opts)?;
    if let Some(name) = stop {
        let (line, column) = lexer.line_col();
        return Err(Error::parse(line, column, format!("unexpected </{name}> with no matching opener")));
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_var_with_default_scenario_from_spec() {
        let nodes = parse(
            "<TMPL_LOOP items><TMPL_VAR name DEFAULT=\"?\">,</TMPL_LOOP>",
            ParseOptions::default(),
        )
        .unwrap();
        let Node::Loop(lp) = &nodes[0] else { panic!("expected loop") };
        assert_eq!(lp.name, "items");
        let Node::Var(v) = &lp.body[0] else { panic!("expected var") };
        assert_eq!(v.name, "name");
        assert_eq!(v.default.as_deref(), Some("?"));
    }

    #[test]
    fn explicit_name_attribute_also_works() {
        let nodes = parse("<TMPL_VAR NAME=x>", ParseOptions::default()).unwrap();
        let Node::Var(v) = &nodes[0] else { panic!("expected var") };
        assert_eq!(v.name, "x");
    }

    #[test]
    fn comment_spelling_is_equivalent() {
        let nodes = parse("<!-- TMPL_VAR NAME=x -->", ParseOptions::default()).unwrap();
        assert!(matches!(&nodes[0], Node::Var(v) if v.name == "x"));
    }

    #[test]
    fn if_else_endif_produces_both_arms() {
        let nodes = parse("<TMPL_IF x>A<TMPL_ELSE>B</TMPL_IF>", ParseOptions::default()).unwrap();
        let Node::If(ifn) = &nodes[0] else { panic!("expected if") };
        assert!(matches!(&ifn.body[0], Node::Text(s) if s == "A"));
        assert!(matches!(&ifn.else_body[0], Node::Text(s) if s == "B"));
    }

    #[test]
    fn names_are_case_insensitive() {
        let nodes = parse("<tmpl_var name=x>", ParseOptions::default()).unwrap();
        assert!(matches!(&nodes[0], Node::Var(v) if v.name == "x"));
    }

    #[test]
    fn shortcut_syntax_can_be_disabled() {
        let opts = ParseOptions { shortcut_syntax: false };
        assert!(parse("<TMPL_VAR x>", opts).is_err());
        assert!(parse("<TMPL_VAR NAME=x>", opts).is_ok());
    }
}
