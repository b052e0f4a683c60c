//! Dialect S's top-level grammar (spec §4.2, §4.4): directives delimited by
//! `<!--#name attr="value" ... -->`, with `if`/`elif`/`else`/`endif` forming
//! the only nested construct — every other directive is a leaf.
//!
//! Grounded in the same shape `dialects::d::grammar` uses: a small typed
//! `Node`/`Clause` pair rather than a generic `parser::Match` tree, since the
//! only branching shape (`if`'s `elif`/`else` arms) is fixed. The skipper
//! reuses `parser::Cursor` and scans for the literal `<!--#` / `-->` pair,
//! the one marker pair this dialect defines (spec §6, "Markers").

use crate::error::{Error, Result};
use crate::parser::Cursor;

pub const TAG_OPEN: &str = "<!--#";
pub const TAG_CLOSE: &str = "-->";

#[derive(Debug, Clone)]
pub enum Node {
    Text(String),
    Directive(DirectiveNode),
}

/// One parsed `<!--#name attr="value" ... -->` directive. `attrs` holds
/// `(lowercased name, unquoted raw value text)` pairs in source order,
/// matching the original's attribute-parsing contract (name lowercased,
/// value interpolated later by the directive handler — `if`/`elif`'s `expr`
/// attribute is the one exception, parsed as a boolean expression instead of
/// interpolated literally).
#[derive(Debug, Clone)]
pub struct DirectiveNode {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub clauses: Vec<Clause>,
}

#[derive(Debug, Clone)]
pub struct Clause {
    pub keyword: String,
    pub attrs: Vec<(String, String)>,
    pub body: Vec<Node>,
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')
}

struct Lexer<'s> {
    cursor: Cursor<'s>,
}

enum RawToken<'s> {
    Text(&'s str),
    Directive(String, Vec<(String, String)>),
    Eof,
}

impl<'s> Lexer<'s> {
    fn new(source: &'s str) -> Self {
        Lexer { cursor: Cursor::new(source) }
    }

    fn next_token(&mut self) -> Result<RawToken<'s>> {
        match self.cursor.find(TAG_OPEN) {
            None => {
                if self.cursor.is_empty() {
                    Ok(RawToken::Eof)
                } else {
                    let text = self.cursor.rest();
                    self.cursor.advance(text.len());
                    Ok(RawToken::Text(text))
                }
            }
            Some(0) => {
                self.cursor.advance(TAG_OPEN.len());
                let rest = self.cursor.rest();
                let end = rest.find(TAG_CLOSE).ok_or_else(|| {
                    let (line, column) = self.cursor.line_col();
                    Error::parse(line, column, "unterminated SSI directive".to_string())
                })?;
                let inner = &rest[..end];
                self.cursor.advance(end + TAG_CLOSE.len());
                let (name, attrs) = parse_directive_body(inner)?;
                Ok(RawToken::Directive(name, attrs))
            }
            Some(offset) => {
                let text = &self.cursor.rest()[..offset];
                self.cursor.advance(offset);
                Ok(RawToken::Text(text))
            }
        }
    }

    fn line_col(&self) -> (usize, usize) {
        self.cursor.line_col()
    }
}

/// Splits a directive's interior (`name attr="value" ...`) into its
/// lowercased name and its attribute list.
fn parse_directive_body(inner: &str) -> Result<(String, Vec<(String, String)>)> {
    let inner = inner.trim_start();
    let mut chars = inner.char_indices().peekable();
    let name_start = match chars.peek() {
        Some(&(_, c)) if is_name_start(c) => 0,
        _ => return Err(Error::parse(0, 0, format!("malformed directive: {inner}"))),
    };
    let mut name_end = inner.len();
    for (i, c) in inner.char_indices() {
        if !is_name_char(c) {
            name_end = i;
            break;
        }
    }
    let name = inner[name_start..name_end].to_ascii_lowercase();
    let attrs = parse_attrs(&inner[name_end..])?;
    Ok((name, attrs))
}

/// Parses a whitespace-separated `name="value"` / `name='value'` /
/// `` name=`value` `` attribute list (spec §4.2: "attribute values support
/// backtick/single/double quoting"), stripping the surrounding quotes.
pub fn parse_attrs(src: &str) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    let mut rest = src.trim_start();
    while !rest.is_empty() {
        let name_end = rest
            .find(|c: char| !is_name_char(c))
            .ok_or_else(|| Error::parse(0, 0, format!("malformed attribute: {rest}")))?;
        if name_end == 0 {
            return Err(Error::parse(0, 0, format!("malformed attribute: {rest}")));
        }
        let name = rest[..name_end].to_ascii_lowercase();
        rest = rest[name_end..].trim_start();
        rest = rest
            .strip_prefix('=')
            .ok_or_else(|| Error::parse(0, 0, format!("expected '=' after attribute '{name}'")))?
            .trim_start();
        let quote = rest.chars().next().filter(|c| matches!(c, '"' | '\'' | '`'));
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

/// Parses a sequence of nodes until EOF or until a directive named in
/// `stops` is encountered.
fn parse_until(
    lexer: &mut Lexer,
    stops: &[&str],
) -> Result<(Vec<Node>, Option<(String, Vec<(String, String)>)>)> {
    let mut nodes = Vec::new();
    loop {
        match lexer.next_token()? {
            RawToken::Eof => return Ok((nodes, None)),
            RawToken::Text(t) => {
                if !t.is_empty() {
                    nodes.push(Node::Text(t.to_string()));
                }
            }
            RawToken::Directive(name, attrs) => {
                if stops.contains(&name.as_str()) {
                    return Ok((nodes, Some((name, attrs))));
                }
                if name == "if" {
                    let mut clauses = Vec::new();
                    let mut keyword = name.clone();
                    let mut current_attrs = attrs;
                    loop {
                        let (body, stop) = parse_until(lexer, &["elif", "else", "endif"])?;
                        clauses.push(Clause { keyword: keyword.clone(), attrs: current_attrs.clone(), body });
                        match stop {
                            Some((stop_name, stop_attrs)) if stop_name == "endif" => break,
                            Some((stop_name, stop_attrs)) => {
                                keyword = stop_name;
                                current_attrs = stop_attrs;
                            }
                            None => {
                                let (line, column) = lexer.line_col();
                                return Err(Error::parse(line, column, "unterminated <!--#if -->: expected <!--#endif -->".to_string()));
                            }
                        }
                    }
                    nodes.push(Node::Directive(DirectiveNode { name, attrs: Vec::new(), clauses }));
                } else {
                    nodes.push(Node::Directive(DirectiveNode { name, attrs, clauses: Vec::new() }));
                }
            }
        }
    }
}

/// Parses a whole template source into its root node list.
pub fn parse(source: &str) -> Result<Vec<Node>> {
    let mut lexer = Lexer::new(source);
    let (nodes, stop) = parse_until(&mut lexer, &[])?;
    if let Some((name, _)) = stop {
        let (line, column) = lexer.line_col();
        return Err(Error::parse(line, column, format!("unexpected <!--#{name} --> with no matching opener")));
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_text_and_leaf_directive() {
        let nodes = parse(r#"hi <!--#echo var="name" -->!"#).unwrap();
        assert_eq!(nodes.len(), 3);
        assert!(matches!(nodes[0], Node::Text(ref s) if s == "hi "));
        let Node::Directive(d) = &nodes[1] else { panic!("expected directive") };
        assert_eq!(d.name, "echo");
        assert_eq!(d.attrs, vec![("var".to_string(), "name".to_string())]);
    }

    #[test]
    fn if_else_endif_produces_two_clauses() {
        let nodes = parse(r#"<!--#if expr="$x" -->A<!--#else -->B<!--#endif -->"#).unwrap();
        let Node::Directive(d) = &nodes[0] else { panic!("expected directive") };
        assert_eq!(d.clauses.len(), 2);
        assert_eq!(d.clauses[0].keyword, "if");
        assert_eq!(d.clauses[1].keyword, "else");
    }

    #[test]
    fn attribute_values_support_all_three_quote_styles() {
        let attrs = parse_attrs(r#"a="x" b='y' c=`z`"#).unwrap();
        assert_eq!(attrs, vec![
            ("a".to_string(), "x".to_string()),
            ("b".to_string(), "y".to_string()),
            ("c".to_string(), "z".to_string()),
        ]);
    }

    #[test]
    fn unterminated_directive_is_parse_error() {
        assert!(parse("<!--#if expr=\"x\"").is_err());
    }
}
