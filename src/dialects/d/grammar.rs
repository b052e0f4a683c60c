//! Dialect D's top-level grammar (spec §4.2): turns source text into a
//! `Node` tree of plain text, variable output, and tags.
//!
//! Grounded in the same shape as `expr.rs`'s choice to parse directly into a
//! concrete tree rather than a generic `parser::Match`: a block tag's
//! structure (an `if`'s `elif`/`else` arms, a `for`'s `empty` arm) is a
//! handful of fixed shapes, so a small typed `Node`/`Clause` pair plays the
//! role the design notes assign to "a dispatch table keyed by rule handle"
//! without a separate interpretation pass. The skipper itself — scanning for
//! the next marker among `{{`, `{%`, `{#` — reuses `parser::find_next_marker`
//! and `parser::Cursor`, the primitive genuinely shared with dialects S and T.

use crate::error::{Error, Result};
use crate::parser::{find_next_marker, Cursor};

use super::expr::{parse_pipeline, Pipeline};

pub const MARKERS: &[(&str, &str)] = &[("{{", "}}"), ("{%", "%}"), ("{#", "#}")];

#[derive(Debug, Clone)]
pub enum Node {
    Text(String),
    Variable(Pipeline),
    Tag(TagNode),
}

/// One parsed tag, e.g. `{% if x %}...{% elif y %}...{% else %}...{% endif %}`.
/// `clauses` holds one entry per branch keyword (`if`, `elif`, `else`, `for`,
/// `empty`, ...); leaf tags with no body have a single clause whose `body` is
/// empty.
#[derive(Debug, Clone)]
pub struct TagNode {
    pub name: String,
    pub args: String,
    pub clauses: Vec<Clause>,
}

#[derive(Debug, Clone)]
pub struct Clause {
    pub keyword: String,
    pub args: String,
    pub body: Vec<Node>,
}

/// `(end tag name, inner separator keywords)` for every tag that opens a body.
/// Leaf tags (not listed here) consume only their own `{% name args %}` span.
fn block_spec(name: &str) -> Option<(&'static str, &'static [&'static str])> {
    Some(match name {
        "if" => ("endif", &["elif", "else"] as &[&str]),
        "ifequal" => ("endifequal", &["else"]),
        "ifnotequal" => ("endifnotequal", &["else"]),
        "ifchanged" => ("endifchanged", &["else"]),
        "for" => ("endfor", &["empty"]),
        "block" => ("endblock", &[]),
        "with" => ("endwith", &[]),
        "autoescape" => ("endautoescape", &[]),
        "filter" => ("endfilter", &[]),
        "spaceless" => ("endspaceless", &[]),
        "comment" => ("endcomment", &[]),
        "verbatim" => ("endverbatim", &[]),
        "blocktrans" => ("endblocktrans", &["plural"]),
        _ => return None,
    })
}

struct Lexer<'s> {
    cursor: Cursor<'s>,
}

enum RawToken<'s> {
    Text(&'s str),
    Variable(&'s str),
    TagOpen(&'s str, &'s str),
    Eof,
}

impl<'s> Lexer<'s> {
    fn new(source: &'s str) -> Self {
        Lexer { cursor: Cursor::new(source) }
    }

    /// Returns the next token without consuming plain text that belongs to
    /// a caller-visible `Node::Text`, which the parser pushes itself.
    fn next_token(&mut self) -> Result<RawToken<'s>> {
        let markers: Vec<&str> = MARKERS.iter().map(|(open, _)| *open).collect();
        match find_next_marker(&self.cursor, &markers) {
            None => {
                if self.cursor.is_empty() {
                    Ok(RawToken::Eof)
                } else {
                    let text = self.cursor.rest();
                    self.cursor.advance(text.len());
                    Ok(RawToken::Text(text))
                }
            }
            Some((idx, offset)) => {
                if offset > 0 {
                    let text = &self.cursor.rest()[..offset];
                    self.cursor.advance(offset);
                    return Ok(RawToken::Text(text));
                }
                let (open, close) = MARKERS[idx];
                self.cursor.advance(open.len());
                let rest = self.cursor.rest();
                let end = rest.find(close).ok_or_else(|| {
                    let (line, column) = self.cursor.line_col();
                    Error::parse(line, column, format!("unterminated '{open}'"))
                })?;
                let inner = &rest[..end];
                self.cursor.advance(end + close.len());
                if open == "{{" {
                    Ok(RawToken::Variable(inner.trim()))
                } else if open == "{%" {
                    Ok(RawToken::TagOpen(open, inner.trim()))
                } else {
                    // comment: caller discards
                    self.next_token()
                }
            }
        }
    }

    fn line_col(&self) -> (usize, usize) {
        self.cursor.line_col()
    }
}

/// Splits `{% name args %}`'s interior into the tag name and its raw
/// argument text.
fn split_tag(inner: &str) -> (String, String) {
    match inner.find(char::is_whitespace) {
        Some(i) => (inner[..i].to_string(), inner[i..].trim().to_string()),
        None => (inner.to_string(), String::new()),
    }
}

/// Parses the verbatim body: raw text up to the matching `{% endverbatim %}`
/// (optionally `{% endverbatim name %}`), with no nested parsing at all —
/// spec §4.3 lists `verbatim` precisely so templates can emit literal `{{ }}`.
fn parse_verbatim_body(lexer: &mut Lexer) -> Result<String> {
    let mut out = String::new();
    loop {
        match lexer.next_token()? {
            RawToken::Eof => {
                let (line, column) = lexer.line_col();
                return Err(Error::parse(line, column, "unterminated {% verbatim %}".to_string()));
            }
            RawToken::Text(t) => out.push_str(t),
            RawToken::Variable(v) => {
                out.push_str("{{ ");
                out.push_str(v);
                out.push_str(" }}");
            }
            RawToken::TagOpen(_, inner) => {
                let (name, _) = split_tag(inner);
                if name == "endverbatim" {
                    return Ok(out);
                }
                out.push_str("{% ");
                out.push_str(inner);
                out.push_str(" %}");
            }
        }
    }
}

/// Parses a sequence of nodes until EOF or until a tag whose name is in
/// `stops` is encountered (that tag is consumed but not wrapped in a node;
/// its name and args are returned to the caller, which decides what it means
/// — the next clause, or the end of the enclosing block).
fn parse_until(lexer: &mut Lexer, stops: &[&str]) -> Result<(Vec<Node>, Option<(String, String)>)> {
    let mut nodes = Vec::new();
    loop {
        match lexer.next_token()? {
            RawToken::Eof => return Ok((nodes, None)),
            RawToken::Text(t) => {
                if !t.is_empty() {
                    nodes.push(Node::Text(t.to_string()));
                }
            }
            RawToken::Variable(src) => {
                let pipeline = parse_pipeline(src)?;
                nodes.push(Node::Variable(pipeline));
            }
            RawToken::TagOpen(_, inner) => {
                let (name, args) = split_tag(inner);
                if stops.contains(&name.as_str()) {
                    return Ok((nodes, Some((name, args))));
                }
                if name == "verbatim" {
                    let text = parse_verbatim_body(lexer)?;
                    nodes.push(Node::Text(text));
                    continue;
                }
                if name == "comment" {
                    // discard the body entirely.
                    parse_until(lexer, &["endcomment"])?;
                    continue;
                }
                if let Some((end_name, separators)) = block_spec(&name) {
                    let mut clauses = Vec::new();
                    let mut current_keyword = name.clone();
                    let mut current_args = args.clone();
                    loop {
                        let mut stop_set: Vec<&str> = separators.to_vec();
                        stop_set.push(end_name);
                        let (body, stop) = parse_until(lexer, &stop_set)?;
                        clauses.push(Clause { keyword: current_keyword.clone(), args: current_args.clone(), body });
                        match stop {
                            Some((stop_name, stop_args)) if stop_name == end_name => break,
                            Some((stop_name, stop_args)) => {
                                current_keyword = stop_name;
                                current_args = stop_args;
                            }
                            None => {
                                let (line, column) = lexer.line_col();
                                return Err(Error::parse(
                                    line,
                                    column,
                                    format!("unterminated {{% {name} %}}: expected {{% {end_name} %}}"),
                                ));
                            }
                        }
                    }
                    nodes.push(Node::Tag(TagNode { name, args, clauses }));
                } else {
                    nodes.push(Node::Tag(TagNode { name, args, clauses: Vec::new() }));
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
        return Err(Error::parse(line, column, format!("unexpected {{% {name} %}} with no matching opener")));
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_text_and_variable() {
        let nodes = parse("hello {{ name }}!").unwrap();
        assert_eq!(nodes.len(), 3);
        assert!(matches!(nodes[0], Node::Text(ref s) if s == "hello "));
        assert!(matches!(nodes[1], Node::Variable(_)));
        assert!(matches!(nodes[2], Node::Text(ref s) if s == "!"));
    }

    #[test]
    fn comments_are_skipped() {
        let nodes = parse("a{# this is dropped #}b").unwrap();
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn if_elif_else_produces_three_clauses() {
        let nodes = parse("{% if a %}A{% elif b %}B{% else %}C{% endif %}").unwrap();
        let Node::Tag(tag) = &nodes[0] else { panic!("expected tag") };
        assert_eq!(tag.clauses.len(), 3);
        assert_eq!(tag.clauses[0].keyword, "if");
        assert_eq!(tag.clauses[1].keyword, "elif");
        assert_eq!(tag.clauses[2].keyword, "else");
    }

    #[test]
    fn for_empty_produces_two_clauses() {
        let nodes = parse("{% for x in xs %}{{ x }}{% empty %}none{% endfor %}").unwrap();
        let Node::Tag(tag) = &nodes[0] else { panic!("expected tag") };
        assert_eq!(tag.clauses.len(), 2);
        assert_eq!(tag.clauses[1].keyword, "empty");
    }

    #[test]
    fn verbatim_disables_inner_parsing() {
        let nodes = parse("{% verbatim %}{{ not a var }}{% endverbatim %}").unwrap();
        assert!(matches!(&nodes[0], Node::Text(s) if s == "{{ not a var }}"));
    }

    #[test]
    fn unterminated_tag_is_parse_error() {
        assert!(parse("{% if a %}body").is_err());
    }
}
