//! Dialect D's expression grammar and evaluator (spec §4.2 expression
//! productions, §4.3 evaluation contract).
//!
//! Grounded in `engine.hpp`'s `evaluate_expression`/`apply_filters`: a
//! literal followed by zero or more attribute/subscript links, optionally
//! wrapped in a unary `not` or chained with a binary operator, then piped
//! through zero or more filters. Unlike the top-level template structure
//! (see `grammar.rs`), expressions are parsed once into a concrete `Expr`
//! tree rather than a generic rule-tagged `Match` — Rust's enum dispatch is
//! the compiled form of the "dispatch table keyed by rule handle" the design
//! notes call for, so there is no separate interpretation step.

use std::fmt;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::value::Value as CoreValue;

use super::filters;
use super::options::Options;
use super::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Link {
    Dot(String),
    Index(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    None,
    Bool(bool),
    Number(f64),
    /// An already-unquoted string literal.
    Str(String),
    /// `block.super`: the enclosing block's base-template rendering.
    Super,
    /// A bare name, resolved against the context.
    Var(String),
    Chain(Box<Expr>, Vec<Link>),
    Unary(Box<Expr>),
    Binary(Box<Expr>, BinOp, Box<Expr>),
    Nested(Box<Expr>),
}

/// One step of a filter pipeline: `name` plus an optional argument
/// expression and, per the original's `is_literal()` handling, the
/// argument's raw source token (used by filters that need the original
/// spelling rather than its evaluated form).
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub arg: Option<Expr>,
    pub arg_token: Option<String>,
}

/// A full `{{ ... }}` body: a base expression followed by a left-to-right
/// filter pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub expr: Expr,
    pub filters: Vec<FilterCall>,
}

struct Parser<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn new(src: &'s str) -> Self {
        Parser { src, pos: 0 }
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn eat_str(&mut self, s: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        self.skip_ws();
        let rest = self.rest();
        if rest.starts_with(word) {
            let after = &rest[word.len()..];
            if after.chars().next().map(|c| !is_ident_char(c)).unwrap_or(true) {
                self.pos += word.len();
                return true;
            }
        }
        false
    }

    fn parse_identifier(&mut self) -> Option<String> {
        self.skip_ws();
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|&(_, c)| !is_ident_char(c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        self.pos += end;
        Some(rest[..end].to_string())
    }

    fn parse_number(&mut self) -> Option<f64> {
        self.skip_ws();
        let rest = self.rest();
        let end = rest
            .char_indices()
            .take_while(|&(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && c == '-'))
            .map(|(i, c)| i + c.len_utf8())
            .last()
            .unwrap_or(0);
        if end == 0 {
            return None;
        }
        let text = &rest[..end];
        text.parse::<f64>().ok().map(|n| {
            self.pos += end;
            n
        })
    }

    fn parse_string(&mut self) -> Option<String> {
        self.skip_ws();
        let rest = self.rest();
        let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let mut chars = rest.char_indices().skip(1);
        let mut out = String::new();
        for (i, c) in &mut chars {
            if c == quote {
                self.pos += i + 1;
                return Some(out);
            }
            out.push(c);
        }
        None
    }

    fn parse_literal(&mut self) -> Result<Expr> {
        self.skip_ws();
        if self.eat_word("None") || self.eat_word("none") {
            return Ok(Expr::None);
        }
        if self.eat_word("True") || self.eat_word("true") {
            return Ok(Expr::Bool(true));
        }
        if self.eat_word("False") || self.eat_word("false") {
            return Ok(Expr::Bool(false));
        }
        if let Some(rest_after_super) = self.rest().strip_prefix("block.super") {
            let boundary_ok = rest_after_super.chars().next().map(|c| !is_ident_char(c)).unwrap_or(true);
            if boundary_ok {
                self.pos += "block.super".len();
                return Ok(Expr::Super);
            }
        }
        if let Some(s) = self.parse_string() {
            return Ok(Expr::Str(s));
        }
        if let Some(n) = self.parse_number() {
            return Ok(Expr::Number(n));
        }
        if let Some(name) = self.parse_identifier() {
            return Ok(Expr::Var(name));
        }
        Err(Error::parse(0, self.pos, self.rest().chars().take(16).collect::<String>()))
    }

    fn parse_links(&mut self, base: Expr) -> Result<Expr> {
        let mut links = Vec::new();
        loop {
            self.skip_ws();
            if self.eat_str(".") {
                let name = self.parse_identifier().ok_or_else(|| {
                    Error::parse(0, self.pos, "expected identifier after '.'".to_string())
                })?;
                links.push(Link::Dot(name));
            } else if self.eat_str("[") {
                let inner = self.parse_expression()?;
                if !self.eat_str("]") {
                    return Err(Error::parse(0, self.pos, "expected ']'".to_string()));
                }
                links.push(Link::Index(Box::new(inner)));
            } else {
                break;
            }
        }
        if links.is_empty() {
            Ok(base)
        } else {
            Ok(Expr::Chain(Box::new(base), links))
        }
    }

    fn parse_chain(&mut self) -> Result<Expr> {
        let base = self.parse_literal()?;
        self.parse_links(base)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        self.skip_ws();
        if self.eat_word("not") {
            let inner = self.parse_expression()?;
            return Ok(Expr::Unary(Box::new(inner)));
        }
        if self.eat_str("(") {
            let inner = self.parse_expression()?;
            if !self.eat_str(")") {
                return Err(Error::parse(0, self.pos, "expected ')'".to_string()));
            }
            return Ok(Expr::Nested(Box::new(inner)));
        }
        self.parse_chain()
    }

    fn parse_bin_op(&mut self) -> Option<BinOp> {
        self.skip_ws();
        let ops: &[(&str, BinOp)] = &[
            ("==", BinOp::Eq),
            ("!=", BinOp::Ne),
            ("<=", BinOp::Le),
            (">=", BinOp::Ge),
            ("<", BinOp::Lt),
            (">", BinOp::Gt),
        ];
        for (text, op) in ops {
            if self.rest().starts_with(text) {
                self.pos += text.len();
                return Some(*op);
            }
        }
        if self.eat_word("and") {
            return Some(BinOp::And);
        }
        if self.eat_word("or") {
            return Some(BinOp::Or);
        }
        if self.rest().trim_start().starts_with("not in") {
            self.skip_ws();
            self.pos += "not in".len();
            return Some(BinOp::NotIn);
        }
        if self.eat_word("in") {
            return Some(BinOp::In);
        }
        None
    }

    /// `expression := unary | binary | nested`, where `binary := chain
    /// (bin_op expression)*` — left-associative, single precedence level,
    /// matching the grammar note that intra-precedence is undefined.
    fn parse_expression(&mut self) -> Result<Expr> {
        let mut left = self.parse_primary()?;
        while let Some(op) = self.parse_bin_op() {
            let right = self.parse_expression_no_trailing_op()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_expression_no_trailing_op(&mut self) -> Result<Expr> {
        self.parse_primary()
    }

    fn parse_filter_arg(&mut self) -> Result<(Expr, String)> {
        self.skip_ws();
        let start = self.pos;
        let expr = self.parse_chain()?;
        let token = self.src[start..self.pos].trim().to_string();
        Ok((expr, token))
    }

    fn parse_pipeline(&mut self) -> Result<Pipeline> {
        let expr = self.parse_expression()?;
        let mut filters = Vec::new();
        loop {
            self.skip_ws();
            if !self.eat_str("|") {
                break;
            }
            self.skip_ws();
            let name = self.parse_identifier().ok_or_else(|| {
                Error::parse(0, self.pos, "expected filter name".to_string())
            })?;
            let (arg, arg_token) = if self.eat_str(":") {
                let (e, t) = self.parse_filter_arg()?;
                (Some(e), Some(t))
            } else {
                (None, None)
            };
            filters.push(FilterCall { name, arg, arg_token });
        }
        Ok(Pipeline { expr, filters })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Parses the text between `{{` and `}}` (already trimmed of the markers)
/// into a `Pipeline`.
pub fn parse_pipeline(src: &str) -> Result<Pipeline> {
    let mut p = Parser::new(src);
    let pipeline = p.parse_pipeline()?;
    p.skip_ws();
    if !p.rest().is_empty() {
        return Err(Error::parse(0, p.pos, format!("unexpected trailing input: {}", p.rest())));
    }
    Ok(pipeline)
}

/// Parses a single standalone expression (used by tag argument lists — e.g.
/// `if`, `ifchanged`'s argument form, `with`'s `name=expr` bindings).
pub fn parse_expression(src: &str) -> Result<Expr> {
    let mut p = Parser::new(src);
    let expr = p.parse_expression()?;
    p.skip_ws();
    if !p.rest().is_empty() {
        return Err(Error::parse(0, p.pos, format!("unexpected trailing input: {}", p.rest())));
    }
    Ok(expr)
}

/// A parsed tag argument: either positional or `name = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub expr: Expr,
    pub token: String,
}

/// Splits a tag's raw argument text into positional and keyword arguments,
/// per the grammar note "argument lists permit positional values and
/// `name = value` keyword arguments".
pub fn parse_args(src: &str) -> Result<Vec<Arg>> {
    let mut p = Parser::new(src);
    let mut args = Vec::new();
    loop {
        p.skip_ws();
        if p.rest().is_empty() {
            break;
        }
        let checkpoint = p.pos;
        let name = p.parse_identifier();
        let name = if let Some(n) = name {
            if p.eat_str("=") {
                Some(n)
            } else {
                p.pos = checkpoint;
                None
            }
        } else {
            None
        };
        let start = p.pos;
        let expr = p.parse_expression()?;
        let token = p.src[start..p.pos].trim().to_string();
        args.push(Arg { name, expr, token });
    }
    Ok(args)
}

/// Resolves `{{ "x" }}` — `evaluate(match, ctx, opts)` per §4.3: evaluate the
/// expression, apply filters left to right, and swallow `MissingVariable`/
/// `MissingAttribute` into `opts.default_value`.
pub fn evaluate_pipeline(pipeline: &Pipeline, ctx: &Context, opts: &Options) -> Result<Value> {
    match evaluate_and_filter(pipeline, ctx, opts) {
        Ok(v) => Ok(v),
        Err(e) if e.is_missing() => Ok(opts.default_value.clone()),
        Err(e) => Err(e),
    }
}

fn evaluate_and_filter(pipeline: &Pipeline, ctx: &Context, opts: &Options) -> Result<Value> {
    let mut value = evaluate_expr(&pipeline.expr, ctx, opts)?;
    for call in &pipeline.filters {
        let arg = match &call.arg {
            Some(e) => Some(evaluate_expr(e, ctx, opts)?),
            None => None,
        };
        value = filters::apply(&call.name, value, arg.as_ref(), call.arg_token.as_deref(), ctx, opts)?;
    }
    Ok(value)
}

pub fn evaluate_expr(expr: &Expr, ctx: &Context, opts: &Options) -> Result<Value> {
    match expr {
        Expr::None => Ok(Value::new(CoreValue::None)),
        Expr::Bool(b) => Ok(Value::new(CoreValue::Bool(*b))),
        Expr::Number(n) => Ok(Value::new(CoreValue::Number(*n))),
        Expr::Str(s) => Ok(Value::with_token(CoreValue::from(s.as_str()), s.clone())),
        Expr::Super => opts
            .super_stack
            .last()
            .map(|text| Value::safe(CoreValue::from(text.as_str())))
            .ok_or_else(|| Error::missing_variable("block.super")),
        Expr::Var(name) => ctx
            .get(name)
            .cloned()
            .map(|v| if ctx.is_name_safe(name) { Value::safe(v) } else { Value::new(v) })
            .ok_or_else(|| Error::missing_variable(name.clone())),
        Expr::Chain(base, links) => {
            let mut value = evaluate_expr(base, ctx, opts)?;
            for link in links {
                value = match link {
                    Link::Dot(name) => {
                        let key = CoreValue::from(name.as_str());
                        let attr = value.inner.must_get_attribute(&key).map_err(|_| {
                            Error::missing_attribute(name.clone())
                        })?;
                        Value::new(attr)
                    }
                    Link::Index(idx_expr) => {
                        let idx = evaluate_expr(idx_expr, ctx, opts)?;
                        let attr = value.inner.must_get_attribute(&idx.inner).map_err(|_| {
                            Error::missing_attribute(idx.inner.to_string_lossy().into_owned())
                        })?;
                        Value::new(attr)
                    }
                };
            }
            Ok(value)
        }
        Expr::Unary(inner) => {
            let v = evaluate_expr(inner, ctx, opts)?;
            Ok(Value::new(CoreValue::Bool(!v.inner.test())))
        }
        Expr::Binary(left, op, right) => evaluate_binary(left, *op, right, ctx, opts),
        Expr::Nested(inner) => evaluate_expr(inner, ctx, opts),
    }
}

fn evaluate_binary(left: &Expr, op: BinOp, right: &Expr, ctx: &Context, opts: &Options) -> Result<Value> {
    match op {
        BinOp::And => {
            let l = evaluate_expr(left, ctx, opts)?;
            if !l.inner.test() {
                return Ok(l);
            }
            evaluate_expr(right, ctx, opts)
        }
        BinOp::Or => {
            let l = evaluate_expr(left, ctx, opts)?;
            if l.inner.test() {
                return Ok(l);
            }
            evaluate_expr(right, ctx, opts)
        }
        _ => {
            let l = evaluate_expr(left, ctx, opts)?;
            let r = evaluate_expr(right, ctx, opts)?;
            let b = match op {
                BinOp::Eq => l.inner.equal(&r.inner),
                BinOp::Ne => !l.inner.equal(&r.inner),
                BinOp::Lt => l.inner.partial_cmp(&r.inner).map(|o| o.is_lt()).unwrap_or(false),
                BinOp::Gt => l.inner.partial_cmp(&r.inner).map(|o| o.is_gt()).unwrap_or(false),
                BinOp::Le => l.inner.partial_cmp(&r.inner).map(|o| o.is_le()).unwrap_or(false),
                BinOp::Ge => l.inner.partial_cmp(&r.inner).map(|o| o.is_ge()).unwrap_or(false),
                BinOp::In => r.inner.contains(&l.inner),
                BinOp::NotIn => !r.inner.contains(&l.inner),
                BinOp::And | BinOp::Or => unreachable!(),
            };
            Ok(Value::new(CoreValue::Bool(b)))
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chain_with_dot_and_index_links() {
        let pipeline = parse_pipeline("user.roles[0]").unwrap();
        match pipeline.expr {
            Expr::Chain(_, links) => assert_eq!(links.len(), 2),
            other => panic!("expected chain, got {other:?}"),
        }
    }

    #[test]
    fn parses_filter_pipeline_with_argument() {
        let pipeline = parse_pipeline("name|default:\"world\"").unwrap();
        assert_eq!(pipeline.filters.len(), 1);
        assert_eq!(pipeline.filters[0].name, "default");
    }

    #[test]
    fn evaluates_missing_variable_to_default() {
        let ctx = Context::new();
        let opts = Options::default().with_default_value(Value::new(CoreValue::from("world")));
        let pipeline = parse_pipeline("missing").unwrap();
        let v = evaluate_pipeline(&pipeline, &ctx, &opts).unwrap();
        assert_eq!(v.inner.to_string_lossy(), "world");
    }

    #[test]
    fn and_or_return_last_evaluated_value_not_boolean() {
        let mut ctx = Context::new();
        ctx.set("a", CoreValue::from(0.0));
        ctx.set("b", CoreValue::from("fallback"));
        let opts = Options::default();
        let pipeline = parse_pipeline("a or b").unwrap();
        let v = evaluate_pipeline(&pipeline, &ctx, &opts).unwrap();
        assert_eq!(v.inner.to_string_lossy(), "fallback");
    }

    #[test]
    fn parses_args_with_keyword_form() {
        let args = parse_args("1 name=\"x\" 2").unwrap();
        assert_eq!(args.len(), 3);
        assert_eq!(args[1].name.as_deref(), Some("name"));
    }
}
