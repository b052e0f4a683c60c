//! Dialect S's boolean expression grammar and evaluator (spec §4.4):
//! `&&`/`||`/`!`/`()`, comparisons (`=`, `==`, `!=`, `<`, `>`, `<=`, `>=`),
//! and `=~`/`!=` against `/regex/` literals with capture exposure into the
//! context.
//!
//! Grounded in `engines/ssi/engine.hpp`'s `evaluate_expression`/`equals`:
//! the original gives `&&` and `||` the same grammar precedence (both reduce
//! through a shared `expression` rule), which is ambiguous for a
//! left-to-right recursive-descent parser; we resolve it the conventional
//! way — `&&` binds tighter than `||`, both left-associative — and record
//! the choice in the design ledger rather than reproduce the ambiguity.

use regex::Regex;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::value::Value as CoreValue;

use super::options::Options;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

/// A string-valued operand: `raw_string` is emitted verbatim (the original
/// does not interpolate it), `variable`/`quoted_string` both pass through
/// `interpolate`.
#[derive(Debug, Clone, PartialEq)]
pub enum StrOperand {
    Raw(String),
    Variable(String),
    Quoted(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rhs {
    Str(StrOperand),
    Regex(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Cmp(StrOperand, CmpOp, Rhs),
    Bare(StrOperand),
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

    fn eat_str(&mut self, lit: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(lit) {
            self.pos += lit.len();
            true
        } else {
            false
        }
    }

    fn peek_str(&mut self, lit: &str) -> bool {
        self.skip_ws();
        self.rest().starts_with(lit)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        loop {
            if self.eat_str("||") {
                let right = self.parse_and()?;
                left = Expr::Or(Box::new(left), Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            if self.eat_str("&&") {
                let right = self.parse_unary()?;
                left = Expr::And(Box::new(left), Box::new(right));
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        self.skip_ws();
        if self.eat_str("!") {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        if self.eat_str("(") {
            let inner = self.parse_or()?;
            self.skip_ws();
            if !self.eat_str(")") {
                return Err(Error::parse(0, self.pos, "expected ')'".to_string()));
            }
            return Ok(inner);
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_str_operand()?;
        self.skip_ws();
        let op = if self.eat_str("==") {
            Some(CmpOp::Eq)
        } else if self.eat_str("=~") {
            Some(CmpOp::Eq)
        } else if self.eat_str("!=") {
            Some(CmpOp::Ne)
        } else if self.eat_str("<=") {
            Some(CmpOp::Le)
        } else if self.eat_str(">=") {
            Some(CmpOp::Ge)
        } else if self.eat_str("=") {
            Some(CmpOp::Eq)
        } else if self.eat_str("<") {
            Some(CmpOp::Lt)
        } else if self.eat_str(">") {
            Some(CmpOp::Gt)
        } else {
            None
        };
        let Some(op) = op else {
            return Ok(Expr::Bare(left));
        };
        self.skip_ws();
        let rhs = if self.rest().starts_with('/') {
            Rhs::Regex(self.parse_regex_literal()?)
        } else {
            Rhs::Str(self.parse_str_operand()?)
        };
        Ok(Expr::Cmp(left, op, rhs))
    }

    fn parse_regex_literal(&mut self) -> Result<String> {
        debug_assert!(self.rest().starts_with('/'));
        self.pos += 1;
        let rest = self.rest();
        let mut out = String::new();
        let mut chars = rest.char_indices();
        loop {
            match chars.next() {
                None => return Err(Error::parse(0, self.pos, "unterminated regex literal".to_string())),
                Some((_, '\\')) => {
                    if let Some((_, next)) = chars.next() {
                        if next != '/' {
                            out.push('\\');
                        }
                        out.push(next);
                    }
                }
                Some((i, '/')) => {
                    self.pos += i + 1;
                    return Ok(out);
                }
                Some((_, c)) => out.push(c),
            }
        }
    }

    fn parse_str_operand(&mut self) -> Result<StrOperand> {
        self.skip_ws();
        let rest = self.rest();
        if let Some(quote) = rest.chars().next().filter(|c| matches!(c, '"' | '\'' | '`')) {
            let body = &rest[1..];
            let mut out = String::new();
            let mut chars = body.char_indices().peekable();
            while let Some((i, c)) = chars.next() {
                if c == quote {
                    self.pos += 1 + i + 1;
                    return Ok(StrOperand::Quoted(out));
                }
                if c == '\\' {
                    if let Some(&(_, next)) = chars.peek() {
                        if next == quote {
                            out.push(next);
                            chars.next();
                            continue;
                        }
                    }
                }
                out.push(c);
            }
            return Err(Error::parse(0, self.pos, "unterminated quoted string".to_string()));
        }
        if rest.starts_with("${") {
            let end = rest.find('}').ok_or_else(|| Error::parse(0, self.pos, "unterminated '${'".to_string()))?;
            let name = rest[2..end].to_string();
            self.pos += end + 1;
            return Ok(StrOperand::Variable(name));
        }
        if let Some(after_dollar) = rest.strip_prefix('$') {
            let end = after_dollar.find(|c: char| !is_word(c)).unwrap_or(after_dollar.len());
            if end == 0 {
                return Err(Error::parse(0, self.pos, "expected a variable name after '$'".to_string()));
            }
            let name = after_dollar[..end].to_string();
            self.pos += 1 + end;
            return Ok(StrOperand::Variable(name));
        }
        let end = rest.find(is_raw_stop).unwrap_or(rest.len());
        if end == 0 {
            return Err(Error::parse(0, self.pos, format!("expected an operand: {rest}")));
        }
        let raw = rest[..end].to_string();
        self.pos += end;
        Ok(StrOperand::Raw(raw))
    }
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Characters that terminate an unquoted `raw_string` token (spec §4.2: the
/// original excludes whitespace and every operator/bracket character).
fn is_raw_stop(c: char) -> bool {
    c.is_whitespace() || matches!(c, '!' | '&' | '|' | '$' | '=' | '(' | ')' | '{' | '}' | '<' | '>' | '"' | '`' | '\'' | '\\' | '/')
}

/// Parses a full `expr="..."` attribute value into a boolean expression.
pub fn parse(src: &str) -> Result<Expr> {
    let mut p = Parser::new(src);
    let expr = p.parse_or()?;
    p.skip_ws();
    if !p.rest().is_empty() {
        return Err(Error::parse(0, p.pos, format!("unexpected trailing input: {}", p.rest())));
    }
    Ok(expr)
}

/// Resolves a `$name`/`${name}` reference: context lookup first, then the
/// magic `DATE_LOCAL`/`DATE_GMT` variables (preserving the original's
/// asymmetric formatter choice — see the design ledger), then the process
/// environment, then `opts.echo_message`.
pub fn lookup_variable(ctx: &Context, opts: &Options, name: &str) -> String {
    if let Some(v) = ctx.get(name) {
        return v.to_string_lossy().into_owned();
    }
    match name {
        "DATE_LOCAL" => {
            let now = chrono::Local::now().naive_local();
            return crate::dialects::d::filters::format::format_datetime(&now, &opts.time_format);
        }
        "DATE_GMT" => {
            let now = chrono::Utc::now().naive_utc();
            return crate::dialects::d::filters::format::format_time_only(&now, &opts.time_format);
        }
        _ => {}
    }
    if let Ok(v) = std::env::var(name) {
        return v;
    }
    opts.echo_message.clone()
}

/// Replaces `\$` with `$` and every `${name}`/`$name` reference with its
/// looked-up value, scanning left to right (spec §4.4 attribute
/// interpolation).
pub fn interpolate(ctx: &Context, opts: &Options, text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\\' && text[i..].starts_with("\\$") {
            out.push('$');
            chars.next();
            continue;
        }
        if c == '$' {
            let rest = &text[i + 1..];
            if let Some(body) = rest.strip_prefix('{') {
                if let Some(end) = body.find('}') {
                    let name = &body[..end];
                    out.push_str(&lookup_variable(ctx, opts, name));
                    for _ in 0..(2 + name.len()) {
                        chars.next();
                    }
                    continue;
                }
            } else {
                let end = rest.find(|c: char| !is_word(c)).unwrap_or(rest.len());
                if end > 0 {
                    let name = &rest[..end];
                    out.push_str(&lookup_variable(ctx, opts, name));
                    for _ in 0..end {
                        chars.next();
                    }
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn resolve_str(ctx: &Context, opts: &Options, operand: &StrOperand) -> String {
    match operand {
        StrOperand::Raw(s) => s.clone(),
        StrOperand::Variable(name) => lookup_variable(ctx, opts, name),
        StrOperand::Quoted(s) => interpolate(ctx, opts, s),
    }
}

/// Erases any previously captured `"0"`..`"N"` keys, runs `pattern` against
/// `left`, and — on a match — populates `"0"`..`min(groups, max_captures)`
/// with the match and its capture groups (spec §4.4).
fn regex_search_and_capture(ctx: &mut Context, opts: &Options, left: &str, pattern: &str) -> Result<bool> {
    ctx.clear_numeric_captures();
    let re = Regex::new(pattern).map_err(|e| Error::parse(0, 0, format!("invalid regex '{pattern}': {e}")))?;
    let Some(caps) = re.captures(left) else {
        return Ok(false);
    };
    let limit = caps.len().min(opts.max_regex_captures + 1);
    for i in 0..limit {
        if let Some(m) = caps.get(i) {
            ctx.set(i.to_string(), CoreValue::from(m.as_str()));
        }
    }
    Ok(true)
}

pub fn evaluate(expr: &Expr, ctx: &mut Context, opts: &Options) -> Result<bool> {
    match expr {
        Expr::And(l, r) => Ok(evaluate(l, ctx, opts)? && evaluate(r, ctx, opts)?),
        Expr::Or(l, r) => Ok(evaluate(l, ctx, opts)? || evaluate(r, ctx, opts)?),
        Expr::Not(inner) => Ok(!evaluate(inner, ctx, opts)?),
        Expr::Bare(operand) => Ok(!resolve_str(ctx, opts, operand).is_empty()),
        Expr::Cmp(left, op, rhs) => {
            let left_text = resolve_str(ctx, opts, left);
            match rhs {
                Rhs::Regex(pattern) => {
                    let matched = regex_search_and_capture(ctx, opts, &left_text, pattern)?;
                    match op {
                        CmpOp::Eq => Ok(matched),
                        CmpOp::Ne => Ok(!matched),
                        _ => Err(Error::bad_argument("'=', '==', or '!=' for a regex comparison", format!("{op:?}"))),
                    }
                }
                Rhs::Str(right) => {
                    let right_text = resolve_str(ctx, opts, right);
                    Ok(match op {
                        CmpOp::Eq => left_text == right_text,
                        CmpOp::Ne => left_text != right_text,
                        CmpOp::Lt => left_text < right_text,
                        CmpOp::Gt => left_text > right_text,
                        CmpOp::Le => left_text <= right_text,
                        CmpOp::Ge => left_text >= right_text,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_evaluates_simple_comparison() {
        let mut ctx = Context::new();
        ctx.set("QUERY", CoreValue::from("id=42"));
        let opts = Options::default();
        let expr = parse(r#"$QUERY = "id=42""#).unwrap();
        assert!(evaluate(&expr, &mut ctx, &opts).unwrap());
    }

    #[test]
    fn regex_match_populates_numbered_captures() {
        let mut ctx = Context::new();
        ctx.set("QUERY", CoreValue::from("id=42&x=y"));
        let opts = Options::default();
        let expr = parse(r#"$QUERY =~ /id=(\d+)/"#).unwrap();
        assert!(evaluate(&expr, &mut ctx, &opts).unwrap());
        assert_eq!(ctx.get("1").unwrap().to_string_lossy(), "42");
    }

    #[test]
    fn and_or_not_combine_with_usual_precedence() {
        let mut ctx = Context::new();
        ctx.set("a", CoreValue::from("1"));
        ctx.set("b", CoreValue::from(""));
        let opts = Options::default();
        // a is truthy, b is falsy: `$a && $b || !$b` -> (true && false) || true -> true
        let expr = parse("$a && $b || !$b").unwrap();
        assert!(evaluate(&expr, &mut ctx, &opts).unwrap());
    }

    #[test]
    fn raw_string_operand_is_not_interpolated() {
        let mut ctx = Context::new();
        ctx.set("x", CoreValue::from("should-not-appear"));
        let opts = Options::default();
        let expr = parse("literal=literal").unwrap();
        assert!(evaluate(&expr, &mut ctx, &opts).unwrap());
    }
}
