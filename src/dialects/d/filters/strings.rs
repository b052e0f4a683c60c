//! String-shaping filters with no markup concerns of their own (escaping
//! lives in `html.rs`).

use crate::error::{Error, Result};
use crate::value::Value as CoreValue;

use super::super::value::Value;

fn text(value: &Value) -> String {
    value.inner.to_string_lossy().into_owned()
}

fn wrap(s: String) -> Value {
    Value::new(CoreValue::from(s))
}

fn parse_int_arg(arg: Option<&Value>) -> Result<i64> {
    let v = arg.ok_or(Error::MissingArgument)?;
    v.inner
        .to_number()
        .map(|n| n as i64)
        .map_err(|_| Error::bad_argument("integer", v.inner.to_string_lossy()))
}

pub fn addslashes(value: Value) -> Result<Value> {
    let s = text(&value);
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\'' || c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    Ok(wrap(out))
}

pub fn capfirst(value: Value) -> Result<Value> {
    let s = text(&value);
    let mut chars = s.chars();
    let out = match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    };
    Ok(wrap(out))
}

pub fn center(value: Value, arg: Option<&Value>) -> Result<Value> {
    let s = text(&value);
    let width = parse_int_arg(arg)?.max(0) as usize;
    let len = s.chars().count();
    if len >= width {
        return Ok(wrap(s));
    }
    let total_pad = width - len;
    let left = total_pad / 2;
    let right = total_pad - left;
    Ok(wrap(format!("{}{}{}", " ".repeat(left), s, " ".repeat(right))))
}

/// Removes all occurrences of the literal token text (per the B.1 note: the
/// argument is re-parsed from its raw spelling, not its evaluated value, so
/// `cut:","` removes commas rather than whatever a variable named `,` held).
pub fn cut(value: Value, arg_token: Option<&str>) -> Result<Value> {
    let s = text(&value);
    let needle = arg_token.map(unquote).unwrap_or_default();
    Ok(wrap(s.replace(needle.as_str(), "")))
}

fn unquote(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.len() >= 2 {
        let bytes = trimmed.as_bytes();
        if (bytes[0] == b'"' && bytes[trimmed.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[trimmed.len() - 1] == b'\'')
        {
            return trimmed[1..trimmed.len() - 1].to_string();
        }
    }
    trimmed.to_string()
}

pub fn linenumbers(value: Value) -> Result<Value> {
    let s = text(&value);
    let width = s.lines().count().to_string().len();
    let out = s
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{:0width$}. {}", i + 1, line, width = width))
        .collect::<Vec<_>>()
        .join("\n");
    Ok(wrap(out))
}

pub fn ljust(value: Value, arg: Option<&Value>) -> Result<Value> {
    let s = text(&value);
    let width = parse_int_arg(arg)?.max(0) as usize;
    let len = s.chars().count();
    Ok(wrap(if len >= width { s } else { format!("{}{}", s, " ".repeat(width - len)) }))
}

pub fn rjust(value: Value, arg: Option<&Value>) -> Result<Value> {
    let s = text(&value);
    let width = parse_int_arg(arg)?.max(0) as usize;
    let len = s.chars().count();
    Ok(wrap(if len >= width { s } else { format!("{}{}", " ".repeat(width - len), s) }))
}

pub fn lower(value: Value) -> Result<Value> {
    Ok(wrap(text(&value).to_lowercase()))
}

pub fn upper(value: Value) -> Result<Value> {
    Ok(wrap(text(&value).to_uppercase()))
}

pub fn title(value: Value) -> Result<Value> {
    let s = text(&value);
    let mut out = String::with_capacity(s.len());
    let mut start_of_word = true;
    for c in s.chars() {
        if c.is_whitespace() {
            start_of_word = true;
            out.push(c);
        } else if start_of_word {
            out.extend(c.to_uppercase());
            start_of_word = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    Ok(wrap(out))
}

pub fn phone2numeric(value: Value) -> Result<Value> {
    let s = text(&value);
    let out: String = s
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            'a'..='c' => '2',
            'd'..='f' => '3',
            'g'..='i' => '4',
            'j'..='l' => '5',
            'm'..='o' => '6',
            'p' | 'q' | 'r' | 's' => '7',
            't' | 'u' | 'v' => '8',
            'w' | 'x' | 'y' | 'z' => '9',
            other => other,
        })
        .collect();
    Ok(wrap(out))
}

/// Accepts zero, one, or two comma-separated forms: `pluralize`,
/// `pluralize:"es"`, `pluralize:"y,ies"`.
pub fn pluralize(value: Value, arg_token: Option<&str>) -> Result<Value> {
    let n = value.inner.to_number().unwrap_or(0.0);
    let (singular, plural) = match arg_token.map(unquote) {
        None => (String::new(), "s".to_string()),
        Some(spec) => match spec.split_once(',') {
            Some((s, p)) => (s.to_string(), p.to_string()),
            None => (String::new(), spec),
        },
    };
    Ok(wrap(if n == 1.0 { singular } else { plural }))
}

pub fn slugify(value: Value) -> Result<Value> {
    let s = text(&value);
    let ascii: String = s
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect();
    let slug = ascii
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    Ok(wrap(slug))
}

/// `%`-style Rust formatting is not attempted; Django's `stringformat`
/// forwards to `%`-printf specifiers, so only the common numeric/string
/// cases (`s`, `d`, `.Nf`) are handled.
pub fn stringformat(value: Value, arg_token: Option<&str>) -> Result<Value> {
    let spec = arg_token.map(unquote).unwrap_or_default();
    let spec = spec.trim_start_matches('%');
    if spec.ends_with('s') {
        return Ok(wrap(text(&value)));
    }
    if spec.ends_with('d') {
        let n = value.inner.to_number().unwrap_or(0.0);
        return Ok(wrap(format!("{}", n as i64)));
    }
    if let Some(rest) = spec.strip_suffix('f') {
        let precision: usize = rest.trim_start_matches('.').parse().unwrap_or(6);
        let n = value.inner.to_number().unwrap_or(0.0);
        return Ok(wrap(format!("{:.*}", precision, n)));
    }
    Ok(wrap(text(&value)))
}

pub fn truncatechars(value: Value, arg: Option<&Value>) -> Result<Value> {
    let s = text(&value);
    let limit = parse_int_arg(arg)?.max(0) as usize;
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= limit {
        return Ok(wrap(s));
    }
    let keep = limit.saturating_sub(1);
    let mut out: String = chars[..keep].iter().collect();
    out.push('\u{2026}');
    Ok(wrap(out))
}

pub fn truncatewords(value: Value, arg: Option<&Value>) -> Result<Value> {
    let s = text(&value);
    let limit = parse_int_arg(arg)?.max(0) as usize;
    let words: Vec<&str> = s.split_whitespace().collect();
    if words.len() <= limit {
        return Ok(wrap(s));
    }
    let mut out = words[..limit].join(" ");
    out.push_str(" \u{2026}");
    Ok(wrap(out))
}

pub fn wordcount(value: Value) -> Result<Value> {
    Ok(Value::new(CoreValue::from(text(&value).split_whitespace().count() as f64)))
}

pub fn wordwrap(value: Value, arg: Option<&Value>) -> Result<Value> {
    let s = text(&value);
    let width = parse_int_arg(arg)?.max(1) as usize;
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in s.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if current.chars().count() + 1 + word.chars().count() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    Ok(wrap(lines.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cut_removes_literal_token_not_evaluated_argument() {
        let v = Value::new(CoreValue::from("a,b,c"));
        let out = cut(v, Some("\",\"")).unwrap();
        assert_eq!(out.inner.to_string_lossy(), "abc");
    }

    #[test]
    fn pluralize_supports_two_comma_forms() {
        let v = Value::new(CoreValue::from(2.0));
        let out = pluralize(v, Some("\"y,ies\"")).unwrap();
        assert_eq!(out.inner.to_string_lossy(), "ies");
    }

    #[test]
    fn truncatechars_appends_ellipsis_within_budget() {
        let v = Value::new(CoreValue::from("abcdef"));
        let out = truncatechars(v, Some(&Value::new(CoreValue::from(4.0)))).unwrap();
        assert_eq!(out.inner.to_string_lossy(), "abc\u{2026}");
    }
}
