//! Filters whose job is markup-aware: escaping, stripping, linkifying.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::Result;
use crate::value::Value as CoreValue;

use super::super::value::Value;

fn text(value: &Value) -> String {
    value.inner.to_string_lossy().into_owned()
}

fn wrap(s: String) -> Value {
    Value::new(CoreValue::from(s))
}

pub fn escape(value: Value) -> Result<Value> {
    let escaped = value.inner.escape();
    Ok(Value::new(escaped).mark_unsafe())
}

/// Escapes eagerly regardless of the current safe flag, unlike `escape`
/// (which only forces escaping at emission time).
pub fn force_escape(value: Value) -> Result<Value> {
    let escaped = value.inner.escape();
    Ok(Value::new(escaped).mark_safe())
}

pub fn escapejs(value: Value) -> Result<Value> {
    let s = text(&value);
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\u0027"),
            '"' => out.push_str("\\u0022"),
            '<' => out.push_str("\\u003C"),
            '>' => out.push_str("\\u003E"),
            '&' => out.push_str("\\u0026"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    Ok(wrap(out))
}

pub fn fix_ampersands(value: Value) -> Result<Value> {
    let s = text(&value);
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == '&' {
            let rest: String = chars[i..].iter().collect();
            if is_entity(&rest) {
                out.push('&');
            } else {
                out.push_str("&amp;");
            }
        } else {
            out.push(c);
        }
    }
    Ok(wrap(out))
}

fn is_entity(rest: &str) -> bool {
    if let Some(end) = rest.find(';') {
        let body = &rest[1..end];
        if body.is_empty() || end > 10 {
            return false;
        }
        if let Some(numeric) = body.strip_prefix('#') {
            return numeric.chars().all(|c| c.is_ascii_digit());
        }
        return body.chars().all(|c| c.is_ascii_alphanumeric());
    }
    false
}

pub fn iriencode(value: Value) -> Result<Value> {
    const SAFE: &AsciiSet = &NON_ALPHANUMERIC
        .remove(b'/')
        .remove(b':')
        .remove(b'?')
        .remove(b'&')
        .remove(b'=')
        .remove(b'#')
        .remove(b'%')
        .remove(b'.')
        .remove(b'-')
        .remove(b'_')
        .remove(b'~');
    let encoded = utf8_percent_encode(&text(&value), SAFE).to_string();
    Ok(wrap(encoded))
}

pub fn urlencode(value: Value) -> Result<Value> {
    const SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');
    let encoded = utf8_percent_encode(&text(&value), SAFE).to_string();
    Ok(wrap(encoded))
}

pub fn linebreaks(value: Value) -> Result<Value> {
    let s = text(&value);
    let paragraphs: Vec<String> = s
        .split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .map(|p| format!("<p>{}</p>", p.trim().replace('\n', "<br />")))
        .collect();
    Ok(wrap(paragraphs.join("\n\n")))
}

pub fn linebreaksbr(value: Value) -> Result<Value> {
    Ok(wrap(text(&value).replace('\n', "<br />")))
}

/// Strips a fixed, conservative tag allowlist given as a space-separated
/// argument; anything not in the list passes through untouched, matching
/// Django's documented "naive" regex-based implementation.
pub fn removetags(value: Value, arg: Option<&super::super::value::Value>) -> Result<Value> {
    let names: Vec<String> = arg
        .map(|v| v.inner.to_string_lossy().into_owned())
        .unwrap_or_default()
        .split_whitespace()
        .map(|s| s.to_lowercase())
        .collect();
    let s = text(&value);
    let mut out = String::with_capacity(s.len());
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '<' {
            if let Some(end) = s[i..].find('>') {
                let tag_src = &s[i..i + end + 1];
                let name: String = tag_src
                    .trim_start_matches('<')
                    .trim_start_matches('/')
                    .trim_end_matches('>')
                    .split_whitespace()
                    .next()
                    .unwrap_or("")
                    .to_lowercase();
                if names.contains(&name) {
                    for _ in 0..end {
                        chars.next();
                    }
                    continue;
                }
            }
        }
        out.push(c);
    }
    Ok(wrap(out))
}

pub fn striptags(value: Value) -> Result<Value> {
    let s = text(&value);
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    Ok(wrap(out))
}

enum Unit {
    Chars,
    Words,
}

/// Truncates `s` to `limit` units (characters or whole words), tracking
/// which tags are open so a mid-structure cut still emits the matching
/// closing tags — the html counterpart of `truncatechars`/`truncatewords`.
fn truncate_with_tag_stack(s: &str, limit: usize, unit: Unit) -> String {
    let mut out = String::new();
    let mut stack: Vec<String> = Vec::new();
    let mut char_count = 0usize;
    let mut word_count = 0usize;
    let mut pending_word = String::new();
    let mut truncated = false;
    let mut chars = s.char_indices().peekable();

    'outer: while let Some((i, c)) = chars.next() {
        if c == '<' {
            if let Some(end) = s[i..].find('>') {
                let over_budget = match unit {
                    Unit::Chars => char_count >= limit,
                    Unit::Words => word_count >= limit,
                };
                if over_budget {
                    truncated = true;
                    break 'outer;
                }
                let tag_src = &s[i..i + end + 1];
                let inner = tag_src.trim_start_matches('<').trim_end_matches('>');
                if let Some(name) = inner.strip_prefix('/') {
                    stack.retain(|t| t != name);
                } else if !inner.ends_with('/') {
                    let name = inner.split_whitespace().next().unwrap_or("").to_string();
                    if !name.is_empty() {
                        stack.push(name);
                    }
                }
                out.push_str(tag_src);
                for _ in 0..end {
                    chars.next();
                }
                continue;
            }
        }
        match unit {
            Unit::Chars => {
                if char_count >= limit {
                    truncated = true;
                    break;
                }
                out.push(c);
                char_count += 1;
            }
            Unit::Words => {
                if c.is_whitespace() {
                    if !pending_word.is_empty() {
                        if word_count >= limit {
                            truncated = true;
                            break;
                        }
                        out.push_str(&pending_word);
                        pending_word.clear();
                        word_count += 1;
                    }
                    out.push(c);
                } else {
                    pending_word.push(c);
                }
            }
        }
    }
    if matches!(unit, Unit::Words) && !pending_word.is_empty() {
        if word_count < limit {
            out.push_str(&pending_word);
        } else {
            truncated = true;
        }
    }
    if truncated {
        out.push('\u{2026}');
    }
    for tag in stack.iter().rev() {
        out.push_str(&format!("</{tag}>"));
    }
    out
}

pub fn truncatechars_html(value: Value, arg: Option<&super::super::value::Value>) -> Result<Value> {
    let limit = arg.and_then(|v| v.inner.to_number().ok()).unwrap_or(0.0).max(0.0) as usize;
    Ok(wrap(truncate_with_tag_stack(&text(&value), limit, Unit::Chars)))
}

pub fn truncatewords_html(value: Value, arg: Option<&super::super::value::Value>) -> Result<Value> {
    let limit = arg.and_then(|v| v.inner.to_number().ok()).unwrap_or(0.0).max(0.0) as usize;
    Ok(wrap(truncate_with_tag_stack(&text(&value), limit, Unit::Words)))
}

pub fn unordered_list(value: Value) -> Result<Value> {
    fn render(v: &CoreValue) -> String {
        match v {
            CoreValue::Sequence(items) => {
                let lis: Vec<String> = items.iter().map(|item| format!("<li>{}</li>", render(item))).collect();
                format!("<ul>\n{}\n</ul>", lis.join("\n"))
            }
            other => other.to_string(),
        }
    }
    Ok(wrap(render(&value.inner)))
}

/// Wraps URL-like substrings in anchor tags, prepending `http://` when no
/// scheme is present; `truncate` limits the visible link text's length.
pub fn urlize(value: Value, truncate: bool) -> Result<Value> {
    let s = text(&value);
    let mut out = String::new();
    for word in split_preserving_whitespace(&s) {
        if looks_like_url(word) {
            let href = if word.contains("://") || word.starts_with("mailto:") {
                word.to_string()
            } else if word.contains('@') {
                format!("mailto:{word}")
            } else {
                format!("http://{word}")
            };
            let label = if truncate && word.chars().count() > 25 {
                let truncated: String = word.chars().take(22).collect();
                format!("{truncated}\u{2026}")
            } else {
                word.to_string()
            };
            out.push_str(&format!("<a href=\"{href}\" rel=\"nofollow\">{label}</a>"));
        } else {
            out.push_str(word);
        }
    }
    Ok(wrap(out))
}

fn split_preserving_whitespace(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut last = 0;
    let mut in_ws = s.as_bytes().first().map(|b| (*b as char).is_whitespace()).unwrap_or(false);
    for (i, c) in s.char_indices() {
        let ws = c.is_whitespace();
        if ws != in_ws {
            out.push(&s[last..i]);
            last = i;
            in_ws = ws;
        }
    }
    out.push(&s[last..]);
    out
}

fn looks_like_url(word: &str) -> bool {
    word.starts_with("http://")
        || word.starts_with("https://")
        || word.starts_with("www.")
        || (word.contains('@') && word.contains('.') && !word.contains(' '))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_marks_unsafe_so_downstream_escapes_apply() {
        let out = escape(Value::new(CoreValue::from("<b>"))).unwrap();
        assert!(!out.is_safe());
        assert_eq!(out.inner.to_string_lossy(), "&lt;b&gt;");
    }

    #[test]
    fn striptags_removes_all_markup() {
        let out = striptags(Value::new(CoreValue::from("<p>hi <b>there</b></p>"))).unwrap();
        assert_eq!(out.inner.to_string_lossy(), "hi there");
    }

    #[test]
    fn urlize_wraps_bare_domains_with_http_scheme() {
        let out = urlize(Value::new(CoreValue::from("see www.example.com today")), false).unwrap();
        assert!(out.inner.to_string_lossy().contains("href=\"http://www.example.com\""));
    }
}
