//! Sequence- and mapping-shaped filters.

use rand::seq::SliceRandom;

use crate::error::{Error, Result};
use crate::value::Value as CoreValue;

use super::super::value::Value;

fn items(value: &Value) -> Vec<CoreValue> {
    value.inner.iter().collect()
}

pub fn first(value: Value) -> Result<Value> {
    Ok(value.inner.iter().next().map(Value::new).unwrap_or_else(|| Value::new(CoreValue::None)))
}

pub fn last(value: Value) -> Result<Value> {
    Ok(items(&value).into_iter().last().map(Value::new).unwrap_or_else(|| Value::new(CoreValue::None)))
}

pub fn length(value: Value) -> Result<Value> {
    let n = value.inner.size().unwrap_or(0);
    Ok(Value::new(CoreValue::from(n as f64)))
}

pub fn length_is(value: Value, arg: Option<&Value>) -> Result<Value> {
    let expected = arg.ok_or(Error::MissingArgument)?.inner.to_number().unwrap_or(-1.0);
    let actual = value.inner.size().unwrap_or(0) as f64;
    Ok(Value::new(CoreValue::Bool(actual == expected)))
}

pub fn join(value: Value, arg: Option<&Value>) -> Result<Value> {
    let sep = arg.map(|v| v.inner.to_string_lossy().into_owned()).unwrap_or_default();
    let parts: Vec<String> = items(&value).iter().map(|v| v.to_string_lossy().into_owned()).collect();
    Ok(Value::new(CoreValue::from(parts.join(&sep))))
}

pub fn make_list(value: Value) -> Result<Value> {
    let list: Vec<CoreValue> = match &value.inner {
        CoreValue::String(s) => s.chars().map(|c| CoreValue::from(c.to_string())).collect(),
        other => other.iter().collect(),
    };
    Ok(Value::new(CoreValue::from(list)))
}

pub fn random(value: Value) -> Result<Value> {
    let list = items(&value);
    let mut rng = rand::thread_rng();
    Ok(list.choose(&mut rng).cloned().map(Value::new).unwrap_or_else(|| Value::new(CoreValue::None)))
}

/// `slice:"start:stop"`, mirroring Python slice syntax — reuses the core
/// value's `slice` which already implements the negative-index rotation.
pub fn slice(value: Value, arg_token: Option<&str>) -> Result<Value> {
    let spec = arg_token.unwrap_or("").trim_matches(|c| c == '"' || c == '\'');
    let (lo_s, hi_s) = spec.split_once(':').unwrap_or((spec, ""));
    let lo = parse_signed(lo_s);
    let hi = parse_signed(hi_s);
    let sliced = value.inner.slice(lo, hi)?;
    Ok(Value::new(sliced))
}

fn parse_signed(s: &str) -> Option<i64> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        s.parse().ok()
    }
}

/// Sorts by a dotted attribute path; stable, ties preserve original order,
/// `reverse` reverses the whole stable-sorted sequence afterward so ties stay
/// in their relative order even when reversed.
pub fn dictsort(value: Value, arg: Option<&Value>, reverse: bool) -> Result<Value> {
    let path = arg.map(|v| v.inner.to_string_lossy().into_owned()).unwrap_or_default();
    let sorted = value.inner.sort_by(&path, reverse)?;
    Ok(Value::new(sorted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_uses_separator_argument() {
        let seq = CoreValue::from(vec![CoreValue::from("a"), CoreValue::from("b")]);
        let out = join(Value::new(seq), Some(&Value::new(CoreValue::from(",")))).unwrap();
        assert_eq!(out.inner.to_string_lossy(), "a,b");
    }

    #[test]
    fn slice_parses_python_style_range() {
        let seq = CoreValue::from(vec![
            CoreValue::from(1.0),
            CoreValue::from(2.0),
            CoreValue::from(3.0),
        ]);
        let out = slice(Value::new(seq), Some("1:")).unwrap();
        assert_eq!(out.inner.size().unwrap(), 2);
    }
}
