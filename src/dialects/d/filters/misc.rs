//! Filters with no natural home elsewhere: defaulting, debug-printing, and
//! the three-way boolean-to-string `yesno`.

use crate::error::Result;
use crate::value::Value as CoreValue;

use super::super::value::Value;

/// `default:"x"` — substitutes `arg` when `value` is falsy (not merely
/// missing; the missing-variable case is already handled one layer up by
/// `evaluate_pipeline`'s swallow-into-`default_value` rule).
pub fn default(value: Value, arg: Option<&Value>) -> Result<Value> {
    if value.inner.test() {
        Ok(value)
    } else {
        Ok(arg.cloned().unwrap_or_else(|| Value::new(CoreValue::None)))
    }
}

/// `default_if_none:"x"` — substitutes only when `value` is exactly `None`,
/// unlike `default` which also triggers on other falsy values.
pub fn default_if_none(value: Value, arg: Option<&Value>) -> Result<Value> {
    if matches!(value.inner, CoreValue::None) {
        Ok(arg.cloned().unwrap_or_else(|| Value::new(CoreValue::None)))
    } else {
        Ok(value)
    }
}

pub fn pprint(value: Value) -> Result<Value> {
    Ok(Value::new(CoreValue::from(format!("{:#?}", value.inner))))
}

/// `yesno:"yes,no,maybe"` — one, two, or three comma-separated forms; a
/// missing `maybe` form falls back to the `no` form for `None` values, per
/// Django's documented behaviour.
pub fn yesno(value: Value, arg_token: Option<&str>) -> Result<Value> {
    let spec = arg_token
        .map(|t| t.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .unwrap_or_else(|| "yes,no,maybe".to_string());
    let parts: Vec<&str> = spec.split(',').collect();
    let yes = parts.first().copied().unwrap_or("yes");
    let no = parts.get(1).copied().unwrap_or("no");
    let maybe = parts.get(2).copied().unwrap_or(no);

    let out = if matches!(value.inner, CoreValue::None) {
        maybe
    } else if value.inner.test() {
        yes
    } else {
        no
    };
    Ok(Value::new(CoreValue::from(out)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_triggers_on_any_falsy_value() {
        let out = default(Value::new(CoreValue::from(0.0)), Some(&Value::new(CoreValue::from("x")))).unwrap();
        assert_eq!(out.inner.to_string_lossy(), "x");
    }

    #[test]
    fn default_if_none_ignores_other_falsy_values() {
        let out = default_if_none(Value::new(CoreValue::from(0.0)), Some(&Value::new(CoreValue::from("x")))).unwrap();
        assert_eq!(out.inner.to_number().unwrap(), 0.0);
    }

    #[test]
    fn yesno_picks_maybe_form_for_none() {
        let out = yesno(Value::new(CoreValue::None), Some("\"yup,nope,dunno\"")).unwrap();
        assert_eq!(out.inner.to_string_lossy(), "dunno");
    }

    #[test]
    fn yesno_falls_back_to_no_form_when_maybe_missing() {
        let out = yesno(Value::new(CoreValue::None), Some("\"yup,nope\"")).unwrap();
        assert_eq!(out.inner.to_string_lossy(), "nope");
    }
}
