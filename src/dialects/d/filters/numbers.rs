//! Numeric-formatting filters.

use crate::error::{Error, Result};
use crate::value::Value as CoreValue;

use super::super::value::Value;

pub fn add(value: Value, arg: Option<&Value>) -> Result<Value> {
    let arg = arg.ok_or(Error::MissingArgument)?;
    if let (Ok(a), Ok(b)) = (value.inner.to_number(), arg.inner.to_number()) {
        return Ok(Value::new(CoreValue::from(a + b)));
    }
    let joined = format!("{}{}", value.inner.to_string_lossy(), arg.inner.to_string_lossy());
    Ok(Value::new(CoreValue::from(joined)))
}

pub fn divisibleby(value: Value, arg: Option<&Value>) -> Result<Value> {
    let divisor = arg.ok_or(Error::MissingArgument)?.inner.to_number()?;
    let n = value.inner.to_number()?;
    Ok(Value::new(CoreValue::Bool(divisor != 0.0 && n % divisor == 0.0)))
}

const UNITS: [&str; 9] =
    ["bytes", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

pub fn filesizeformat(value: Value) -> Result<Value> {
    let mut size = value.inner.to_number()?;
    if size.abs() < 1000.0 {
        return Ok(Value::new(CoreValue::from(format!("{} bytes", size as i64))));
    }
    let mut unit_index = 1;
    size /= 1024.0;
    while size.abs() >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }
    Ok(Value::new(CoreValue::from(format!("{:.1} {}", size, UNITS[unit_index]))))
}

/// Rounds to `arg` decimal places, half-away-from-zero, matching Django's
/// documented `floatformat` (and, per the B.2 note, `widthratio`'s rounding).
pub fn floatformat(value: Value, arg: Option<&Value>) -> Result<Value> {
    let n = value.inner.to_number()?;
    let precision = match arg {
        Some(v) => v.inner.to_number().unwrap_or(1.0) as i32,
        None => 1,
    };
    if precision == 0 || (precision > 0 && n.fract() == 0.0) {
        return Ok(Value::new(CoreValue::from(format!("{}", round_half_away_from_zero(n, 0)))));
    }
    let digits = precision.unsigned_abs() as usize;
    Ok(Value::new(CoreValue::from(format!("{:.*}", digits, round_half_away_from_zero(n, digits as i32)))))
}

pub fn round_half_away_from_zero(n: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (n * factor).abs().round().copysign(n) / factor
}

pub fn get_digit(value: Value, arg: Option<&Value>) -> Result<Value> {
    let n = value.inner.to_number()?;
    let position = arg.ok_or(Error::MissingArgument)?.inner.to_number()? as u32;
    if position == 0 {
        return Ok(Value::new(CoreValue::from(n)));
    }
    let digits: Vec<u32> = (n.abs() as u64).to_string().chars().rev().filter_map(|c| c.to_digit(10)).collect();
    let digit = digits.get(position as usize - 1).copied().unwrap_or(0);
    Ok(Value::new(CoreValue::from(digit as f64)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_adds_numbers_and_concatenates_strings() {
        let out = add(Value::new(CoreValue::from(1.0)), Some(&Value::new(CoreValue::from(2.0)))).unwrap();
        assert_eq!(out.inner.to_number().unwrap(), 3.0);
    }

    #[test]
    fn floatformat_rounds_half_away_from_zero() {
        let out = floatformat(Value::new(CoreValue::from(2.5)), Some(&Value::new(CoreValue::from(0.0)))).unwrap();
        assert_eq!(out.inner.to_string_lossy(), "3");
    }

    #[test]
    fn filesizeformat_picks_appropriate_unit() {
        let out = filesizeformat(Value::new(CoreValue::from(1_500_000.0))).unwrap();
        assert_eq!(out.inner.to_string_lossy(), "1.4 MB");
    }
}
