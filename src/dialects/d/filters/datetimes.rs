//! `date`, `time`, `timesince`, `timeuntil`.

use chrono::{Local, NaiveDateTime};

use crate::error::{Error, Result};
use crate::value::Value as CoreValue;

use super::super::options::Options;
use super::super::value::Value;
use super::format::format_datetime;

fn as_datetime(value: &Value) -> Result<NaiveDateTime> {
    value.inner.to_datetime()
}

pub fn date(value: Value, arg: Option<&Value>, opts: &Options) -> Result<Value> {
    let dt = as_datetime(&value)?;
    let spec = match arg {
        Some(v) => v.inner.to_string_lossy(),
        None => opts.format("DATE_FORMAT").to_string(),
    };
    Ok(Value::new(CoreValue::from(format_datetime(&dt, &spec))))
}

pub fn time(value: Value, arg: Option<&Value>, opts: &Options) -> Result<Value> {
    let dt = as_datetime(&value)?;
    let spec = match arg {
        Some(v) => v.inner.to_string_lossy(),
        None => opts.format("TIME_FORMAT").to_string(),
    };
    Ok(Value::new(CoreValue::from(format_datetime(&dt, &spec))))
}

fn humanize_delta(seconds: i64) -> String {
    const CHUNKS: [(i64, &str); 6] = [
        (60 * 60 * 24 * 365, "year"),
        (60 * 60 * 24 * 30, "month"),
        (60 * 60 * 24 * 7, "week"),
        (60 * 60 * 24, "day"),
        (60 * 60, "hour"),
        (60, "minute"),
    ];
    let seconds = seconds.max(0);
    for (chunk, name) in CHUNKS {
        if seconds >= chunk {
            let count = seconds / chunk;
            let plural = if count == 1 { "" } else { "s" };
            return format!("{count} {name}{plural}");
        }
    }
    "0 minutes".to_string()
}

pub fn timesince(value: Value, arg: Option<&Value>) -> Result<Value> {
    let then = as_datetime(&value)?;
    let now = match arg {
        Some(v) => as_datetime(v)?,
        None => Local::now().naive_local(),
    };
    let delta = (now - then).num_seconds();
    Ok(Value::new(CoreValue::from(humanize_delta(delta))))
}

pub fn timeuntil(value: Value, arg: Option<&Value>) -> Result<Value> {
    let then = as_datetime(&value)?;
    let now = match arg {
        Some(v) => as_datetime(v)?,
        None => Local::now().naive_local(),
    };
    let delta = (then - now).num_seconds();
    Ok(Value::new(CoreValue::from(humanize_delta(delta))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn date_filter_uses_default_format_option() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let value = Value::new(CoreValue::DateTime(dt));
        let opts = Options::default();
        let out = date(value, None, &opts).unwrap();
        assert_eq!(out.inner.to_string_lossy(), "Mar 5, 2024");
    }

    #[test]
    fn timesince_reports_largest_unit() {
        let earlier = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let later = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let out = timesince(
            Value::new(CoreValue::DateTime(earlier)),
            Some(&Value::new(CoreValue::DateTime(later))),
        )
        .unwrap();
        assert_eq!(out.inner.to_string_lossy(), "1 week");
    }
}
