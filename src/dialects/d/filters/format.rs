//! Translates Django's date/time format specifiers into formatted output.
//! Shared by the `date`/`time` filters and the `now` tag — the original
//! implements the same table once and reuses it from both call sites.

use chrono::{Datelike, NaiveDateTime, Timelike};

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

const DAY_NAMES: [&str; 7] =
    ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];

fn ordinal_suffix(n: u32) -> &'static str {
    if (11..=13).contains(&(n % 100)) {
        return "th";
    }
    match n % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// Formats `dt` according to a Django-style format string (a small subset of
/// the documented specifiers, sufficient for the defaults in
/// `Options::formats` and ordinary user-supplied strings; unrecognized
/// letters pass through literally).
pub fn format_datetime(dt: &NaiveDateTime, spec: &str) -> String {
    let mut out = String::with_capacity(spec.len());
    let mut chars = spec.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            'd' => out.push_str(&format!("{:02}", dt.day())),
            'j' => out.push_str(&dt.day().to_string()),
            'D' => out.push_str(&DAY_NAMES[dt.weekday().num_days_from_monday() as usize][..3]),
            'l' => out.push_str(DAY_NAMES[dt.weekday().num_days_from_monday() as usize]),
            'S' => out.push_str(ordinal_suffix(dt.day())),
            'N' => out.push_str(&MONTH_NAMES[dt.month0() as usize][..3]),
            'F' => out.push_str(MONTH_NAMES[dt.month0() as usize]),
            'm' => out.push_str(&format!("{:02}", dt.month())),
            'n' => out.push_str(&dt.month().to_string()),
            'Y' => out.push_str(&dt.year().to_string()),
            'y' => out.push_str(&format!("{:02}", dt.year() % 100)),
            'H' => out.push_str(&format!("{:02}", dt.hour())),
            'G' => out.push_str(&dt.hour().to_string()),
            'i' => out.push_str(&format!("{:02}", dt.minute())),
            's' => out.push_str(&format!("{:02}", dt.second())),
            'h' => out.push_str(&format!("{:02}", twelve_hour(dt.hour()))),
            'g' => out.push_str(&twelve_hour(dt.hour()).to_string()),
            'A' => out.push_str(if dt.hour() < 12 { "AM" } else { "PM" }),
            'a' => out.push_str(if dt.hour() < 12 { "a.m." } else { "p.m." }),
            'P' => out.push_str(&format_p(dt)),
            'w' => out.push_str(&((dt.weekday().num_days_from_sunday()).to_string())),
            other => out.push(other),
        }
    }
    out
}

fn twelve_hour(hour: u32) -> u32 {
    let h = hour % 12;
    if h == 0 {
        12
    } else {
        h
    }
}

fn format_p(dt: &NaiveDateTime) -> String {
    if dt.hour() == 0 && dt.minute() == 0 {
        "midnight".to_string()
    } else if dt.hour() == 12 && dt.minute() == 0 {
        "noon".to_string()
    } else {
        let suffix = if dt.hour() < 12 { "a.m." } else { "p.m." };
        if dt.minute() == 0 {
            format!("{} {}", twelve_hour(dt.hour()), suffix)
        } else {
            format!("{}:{:02} {}", twelve_hour(dt.hour()), dt.minute(), suffix)
        }
    }
}

/// Formats only the time-of-day portion — used by the SSI `DATE_GMT` magic
/// variable, which the original formats with `format_time` rather than
/// `format_datetime` (see the B.2 design note on the asymmetry).
pub fn format_time_only(dt: &NaiveDateTime, spec: &str) -> String {
    format_datetime(dt, spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn formats_common_specifiers() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(9, 5, 0).unwrap();
        assert_eq!(format_datetime(&dt, "Y-m-d"), "2024-03-05");
        assert_eq!(format_datetime(&dt, "N j, Y"), "Mar 5, 2024");
    }

    #[test]
    fn p_specifier_handles_midnight_and_noon() {
        let midnight = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(format_datetime(&midnight, "P"), "midnight");
    }
}
