use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::sync::LazyLock;

use super::error::KifuError;

// `2008/03/15(土) 10:00` style weekday annotations, ASCII or full-width parens.
static WEEKDAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[(（][^)）]*[)）]").expect("weekday pattern compiles"));

const DATE_TIME_FORMATS: [&str; 2] = ["%Y/%m/%d %H:%M:%S", "%Y/%m/%d %H:%M"];

/// Parses the value of a `開始日時` header.
///
/// Accepted: `YYYY/MM/DD HH:MM:SS`, `YYYY/MM/DD HH:MM` and a bare `YYYY/MM/DD`
/// (midnight). `-` may stand in for `/`, and a parenthesised weekday after the
/// date is ignored.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, KifuError> {
    let cleaned = WEEKDAY.replace_all(raw.trim(), " ");
    let normalized = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('-', "/");

    let mut last_error = None;
    for format in DATE_TIME_FORMATS {
        match NaiveDateTime::parse_from_str(&normalized, format) {
            Ok(parsed) => return Ok(parsed),
            Err(e) => last_error = Some(e),
        }
    }

    match NaiveDate::parse_from_str(&normalized, "%Y/%m/%d") {
        Ok(date) => Ok(date.and_time(NaiveTime::MIN)),
        Err(e) => Err(KifuError::TimestampFormat {
            raw: raw.to_string(),
            source: last_error.unwrap_or(e),
        }),
    }
}
