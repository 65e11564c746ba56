//! ArchivesSpace date handling.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inclusive date range of an archival description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Builds a range from ArchivesSpace `begin`/`end` values.
    ///
    /// Values may be `YYYY`, `YYYY-MM` or `YYYY-MM-DD`. A partial begin starts
    /// on the first day of its year or month, a partial end stops on the last
    /// day. A missing end reuses the begin value.
    pub fn from_expressions(begin: &str, end: Option<&str>) -> Option<DateRange> {
        let start = parse_partial(begin, false)?;
        let end = parse_partial(end.unwrap_or(begin), true)?;
        Some(DateRange { start, end })
    }

    /// Range of the first usable entry in a record's `dates` array.
    pub fn from_record(record: &Value) -> Option<DateRange> {
        record
            .get("dates")?
            .as_array()?
            .iter()
            .find_map(|date| {
                let begin = date.get("begin").and_then(Value::as_str)?;
                let end = match date.get("date_type").and_then(Value::as_str) {
                    Some("single") => None,
                    _ => date.get("end").and_then(Value::as_str),
                };
                Self::from_expressions(begin, end)
            })
    }
}

fn parse_partial(value: &str, end_of_period: bool) -> Option<NaiveDate> {
    let value = value.trim();
    let mut parts = value.splitn(3, '-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: Option<u32> = parts.next().map(str::parse).transpose().ok()?;
    // Full dates may carry a time part: "1950-06-14T00:00:00".
    let day: Option<u32> = parts
        .next()
        .map(|rest| rest.get(..2).unwrap_or(rest).parse())
        .transpose()
        .ok()?;

    match (month, day) {
        (Some(month), Some(day)) => NaiveDate::from_ymd_opt(year, month, day),
        (Some(month), None) if end_of_period => last_day_of_month(year, month),
        (Some(month), None) => NaiveDate::from_ymd_opt(year, month, 1),
        (None, _) if end_of_period => NaiveDate::from_ymd_opt(year, 12, 31),
        (None, _) => NaiveDate::from_ymd_opt(year, 1, 1),
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    next.pred_opt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_partial_ends_are_widened() {
        let range = DateRange::from_expressions("1950", Some("1960")).unwrap();
        assert_eq!(range.start, date("1950-01-01"));
        assert_eq!(range.end, date("1960-12-31"));

        let range = DateRange::from_expressions("1950-02", Some("1952-02")).unwrap();
        assert_eq!(range.start, date("1950-02-01"));
        assert_eq!(range.end, date("1952-02-29"));

        let range = DateRange::from_expressions("1950-06-14", Some("1950-12")).unwrap();
        assert_eq!(range.start, date("1950-06-14"));
        assert_eq!(range.end, date("1950-12-31"));
    }

    #[test]
    fn test_single_date_spans_its_period() {
        let range = DateRange::from_expressions("1971-04", None).unwrap();
        assert_eq!(range.start, date("1971-04-01"));
        assert_eq!(range.end, date("1971-04-30"));

        let range = DateRange::from_expressions("1971-04-03T00:00:00", None).unwrap();
        assert_eq!(range.start, range.end);
    }

    #[test]
    fn test_unparseable_dates() {
        assert!(DateRange::from_expressions("circa 1950", None).is_none());
        assert!(DateRange::from_expressions("1950-13", None).is_none());
    }

    #[test]
    fn test_from_record() {
        let record = json!({
            "dates": [
                { "date_type": "inclusive", "expression": "undated" },
                { "date_type": "single", "begin": "1968", "end": "1990" },
            ]
        });
        let range = DateRange::from_record(&record).unwrap();
        assert_eq!(range.start, date("1968-01-01"));
        assert_eq!(range.end, date("1968-12-31"));

        assert!(DateRange::from_record(&json!({ "dates": [] })).is_none());
        assert!(DateRange::from_record(&json!({ "title": "x" })).is_none());
    }
}
