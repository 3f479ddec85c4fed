//! Scalar codecs applied on top of key transcoding: calendar dates and the
//! `metadata` <-> `meta.data` envelope.

use chrono::{DateTime, NaiveDate};
use serde_json::{json, Value};

/// Date format the service reads and writes.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Re-render a date-like JSON string in [`DATE_FORMAT`]. Anything that is not
/// a recognizable date is returned unchanged, so partial attribute sets never
/// fail here.
pub fn format_date_value(value: Value) -> Value {
    match &value {
        Value::String(text) => match parse_date(Some(text)) {
            Some(date) => Value::String(format_date(&date)),
            None => value,
        },
        _ => value,
    }
}

/// Parse a wire date. Accepts a plain date or an RFC 3339 timestamp (the
/// date component is kept). Absent, empty and unparseable input yield `None`.
pub fn parse_date(text: Option<&str>) -> Option<NaiveDate> {
    let text = text?.trim();
    if text.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|ts| ts.date_naive()))
}

/// Wrap opaque metadata in the wire envelope: `{"data": value}`.
pub fn metadata_to_meta(metadata: Value) -> Value {
    json!({ "data": metadata })
}

/// Unwrap `meta.data`. `None` when `meta` is absent or null.
pub fn meta_to_domain(meta: Option<&Value>) -> Option<Value> {
    match meta? {
        Value::Null => None,
        meta => meta.get("data").cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn formats_dates_as_iso_calendar_dates() {
        assert_eq!(format_date(&date(1990, 3, 7)), "1990-03-07");
    }

    #[test]
    fn format_date_value_normalizes_timestamps() {
        let value = format_date_value(json!("1990-03-07T10:00:00Z"));
        assert_eq!(value, json!("1990-03-07"));
    }

    #[test]
    fn format_date_value_passes_non_dates_through() {
        assert_eq!(format_date_value(json!("tomorrow")), json!("tomorrow"));
        assert_eq!(format_date_value(json!(42)), json!(42));
        assert_eq!(format_date_value(Value::Null), Value::Null);
    }

    #[test]
    fn parse_date_accepts_dates_and_timestamps() {
        assert_eq!(parse_date(Some("2001-12-31")), Some(date(2001, 12, 31)));
        assert_eq!(
            parse_date(Some("2001-12-31T23:59:59.000+00:00")),
            Some(date(2001, 12, 31))
        );
    }

    #[test]
    fn parse_date_returns_none_for_missing_input() {
        assert_eq!(parse_date(None), None);
        assert_eq!(parse_date(Some("")), None);
        assert_eq!(parse_date(Some("not a date")), None);
    }

    #[test]
    fn metadata_wraps_and_unwraps() {
        let meta = metadata_to_meta(json!({ "k": 1 }));
        assert_eq!(meta, json!({ "data": { "k": 1 } }));
        assert_eq!(meta_to_domain(Some(&meta)), Some(json!({ "k": 1 })));
        assert_eq!(meta_to_domain(None), None);
        assert_eq!(meta_to_domain(Some(&Value::Null)), None);
    }
}
