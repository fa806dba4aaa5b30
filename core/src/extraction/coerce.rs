use crate::error::FieldErrorKind;
use crate::schema::FieldSpec;
use crate::types::{FieldValue, ValueType};
use chrono::{NaiveDate, NaiveTime, Timelike};

/// Converts a raw header value to the field's declared type
///
/// Returns `Ok(None)` for a missing or blank value.
pub fn coerce(raw: Option<&str>, field: &FieldSpec) -> Result<Option<FieldValue>, FieldErrorKind> {
    let value = match raw.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => return Ok(None),
    };

    match field.value_type {
        ValueType::String => coerce_string(value, field.max_length).map(Some),
        ValueType::Integer => match first_value(value) {
            Some(first) => parse_integer(first).map(|i| Some(FieldValue::Integer(i))),
            None => Ok(None),
        },
        ValueType::Decimal => match first_value(value) {
            Some(first) => parse_decimal(first).map(|d| Some(FieldValue::Decimal(d))),
            None => Ok(None),
        },
        ValueType::Date => parse_date(value).map(|d| Some(FieldValue::Date(d))),
        ValueType::Time => parse_time(value).map(|t| Some(FieldValue::Time(t))),
    }
}

fn coerce_string(value: &str, max_length: Option<usize>) -> Result<FieldValue, FieldErrorKind> {
    let length = value.chars().count();
    match max_length {
        Some(max) if length > max => Err(FieldErrorKind::TooLong { length, max }),
        _ => Ok(FieldValue::Text(value.to_string())),
    }
}

/// First component of a backslash-separated multi-value
fn first_value(value: &str) -> Option<&str> {
    value
        .split('\\')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn unparsable(value: &str, expected: &'static str) -> FieldErrorKind {
    FieldErrorKind::Unparsable {
        value: value.to_string(),
        expected,
    }
}

/// Parses an integer, accepting integral decimal notation such as `512.0`
pub fn parse_integer(value: &str) -> Result<i64, FieldErrorKind> {
    let value = value.trim();
    if let Ok(i) = value.parse::<i64>() {
        return Ok(i);
    }
    match value.parse::<f64>() {
        Ok(d) if d.is_finite() && d.fract() == 0.0 && d.abs() < i64::MAX as f64 => Ok(d as i64),
        _ => Err(unparsable(value, "Integer")),
    }
}

pub fn parse_decimal(value: &str) -> Result<f64, FieldErrorKind> {
    let value = value.trim();
    match value.parse::<f64>() {
        Ok(d) if d.is_finite() => Ok(d),
        _ => Err(unparsable(value, "Decimal")),
    }
}

/// Parses a DICOM date, `YYYYMMDD`
pub fn parse_date(value: &str) -> Result<NaiveDate, FieldErrorKind> {
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(unparsable(value, "Date"));
    }
    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| unparsable(value, "Date"))
}

/// Parses a DICOM time, `HHMMSS` with an optional `.ffffff` fraction
pub fn parse_time(value: &str) -> Result<NaiveTime, FieldErrorKind> {
    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (value, None),
    };

    if whole.len() != 6 || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(unparsable(value, "Time"));
    }
    let time = NaiveTime::parse_from_str(whole, "%H%M%S").map_err(|_| unparsable(value, "Time"))?;

    match fraction {
        None => Ok(time),
        Some(digits)
            if !digits.is_empty()
                && digits.len() <= 9
                && digits.bytes().all(|b| b.is_ascii_digit()) =>
        {
            let scale = 10u32.pow(9 - digits.len() as u32);
            let nanos = digits
                .parse::<u32>()
                .map_err(|_| unparsable(value, "Time"))?
                * scale;
            time.with_nanosecond(nanos)
                .ok_or_else(|| unparsable(value, "Time"))
        }
        Some(_) => Err(unparsable(value, "Time")),
    }
}
