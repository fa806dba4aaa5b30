use chrono::{NaiveDate, NaiveTime};
use std::fmt;

/// Declared column type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum ValueType {
    String,
    Integer,
    Decimal,
    Date,
    Time,
}

impl ValueType {
    /// Parses a declared type name, exactly as written in table definitions
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim() {
            "String" => Some(ValueType::String),
            "Integer" => Some(ValueType::Integer),
            "Decimal" => Some(ValueType::Decimal),
            "Date" => Some(ValueType::Date),
            "Time" => Some(ValueType::Time),
            _ => None,
        }
    }

    /// Returns the declared type name
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::String => "String",
            ValueType::Integer => "Integer",
            ValueType::Decimal => "Decimal",
            ValueType::Date => "Date",
            ValueType::Time => "Time",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A typed, coerced field value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[cfg_attr(feature = "json", serde(untagged))]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl FieldValue {
    /// Returns the type this value was coerced to
    pub fn value_type(&self) -> ValueType {
        match self {
            FieldValue::Text(_) => ValueType::String,
            FieldValue::Integer(_) => ValueType::Integer,
            FieldValue::Decimal(_) => ValueType::Decimal,
            FieldValue::Date(_) => ValueType::Date,
            FieldValue::Time(_) => ValueType::Time,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of Integer and Decimal values
    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            FieldValue::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Decimal(d) => write!(f, "{}", d),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
        }
    }
}
