use crate::core::data_type::DataType;
use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// A typed cell value as it travels from a source row, through the
/// evaluator, into a target INSERT parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Decimal(BigDecimal),
    String(String),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            Value::Decimal(v) => v.to_i64(),
            Value::String(v) => v.trim().parse::<i64>().ok(),
            Value::Boolean(v) => Some(if *v { 1 } else { 0 }),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Decimal(v) => v.to_f64(),
            Value::String(v) => v.trim().parse::<f64>().ok(),
            Value::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            Value::Json(v) => v.as_f64(),
            _ => None,
        }
    }

    pub fn as_big_decimal(&self) -> Option<BigDecimal> {
        match self {
            Value::Decimal(v) => Some(v.clone()),
            Value::Int(v) => Some(BigDecimal::from(*v)),
            Value::Float(v) => BigDecimal::from_f64(*v),
            Value::String(s) => BigDecimal::from_str(s.trim()).ok(),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::Int(v) => Some(v.to_string()),
            Value::Float(v) => Some(v.to_string()),
            Value::Decimal(v) => Some(v.to_string()),
            Value::String(v) => Some(v.clone()),
            Value::Boolean(v) => Some(v.to_string()),
            Value::Date(v) => Some(v.format("%Y-%m-%d").to_string()),
            Value::DateTime(v) => Some(v.format("%Y-%m-%d %H:%M:%S").to_string()),
            Value::Timestamp(v) => Some(v.to_rfc3339()),
            Value::Uuid(v) => Some(v.to_string()),
            Value::Json(v) => Some(v.to_string()),
            Value::Bytes(_) => None,
            Value::Null => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            Value::Float(v) => Some(*v != 0.0),
            Value::String(v) => match v.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "y" | "s" | "si" => Some(true),
                "false" | "0" | "no" | "n" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int(_) => DataType::BigInt,
            Value::Float(_) => DataType::Float,
            Value::Decimal(_) => DataType::Decimal,
            Value::String(_) => DataType::VarChar,
            Value::Boolean(_) => DataType::Boolean,
            Value::Date(_) => DataType::Date,
            Value::DateTime(_) => DataType::DateTime,
            Value::Timestamp(_) => DataType::Timestamp,
            Value::Uuid(_) => DataType::Uuid,
            Value::Bytes(_) => DataType::Bytes,
            Value::Json(_) => DataType::Json,
            Value::Null => DataType::Null,
        }
    }

    /// Parse an ISO-8601-looking string into a temporal value, if it is one.
    pub fn parse_temporal(s: &str) -> Option<Value> {
        let trimmed = s.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
            return Some(Value::Timestamp(ts.with_timezone(&Utc)));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
            return Some(Value::Timestamp(naive.and_utc()));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
            return Some(Value::Timestamp(naive.and_utc()));
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Some(Value::Date(date));
        }
        None
    }
}

/// SQL-literal rendering, used for logs and for the memory adapter's
/// statement echo. Bound parameters never go through `Display`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "'{}'", v.replace('\'', "''")),
            Value::Boolean(v) => write!(f, "{}", if *v { 1 } else { 0 }),
            Value::Date(v) => write!(f, "'{v}'"),
            Value::DateTime(v) => write!(f, "'{}'", v.format("%Y-%m-%d %H:%M:%S")),
            Value::Timestamp(v) => write!(f, "'{}'", v.format("%Y-%m-%d %H:%M:%S")),
            Value::Uuid(v) => write!(f, "'{v}'"),
            Value::Bytes(v) => {
                let hex = v
                    .iter()
                    .fold(String::new(), |acc, byte| acc + &format!("{byte:02x}"));
                write!(f, "0x{hex}")
            }
            Value::Json(v) => write!(f, "'{}'", v.to_string().replace('\'', "''")),
            Value::Null => write!(f, "NULL"),
        }
    }
}

/// A named, typed cell inside a [`RowData`](crate::records::row::RowData).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldValue {
    pub name: String,
    pub value: Option<Value>,
    pub data_type: DataType,
}

impl FieldValue {
    pub fn new(name: &str, value: Value) -> Self {
        let data_type = value.data_type();
        FieldValue {
            name: name.to_string(),
            value: Some(value),
            data_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_dates_and_timestamps() {
        assert!(matches!(
            Value::parse_temporal("2024-03-01"),
            Some(Value::Date(_))
        ));
        assert!(matches!(
            Value::parse_temporal("2024-03-01T10:30:00Z"),
            Some(Value::Timestamp(_))
        ));
        assert!(matches!(
            Value::parse_temporal("2024-03-01 10:30:00"),
            Some(Value::Timestamp(_))
        ));
        assert!(Value::parse_temporal("P1").is_none());
    }

    #[test]
    fn boolean_normalisation_accepts_spanish_affirmatives() {
        assert_eq!(Value::String("S".into()).as_bool(), Some(true));
        assert_eq!(Value::String("y".into()).as_bool(), Some(true));
        assert_eq!(Value::String("si".into()).as_bool(), Some(true));
        assert_eq!(Value::String("no".into()).as_bool(), Some(false));
    }
}
