use crate::sql::base::metadata::ColumnMetadata;
use model::core::{data_type::DataType, value::Value};
use tracing::warn;

/// Bind-site normalisation: empty strings and the `NULL` sentinel bind SQL
/// NULL, values are nudged toward the column's type, and over-length
/// strings are truncated to the column's max length.
pub fn coerce_for_column(value: Value, column: &ColumnMetadata) -> Value {
    let value = match value {
        Value::String(s) if s.is_empty() || s == "NULL" => Value::Null,
        other => other,
    };
    if value.is_null() {
        return Value::Null;
    }

    let value = coerce_type(value, &column.data_type);
    truncate_to_length(value, column)
}

fn coerce_type(value: Value, data_type: &DataType) -> Value {
    match data_type {
        DataType::SmallInt | DataType::Int | DataType::BigInt => match value.as_i64() {
            Some(v) => Value::Int(v),
            None => value,
        },
        DataType::Float => match value.as_f64() {
            Some(v) => Value::Float(v),
            None => value,
        },
        DataType::Decimal => match value.as_big_decimal() {
            Some(v) => Value::Decimal(v),
            None => value,
        },
        DataType::Boolean => match value.as_bool() {
            Some(v) => Value::Boolean(v),
            None => value,
        },
        DataType::Date => match &value {
            Value::Date(_) => value,
            Value::DateTime(dt) => Value::Date(dt.date()),
            Value::Timestamp(ts) => Value::Date(ts.date_naive()),
            Value::String(s) => match Value::parse_temporal(s) {
                Some(Value::Date(d)) => Value::Date(d),
                Some(Value::Timestamp(ts)) => Value::Date(ts.date_naive()),
                _ => value,
            },
            _ => value,
        },
        DataType::DateTime => match &value {
            Value::DateTime(_) => value,
            Value::Timestamp(ts) => Value::DateTime(ts.naive_utc()),
            Value::Date(d) => match d.and_hms_opt(0, 0, 0) {
                Some(dt) => Value::DateTime(dt),
                None => value,
            },
            Value::String(s) => match Value::parse_temporal(s) {
                Some(Value::Timestamp(ts)) => Value::DateTime(ts.naive_utc()),
                Some(Value::Date(d)) => d
                    .and_hms_opt(0, 0, 0)
                    .map(Value::DateTime)
                    .unwrap_or(value),
                _ => value,
            },
            _ => value,
        },
        DataType::Timestamp => match &value {
            Value::Timestamp(_) => value,
            Value::DateTime(dt) => Value::Timestamp(dt.and_utc()),
            Value::String(s) => Value::parse_temporal(s).unwrap_or(value),
            _ => value,
        },
        DataType::Char | DataType::VarChar | DataType::Text => match &value {
            Value::String(_) => value,
            other => match other.as_string() {
                Some(s) => Value::String(s),
                None => value,
            },
        },
        _ => value,
    }
}

fn truncate_to_length(value: Value, column: &ColumnMetadata) -> Value {
    let Some(max) = column.max_length else {
        return value;
    };
    if max == 0 {
        return value;
    }
    match value {
        Value::String(s) if s.chars().count() > max => {
            warn!(
                column = %column.name,
                max_length = max,
                "Truncating over-length value at bind site"
            );
            Value::String(s.chars().take(max).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn varchar(max: usize) -> ColumnMetadata {
        let mut col = ColumnMetadata::new("name", "varchar", 1);
        col.max_length = Some(max);
        col
    }

    #[test]
    fn null_sentinel_and_empty_bind_null() {
        let col = varchar(10);
        assert!(coerce_for_column(Value::String("NULL".into()), &col).is_null());
        assert!(coerce_for_column(Value::String("".into()), &col).is_null());
    }

    #[test]
    fn truncates_to_max_length() {
        let col = varchar(3);
        assert_eq!(
            coerce_for_column(Value::String("abcdef".into()), &col),
            Value::String("abc".into())
        );
    }

    #[test]
    fn coerces_strings_to_numeric_columns() {
        let col = ColumnMetadata::new("qty", "int", 1);
        assert_eq!(
            coerce_for_column(Value::String("12".into()), &col),
            Value::Int(12)
        );
    }
}
