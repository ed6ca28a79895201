use bigdecimal::{BigDecimal, FromPrimitive};
use model::{
    core::value::Value,
    mapping::field::{ConversionOp, FieldMapping, UnitConversion},
    records::row::RowData,
};
use std::str::FromStr;
use tracing::warn;

/// Fallback source columns consulted when a unit conversion does not name
/// its fields explicitly.
const UNIT_MEASURE_FALLBACKS: [&str; 4] = ["Unit_Measure", "UNI_MED", "UNIDAD", "TIPO_UNIDAD"];
const FACTOR_FALLBACKS: [&str; 4] = ["Factor_Conversion", "CNT_MAX", "FACTOR", "CONV_FACTOR"];

/// Steps 1–4 of the transform chain: prefix removal, value mapping, unit
/// conversion, date normalisation. Truncation and consecutive assignment
/// happen in `resolve`, where column metadata and the reservation live.
pub fn apply_transforms(value: Value, field: &FieldMapping, source_row: &RowData) -> Value {
    let value = remove_prefix(value, field);
    let value = map_value(value, field);
    let value = convert_units(value, field, source_row);
    normalize_dates(value)
}

fn remove_prefix(value: Value, field: &FieldMapping) -> Value {
    let Some(prefix) = &field.remove_prefix else {
        return value;
    };
    match value {
        Value::String(s) if s.starts_with(prefix.as_str()) => {
            Value::String(s[prefix.len()..].to_string())
        }
        other => other,
    }
}

fn map_value(value: Value, field: &FieldMapping) -> Value {
    if field.value_mappings.is_empty() {
        return value;
    }
    let Some(as_string) = value.as_string() else {
        return value;
    };
    for mapping in &field.value_mappings {
        if mapping.source_value == as_string {
            return Value::String(mapping.target_value.clone());
        }
    }
    value
}

fn convert_units(value: Value, field: &FieldMapping, source_row: &RowData) -> Value {
    let Some(conversion) = &field.unit_conversion else {
        return value;
    };
    if !conversion.enabled {
        return value;
    }
    let Some(amount) = value.as_big_decimal() else {
        warn!(
            field = %field.target_field,
            "unit conversion skipped: value is not numeric"
        );
        return value;
    };

    let Some(factor) = read_factor(conversion, source_row) else {
        warn!(
            field = %field.target_field,
            "unit conversion skipped: factor missing or not positive"
        );
        return value;
    };

    let converted = match conversion.operation {
        ConversionOp::Multiply => amount * factor,
        ConversionOp::Divide => amount / factor,
    };
    let converted = match conversion.decimals {
        Some(decimals) => converted.round(decimals),
        None => converted,
    };
    Value::Decimal(converted)
}

fn read_factor(conversion: &UnitConversion, source_row: &RowData) -> Option<BigDecimal> {
    let configured = conversion.conversion_factor_field.as_deref();
    let mut candidates: Vec<&str> = Vec::new();
    if let Some(name) = configured {
        candidates.push(name);
    }
    candidates.extend(FACTOR_FALLBACKS);

    for name in candidates {
        if !source_row.contains(name) {
            continue;
        }
        let raw = source_row.get_value(name);
        let factor = match &raw {
            Value::String(s) => BigDecimal::from_str(s.trim()).ok(),
            other => other.as_f64().and_then(BigDecimal::from_f64),
        };
        return factor.filter(|f| f > &BigDecimal::from(0));
    }
    None
}

/// Unit-of-measure column actually present on the row, if any. Only used
/// for diagnostics; the factor drives the arithmetic.
pub fn unit_measure_of(conversion: &UnitConversion, source_row: &RowData) -> Option<String> {
    let mut candidates: Vec<&str> = Vec::new();
    if let Some(name) = conversion.unit_measure_field.as_deref() {
        candidates.push(name);
    }
    candidates.extend(UNIT_MEASURE_FALLBACKS);
    candidates
        .into_iter()
        .find(|name| source_row.contains(name))
        .and_then(|name| source_row.get_value(name).as_string())
}

fn normalize_dates(value: Value) -> Value {
    match &value {
        Value::String(s) => Value::parse_temporal(s).unwrap_or(value),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::FieldValue;

    fn field(json: &str) -> FieldMapping {
        serde_json::from_str(json).unwrap()
    }

    fn row(fields: Vec<(&str, Value)>) -> RowData {
        RowData::new(
            "t",
            fields
                .into_iter()
                .map(|(name, value)| FieldValue::new(name, value))
                .collect(),
        )
    }

    #[test]
    fn prefix_then_value_map() {
        let f = field(
            r#"{ "targetField": "T", "removePrefix": "ART-",
                 "valueMappings": [ { "sourceValue": "001", "targetValue": "X1" } ] }"#,
        );
        let out = apply_transforms(Value::String("ART-001".into()), &f, &row(vec![]));
        assert_eq!(out, Value::String("X1".into()));
    }

    #[test]
    fn unit_conversion_uses_fallback_factor_fields() {
        let f = field(
            r#"{ "targetField": "QTY", "unitConversion": { "operation": "multiply", "decimals": 2 } }"#,
        );
        let source = row(vec![("CNT_MAX", Value::Int(12))]);
        let out = apply_transforms(Value::Int(3), &f, &source);
        assert_eq!(out.as_f64(), Some(36.0));
    }

    #[test]
    fn unit_conversion_leaves_value_when_factor_invalid() {
        let f = field(r#"{ "targetField": "QTY", "unitConversion": { "operation": "divide" } }"#);
        let source = row(vec![("FACTOR", Value::Int(0))]);
        let out = apply_transforms(Value::Int(10), &f, &source);
        assert_eq!(out, Value::Int(10));
    }

    #[test]
    fn divide_rounds_to_requested_decimals() {
        let f = field(
            r#"{ "targetField": "QTY",
                 "unitConversion": { "operation": "divide", "conversionFactorField": "F", "decimals": 3 } }"#,
        );
        let source = row(vec![("F", Value::Int(3))]);
        let out = apply_transforms(Value::Int(10), &f, &source);
        assert_eq!(out.as_string().unwrap(), "3.333");
    }

    #[test]
    fn iso_strings_become_temporal_values() {
        let f = field(r#"{ "targetField": "D" }"#);
        let out = apply_transforms(Value::String("2024-05-01".into()), &f, &row(vec![]));
        assert!(matches!(out, Value::Date(_)));
        let out = apply_transforms(Value::String("not a date".into()), &f, &row(vec![]));
        assert!(matches!(out, Value::String(_)));
    }
}
