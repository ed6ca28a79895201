use crate::core::value::{FieldValue, Value};
use serde::{Deserialize, Serialize};

/// One row read from (or destined for) a table: an ordered set of named,
/// typed cells. Column lookups are case-insensitive because the supported
/// engines disagree on identifier casing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowData {
    pub entity: String,
    pub field_values: Vec<FieldValue>,
}

impl RowData {
    pub fn new(entity: &str, field_values: Vec<FieldValue>) -> Self {
        RowData {
            entity: entity.to_string(),
            field_values,
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.field_values
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(field))
    }

    /// Whether the row carries the column at all (even with a NULL value).
    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn get_value(&self, field: &str) -> Value {
        self.get(field)
            .and_then(|f| f.value.clone())
            .unwrap_or(Value::Null)
    }

    /// Set a column in place, appending it if the row does not have it yet.
    pub fn set(&mut self, field: &str, value: Value) {
        if let Some(existing) = self
            .field_values
            .iter_mut()
            .find(|f| f.name.eq_ignore_ascii_case(field))
        {
            existing.data_type = value.data_type();
            existing.value = Some(value);
        } else {
            self.field_values.push(FieldValue::new(field, value));
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        self.field_values.iter().map(|f| f.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_is_case_insensitive() {
        let row = RowData::new(
            "orders",
            vec![FieldValue::new("NUM_PED", Value::String("P1".into()))],
        );
        assert_eq!(row.get_value("num_ped"), Value::String("P1".into()));
        assert!(row.contains("Num_Ped"));
        assert!(!row.contains("other"));
    }

    #[test]
    fn set_replaces_or_appends() {
        let mut row = RowData::new("orders", vec![]);
        row.set("qty", Value::Int(1));
        row.set("QTY", Value::Int(2));
        assert_eq!(row.field_values.len(), 1);
        assert_eq!(row.get_value("qty"), Value::Int(2));
    }
}
