use crate::error::EvalError;
use connectors::{manager::Connection, sql::base::requests::NamedParam};
use model::{core::value::Value, mapping::table::TableConfig, records::row::RowData};
use std::collections::HashMap;
use tracing::debug;

const RESULT_COLUMN: &str = "result";

/// Run every lookup-from-target query of `table` for the current source
/// row, in one batch before the INSERT is assembled. A failed required
/// lookup fails the whole document.
pub async fn run_lookups(
    table: &TableConfig,
    source_row: &RowData,
    target: &Connection,
) -> Result<HashMap<String, Value>, EvalError> {
    let mut results = HashMap::new();

    for field in table.lookup_fields() {
        let Some(query) = field.lookup_query.as_deref() else {
            return Err(EvalError::InvalidConfig(format!(
                "field '{}' is lookupFromTarget without a lookupQuery",
                field.target_field
            )));
        };

        let mut params = Vec::with_capacity(field.lookup_params.len());
        let mut missing_param = None;
        for lp in &field.lookup_params {
            if !source_row.contains(&lp.source_field) {
                missing_param = Some(lp.param_name.clone());
                break;
            }
            params.push(NamedParam::new(
                &lp.param_name,
                source_row.get_value(&lp.source_field),
            ));
        }
        if let Some(param) = missing_param {
            if field.fail_if_not_found || field.is_required {
                return Err(EvalError::MissingLookupParam {
                    field: field.target_field.clone(),
                    param,
                });
            }
            debug!(field = %field.target_field, param = %param, "lookup skipped: parameter missing");
            results.insert(field.target_field.clone(), Value::Null);
            continue;
        }

        let sql = wrap_as_select(query);
        let rows = target.query(&sql, &params).await?;

        let value = match rows.first() {
            Some(row) => extract(row, &field.target_field),
            None if field.fail_if_not_found => {
                return Err(EvalError::LookupEmpty(field.target_field.clone()));
            }
            None => Value::Null,
        };
        results.insert(field.target_field.clone(), value);
    }

    Ok(results)
}

/// Non-SELECT expressions are wrapped so they come back under `result`.
fn wrap_as_select(query: &str) -> String {
    let trimmed = query.trim();
    if trimmed.to_ascii_lowercase().starts_with("select") {
        trimmed.to_string()
    } else {
        format!("SELECT {trimmed} AS {RESULT_COLUMN}")
    }
}

/// Result column preference: `result`, then the target field's name, then
/// the first column of the first row.
fn extract(row: &RowData, target_field: &str) -> Value {
    if row.contains(RESULT_COLUMN) {
        return row.get_value(RESULT_COLUMN);
    }
    if row.contains(target_field) {
        return row.get_value(target_field);
    }
    row.field_values
        .first()
        .and_then(|f| f.value.clone())
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::{adapter::Adapter, manager::Connection, memory::adapter::MemoryAdapter};
    use model::core::value::FieldValue;

    fn table(json: &str) -> TableConfig {
        serde_json::from_str(json).unwrap()
    }

    fn conn(memory: &MemoryAdapter) -> Connection {
        Connection::from_adapter("target", Adapter::Memory(memory.clone()))
    }

    fn lookup_table(fail_if_not_found: bool) -> TableConfig {
        table(&format!(
            r#"{{ "name": "h", "sourceTable": "S", "targetTable": "T", "primaryKey": "ID",
                  "fieldMappings": [
                    {{ "targetField": "DIM_ID", "lookupFromTarget": true,
                       "failIfNotFound": {fail_if_not_found},
                       "lookupQuery": "SELECT id FROM DIM WHERE code=@c",
                       "lookupParams": [ {{ "sourceField": "ART", "paramName": "c" }} ] }}
                  ] }}"#
        ))
    }

    fn source_with_art() -> RowData {
        RowData::new("S", vec![FieldValue::new("ART", Value::String("A1".into()))])
    }

    #[tokio::test]
    async fn resolves_result_column_from_first_row() {
        let memory = MemoryAdapter::new();
        memory.stub_query(
            "from dim",
            vec![RowData::new(
                "DIM",
                vec![FieldValue::new("id", Value::Int(7))],
            )],
        );

        let t = lookup_table(true);
        let results = run_lookups(&t, &source_with_art(), &conn(&memory))
            .await
            .unwrap();
        assert_eq!(results["DIM_ID"], Value::Int(7));
    }

    #[tokio::test]
    async fn empty_result_fails_only_when_required() {
        let memory = MemoryAdapter::new();
        memory.stub_query("from dim", vec![]);

        let strict = lookup_table(true);
        let err = run_lookups(&strict, &source_with_art(), &conn(&memory))
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::LookupEmpty(f) if f == "DIM_ID"));

        let lax = lookup_table(false);
        let results = run_lookups(&lax, &source_with_art(), &conn(&memory))
            .await
            .unwrap();
        assert_eq!(results["DIM_ID"], Value::Null);
    }

    #[tokio::test]
    async fn missing_parameter_fails_required_lookup() {
        let memory = MemoryAdapter::new();
        let strict = lookup_table(true);
        let no_art = RowData::new("S", vec![]);
        let err = run_lookups(&strict, &no_art, &conn(&memory)).await.unwrap_err();
        assert!(matches!(err, EvalError::MissingLookupParam { param, .. } if param == "c"));
    }

    #[test]
    fn wraps_bare_expressions() {
        assert_eq!(
            wrap_as_select("ISNULL(MAX(x), 0)"),
            "SELECT ISNULL(MAX(x), 0) AS result"
        );
        assert_eq!(
            wrap_as_select("  SELECT 1 FROM t"),
            "SELECT 1 FROM t"
        );
    }
}
