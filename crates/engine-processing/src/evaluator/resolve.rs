use crate::{error::EvalError, evaluator::transform};
use connectors::sql::base::{
    coercion::coerce_for_column,
    metadata::TableMetadata,
    requests::{InsertRequest, SqlExpr},
};
use model::{
    core::value::Value,
    counter::ReservedValue,
    mapping::{
        bonification::BonificationConfig, consecutive::ConsecutiveConfig, field::FieldMapping,
        table::TableConfig,
    },
    records::row::RowData,
};
use std::collections::HashMap;
use tracing::warn;

/// Native SQL functions inlined verbatim instead of bound. Matched on
/// the upper-cased default value.
const SQL_FUNCTIONS: [&str; 11] = [
    "GETDATE",
    "CURRENT_TIMESTAMP",
    "NEWID",
    "SYSUTCDATETIME",
    "SYSDATETIME",
    "GETUTCDATE",
    "DAY(",
    "MONTH(",
    "YEAR(",
    "DATEADD",
    "DATEDIFF",
];

/// Per-field evaluation result: a value to bind, or a raw fragment to
/// splice into the VALUES list.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldExpr {
    Bound(Value),
    Literal(String),
}

/// Everything one row's evaluation can see.
pub struct RowContext<'a> {
    pub table: &'a TableConfig,
    pub source_row: &'a RowData,
    /// Pre-computed lookup-from-target results, keyed by target field.
    pub lookups: &'a HashMap<String, Value>,
    pub consecutive: Option<&'a ReservedValue>,
    pub consecutive_config: Option<&'a ConsecutiveConfig>,
    pub bonification: Option<&'a BonificationConfig>,
    pub target_meta: Option<&'a TableMetadata>,
}

impl RowContext<'_> {
    /// Whether this target column receives the reserved consecutive.
    fn consecutive_field(&self, target_field: &str) -> bool {
        match (self.consecutive, self.consecutive_config) {
            (Some(_), Some(config)) if config.enabled => config
                .target_field_for(self.table)
                .is_some_and(|f| f.eq_ignore_ascii_case(target_field)),
            _ => false,
        }
    }
}

fn is_sql_function(raw: &str) -> bool {
    let upper = raw.to_ascii_uppercase();
    SQL_FUNCTIONS.iter().any(|f| upper.contains(f))
}

/// Resolve one field mapping. Rules apply in order (first hit wins):
/// bonification passthrough, target lookup, native function passthrough,
/// source-then-default with the transform chain.
pub fn resolve_field(field: &FieldMapping, ctx: &RowContext<'_>) -> Result<FieldExpr, EvalError> {
    // Bonification-managed columns travel on the row itself.
    if let Some(bonification) = ctx.bonification {
        if field.target_field.eq_ignore_ascii_case(&bonification.line_number_field)
            && ctx.source_row.contains(&bonification.line_number_field)
        {
            return Ok(FieldExpr::Bound(
                ctx.source_row.get_value(&bonification.line_number_field),
            ));
        }
        if field
            .target_field
            .eq_ignore_ascii_case(&bonification.bonification_line_reference_field)
            && ctx
                .source_row
                .contains(&bonification.bonification_line_reference_field)
        {
            return Ok(FieldExpr::Bound(
                ctx.source_row
                    .get_value(&bonification.bonification_line_reference_field),
            ));
        }
    }

    // Target lookups ran as a batch before the INSERT was built.
    if field.lookup_from_target {
        let value = ctx
            .lookups
            .get(&field.target_field)
            .cloned()
            .unwrap_or(Value::Null);
        return Ok(FieldExpr::Bound(apply_consecutive(field, ctx, value)));
    }

    // Native SQL function defaults are spliced, not bound.
    if let Some(default) = &field.default_value
        && is_sql_function(default)
    {
        return Ok(FieldExpr::Literal(default.clone()));
    }

    // Source value, then default; `"NULL"` means SQL NULL.
    let mut value = match &field.source_field {
        Some(source) if ctx.source_row.contains(source) => ctx.source_row.get_value(source),
        _ => Value::Null,
    };
    if value.is_null() {
        value = match &field.default_value {
            Some(default) if default == "NULL" => Value::Null,
            Some(default) => Value::String(default.clone()),
            None => Value::Null,
        };
    }

    // Transform chain.
    value = transform::apply_transforms(value, field, ctx.source_row);
    value = truncate(field, ctx, value);
    value = apply_consecutive(field, ctx, value);

    if value.is_null() && field.is_required {
        return Err(EvalError::RequiredField(field.target_field.clone()));
    }
    Ok(FieldExpr::Bound(value))
}

/// Truncate strings to the target column length, logging the cut.
fn truncate(field: &FieldMapping, ctx: &RowContext<'_>, value: Value) -> Value {
    let Some(meta) = ctx.target_meta else {
        return value;
    };
    let Some(column) = meta.column(&field.target_field) else {
        return value;
    };
    let Some(max) = column.max_length else {
        return value;
    };
    match value {
        Value::String(s) if max > 0 && s.chars().count() > max => {
            warn!(
                field = %field.target_field,
                max_length = max,
                "value truncated to column length"
            );
            Value::String(s.chars().take(max).collect())
        }
        other => other,
    }
}

/// Overwrite with the reserved consecutive when this is its column.
fn apply_consecutive(field: &FieldMapping, ctx: &RowContext<'_>, value: Value) -> Value {
    if ctx.consecutive_field(&field.target_field) {
        if let Some(reserved) = ctx.consecutive {
            return Value::String(reserved.formatted.clone());
        }
    }
    value
}

/// Assemble the INSERT for one row. Bound values are coerced to the
/// cached column types; temporal columns reject unparseable strings.
pub fn build_insert(ctx: &RowContext<'_>) -> Result<InsertRequest, EvalError> {
    let mut columns = Vec::with_capacity(ctx.table.field_mappings.len());
    let mut values = Vec::with_capacity(ctx.table.field_mappings.len());

    for field in &ctx.table.field_mappings {
        let expr = resolve_field(field, ctx)?;
        columns.push(field.target_field.clone());
        values.push(match expr {
            FieldExpr::Literal(fragment) => SqlExpr::Raw(fragment),
            FieldExpr::Bound(value) => {
                let value = match ctx
                    .target_meta
                    .and_then(|meta| meta.column(&field.target_field))
                {
                    Some(column) => {
                        let coerced = coerce_for_column(value, column);
                        if column.data_type.is_temporal()
                            && matches!(coerced, Value::String(_))
                            && !coerced.is_null()
                        {
                            return Err(EvalError::DateConversion {
                                field: field.target_field.clone(),
                                value: coerced.as_string().unwrap_or_default(),
                            });
                        }
                        coerced
                    }
                    None => value,
                };
                SqlExpr::Bound(value)
            }
        });
    }

    Ok(InsertRequest {
        table: ctx.table.target_table.clone(),
        columns,
        values,
    })
}

/// Evaluate whether a target column will end up NULL although declared
/// NOT NULL, before the engine spends an INSERT on it.
pub fn check_not_null(ctx: &RowContext<'_>, request: &InsertRequest) -> Result<(), EvalError> {
    let Some(meta) = ctx.target_meta else {
        return Ok(());
    };
    for (column, expr) in request.columns.iter().zip(request.values.iter()) {
        if let SqlExpr::Bound(Value::Null) = expr
            && let Some(col_meta) = meta.column(column)
            && !col_meta.nullable
        {
            return Err(EvalError::RequiredField(column.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::sql::base::metadata::ColumnMetadata;
    use model::core::value::FieldValue;

    fn table(json: &str) -> TableConfig {
        serde_json::from_str(json).unwrap()
    }

    fn row(fields: Vec<(&str, Value)>) -> RowData {
        RowData::new(
            "src",
            fields
                .into_iter()
                .map(|(n, v)| FieldValue::new(n, v))
                .collect(),
        )
    }

    fn ctx<'a>(
        table: &'a TableConfig,
        source_row: &'a RowData,
        lookups: &'a HashMap<String, Value>,
    ) -> RowContext<'a> {
        RowContext {
            table,
            source_row,
            lookups,
            consecutive: None,
            consecutive_config: None,
            bonification: None,
            target_meta: None,
        }
    }

    #[test]
    fn source_value_wins_over_default() {
        let t = table(
            r#"{ "name": "h", "sourceTable": "S", "targetTable": "T", "primaryKey": "ID",
                 "fieldMappings": [
                    { "sourceField": "A", "targetField": "A", "defaultValue": "zz" }
                 ] }"#,
        );
        let source = row(vec![("A", Value::String("hit".into()))]);
        let lookups = HashMap::new();
        let expr = resolve_field(&t.field_mappings[0], &ctx(&t, &source, &lookups)).unwrap();
        assert_eq!(expr, FieldExpr::Bound(Value::String("hit".into())));

        let empty = row(vec![]);
        let expr = resolve_field(&t.field_mappings[0], &ctx(&t, &empty, &lookups)).unwrap();
        assert_eq!(expr, FieldExpr::Bound(Value::String("zz".into())));
    }

    #[test]
    fn null_sentinel_and_required_failure() {
        let t = table(
            r#"{ "name": "h", "sourceTable": "S", "targetTable": "T", "primaryKey": "ID",
                 "fieldMappings": [
                    { "targetField": "A", "defaultValue": "NULL" },
                    { "targetField": "B", "isRequired": true }
                 ] }"#,
        );
        let source = row(vec![]);
        let lookups = HashMap::new();
        let c = ctx(&t, &source, &lookups);
        assert_eq!(
            resolve_field(&t.field_mappings[0], &c).unwrap(),
            FieldExpr::Bound(Value::Null)
        );
        assert!(matches!(
            resolve_field(&t.field_mappings[1], &c),
            Err(EvalError::RequiredField(f)) if f == "B"
        ));
    }

    #[test]
    fn sql_function_defaults_become_literals() {
        let t = table(
            r#"{ "name": "h", "sourceTable": "S", "targetTable": "T", "primaryKey": "ID",
                 "fieldMappings": [
                    { "targetField": "CREATED", "defaultValue": "GETDATE()" },
                    { "targetField": "GUID", "defaultValue": "NEWID()" }
                 ] }"#,
        );
        let source = row(vec![]);
        let lookups = HashMap::new();
        let c = ctx(&t, &source, &lookups);
        assert_eq!(
            resolve_field(&t.field_mappings[0], &c).unwrap(),
            FieldExpr::Literal("GETDATE()".into())
        );
        assert_eq!(
            resolve_field(&t.field_mappings[1], &c).unwrap(),
            FieldExpr::Literal("NEWID()".into())
        );
    }

    #[test]
    fn lookup_results_are_taken_from_the_batch() {
        let t = table(
            r#"{ "name": "h", "sourceTable": "S", "targetTable": "T", "primaryKey": "ID",
                 "fieldMappings": [
                    { "targetField": "DIM_ID", "lookupFromTarget": true,
                      "lookupQuery": "SELECT id FROM dim WHERE code=@c" }
                 ] }"#,
        );
        let source = row(vec![]);
        let mut lookups = HashMap::new();
        lookups.insert("DIM_ID".to_string(), Value::Int(99));
        let expr = resolve_field(&t.field_mappings[0], &ctx(&t, &source, &lookups)).unwrap();
        assert_eq!(expr, FieldExpr::Bound(Value::Int(99)));
    }

    #[test]
    fn consecutive_overwrites_its_target_column() {
        let t = table(
            r#"{ "name": "h", "sourceTable": "S", "targetTable": "T", "primaryKey": "ID",
                 "fieldMappings": [ { "targetField": "NUM_DOC", "defaultValue": "0" } ] }"#,
        );
        let config: ConsecutiveConfig = serde_json::from_str(
            r#"{ "enabled": true, "fieldName": "NUM_DOC", "pattern": "ORD-{VALUE:6}" }"#,
        )
        .unwrap();
        let reserved = ReservedValue {
            numeric: 11,
            formatted: "ORD-000011".into(),
        };
        let source = row(vec![]);
        let lookups = HashMap::new();
        let mut c = ctx(&t, &source, &lookups);
        c.consecutive = Some(&reserved);
        c.consecutive_config = Some(&config);

        let expr = resolve_field(&t.field_mappings[0], &c).unwrap();
        assert_eq!(expr, FieldExpr::Bound(Value::String("ORD-000011".into())));
    }

    #[test]
    fn build_insert_coerces_and_rejects_bad_dates() {
        let t = table(
            r#"{ "name": "h", "sourceTable": "S", "targetTable": "T", "primaryKey": "ID",
                 "fieldMappings": [
                    { "sourceField": "WHEN", "targetField": "WHEN" }
                 ] }"#,
        );
        let mut meta = TableMetadata::new("T");
        meta.add(ColumnMetadata::new("WHEN", "datetime", 1));

        let source = row(vec![("WHEN", Value::String("31/02/2024".into()))]);
        let lookups = HashMap::new();
        let mut c = ctx(&t, &source, &lookups);
        c.target_meta = Some(&meta);
        assert!(matches!(
            build_insert(&c),
            Err(EvalError::DateConversion { .. })
        ));

        let source = row(vec![("WHEN", Value::String("2024-02-28 10:00:00".into()))]);
        let mut c = ctx(&t, &source, &lookups);
        c.target_meta = Some(&meta);
        let insert = build_insert(&c).unwrap();
        assert!(matches!(
            insert.values[0],
            SqlExpr::Bound(Value::DateTime(_))
        ));
    }
}
