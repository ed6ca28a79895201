use crate::{bonification::promotion, error::BonificationError};
use model::{
    core::value::Value,
    execution::result::BonificationStats,
    mapping::bonification::{BonificationConfig, CustomerContext, OrphanPolicy},
    records::row::RowData,
};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Result of running one document's detail rows through the bonification
/// pipeline. `rows` are in final insert order with `lineNumberField` and
/// `bonificationLineReferenceField` populated.
#[derive(Debug, Clone)]
pub struct BonificationOutcome {
    pub rows: Vec<RowData>,
    pub stats: BonificationStats,
}

/// Group fetched detail rows by their document key.
pub fn group_documents(
    rows: Vec<RowData>,
    config: &BonificationConfig,
) -> HashMap<String, Vec<RowData>> {
    let mut groups: HashMap<String, Vec<RowData>> = HashMap::new();
    for row in rows {
        let key = row
            .get_value(&config.order_field)
            .as_string()
            .unwrap_or_default();
        groups.entry(key).or_default().push(row);
    }
    groups
}

/// Classify, renumber and wire one document's lines.
///
/// Rows are ordered by `lineOrderField` (stable), assigned fresh
/// sequential line numbers, and every bonification points at the
/// immediately preceding regular line. Orphans follow the configured
/// policy. Promotion rules run last and may append synthetic lines.
pub fn process_document(
    document_id: &str,
    mut rows: Vec<RowData>,
    config: &BonificationConfig,
    customer: Option<&CustomerContext>,
) -> Result<BonificationOutcome, BonificationError> {
    rows.sort_by(|a, b| {
        let left = a.get_value(&config.line_order_field);
        let right = b.get_value(&config.line_order_field);
        match (left.as_f64(), right.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
            _ => left
                .as_string()
                .unwrap_or_default()
                .cmp(&right.as_string().unwrap_or_default()),
        }
    });

    let mut stats = BonificationStats::default();
    let mut out = Vec::with_capacity(rows.len());
    let mut next_line: i64 = 0;
    let mut last_regular_line: Option<i64> = None;

    for row in rows {
        let is_bonification = is_bonification(&row, config);
        if !is_bonification {
            next_line += 1;
            last_regular_line = Some(next_line);
            let mut row = row;
            row.set(&config.line_number_field, Value::Int(next_line));
            row.set(&config.bonification_line_reference_field, Value::Null);
            out.push(row);
            continue;
        }

        stats.total_bonifications += 1;
        let kind = row
            .get_value(&config.bonification_indicator_field)
            .as_string()
            .unwrap_or_else(|| config.bonification_indicator_value.clone());
        *stats.bonification_types.entry(kind).or_default() += 1;

        match last_regular_line {
            Some(parent) => {
                next_line += 1;
                let mut row = row;
                row.set(&config.line_number_field, Value::Int(next_line));
                row.set(
                    &config.bonification_line_reference_field,
                    Value::Int(parent),
                );
                out.push(row);
            }
            None => match config.orphan_policy {
                OrphanPolicy::PassThrough => {
                    stats.orphan_lines += 1;
                    next_line += 1;
                    let mut row = row;
                    row.set(&config.line_number_field, Value::Int(next_line));
                    row.set(&config.bonification_line_reference_field, Value::Null);
                    warn!(
                        document = document_id,
                        line = next_line,
                        "orphan bonification passed through without parent"
                    );
                    out.push(row);
                }
                OrphanPolicy::Drop => {
                    stats.orphan_lines += 1;
                    debug!(document = document_id, "orphan bonification dropped");
                }
                OrphanPolicy::Fail => {
                    let line = row
                        .get_value(&config.line_order_field)
                        .as_string()
                        .unwrap_or_default();
                    return Err(BonificationError::OrphanLine {
                        document: document_id.to_string(),
                        line,
                    });
                }
            },
        }
    }

    if config.apply_promotion_rules {
        promotion::apply_rules(&mut out, config, customer, &mut stats, &mut next_line);
    }

    stats.processed_details = out.len() as u64;
    Ok(BonificationOutcome { rows: out, stats })
}

fn is_bonification(row: &RowData, config: &BonificationConfig) -> bool {
    row.get_value(&config.bonification_indicator_field)
        .as_string()
        .is_some_and(|v| v == config.bonification_indicator_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::FieldValue;

    fn config(orphan_policy: &str) -> BonificationConfig {
        serde_json::from_str(&format!(
            r#"{{
                "sourceTable": "PEDIDOS_DET",
                "orderField": "NUM_PED",
                "lineOrderField": "NUM_LIN",
                "bonificationIndicatorField": "TIPO_LIN",
                "bonificationIndicatorValue": "B",
                "lineNumberField": "LINEA",
                "bonificationLineReferenceField": "LINEA_PADRE",
                "orphanPolicy": "{orphan_policy}"
            }}"#
        ))
        .unwrap()
    }

    fn line(num: i64, article: &str, kind: &str) -> RowData {
        RowData::new(
            "PEDIDOS_DET",
            vec![
                FieldValue::new("NUM_PED", Value::String("P1".into())),
                FieldValue::new("NUM_LIN", Value::Int(num)),
                FieldValue::new("ART", Value::String(article.into())),
                FieldValue::new("TIPO_LIN", Value::String(kind.into())),
            ],
        )
    }

    #[test]
    fn maps_bonifications_to_preceding_regular_lines() {
        let rows = vec![
            line(1, "A", "N"),
            line(2, "A2", "B"),
            line(3, "B", "N"),
            line(4, "B2", "B"),
        ];
        let outcome = process_document("P1", rows, &config("passThrough"), None).unwrap();

        let numbers: Vec<i64> = outcome
            .rows
            .iter()
            .map(|r| r.get_value("LINEA").as_i64().unwrap())
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(outcome.rows[1].get_value("LINEA_PADRE"), Value::Int(1));
        assert_eq!(outcome.rows[3].get_value("LINEA_PADRE"), Value::Int(3));
        assert_eq!(outcome.rows[0].get_value("LINEA_PADRE"), Value::Null);
        assert_eq!(outcome.stats.total_bonifications, 2);
        assert_eq!(outcome.stats.processed_details, 4);
    }

    #[test]
    fn reorders_by_line_order_field_before_numbering() {
        let rows = vec![line(3, "B", "N"), line(1, "A", "N"), line(2, "A2", "B")];
        let outcome = process_document("P1", rows, &config("passThrough"), None).unwrap();
        let articles: Vec<String> = outcome
            .rows
            .iter()
            .map(|r| r.get_value("ART").as_string().unwrap())
            .collect();
        assert_eq!(articles, vec!["A", "A2", "B"]);
        // The bonification for A2 points at A's new line number.
        assert_eq!(outcome.rows[1].get_value("LINEA_PADRE"), Value::Int(1));
    }

    #[test]
    fn orphan_policies() {
        let rows = vec![line(1, "X2", "B"), line(2, "A", "N")];

        let kept = process_document("P1", rows.clone(), &config("passThrough"), None).unwrap();
        assert_eq!(kept.rows.len(), 2);
        assert_eq!(kept.rows[0].get_value("LINEA_PADRE"), Value::Null);
        assert_eq!(kept.stats.orphan_lines, 1);

        let dropped = process_document("P1", rows.clone(), &config("drop"), None).unwrap();
        assert_eq!(dropped.rows.len(), 1);
        assert_eq!(
            dropped.rows[0].get_value("ART"),
            Value::String("A".into())
        );

        assert!(matches!(
            process_document("P1", rows, &config("fail"), None),
            Err(BonificationError::OrphanLine { .. })
        ));
    }

    #[test]
    fn groups_rows_by_document_key() {
        let mut rows = vec![line(1, "A", "N"), line(2, "B", "N")];
        rows[1].set("NUM_PED", Value::String("P2".into()));
        let groups = group_documents(rows, &config("passThrough"));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["P1"].len(), 1);
        assert_eq!(groups["P2"].len(), 1);
    }
}
