use model::{
    core::value::Value,
    execution::result::BonificationStats,
    mapping::bonification::{BonificationConfig, CustomerContext, PromotionRule},
    records::row::RowData,
};
use tracing::{debug, warn};

/// Apply the mapping's deterministic promotion rules to a document's
/// already-numbered line set. Rules are pure functions of the rows plus
/// the customer context; synthetic lines continue the line numbering.
pub fn apply_rules(
    rows: &mut Vec<RowData>,
    config: &BonificationConfig,
    customer: Option<&CustomerContext>,
    stats: &mut BonificationStats,
    next_line: &mut i64,
) {
    if config.promotion_rules.is_empty() {
        return;
    }
    let (Some(article_field), Some(quantity_field)) =
        (config.article_field.as_deref(), config.quantity_field.as_deref())
    else {
        warn!("promotion rules skipped: articleField/quantityField not configured");
        return;
    };

    for rule in &config.promotion_rules {
        match rule {
            PromotionRule::OneTimeOffer {
                article,
                bonus_article,
                min_quantity,
                bonus_quantity,
            } => {
                let hit = rows.iter().find(|row| {
                    !is_bonification(row, config)
                        && article_matches(row, article_field, article)
                        && quantity_of(row, quantity_field) >= *min_quantity
                });
                if let Some(parent) = hit {
                    let parent_line = parent.get_value(&config.line_number_field);
                    let template = parent.clone();
                    rows.push(bonus_line(
                        template,
                        config,
                        article_field,
                        quantity_field,
                        bonus_article,
                        *bonus_quantity,
                        parent_line,
                        next_line,
                    ));
                    stats.total_promotions += 1;
                    debug!(article, bonus_article, "one-time offer applied");
                }
            }
            PromotionRule::FamilyDiscount {
                family_prefix,
                discount_percent,
                min_order_amount,
            } => {
                let order_amount = customer.map(|c| c.order_amount).unwrap_or(0.0);
                if order_amount < *min_order_amount {
                    continue;
                }
                let Some(discount_field) = config.discount_field.as_deref() else {
                    warn!("family discount skipped: discountField not configured");
                    continue;
                };
                let mut applied = false;
                for row in rows.iter_mut() {
                    if article_of(row, article_field).starts_with(family_prefix.as_str()) {
                        row.set(discount_field, Value::Float(*discount_percent));
                        applied = true;
                    }
                }
                if applied {
                    stats.total_promotions += 1;
                    debug!(family_prefix, "family discount applied");
                }
            }
            PromotionRule::ScaledPromotion {
                article,
                bonus_article,
                tiers,
            } => {
                let hit = rows.iter().find(|row| {
                    !is_bonification(row, config) && article_matches(row, article_field, article)
                });
                let Some(parent) = hit else { continue };
                let quantity = quantity_of(parent, quantity_field);
                // Highest tier at or below the ordered quantity wins.
                let bonus = tiers
                    .iter()
                    .filter(|tier| quantity >= tier.min_quantity)
                    .map(|tier| tier.bonus_quantity)
                    .fold(None::<f64>, |best, q| {
                        Some(best.map_or(q, |b| b.max(q)))
                    });
                if let Some(bonus_quantity) = bonus.filter(|q| *q > 0.0) {
                    let parent_line = parent.get_value(&config.line_number_field);
                    let template = parent.clone();
                    rows.push(bonus_line(
                        template,
                        config,
                        article_field,
                        quantity_field,
                        bonus_article,
                        bonus_quantity,
                        parent_line,
                        next_line,
                    ));
                    stats.total_promotions += 1;
                    debug!(article, quantity, bonus_quantity, "scaled promotion applied");
                }
            }
        }
    }
}

fn is_bonification(row: &RowData, config: &BonificationConfig) -> bool {
    row.get_value(&config.bonification_indicator_field)
        .as_string()
        .is_some_and(|v| v == config.bonification_indicator_value)
}

fn article_of(row: &RowData, article_field: &str) -> String {
    row.get_value(article_field).as_string().unwrap_or_default()
}

fn article_matches(row: &RowData, article_field: &str, article: &str) -> bool {
    article_of(row, article_field) == article
}

fn quantity_of(row: &RowData, quantity_field: &str) -> f64 {
    row.get_value(quantity_field).as_f64().unwrap_or(0.0)
}

#[allow(clippy::too_many_arguments)]
fn bonus_line(
    mut template: RowData,
    config: &BonificationConfig,
    article_field: &str,
    quantity_field: &str,
    bonus_article: &str,
    bonus_quantity: f64,
    parent_line: Value,
    next_line: &mut i64,
) -> RowData {
    *next_line += 1;
    template.set(article_field, Value::String(bonus_article.to_string()));
    template.set(quantity_field, Value::Float(bonus_quantity));
    template.set(
        &config.bonification_indicator_field,
        Value::String(config.bonification_indicator_value.clone()),
    );
    template.set(&config.line_number_field, Value::Int(*next_line));
    template.set(&config.bonification_line_reference_field, parent_line);
    template
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::FieldValue;

    fn config(rules: &str) -> BonificationConfig {
        serde_json::from_str(&format!(
            r#"{{
                "sourceTable": "DET",
                "orderField": "NUM_PED",
                "lineOrderField": "NUM_LIN",
                "bonificationIndicatorField": "TIPO_LIN",
                "bonificationIndicatorValue": "B",
                "lineNumberField": "LINEA",
                "bonificationLineReferenceField": "LINEA_PADRE",
                "applyPromotionRules": true,
                "articleField": "ART",
                "quantityField": "QTY",
                "discountField": "DESC_PCT",
                "promotionRules": {rules}
            }}"#
        ))
        .unwrap()
    }

    fn regular(linea: i64, article: &str, qty: f64) -> RowData {
        RowData::new(
            "DET",
            vec![
                FieldValue::new("NUM_PED", Value::String("P1".into())),
                FieldValue::new("ART", Value::String(article.into())),
                FieldValue::new("QTY", Value::Float(qty)),
                FieldValue::new("TIPO_LIN", Value::String("N".into())),
                FieldValue::new("LINEA", Value::Int(linea)),
                FieldValue::new("LINEA_PADRE", Value::Null),
            ],
        )
    }

    #[test]
    fn one_time_offer_appends_a_bonus_line() {
        let config = config(
            r#"[ { "type": "oneTimeOffer", "article": "A", "bonusArticle": "A-GIFT",
                   "minQuantity": 10, "bonusQuantity": 1 } ]"#,
        );
        let mut rows = vec![regular(1, "A", 12.0)];
        let mut stats = BonificationStats::default();
        let mut next = 1;
        apply_rules(&mut rows, &config, None, &mut stats, &mut next);

        assert_eq!(rows.len(), 2);
        let bonus = &rows[1];
        assert_eq!(bonus.get_value("ART"), Value::String("A-GIFT".into()));
        assert_eq!(bonus.get_value("LINEA"), Value::Int(2));
        assert_eq!(bonus.get_value("LINEA_PADRE"), Value::Int(1));
        assert_eq!(bonus.get_value("TIPO_LIN"), Value::String("B".into()));
        assert_eq!(stats.total_promotions, 1);
    }

    #[test]
    fn family_discount_requires_order_amount() {
        let config = config(
            r#"[ { "type": "familyDiscount", "familyPrefix": "FAM-",
                   "discountPercent": 7.5, "minOrderAmount": 500 } ]"#,
        );
        let mut rows = vec![regular(1, "FAM-01", 2.0), regular(2, "OTHER", 1.0)];
        let mut stats = BonificationStats::default();
        let mut next = 2;

        let poor = CustomerContext {
            order_amount: 100.0,
            ..CustomerContext::default()
        };
        apply_rules(&mut rows, &config, Some(&poor), &mut stats, &mut next);
        assert_eq!(rows[0].get_value("DESC_PCT"), Value::Null);

        let rich = CustomerContext {
            order_amount: 900.0,
            ..CustomerContext::default()
        };
        apply_rules(&mut rows, &config, Some(&rich), &mut stats, &mut next);
        assert_eq!(rows[0].get_value("DESC_PCT"), Value::Float(7.5));
        assert_eq!(rows[1].get_value("DESC_PCT"), Value::Null);
        assert_eq!(stats.total_promotions, 1);
    }

    #[test]
    fn scaled_promotion_picks_the_highest_reached_tier() {
        let config = config(
            r#"[ { "type": "scaledPromotion", "article": "A", "bonusArticle": "A-BONUS",
                   "tiers": [ { "minQuantity": 5, "bonusQuantity": 1 },
                              { "minQuantity": 20, "bonusQuantity": 5 } ] } ]"#,
        );
        let mut rows = vec![regular(1, "A", 25.0)];
        let mut stats = BonificationStats::default();
        let mut next = 1;
        apply_rules(&mut rows, &config, None, &mut stats, &mut next);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get_value("QTY"), Value::Float(5.0));
    }
}
