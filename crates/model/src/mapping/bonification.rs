use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Configuration for promotion (bonification) handling on detail lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonificationConfig {
    /// Detail source table the grouping reads from.
    pub source_table: String,
    /// Document-key column in the detail rows.
    pub order_field: String,
    /// Source line-number column, used for stable ordering.
    pub line_order_field: String,
    pub bonification_indicator_field: String,
    pub bonification_indicator_value: String,
    /// Target column receiving the newly assigned line number.
    pub line_number_field: String,
    /// Target column pointing a bonification at its parent line.
    pub bonification_line_reference_field: String,
    #[serde(default)]
    pub apply_promotion_rules: bool,
    #[serde(default)]
    pub orphan_policy: OrphanPolicy,
    #[serde(default)]
    pub article_field: Option<String>,
    #[serde(default)]
    pub quantity_field: Option<String>,
    #[serde(default)]
    pub discount_field: Option<String>,
    #[serde(default)]
    pub promotion_rules: Vec<PromotionRule>,
    /// Header columns feeding the [`CustomerContext`] promotion rules see.
    #[serde(default)]
    pub customer_context_fields: Option<CustomerContextFields>,
}

/// Names of header columns that populate the customer context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerContextFields {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub customer_type: Option<String>,
    #[serde(default)]
    pub price_list: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub order_amount: Option<String>,
    #[serde(default)]
    pub order_date: Option<String>,
}

/// What to do with a bonification that has no preceding regular line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrphanPolicy {
    /// Keep the line, leave the parent reference NULL.
    #[default]
    PassThrough,
    Drop,
    /// Fail the whole document.
    Fail,
}

/// Deterministic promotion rules, applied to a document's row group after
/// line mapping. Pure functions of the group plus [`CustomerContext`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PromotionRule {
    /// One bonus line per document once `article` reaches `minQuantity`.
    #[serde(rename_all = "camelCase")]
    OneTimeOffer {
        article: String,
        bonus_article: String,
        min_quantity: f64,
        bonus_quantity: f64,
    },
    /// Percentage discount on every line of an article family, gated on
    /// the order amount.
    #[serde(rename_all = "camelCase")]
    FamilyDiscount {
        family_prefix: String,
        discount_percent: f64,
        min_order_amount: f64,
    },
    /// Tiered bonus: the highest tier at or below the ordered quantity wins.
    #[serde(rename_all = "camelCase")]
    ScaledPromotion {
        article: String,
        bonus_article: String,
        tiers: Vec<PromotionTier>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionTier {
    pub min_quantity: f64,
    pub bonus_quantity: f64,
}

/// Customer attributes promotion rules may condition on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerContext {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub customer_type: Option<String>,
    #[serde(default)]
    pub price_list: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub order_amount: f64,
    #[serde(default)]
    pub order_date: Option<NaiveDate>,
}
