use serde::{Deserialize, Serialize};

/// Sentinel accepted in `defaultValue` (and in source data) meaning SQL NULL.
pub const NULL_SENTINEL: &str = "NULL";

/// How one target column is produced from the source row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    #[serde(default)]
    pub source_field: Option<String>,
    pub target_field: String,
    /// Literal fallback; the string `"NULL"` means SQL NULL, and values
    /// containing a native SQL function are inlined, not bound.
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub remove_prefix: Option<String>,
    #[serde(default)]
    pub value_mappings: Vec<ValueMapping>,
    #[serde(default)]
    pub unit_conversion: Option<UnitConversion>,
    #[serde(default)]
    pub lookup_from_target: bool,
    /// Target-side SELECT, parameterised by `@name` markers.
    #[serde(default)]
    pub lookup_query: Option<String>,
    #[serde(default)]
    pub lookup_params: Vec<LookupParam>,
    #[serde(default)]
    pub fail_if_not_found: bool,
    #[serde(default)]
    pub validate_existence: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueMapping {
    pub source_value: String,
    pub target_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupParam {
    pub source_field: String,
    pub param_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitConversion {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub unit_measure_field: Option<String>,
    #[serde(default)]
    pub conversion_factor_field: Option<String>,
    #[serde(default)]
    pub operation: ConversionOp,
    /// Round the converted value to this many decimal places.
    #[serde(default)]
    pub decimals: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionOp {
    #[default]
    Multiply,
    Divide,
}

fn default_true() -> bool {
    true
}
