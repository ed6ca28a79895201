use crate::mapping::table::TableConfig;
use serde::{Deserialize, Serialize};

/// Per-mapping consecutive numbering configuration.
///
/// Centralised mode reserves values through the consecutive service;
/// local mode advances `lastValue` via a conditional update on the
/// mapping record itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsecutiveConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub use_centralized_service: bool,
    #[serde(default)]
    pub consecutive_name: Option<String>,
    /// Header target column receiving the formatted value.
    #[serde(default)]
    pub field_name: Option<String>,
    /// Detail target column receiving the formatted value.
    #[serde(default)]
    pub detail_field_name: Option<String>,
    #[serde(default)]
    pub apply_to_tables: Vec<ApplyToTable>,
    /// Format template, e.g. `ORD-{VALUE:6}`. When absent, one is built
    /// from `prefix` and `padding`.
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub padding: Option<u32>,
    #[serde(default)]
    pub start_value: i64,
    #[serde(default = "default_increment")]
    pub increment: i64,
    /// Last value handed out in local mode.
    #[serde(default)]
    pub last_value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyToTable {
    pub table_name: String,
    pub field_name: String,
}

fn default_increment() -> i64 {
    1
}

impl ConsecutiveConfig {
    /// The format template for this mapping's consecutives.
    pub fn template(&self) -> String {
        if let Some(pattern) = &self.pattern {
            return pattern.clone();
        }
        let value = match self.padding {
            Some(width) if width > 0 => format!("{{VALUE:{width}}}"),
            _ => "{VALUE}".to_string(),
        };
        match &self.prefix {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}{value}"),
            _ => value,
        }
    }

    /// Which target column of `table` (if any) receives the consecutive.
    pub fn target_field_for(&self, table: &TableConfig) -> Option<String> {
        if let Some(entry) = self
            .apply_to_tables
            .iter()
            .find(|e| e.table_name.eq_ignore_ascii_case(&table.name))
        {
            return Some(entry.field_name.clone());
        }
        if table.is_detail_table {
            self.detail_field_name.clone()
        } else {
            self.field_name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_prefers_pattern_over_prefix_padding() {
        let cfg: ConsecutiveConfig = serde_json::from_str(
            r#"{ "enabled": true, "pattern": "ORD-{VALUE:6}", "prefix": "X", "padding": 3 }"#,
        )
        .unwrap();
        assert_eq!(cfg.template(), "ORD-{VALUE:6}");

        let cfg: ConsecutiveConfig =
            serde_json::from_str(r#"{ "enabled": true, "prefix": "FAC", "padding": 4 }"#).unwrap();
        assert_eq!(cfg.template(), "FAC{VALUE:4}");

        let cfg: ConsecutiveConfig = serde_json::from_str(r#"{ "enabled": true }"#).unwrap();
        assert_eq!(cfg.template(), "{VALUE}");
        assert_eq!(cfg.increment, 1);
    }
}
