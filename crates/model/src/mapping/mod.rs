pub mod bonification;
pub mod consecutive;
pub mod field;
pub mod table;

use crate::{
    mapping::{bonification::BonificationConfig, consecutive::ConsecutiveConfig, table::TableConfig},
    records::row::RowData,
};
use serde::{Deserialize, Serialize};

pub const UNKNOWN_DOCUMENT_TYPE: &str = "unknown";

/// The full configuration driving one transfer shape. Immutable from the
/// engine's point of view for the duration of an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub id: String,
    pub name: String,
    pub source_server: String,
    pub target_server: String,
    pub table_configs: Vec<TableConfig>,
    #[serde(default)]
    pub document_type_rules: Vec<DocumentTypeRule>,
    #[serde(default)]
    pub consecutive_config: Option<ConsecutiveConfig>,
    #[serde(default)]
    pub mark_processed_field: Option<String>,
    #[serde(default)]
    pub mark_processed_value: Option<String>,
    #[serde(default)]
    pub mark_unprocessed_value: Option<String>,
    #[serde(default)]
    pub mark_processed_strategy: MarkProcessedStrategy,
    #[serde(default)]
    pub mark_processed_config: MarkProcessedConfig,
    #[serde(default)]
    pub has_bonification_processing: bool,
    #[serde(default)]
    pub bonification_config: Option<BonificationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTypeRule {
    pub name: String,
    pub source_field: String,
    pub source_values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkProcessedStrategy {
    Individual,
    Batch,
    #[default]
    None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkProcessedConfig {
    #[serde(default)]
    pub allow_rollback: bool,
}

impl Mapping {
    /// Main (header) table configs in execution order; ties keep array order.
    pub fn main_tables(&self) -> Vec<&TableConfig> {
        let mut mains: Vec<(usize, &TableConfig)> = self
            .table_configs
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_detail_table)
            .collect();
        mains.sort_by_key(|(idx, t)| (t.execution_order, *idx));
        mains.into_iter().map(|(_, t)| t).collect()
    }

    /// Detail configs whose `parentTableRef` names the given main entry,
    /// in their execution order.
    pub fn details_of(&self, parent: &str) -> Vec<&TableConfig> {
        let mut details: Vec<(usize, &TableConfig)> = self
            .table_configs
            .iter()
            .enumerate()
            .filter(|(_, t)| {
                t.is_detail_table
                    && t.parent_table_ref
                        .as_deref()
                        .is_some_and(|p| p.eq_ignore_ascii_case(parent))
            })
            .collect();
        details.sort_by_key(|(idx, t)| (t.execution_order, *idx));
        details.into_iter().map(|(_, t)| t).collect()
    }

    /// Classify a header row: first matching rule wins, else `"unknown"`.
    pub fn document_type(&self, header: &RowData) -> String {
        for rule in &self.document_type_rules {
            let value = header.get_value(&rule.source_field);
            if let Some(s) = value.as_string()
                && rule.source_values.iter().any(|v| v == &s)
            {
                return rule.name.clone();
            }
        }
        UNKNOWN_DOCUMENT_TYPE.to_string()
    }

    pub fn uses_centralized_consecutive(&self) -> bool {
        self.consecutive_config
            .as_ref()
            .is_some_and(|c| c.enabled && c.use_centralized_service)
    }

    pub fn uses_local_consecutive(&self) -> bool {
        self.consecutive_config
            .as_ref()
            .is_some_and(|c| c.enabled && !c.use_centralized_service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::{FieldValue, Value};

    fn sample_json() -> &'static str {
        r#"{
            "id": "map-1",
            "name": "orders",
            "sourceServer": "src",
            "targetServer": "dst",
            "tableConfigs": [
                {
                    "name": "header",
                    "sourceTable": "PEDIDOS",
                    "targetTable": "ORDERS",
                    "primaryKey": "NUM_PED",
                    "executionOrder": 1,
                    "isDetailTable": false,
                    "fieldMappings": [
                        { "sourceField": "NUM_PED", "targetField": "ORDER_NO", "isRequired": true }
                    ]
                },
                {
                    "name": "lines",
                    "sourceTable": "PEDIDOS_DET",
                    "targetTable": "ORDER_LINES",
                    "primaryKey": "NUM_PED",
                    "executionOrder": 2,
                    "isDetailTable": true,
                    "parentTableRef": "header",
                    "fieldMappings": []
                }
            ],
            "documentTypeRules": [
                { "name": "credit", "sourceField": "TIPO", "sourceValues": ["C"] }
            ],
            "markProcessedStrategy": "batch"
        }"#
    }

    #[test]
    fn deserializes_camel_case_definition() {
        let mapping: Mapping = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(mapping.table_configs.len(), 2);
        assert_eq!(mapping.mark_processed_strategy, MarkProcessedStrategy::Batch);
        assert!(!mapping.mark_processed_config.allow_rollback);
        assert_eq!(mapping.main_tables().len(), 1);
        assert_eq!(mapping.details_of("header").len(), 1);
        assert!(mapping.details_of("lines").is_empty());
    }

    #[test]
    fn document_type_first_match_wins_else_unknown() {
        let mapping: Mapping = serde_json::from_str(sample_json()).unwrap();
        let credit = RowData::new(
            "PEDIDOS",
            vec![FieldValue::new("TIPO", Value::String("C".into()))],
        );
        let other = RowData::new(
            "PEDIDOS",
            vec![FieldValue::new("TIPO", Value::String("X".into()))],
        );
        assert_eq!(mapping.document_type(&credit), "credit");
        assert_eq!(mapping.document_type(&other), UNKNOWN_DOCUMENT_TYPE);
    }
}
