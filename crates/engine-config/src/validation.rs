use model::mapping::{Mapping, MarkProcessedStrategy};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// A structural problem found in a mapping definition before execution.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "[{tag}] {}: {}", self.code, self.message)
    }
}

fn error(code: &'static str, message: String) -> Finding {
    Finding {
        severity: Severity::Error,
        code,
        message,
    }
}

fn warning(code: &'static str, message: String) -> Finding {
    Finding {
        severity: Severity::Warning,
        code,
        message,
    }
}

/// Validate a mapping definition. Errors abort an execution before it
/// starts; warnings are logged and execution proceeds.
pub fn validate_mapping(mapping: &Mapping) -> Vec<Finding> {
    let mut findings = Vec::new();

    if mapping.table_configs.is_empty() {
        findings.push(error(
            "empty-table-configs",
            format!("mapping '{}' defines no table configs", mapping.name),
        ));
    }

    let mut seen = HashSet::new();
    for table in &mapping.table_configs {
        if !seen.insert(table.name.to_ascii_lowercase()) {
            findings.push(error(
                "duplicate-table-name",
                format!("table config '{}' is defined twice", table.name),
            ));
        }
    }

    let main_names: HashSet<String> = mapping
        .table_configs
        .iter()
        .filter(|t| !t.is_detail_table)
        .map(|t| t.name.to_ascii_lowercase())
        .collect();

    for table in &mapping.table_configs {
        if table.is_detail_table {
            match &table.parent_table_ref {
                None => findings.push(error(
                    "missing-parent-ref",
                    format!("detail table '{}' has no parentTableRef", table.name),
                )),
                Some(parent) if !main_names.contains(&parent.to_ascii_lowercase()) => {
                    findings.push(error(
                        "unknown-parent-ref",
                        format!(
                            "detail table '{}' references unknown parent '{parent}'",
                            table.name
                        ),
                    ));
                }
                Some(_) => {}
            }
        }

        if let Some(custom) = &table.custom_query
            && !custom.to_ascii_lowercase().contains("@documentid")
        {
            findings.push(warning(
                "custom-query-without-document-id",
                format!(
                    "custom query of table '{}' never mentions @documentId",
                    table.name
                ),
            ));
        }

        for field in &table.field_mappings {
            if field.lookup_from_target {
                if field.lookup_query.as_deref().unwrap_or("").trim().is_empty() {
                    findings.push(error(
                        "lookup-without-query",
                        format!(
                            "field '{}' of table '{}' is lookupFromTarget but has no lookupQuery",
                            field.target_field, table.name
                        ),
                    ));
                }
                for param in &field.lookup_params {
                    if param.source_field.trim().is_empty() || param.param_name.trim().is_empty() {
                        findings.push(error(
                            "invalid-lookup-param",
                            format!(
                                "field '{}' of table '{}' has an empty lookup parameter",
                                field.target_field, table.name
                            ),
                        ));
                    }
                }
            }
            if field.source_field.is_none()
                && field.default_value.is_none()
                && !field.lookup_from_target
                && field.is_required
            {
                findings.push(error(
                    "unsatisfiable-required-field",
                    format!(
                        "required field '{}' of table '{}' has neither source nor default",
                        field.target_field, table.name
                    ),
                ));
            }
        }
    }

    if let Some(consecutive) = &mapping.consecutive_config
        && consecutive.enabled
    {
        if let Err(err) = consecutive::format::validate(&consecutive.template()) {
            findings.push(error("invalid-consecutive-format", err.to_string()));
        }
        if consecutive.use_centralized_service
            && consecutive
                .consecutive_name
                .as_deref()
                .unwrap_or("")
                .trim()
                .is_empty()
        {
            findings.push(error(
                "missing-consecutive-name",
                "centralized consecutive requires consecutiveName".to_string(),
            ));
        }
        if consecutive.field_name.is_none()
            && consecutive.detail_field_name.is_none()
            && consecutive.apply_to_tables.is_empty()
        {
            findings.push(warning(
                "consecutive-without-target-field",
                "consecutive is enabled but no target field receives it".to_string(),
            ));
        }
    }

    if mapping.mark_processed_strategy != MarkProcessedStrategy::None
        && mapping
            .mark_processed_field
            .as_deref()
            .unwrap_or("")
            .trim()
            .is_empty()
    {
        findings.push(error(
            "missing-mark-field",
            "markProcessedStrategy requires markProcessedField".to_string(),
        ));
    }

    if mapping.has_bonification_processing && mapping.bonification_config.is_none() {
        findings.push(error(
            "missing-bonification-config",
            "hasBonificationProcessing is set but bonificationConfig is absent".to_string(),
        ));
    }

    findings
}

pub fn has_errors(findings: &[Finding]) -> bool {
    findings.iter().any(|f| f.severity == Severity::Error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(json: &str) -> Mapping {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn detects_unknown_parent_ref() {
        let m = mapping(
            r#"{
                "id": "m", "name": "m", "sourceServer": "s", "targetServer": "t",
                "tableConfigs": [
                    { "name": "h", "sourceTable": "H", "targetTable": "TH",
                      "primaryKey": "ID", "isDetailTable": false, "fieldMappings": [] },
                    { "name": "d", "sourceTable": "D", "targetTable": "TD",
                      "primaryKey": "ID", "isDetailTable": true,
                      "parentTableRef": "nope", "fieldMappings": [] }
                ]
            }"#,
        );
        let findings = validate_mapping(&m);
        assert!(has_errors(&findings));
        assert!(findings.iter().any(|f| f.code == "unknown-parent-ref"));
    }

    #[test]
    fn detects_lookup_without_query_and_bad_pattern() {
        let m = mapping(
            r#"{
                "id": "m", "name": "m", "sourceServer": "s", "targetServer": "t",
                "tableConfigs": [
                    { "name": "h", "sourceTable": "H", "targetTable": "TH",
                      "primaryKey": "ID", "isDetailTable": false,
                      "fieldMappings": [
                        { "targetField": "DIM_ID", "lookupFromTarget": true }
                      ] }
                ],
                "consecutiveConfig": { "enabled": true, "pattern": "{BOGUS}" }
            }"#,
        );
        let findings = validate_mapping(&m);
        assert!(findings.iter().any(|f| f.code == "lookup-without-query"));
        assert!(
            findings
                .iter()
                .any(|f| f.code == "invalid-consecutive-format")
        );
    }

    #[test]
    fn clean_mapping_has_no_errors() {
        let m = mapping(
            r#"{
                "id": "m", "name": "m", "sourceServer": "s", "targetServer": "t",
                "tableConfigs": [
                    { "name": "h", "sourceTable": "H", "targetTable": "TH",
                      "primaryKey": "ID", "isDetailTable": false,
                      "fieldMappings": [
                        { "sourceField": "ID", "targetField": "ID", "isRequired": true }
                      ] }
                ]
            }"#,
        );
        assert!(!has_errors(&validate_mapping(&m)));
    }
}
