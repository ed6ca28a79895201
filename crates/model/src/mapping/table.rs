use crate::mapping::field::FieldMapping;
use serde::{Deserialize, Serialize};

/// One table entry in a mapping: where rows come from, where they land,
/// and how each target column is produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    pub name: String,
    pub source_table: String,
    pub target_table: String,
    /// Document-key column on the source side. For detail tables this is
    /// the column linking each line back to its document.
    pub primary_key: String,
    #[serde(default)]
    pub target_primary_key: Option<String>,
    #[serde(default)]
    pub execution_order: i32,
    #[serde(default)]
    pub is_detail_table: bool,
    /// Name of the main entry this detail belongs to. Required when
    /// `is_detail_table` is set; validated before execution.
    #[serde(default)]
    pub parent_table_ref: Option<String>,
    /// Full replacement query for the source fetch. The literal token
    /// `@documentId` is substituted textually per document.
    #[serde(default)]
    pub custom_query: Option<String>,
    /// Extra condition ANDed onto the generated source fetch.
    #[serde(default)]
    pub filter_condition: Option<String>,
    #[serde(default)]
    pub order_by_column: Option<String>,
    pub field_mappings: Vec<FieldMapping>,
}

impl TableConfig {
    /// Target-side column holding the document key, defaulting to the
    /// source primary key name when not remapped.
    pub fn target_key(&self) -> &str {
        self.target_primary_key.as_deref().unwrap_or(&self.primary_key)
    }

    pub fn lookup_fields(&self) -> impl Iterator<Item = &FieldMapping> {
        self.field_mappings.iter().filter(|f| f.lookup_from_target)
    }
}
