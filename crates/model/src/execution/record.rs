use crate::execution::{errors::ErrorCode, result::BonificationStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal and in-flight states of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Partial,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Partial => "partial",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single document within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Processed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDetail {
    pub document_id: String,
    pub success: bool,
    pub status: DocumentStatus,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_code: Option<ErrorCode>,
    #[serde(default)]
    pub error_details: Option<String>,
    /// Target tables that received rows for this document.
    #[serde(default)]
    pub processed_tables: Vec<String>,
    /// Formatted consecutive assigned to this document, if any.
    #[serde(default)]
    pub consecutive: Option<String>,
}

impl DocumentDetail {
    pub fn processed(document_id: &str, document_type: Option<String>) -> Self {
        DocumentDetail {
            document_id: document_id.to_string(),
            success: true,
            status: DocumentStatus::Processed,
            document_type,
            message: None,
            error_code: None,
            error_details: None,
            processed_tables: Vec::new(),
            consecutive: None,
        }
    }

    pub fn skipped(document_id: &str, reason: &str) -> Self {
        DocumentDetail {
            document_id: document_id.to_string(),
            success: false,
            status: DocumentStatus::Skipped,
            document_type: None,
            message: Some(reason.to_string()),
            error_code: None,
            error_details: None,
            processed_tables: Vec::new(),
            consecutive: None,
        }
    }

    pub fn failed(document_id: &str, code: ErrorCode, message: String) -> Self {
        DocumentDetail {
            document_id: document_id.to_string(),
            success: false,
            status: DocumentStatus::Failed,
            document_type: None,
            message: Some(message),
            error_code: Some(code),
            error_details: None,
            processed_tables: Vec::new(),
            consecutive: None,
        }
    }
}

/// Persisted audit record for one execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: String,
    pub mapping_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub execution_time_ms: Option<i64>,
    pub status: ExecutionStatus,
    pub total_records: u64,
    #[serde(default)]
    pub successful_records: u64,
    #[serde(default)]
    pub failed_records: u64,
    #[serde(default)]
    pub skipped_records: u64,
    #[serde(default)]
    pub details: Vec<DocumentDetail>,
    #[serde(default)]
    pub error_details: Option<String>,
    #[serde(default)]
    pub bonification_stats: Option<BonificationStats>,
    #[serde(default)]
    pub consecutives_used: Vec<String>,
}

impl ExecutionRecord {
    pub fn started(id: &str, mapping_id: &str, total_records: u64) -> Self {
        ExecutionRecord {
            id: id.to_string(),
            mapping_id: mapping_id.to_string(),
            start_time: Utc::now(),
            end_time: None,
            execution_time_ms: None,
            status: ExecutionStatus::Running,
            total_records,
            successful_records: 0,
            failed_records: 0,
            skipped_records: 0,
            details: Vec::new(),
            error_details: None,
            bonification_stats: None,
            consecutives_used: Vec::new(),
        }
    }
}
