use crate::{
    execution::record::{DocumentDetail, ExecutionStatus},
    mapping::MarkProcessedStrategy,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Aggregate returned by `process_documents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub processed: u64,
    pub failed: u64,
    pub skipped: u64,
    /// Successful documents per document type.
    #[serde(default)]
    pub by_type: HashMap<String, u64>,
    pub details: Vec<DocumentDetail>,
    #[serde(default)]
    pub consecutives_used: Vec<String>,
    #[serde(default)]
    pub bonification_stats: Option<BonificationStats>,
    #[serde(default)]
    pub marking: Option<MarkingResult>,
}

impl BatchResult {
    /// Final status rule: `cancelled` wins, then all-failed, then partial.
    pub fn finalize_status(processed: u64, failed: u64, cancelled: bool) -> ExecutionStatus {
        if cancelled {
            ExecutionStatus::Cancelled
        } else if failed > 0 && processed == 0 {
            ExecutionStatus::Failed
        } else if failed > 0 {
            ExecutionStatus::Partial
        } else {
            ExecutionStatus::Completed
        }
    }
}

/// Outcome of the mark-as-processed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkingResult {
    pub strategy: MarkProcessedStrategy,
    pub marked: u64,
    pub rolled_back: bool,
}

/// Counters accumulated by the bonification processor across a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonificationStats {
    pub total_bonifications: u64,
    pub total_promotions: u64,
    pub processed_details: u64,
    pub orphan_lines: u64,
    /// Count per indicator value observed (e.g. different promo classes).
    #[serde(default)]
    pub bonification_types: HashMap<String, u64>,
}

impl BonificationStats {
    pub fn absorb(&mut self, other: &BonificationStats) {
        self.total_bonifications += other.total_bonifications;
        self.total_promotions += other.total_promotions;
        self.processed_details += other.processed_details;
        self.orphan_lines += other.orphan_lines;
        for (kind, count) in &other.bonification_types {
            *self.bonification_types.entry(kind.clone()).or_default() += count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_rules() {
        use ExecutionStatus::*;
        assert_eq!(BatchResult::finalize_status(0, 0, false), Completed);
        assert_eq!(BatchResult::finalize_status(3, 0, false), Completed);
        assert_eq!(BatchResult::finalize_status(2, 1, false), Partial);
        assert_eq!(BatchResult::finalize_status(0, 4, false), Failed);
        assert_eq!(BatchResult::finalize_status(5, 0, true), Cancelled);
    }
}
