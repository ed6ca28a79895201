use engine_config::validation::Finding;
use model::execution::{record::ExecutionRecord, result::BatchResult};

pub fn print_result(result: &BatchResult) {
    println!("execution:  {}", result.execution_id);
    println!("status:     {}", result.status);
    println!(
        "documents:  {} processed, {} failed, {} skipped",
        result.processed, result.failed, result.skipped
    );
    if !result.by_type.is_empty() {
        let mut types: Vec<_> = result.by_type.iter().collect();
        types.sort();
        let summary = types
            .iter()
            .map(|(name, count)| format!("{name}={count}"))
            .collect::<Vec<_>>()
            .join(", ");
        println!("by type:    {summary}");
    }
    if !result.consecutives_used.is_empty() {
        println!("consecutives: {}", result.consecutives_used.join(", "));
    }
    if let Some(stats) = &result.bonification_stats {
        println!(
            "bonifications: {} mapped, {} promotions, {} orphans",
            stats.total_bonifications, stats.total_promotions, stats.orphan_lines
        );
    }
    if let Some(marking) = &result.marking {
        println!(
            "marking:    {:?} marked={} rolled_back={}",
            marking.strategy, marking.marked, marking.rolled_back
        );
    }
    for detail in result.details.iter().filter(|d| !d.success) {
        println!(
            "  - {} [{}] {}",
            detail.document_id,
            detail
                .error_code
                .map(|c| c.as_str())
                .unwrap_or(match detail.status {
                    model::execution::record::DocumentStatus::Skipped => "skipped",
                    _ => "failed",
                }),
            detail.message.as_deref().unwrap_or("")
        );
    }
}

pub fn print_findings(findings: &[Finding]) {
    if findings.is_empty() {
        println!("mapping is valid");
        return;
    }
    for finding in findings {
        println!("{finding}");
    }
}

pub fn print_executions(records: &[ExecutionRecord]) {
    for record in records {
        println!(
            "{}  {}  {}  total={} ok={} failed={} skipped={}",
            record.id,
            record.start_time.format("%Y-%m-%d %H:%M:%S"),
            record.status,
            record.total_records,
            record.successful_records,
            record.failed_records,
            record.skipped_records
        );
    }
}
