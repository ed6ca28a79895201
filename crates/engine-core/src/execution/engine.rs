use crate::{
    error::{EngineError, db_error_code},
    execution::{
        counter::{AllocError, Allocation, DocumentCounter},
        marker,
    },
    progress::{ProgressReporter, ProgressStatus},
    retry::{RetryDisposition, RetryPolicy},
    tracker::{RunningExecution, TaskTracker},
};
use chrono::Utc;
use connectors::{
    error::DbError,
    manager::{Connection, ConnectionManager},
    sql::base::{
        dialect::substitute_document_id,
        requests::{ExistsRequest, FetchRowsRequest, InsertRequest},
    },
};
use consecutive::service::ConsecutiveService;
use engine_config::{
    store::{execution::ExecutionStore, mapping::MappingStore},
    validation,
};
use engine_processing::{
    bonification,
    error::{BonificationError, EvalError},
    evaluator::{self, RowContext, lookup},
};
use model::{
    core::value::Value,
    execution::{
        errors::ErrorCode,
        record::{DocumentDetail, ExecutionRecord, ExecutionStatus},
        result::{BatchResult, BonificationStats, MarkingResult},
    },
    mapping::{
        Mapping, MarkProcessedStrategy,
        bonification::{BonificationConfig, CustomerContext},
        table::TableConfig,
    },
    records::row::RowData,
};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

const DEFAULT_WATCHDOG_TIMEOUT: Duration = Duration::from_secs(120);
const PROGRESS_LOG_EVERY: usize = 10;

pub struct EngineParams {
    pub mappings: Arc<dyn MappingStore>,
    pub executions: Arc<dyn ExecutionStore>,
    pub connections: ConnectionManager,
    pub counters: Option<Arc<ConsecutiveService>>,
}

/// The document transfer engine: runs batches of documents through a
/// mapping, one document at a time, converting every per-document failure
/// into a detail entry.
pub struct DocumentEngine {
    mappings: Arc<dyn MappingStore>,
    executions: Arc<dyn ExecutionStore>,
    connections: ConnectionManager,
    counters: Option<Arc<ConsecutiveService>>,
    tracker: TaskTracker,
    watchdog_timeout: Duration,
}

/// Internal outcome of one document before it becomes a detail entry.
enum DocOutcome {
    Processed {
        document_type: String,
        tables: Vec<String>,
        consecutive: Option<String>,
        stats: Option<BonificationStats>,
    },
    Skipped {
        reason: String,
    },
}

/// Failure of one document, already classified.
struct DocFailure {
    code: ErrorCode,
    message: String,
}

impl DocFailure {
    fn general(message: String) -> Self {
        DocFailure {
            code: ErrorCode::General,
            message,
        }
    }
}

impl From<DbError> for DocFailure {
    fn from(err: DbError) -> Self {
        DocFailure {
            code: db_error_code(&err),
            message: err.to_string(),
        }
    }
}

impl From<EvalError> for DocFailure {
    fn from(err: EvalError) -> Self {
        DocFailure {
            code: err.error_code(),
            message: err.to_string(),
        }
    }
}

impl From<AllocError> for DocFailure {
    fn from(err: AllocError) -> Self {
        DocFailure::general(format!("consecutive allocation failed: {err}"))
    }
}

impl From<BonificationError> for DocFailure {
    fn from(err: BonificationError) -> Self {
        DocFailure::general(err.to_string())
    }
}

#[derive(Default)]
struct Tally {
    processed: u64,
    failed: u64,
    skipped: u64,
    by_type: HashMap<String, u64>,
    details: Vec<DocumentDetail>,
    successful_ids: Vec<String>,
    consecutives_used: Vec<String>,
    bonification_stats: Option<BonificationStats>,
}

impl DocumentEngine {
    pub fn new(params: EngineParams) -> Self {
        DocumentEngine {
            mappings: params.mappings,
            executions: params.executions,
            connections: params.connections,
            counters: params.counters,
            tracker: TaskTracker::new(),
            watchdog_timeout: DEFAULT_WATCHDOG_TIMEOUT,
        }
    }

    pub fn with_watchdog_timeout(mut self, timeout: Duration) -> Self {
        self.watchdog_timeout = timeout;
        self
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Request cancellation of a running execution.
    pub fn cancel_execution(&self, execution_id: &str) -> bool {
        self.tracker.cancel(execution_id)
    }

    pub fn execution_progress(&self, execution_id: &str) -> Option<ProgressStatus> {
        self.tracker.status(execution_id)
    }

    /// Transfer a batch of documents under one mapping.
    ///
    /// Only setup failures (bad mapping, unreachable servers) return
    /// `Err`; everything after the loop starts is reported through the
    /// result aggregate.
    pub async fn process_documents(
        &self,
        mapping_id: &str,
        document_ids: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<BatchResult, EngineError> {
        // loading
        let mapping = self.mappings.find_mapping(mapping_id).await?;
        let findings = validation::validate_mapping(&mapping);
        for finding in &findings {
            match finding.severity {
                validation::Severity::Warning => warn!(mapping = %mapping.name, "{finding}"),
                validation::Severity::Error => error!(mapping = %mapping.name, "{finding}"),
            }
        }
        if validation::has_errors(&findings) {
            let summary = findings
                .iter()
                .map(|f| f.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(EngineError::InvalidMapping(summary));
        }

        let execution_id = Uuid::new_v4().to_string();
        let total = document_ids.len() as u64;
        let mut record = ExecutionRecord::started(&execution_id, mapping_id, total);
        self.executions.create_execution(&record).await?;
        info!(execution_id = %execution_id, mapping = %mapping.name, total, "execution started");

        // connecting
        let started = std::time::Instant::now();
        let (mut source, mut target, counter) = match self.setup(&mapping).await {
            Ok(setup) => setup,
            Err(err) => {
                record.status = ExecutionStatus::Failed;
                record.end_time = Some(Utc::now());
                record.error_details = Some(err.to_string());
                if let Err(store_err) = self.executions.update_execution(&record).await {
                    warn!(%store_err, "could not persist failed execution record");
                }
                return Err(err);
            }
        };

        // The watchdog is a child token: it can abort this execution but
        // never cancels the caller's token.
        let watchdog = cancel.child_token();
        let progress = ProgressReporter::new(&execution_id, total);
        self.tracker.register(RunningExecution {
            execution_id: execution_id.clone(),
            mapping_id: mapping_id.to_string(),
            started_at: Utc::now(),
            cancel: watchdog.clone(),
            progress: progress.subscribe(),
        });
        let watchdog_task = {
            let token = watchdog.clone();
            let timeout = self.watchdog_timeout;
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(timeout) => {
                        warn!("watchdog timeout reached, aborting execution");
                        token.cancel();
                    }
                }
            })
        };

        // per-document loop
        let mut tally = Tally::default();
        let mut cancelled = false;
        let mut marked = 0u64;

        for (index, document_id) in document_ids.iter().enumerate() {
            if watchdog.is_cancelled() {
                cancelled = true;
                info!(execution_id = %execution_id, at = index, "execution cancelled mid-batch");
                break;
            }

            let outcome = self
                .process_document(&mapping, document_id, &execution_id, &source, &target, counter.as_ref())
                .await;

            match outcome {
                Ok(DocOutcome::Processed {
                    document_type,
                    tables,
                    consecutive,
                    stats,
                }) => {
                    tally.processed += 1;
                    *tally.by_type.entry(document_type.clone()).or_default() += 1;
                    tally.successful_ids.push(document_id.clone());
                    if let Some(formatted) = &consecutive {
                        tally.consecutives_used.push(formatted.clone());
                    }
                    if let Some(stats) = stats {
                        tally
                            .bonification_stats
                            .get_or_insert_with(BonificationStats::default)
                            .absorb(&stats);
                    }
                    let mut detail = DocumentDetail::processed(document_id, Some(document_type));
                    detail.processed_tables = tables;
                    detail.consecutive = consecutive;
                    tally.details.push(detail);

                    if mapping.mark_processed_strategy == MarkProcessedStrategy::Individual {
                        match marker::mark_one(&source, &mapping, document_id).await {
                            Ok(count) => marked += count,
                            Err(err) => {
                                warn!(document_id = %document_id, %err, "individual marking failed")
                            }
                        }
                    }
                }
                Ok(DocOutcome::Skipped { reason }) => {
                    tally.skipped += 1;
                    tally.details.push(DocumentDetail::skipped(document_id, &reason));
                }
                Err(failure) => {
                    tally.failed += 1;
                    warn!(
                        document_id = %document_id,
                        code = failure.code.as_str(),
                        "document failed: {}",
                        failure.message
                    );
                    tally
                        .details
                        .push(DocumentDetail::failed(document_id, failure.code, failure.message.clone()));

                    // One in-place reconnection after a transient loss; the
                    // current document stays failed, the next ones run on
                    // the fresh connections.
                    if failure.code == ErrorCode::Connection {
                        if let Err(err) = self.connections.reconnect(&mut source).await {
                            warn!(%err, "source reconnection failed");
                        }
                        if let Err(err) = self.connections.reconnect(&mut target).await {
                            warn!(%err, "target reconnection failed");
                        }
                    }
                }
            }

            let done = (index + 1) as u64;
            progress.report(done, tally.processed, tally.failed, tally.skipped);
            if (index + 1) % PROGRESS_LOG_EVERY == 0 {
                info!(
                    execution_id = %execution_id,
                    done,
                    total,
                    processed = tally.processed,
                    failed = tally.failed,
                    "progress"
                );
            }
        }

        // finalizing: batch marking and its scoped rollback
        let marking = match mapping.mark_processed_strategy {
            MarkProcessedStrategy::None => None,
            MarkProcessedStrategy::Individual => Some(MarkingResult {
                strategy: MarkProcessedStrategy::Individual,
                marked,
                rolled_back: false,
            }),
            MarkProcessedStrategy::Batch => {
                let marked = match marker::mark_batch(&source, &mapping, &tally.successful_ids).await
                {
                    Ok(count) => count,
                    Err(err) => {
                        warn!(%err, "batch marking failed");
                        0
                    }
                };
                let rolled_back = if mapping.mark_processed_config.allow_rollback
                    && tally.failed > 0
                    && !tally.successful_ids.is_empty()
                {
                    marker::rollback_batch(&source, &mapping, &tally.successful_ids).await
                } else {
                    false
                };
                Some(MarkingResult {
                    strategy: MarkProcessedStrategy::Batch,
                    marked,
                    rolled_back,
                })
            }
        };

        let status = BatchResult::finalize_status(tally.processed, tally.failed, cancelled);

        record.status = status;
        record.end_time = Some(Utc::now());
        record.execution_time_ms = Some(started.elapsed().as_millis() as i64);
        record.successful_records = tally.processed;
        record.failed_records = tally.failed;
        record.skipped_records = tally.skipped;
        record.details = tally.details.clone();
        record.bonification_stats = tally.bonification_stats.clone();
        record.consecutives_used = tally.consecutives_used.clone();
        if let Err(err) = self.executions.update_execution(&record).await {
            error!(%err, execution_id = %execution_id, "could not persist execution record");
        }

        watchdog.cancel();
        let _ = watchdog_task.await;
        self.connections.release(source).await;
        self.connections.release(target).await;
        self.tracker.deregister(&execution_id);
        info!(
            execution_id = %execution_id,
            status = status.as_str(),
            processed = tally.processed,
            failed = tally.failed,
            skipped = tally.skipped,
            "execution finished"
        );

        Ok(BatchResult {
            execution_id,
            status,
            processed: tally.processed,
            failed: tally.failed,
            skipped: tally.skipped,
            by_type: tally.by_type,
            details: tally.details,
            consecutives_used: tally.consecutives_used,
            bonification_stats: tally.bonification_stats,
            marking,
        })
    }

    async fn setup(
        &self,
        mapping: &Mapping,
    ) -> Result<(Connection, Connection, Option<DocumentCounter>), EngineError> {
        let source = self.acquire_with_retry(&mapping.source_server).await?;
        let target = match self.acquire_with_retry(&mapping.target_server).await {
            Ok(conn) => conn,
            Err(err) => {
                self.connections.release(source).await;
                return Err(err);
            }
        };
        let counter = match DocumentCounter::resolve(
            mapping,
            self.counters.clone(),
            self.mappings.clone(),
        )
        .await
        {
            Ok(counter) => counter,
            Err(err) => {
                self.connections.release(source).await;
                self.connections.release(target).await;
                return Err(err);
            }
        };
        Ok((source, target, counter))
    }

    async fn acquire_with_retry(&self, server: &str) -> Result<Connection, EngineError> {
        RetryPolicy::for_connect()
            .run(
                || self.connections.acquire(server),
                |_err| RetryDisposition::Retry,
            )
            .await
            .map_err(|err| EngineError::Acquire {
                server: server.to_string(),
                source: err.into_inner(),
            })
    }

    async fn process_document(
        &self,
        mapping: &Mapping,
        document_id: &str,
        execution_id: &str,
        source: &Connection,
        target: &Connection,
        counter: Option<&DocumentCounter>,
    ) -> Result<DocOutcome, DocFailure> {
        let mains = mapping.main_tables();
        let Some(first) = mains.first() else {
            return Err(DocFailure::general("mapping has no main tables".to_string()));
        };

        let Some(header) = self.fetch_source_row(source, first, document_id).await? else {
            return Err(DocFailure::general(format!(
                "no source row for document '{document_id}'"
            )));
        };
        let document_type = mapping.document_type(&header);

        // Existence check runs before any consecutive is taken, so a
        // skipped re-run does not advance the counter.
        let exists = target
            .exists(&ExistsRequest {
                table: first.target_table.clone(),
                key_column: first.target_key().to_string(),
                key: marker::document_key(document_id),
            })
            .await?;
        if exists {
            return Ok(DocOutcome::Skipped {
                reason: format!(
                    "document already present in {} (type {document_type})",
                    first.target_table
                ),
            });
        }

        let allocation = match counter {
            Some(counter) => Some(counter.allocate(execution_id).await?),
            None => None,
        };

        let inserted = self
            .insert_document(mapping, document_id, &mains, &header, source, target, allocation.as_ref())
            .await;

        match inserted {
            Ok((tables, stats)) => {
                if let (Some(counter), Some(allocation)) = (counter, &allocation) {
                    counter.commit(allocation).await;
                }
                Ok(DocOutcome::Processed {
                    document_type,
                    tables,
                    consecutive: allocation.map(|a| a.value.formatted),
                    stats,
                })
            }
            Err(failure) => {
                if let (Some(counter), Some(allocation)) = (counter, &allocation) {
                    counter.cancel(allocation).await;
                }
                Err(failure)
            }
        }
    }

    /// Assemble every row of the document first (all lookups, all field
    /// resolution), then insert header-before-details in execution order.
    /// A required-lookup or evaluation failure therefore leaves no target
    /// rows behind.
    async fn insert_document(
        &self,
        mapping: &Mapping,
        document_id: &str,
        mains: &[&TableConfig],
        first_header: &RowData,
        source: &Connection,
        target: &Connection,
        allocation: Option<&Allocation>,
    ) -> Result<(Vec<String>, Option<BonificationStats>), DocFailure> {
        let bonification = mapping
            .has_bonification_processing
            .then(|| mapping.bonification_config.as_ref())
            .flatten();
        let mut tables = Vec::new();
        let mut stats: Option<BonificationStats> = None;
        let mut planned = Vec::new();

        for (position, table) in mains.iter().enumerate() {
            let header = if position == 0 {
                first_header.clone()
            } else {
                match self.fetch_source_row(source, table, document_id).await? {
                    Some(row) => row,
                    None => continue,
                }
            };

            planned.push(
                self.plan_row(mapping, table, &header, target, allocation, bonification)
                    .await?,
            );
            tables.push(table.name.clone());

            for detail in mapping.details_of(&table.name) {
                let rows = self.fetch_table_rows(source, detail, document_id).await?;
                let rows = match bonification {
                    Some(config)
                        if config
                            .source_table
                            .eq_ignore_ascii_case(&detail.source_table) =>
                    {
                        let customer = customer_context(config, &header);
                        let outcome = bonification::process_document(
                            document_id,
                            rows,
                            config,
                            customer.as_ref(),
                        )?;
                        stats
                            .get_or_insert_with(BonificationStats::default)
                            .absorb(&outcome.stats);
                        outcome.rows
                    }
                    _ => rows,
                };

                for row in &rows {
                    planned.push(
                        self.plan_row(mapping, detail, row, target, allocation, bonification)
                            .await?,
                    );
                }
                tables.push(detail.name.clone());
            }
        }

        // Every row resolved; only now touch the target.
        for request in &planned {
            target.insert(request).await?;
        }

        Ok((tables, stats))
    }

    async fn plan_row(
        &self,
        mapping: &Mapping,
        table: &TableConfig,
        source_row: &RowData,
        target: &Connection,
        allocation: Option<&Allocation>,
        bonification: Option<&BonificationConfig>,
    ) -> Result<InsertRequest, DocFailure> {
        let lookups = lookup::run_lookups(table, source_row, target).await?;
        let meta = target.column_types(&table.target_table).await?;

        let ctx = RowContext {
            table,
            source_row,
            lookups: &lookups,
            consecutive: allocation.map(|a| &a.value),
            consecutive_config: mapping.consecutive_config.as_ref(),
            bonification,
            target_meta: Some(&meta),
        };
        let request = evaluator::build_insert(&ctx)?;
        evaluator::resolve::check_not_null(&ctx, &request)?;
        Ok(request)
    }

    async fn fetch_source_row(
        &self,
        source: &Connection,
        table: &TableConfig,
        document_id: &str,
    ) -> Result<Option<RowData>, DocFailure> {
        let mut rows = self.fetch_table_rows(source, table, document_id).await?;
        if rows.len() > 1 {
            warn!(
                table = %table.source_table,
                document_id,
                "multiple header rows; taking the first"
            );
        }
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    async fn fetch_table_rows(
        &self,
        source: &Connection,
        table: &TableConfig,
        document_id: &str,
    ) -> Result<Vec<RowData>, DocFailure> {
        if let Some(custom) = &table.custom_query {
            let sql = substitute_document_id(custom, document_id);
            return Ok(source.query(&sql, &[]).await?);
        }
        let mut request = FetchRowsRequest::by_key(
            &table.source_table,
            &table.primary_key,
            marker::document_key(document_id),
        );
        request.extra_condition = table.filter_condition.clone();
        request.order_by = table.order_by_column.clone();
        Ok(source.fetch_rows(&request).await?)
    }
}

/// Build the customer context from the header row, when the mapping says
/// which columns carry it.
fn customer_context(
    config: &BonificationConfig,
    header: &RowData,
) -> Option<CustomerContext> {
    let fields = config.customer_context_fields.as_ref()?;
    let get_string = |name: &Option<String>| {
        name.as_deref()
            .and_then(|n| header.get_value(n).as_string())
    };
    Some(CustomerContext {
        customer_id: get_string(&fields.customer_id),
        customer_type: get_string(&fields.customer_type),
        price_list: get_string(&fields.price_list),
        zone: get_string(&fields.zone),
        order_amount: fields
            .order_amount
            .as_deref()
            .and_then(|n| header.get_value(n).as_f64())
            .unwrap_or(0.0),
        order_date: fields.order_date.as_deref().and_then(|n| {
            match header.get_value(n) {
                Value::Date(d) => Some(d),
                Value::Timestamp(ts) => Some(ts.date_naive()),
                Value::DateTime(dt) => Some(dt.date()),
                other => other
                    .as_string()
                    .and_then(|s| Value::parse_temporal(&s))
                    .and_then(|v| match v {
                        Value::Date(d) => Some(d),
                        Value::Timestamp(ts) => Some(ts.date_naive()),
                        _ => None,
                    }),
            }
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::FieldValue;

    #[test]
    fn customer_context_reads_configured_header_columns() {
        let config: BonificationConfig = serde_json::from_str(
            r#"{
                "sourceTable": "DET", "orderField": "NUM_PED",
                "lineOrderField": "NUM_LIN",
                "bonificationIndicatorField": "TIPO_LIN",
                "bonificationIndicatorValue": "B",
                "lineNumberField": "LINEA",
                "bonificationLineReferenceField": "LINEA_PADRE",
                "customerContextFields": {
                    "customerId": "COD_CLI",
                    "orderAmount": "TOTAL",
                    "orderDate": "FECHA"
                }
            }"#,
        )
        .unwrap();
        let header = RowData::new(
            "PEDIDOS",
            vec![
                FieldValue::new("COD_CLI", Value::String("C9".into())),
                FieldValue::new("TOTAL", Value::Float(812.5)),
                FieldValue::new("FECHA", Value::String("2024-06-01".into())),
            ],
        );
        let ctx = customer_context(&config, &header).unwrap();
        assert_eq!(ctx.customer_id.as_deref(), Some("C9"));
        assert_eq!(ctx.order_amount, 812.5);
        assert!(ctx.order_date.is_some());
    }

    #[test]
    fn doc_failures_classify_database_errors() {
        let failure = DocFailure::from(DbError::DuplicateKey("pk".into()));
        assert_eq!(failure.code, ErrorCode::DuplicateKey);
        let failure = DocFailure::from(DbError::Connection("gone".into()));
        assert_eq!(failure.code, ErrorCode::Connection);
    }
}
