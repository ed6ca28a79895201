use crate::{
    error::DbError,
    sql::base::{
        adapter::{DatabaseKind, SqlAdapter},
        coercion::coerce_for_column,
        metadata::{ColumnMetadata, TableMetadata},
        requests::{
            ExistsRequest, FetchRowsRequest, InsertRequest, NamedParam, SqlExpr, UpdateInRequest,
        },
    },
};
use async_trait::async_trait;
use chrono::Utc;
use model::{
    core::value::{FieldValue, Value},
    records::row::RowData,
};
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

/// In-process backend used by the test suites. Structured requests are
/// interpreted against real tables with metadata; raw SQL goes through
/// registered stub responses, mirroring how the engine only relies on the
/// parameter/lookup contract for user SQL.
#[derive(Clone, Default)]
pub struct MemoryAdapter {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, MemoryTable>,
    stubs: Vec<QueryStub>,
    fail_queue: VecDeque<DbError>,
    cancel_after: Option<(usize, CancellationToken)>,
}

struct MemoryTable {
    meta: TableMetadata,
    rows: Vec<RowData>,
}

struct QueryStub {
    needle: String,
    rows: Vec<RowData>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        MemoryAdapter::default()
    }

    pub fn create_table(&self, name: &str, columns: Vec<ColumnMetadata>) {
        let mut meta = TableMetadata::new(name);
        for column in columns {
            meta.add(column);
        }
        let mut state = self.state.lock().expect("memory adapter poisoned");
        state.tables.insert(
            name.to_ascii_lowercase(),
            MemoryTable {
                meta,
                rows: Vec::new(),
            },
        );
    }

    /// Seed a row without PK enforcement (fixture setup).
    pub fn seed_row(&self, table: &str, row: RowData) {
        let mut state = self.state.lock().expect("memory adapter poisoned");
        if let Some(t) = state.tables.get_mut(&table.to_ascii_lowercase()) {
            t.rows.push(row);
        }
    }

    pub fn rows(&self, table: &str) -> Vec<RowData> {
        let state = self.state.lock().expect("memory adapter poisoned");
        state
            .tables
            .get(&table.to_ascii_lowercase())
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Register a canned result for raw SQL whose normalised text contains
    /// `sql_fragment`.
    pub fn stub_query(&self, sql_fragment: &str, rows: Vec<RowData>) {
        let mut state = self.state.lock().expect("memory adapter poisoned");
        state.stubs.push(QueryStub {
            needle: normalize(sql_fragment),
            rows,
        });
    }

    /// Make the next statement fail with `error` (transient-failure tests).
    pub fn fail_next(&self, error: DbError) {
        let mut state = self.state.lock().expect("memory adapter poisoned");
        state.fail_queue.push_back(error);
    }

    /// Cancel `token` once `fetches` fetch_rows calls have been served
    /// (deterministic mid-batch cancellation in tests).
    pub fn cancel_token_after(&self, fetches: usize, token: CancellationToken) {
        let mut state = self.state.lock().expect("memory adapter poisoned");
        state.cancel_after = Some((fetches, token));
    }

    fn take_failure(&self) -> Option<DbError> {
        let mut state = self.state.lock().expect("memory adapter poisoned");
        state.fail_queue.pop_front()
    }

    fn count_fetch(&self) {
        let mut state = self.state.lock().expect("memory adapter poisoned");
        let exhausted = match state.cancel_after.as_mut() {
            Some((remaining, _)) => {
                *remaining = remaining.saturating_sub(1);
                *remaining == 0
            }
            None => false,
        };
        if exhausted && let Some((_, token)) = state.cancel_after.take() {
            token.cancel();
        }
    }
}

fn normalize(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x == y;
    }
    match (a.as_string(), b.as_string()) {
        (Some(x), Some(y)) => x == y,
        _ => a.is_null() && b.is_null(),
    }
}

/// Evaluate the native-function fragments the evaluator may inline.
fn eval_raw(fragment: &str) -> Value {
    let upper = fragment.to_ascii_uppercase();
    if upper.contains("GETDATE")
        || upper.contains("CURRENT_TIMESTAMP")
        || upper.contains("SYSDATETIME")
        || upper.contains("SYSUTCDATETIME")
        || upper.contains("GETUTCDATE")
    {
        return Value::Timestamp(Utc::now());
    }
    if upper.contains("NEWID") {
        return Value::Uuid(Uuid::new_v4());
    }
    Value::String(fragment.to_string())
}

#[async_trait]
impl SqlAdapter for MemoryAdapter {
    async fn query(&self, sql: &str, _params: &[NamedParam]) -> Result<Vec<RowData>, DbError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let normalized = normalize(sql);
        let state = self.state.lock().expect("memory adapter poisoned");
        for stub in &state.stubs {
            if normalized.contains(&stub.needle) {
                return Ok(stub.rows.clone());
            }
        }
        Err(DbError::Unsupported(format!(
            "no stub registered for query: {sql}"
        )))
    }

    async fn execute(&self, sql: &str, _params: &[NamedParam]) -> Result<u64, DbError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let normalized = normalize(sql);
        let state = self.state.lock().expect("memory adapter poisoned");
        if state.stubs.iter().any(|s| normalized.contains(&s.needle)) {
            return Ok(0);
        }
        Err(DbError::Unsupported(format!(
            "no stub registered for statement: {sql}"
        )))
    }

    async fn fetch_rows(&self, request: &FetchRowsRequest) -> Result<Vec<RowData>, DbError> {
        self.count_fetch();
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        if request.extra_condition.is_some() {
            warn!(table = %request.table, "memory adapter ignores raw filter conditions");
        }

        let state = self.state.lock().expect("memory adapter poisoned");
        let table = state
            .tables
            .get(&request.table.to_ascii_lowercase())
            .ok_or_else(|| DbError::TableNotFound(request.table.clone()))?;

        let mut rows: Vec<RowData> = table
            .rows
            .iter()
            .filter(|row| {
                request
                    .filters
                    .iter()
                    .all(|f| values_equal(&row.get_value(&f.column), &f.value))
            })
            .cloned()
            .collect();

        if let Some(order_by) = &request.order_by {
            rows.sort_by(|a, b| {
                let left = a.get_value(order_by);
                let right = b.get_value(order_by);
                match (left.as_f64(), right.as_f64()) {
                    (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
                    _ => left
                        .as_string()
                        .unwrap_or_default()
                        .cmp(&right.as_string().unwrap_or_default()),
                }
            });
        }
        if let Some(limit) = request.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, request: &InsertRequest) -> Result<(), DbError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let mut state = self.state.lock().expect("memory adapter poisoned");
        let table = state
            .tables
            .get_mut(&request.table.to_ascii_lowercase())
            .ok_or_else(|| DbError::TableNotFound(request.table.clone()))?;

        let mut fields = Vec::with_capacity(request.columns.len());
        for (column, expr) in request.columns.iter().zip(request.values.iter()) {
            let raw = match expr {
                SqlExpr::Bound(value) => value.clone(),
                SqlExpr::Raw(fragment) => eval_raw(fragment),
            };
            let value = match table.meta.column(column) {
                Some(meta) => {
                    let coerced = coerce_for_column(raw, meta);
                    if coerced.is_null() && !meta.nullable {
                        return Err(DbError::NullValue(column.clone()));
                    }
                    coerced
                }
                None => raw,
            };
            fields.push(FieldValue::new(column, value));
        }
        let row = RowData::new(&request.table, fields);

        for pk in table.meta.primary_keys() {
            let new_key = row.get_value(&pk.name);
            if new_key.is_null() {
                continue;
            }
            if table
                .rows
                .iter()
                .any(|existing| values_equal(&existing.get_value(&pk.name), &new_key))
            {
                return Err(DbError::DuplicateKey(format!(
                    "{}.{} = {}",
                    request.table, pk.name, new_key
                )));
            }
        }

        table.rows.push(row);
        Ok(())
    }

    async fn exists(&self, request: &ExistsRequest) -> Result<bool, DbError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let state = self.state.lock().expect("memory adapter poisoned");
        let table = state
            .tables
            .get(&request.table.to_ascii_lowercase())
            .ok_or_else(|| DbError::TableNotFound(request.table.clone()))?;
        Ok(table
            .rows
            .iter()
            .any(|row| values_equal(&row.get_value(&request.key_column), &request.key)))
    }

    async fn update_where_in(&self, request: &UpdateInRequest) -> Result<u64, DbError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        if request.keys.is_empty() {
            return Ok(0);
        }
        let mut state = self.state.lock().expect("memory adapter poisoned");
        let table = state
            .tables
            .get_mut(&request.table.to_ascii_lowercase())
            .ok_or_else(|| DbError::TableNotFound(request.table.clone()))?;

        let mut updated = 0;
        for row in &mut table.rows {
            let key = row.get_value(&request.key_column);
            if request.keys.iter().any(|k| values_equal(k, &key)) {
                row.set(&request.set_column, request.set_value.clone());
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        let state = self.state.lock().expect("memory adapter poisoned");
        Ok(state.tables.contains_key(&table.to_ascii_lowercase()))
    }

    async fn table_metadata(&self, table: &str) -> Result<TableMetadata, DbError> {
        let state = self.state.lock().expect("memory adapter poisoned");
        state
            .tables
            .get(&table.to_ascii_lowercase())
            .map(|t| t.meta.clone())
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))
    }

    async fn clear_table(&self, table: &str) -> Result<(), DbError> {
        let mut state = self.state.lock().expect("memory adapter poisoned");
        let table = state
            .tables
            .get_mut(&table.to_ascii_lowercase())
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))?;
        table.rows.clear();
        Ok(())
    }

    async fn begin(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn commit(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn rollback(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn ping(&self) -> Result<(), DbError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        Ok(())
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders_adapter() -> MemoryAdapter {
        let adapter = MemoryAdapter::new();
        let mut id = ColumnMetadata::new("id", "int", 1);
        id.primary_key = true;
        let mut name = ColumnMetadata::new("name", "varchar", 2);
        name.max_length = Some(5);
        adapter.create_table("orders", vec![id, name]);
        adapter
    }

    #[tokio::test]
    async fn insert_enforces_primary_key() {
        let adapter = orders_adapter();
        let request = InsertRequest {
            table: "orders".into(),
            columns: vec!["id".into(), "name".into()],
            values: vec![
                SqlExpr::Bound(Value::Int(1)),
                SqlExpr::Bound(Value::String("a".into())),
            ],
        };
        adapter.insert(&request).await.unwrap();
        let err = adapter.insert(&request).await.unwrap_err();
        assert!(matches!(err, DbError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn insert_truncates_and_evaluates_raw_fragments() {
        let adapter = orders_adapter();
        let request = InsertRequest {
            table: "orders".into(),
            columns: vec!["id".into(), "name".into()],
            values: vec![
                SqlExpr::Raw("NEWID()".into()),
                SqlExpr::Bound(Value::String("abcdefgh".into())),
            ],
        };
        adapter.insert(&request).await.unwrap();
        let rows = adapter.rows("orders");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_value("name"), Value::String("abcde".into()));
    }

    #[tokio::test]
    async fn update_where_in_touches_only_listed_keys() {
        let adapter = orders_adapter();
        for id in 1..=3 {
            adapter.seed_row(
                "orders",
                RowData::new(
                    "orders",
                    vec![
                        FieldValue::new("id", Value::Int(id)),
                        FieldValue::new("flag", Value::String("N".into())),
                    ],
                ),
            );
        }
        let updated = adapter
            .update_where_in(&UpdateInRequest {
                table: "orders".into(),
                set_column: "flag".into(),
                set_value: Value::String("S".into()),
                key_column: "id".into(),
                keys: vec![Value::Int(1), Value::Int(3)],
            })
            .await
            .unwrap();
        assert_eq!(updated, 2);
        let rows = adapter.rows("orders");
        assert_eq!(rows[0].get_value("flag"), Value::String("S".into()));
        assert_eq!(rows[1].get_value("flag"), Value::String("N".into()));
    }
}
