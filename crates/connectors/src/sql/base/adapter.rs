use crate::{
    error::DbError,
    sql::base::{
        metadata::TableMetadata,
        requests::{ExistsRequest, FetchRowsRequest, InsertRequest, NamedParam, UpdateInRequest},
    },
};
use async_trait::async_trait;
use model::records::row::RowData;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseKind {
    MySql,
    Postgres,
    Mssql,
    Memory,
}

/// Uniform surface over the supported backends.
///
/// Stored SQL fragments arrive MSSQL-flavoured; implementations translate
/// markers and `TOP` through their [`Dialect`](super::dialect::Dialect)
/// before executing.
#[async_trait]
pub trait SqlAdapter: Send + Sync {
    /// Run a stored SQL fragment with `@name` parameters.
    async fn query(&self, sql: &str, params: &[NamedParam]) -> Result<Vec<RowData>, DbError>;

    /// Run a statement; returns affected row count.
    async fn execute(&self, sql: &str, params: &[NamedParam]) -> Result<u64, DbError>;

    async fn fetch_rows(&self, request: &FetchRowsRequest) -> Result<Vec<RowData>, DbError>;
    async fn insert(&self, request: &InsertRequest) -> Result<(), DbError>;
    async fn exists(&self, request: &ExistsRequest) -> Result<bool, DbError>;
    async fn update_where_in(&self, request: &UpdateInRequest) -> Result<u64, DbError>;

    // Introspection
    async fn table_exists(&self, table: &str) -> Result<bool, DbError>;
    async fn table_metadata(&self, table: &str) -> Result<TableMetadata, DbError>;
    async fn clear_table(&self, table: &str) -> Result<(), DbError>;

    // Transactions (statement-level; the engine commits per INSERT)
    async fn begin(&self) -> Result<(), DbError>;
    async fn commit(&self) -> Result<(), DbError>;
    async fn rollback(&self) -> Result<(), DbError>;

    /// Health probe.
    async fn ping(&self) -> Result<(), DbError>;

    fn kind(&self) -> DatabaseKind;
}
