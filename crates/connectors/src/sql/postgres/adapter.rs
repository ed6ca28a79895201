use crate::{
    error::{ConnectorError, DbError},
    sql::{
        base::{
            adapter::{DatabaseKind, SqlAdapter},
            dialect::{self, Dialect},
            metadata::{ColumnMetadata, TableMetadata},
            requests::{
                ExistsRequest, FetchRowsRequest, InsertRequest, NamedParam, UpdateInRequest,
            },
            row::DbRow,
        },
        postgres::{params::PgParamStore, utils::connect_client},
    },
};
use async_trait::async_trait;
use model::{core::value::Value, records::row::RowData};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_postgres::{Client, Row as PgRow, error::SqlState};
use tracing::debug;

const QUERY_TABLE_EXISTS_SQL: &str = include_str!("sql/table_exists.sql");
const QUERY_TABLE_METADATA_SQL: &str = include_str!("sql/table_metadata.sql");

#[derive(Clone)]
pub struct PgAdapter {
    client: Arc<RwLock<Client>>,
    dialect: Dialect,
}

impl PgAdapter {
    pub async fn connect(url: &str) -> Result<Self, ConnectorError> {
        let client = Arc::new(RwLock::new(connect_client(url).await?));
        Ok(PgAdapter {
            client,
            dialect: dialect::POSTGRES,
        })
    }

    async fn exec_rows(&self, sql: &str, values: &[Value]) -> Result<Vec<PgRow>, DbError> {
        debug!(sql, "postgres query");
        let bindings = PgParamStore::from_values(values);
        let client = self.client.read().await;
        client.query(sql, &bindings.as_refs()).await.map_err(map_err)
    }

    async fn exec(&self, sql: &str, values: &[Value]) -> Result<u64, DbError> {
        debug!(sql, "postgres exec");
        let bindings = PgParamStore::from_values(values);
        let client = self.client.read().await;
        client
            .execute(sql, &bindings.as_refs())
            .await
            .map_err(map_err)
    }
}

#[async_trait]
impl SqlAdapter for PgAdapter {
    async fn query(&self, sql: &str, params: &[NamedParam]) -> Result<Vec<RowData>, DbError> {
        let (sql, values) = self.dialect.bind_named(sql, params)?;
        let rows = self.exec_rows(&sql, &values).await?;
        Ok(rows
            .iter()
            .map(|r| DbRow::Postgres(r).to_row_data(""))
            .collect())
    }

    async fn execute(&self, sql: &str, params: &[NamedParam]) -> Result<u64, DbError> {
        let (sql, values) = self.dialect.bind_named(sql, params)?;
        self.exec(&sql, &values).await
    }

    async fn fetch_rows(&self, request: &FetchRowsRequest) -> Result<Vec<RowData>, DbError> {
        let (sql, values) = self.dialect.render_select(request);
        let rows = self.exec_rows(&sql, &values).await?;
        Ok(rows
            .iter()
            .map(|r| DbRow::Postgres(r).to_row_data(&request.table))
            .collect())
    }

    async fn insert(&self, request: &InsertRequest) -> Result<(), DbError> {
        let (sql, values) = self.dialect.render_insert(request);
        self.exec(&sql, &values).await?;
        Ok(())
    }

    async fn exists(&self, request: &ExistsRequest) -> Result<bool, DbError> {
        let (sql, values) = self.dialect.render_exists(request);
        let rows = self.exec_rows(&sql, &values).await?;
        Ok(!rows.is_empty())
    }

    async fn update_where_in(&self, request: &UpdateInRequest) -> Result<u64, DbError> {
        if request.keys.is_empty() {
            return Ok(0);
        }
        let (sql, values) = self.dialect.render_update_in(request);
        self.exec(&sql, &values).await
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        let rows = self
            .exec_rows(QUERY_TABLE_EXISTS_SQL, &[Value::String(table.to_string())])
            .await?;
        let exists = rows
            .first()
            .and_then(|row| row.try_get::<_, bool>(0).ok())
            .unwrap_or(false);
        Ok(exists)
    }

    async fn table_metadata(&self, table: &str) -> Result<TableMetadata, DbError> {
        let rows = self
            .exec_rows(QUERY_TABLE_METADATA_SQL, &[Value::String(table.to_string())])
            .await?;
        if rows.is_empty() {
            return Err(DbError::TableNotFound(table.to_string()));
        }

        let mut meta = TableMetadata::new(table);
        for row in &rows {
            let data = DbRow::Postgres(row).to_row_data(table);
            let name = data.get_value("column_name").as_string().unwrap_or_default();
            let sql_type = data.get_value("data_type").as_string().unwrap_or_default();
            let ordinal = data
                .get_value("ordinal_position")
                .as_i64()
                .unwrap_or(0)
                .max(0) as usize;

            let mut column = ColumnMetadata::new(&name, &sql_type, ordinal);
            column.max_length = data
                .get_value("character_maximum_length")
                .as_i64()
                .filter(|len| *len > 0)
                .map(|len| len as usize);
            column.nullable = data
                .get_value("is_nullable")
                .as_string()
                .map(|s| s.eq_ignore_ascii_case("YES"))
                .unwrap_or(true);
            column.primary_key = data.get_value("is_primary").as_i64().unwrap_or(0) == 1;
            meta.add(column);
        }
        Ok(meta)
    }

    async fn clear_table(&self, table: &str) -> Result<(), DbError> {
        self.exec(&format!("TRUNCATE TABLE {table}"), &[]).await?;
        Ok(())
    }

    async fn begin(&self) -> Result<(), DbError> {
        let client = self.client.read().await;
        client.batch_execute("BEGIN").await.map_err(map_err)
    }

    async fn commit(&self) -> Result<(), DbError> {
        let client = self.client.read().await;
        client.batch_execute("COMMIT").await.map_err(map_err)
    }

    async fn rollback(&self) -> Result<(), DbError> {
        let client = self.client.read().await;
        client.batch_execute("ROLLBACK").await.map_err(map_err)
    }

    async fn ping(&self) -> Result<(), DbError> {
        let client = self.client.read().await;
        client.batch_execute("SELECT 1").await.map_err(map_err)
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Postgres
    }
}

fn map_err(err: tokio_postgres::Error) -> DbError {
    if err.is_closed() {
        return DbError::Connection(err.to_string());
    }
    let Some(code) = err.code() else {
        return DbError::Unknown(err.to_string());
    };
    let message = err.to_string();
    if *code == SqlState::T_R_DEADLOCK_DETECTED {
        DbError::Deadlock(message)
    } else if *code == SqlState::UNIQUE_VIOLATION {
        DbError::DuplicateKey(message)
    } else if *code == SqlState::INSUFFICIENT_PRIVILEGE {
        DbError::Permission(message)
    } else if *code == SqlState::SYNTAX_ERROR {
        DbError::Syntax(message)
    } else if *code == SqlState::NOT_NULL_VIOLATION {
        DbError::NullValue(message)
    } else if *code == SqlState::STRING_DATA_RIGHT_TRUNCATION {
        DbError::Truncation(message)
    } else if *code == SqlState::UNDEFINED_TABLE {
        DbError::TableNotFound(message)
    } else if *code == SqlState::INVALID_DATETIME_FORMAT
        || *code == SqlState::DATETIME_FIELD_OVERFLOW
    {
        DbError::DateConversion(message)
    } else if *code == SqlState::QUERY_CANCELED {
        DbError::Timeout(message)
    } else {
        DbError::Unknown(message)
    }
}
