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
        mysql::params::MySqlParamStore,
    },
};
use async_trait::async_trait;
use model::{core::value::Value, records::row::RowData};
use mysql_async::{Conn, Pool, Row as MySqlRow, prelude::Queryable};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

const QUERY_TABLE_EXISTS_SQL: &str = include_str!("sql/table_exists.sql");
const QUERY_TABLE_METADATA_SQL: &str = include_str!("sql/table_metadata.sql");

/// MySQL / MariaDB adapter over a connection pool. While a transaction is
/// open, statements are routed through the pinned connection.
#[derive(Clone)]
pub struct MySqlAdapter {
    pool: Pool,
    tx: Arc<Mutex<Option<Conn>>>,
    dialect: Dialect,
}

impl MySqlAdapter {
    pub async fn connect(url: &str) -> Result<Self, ConnectorError> {
        let url = url.replacen("mariadb://", "mysql://", 1);
        let pool =
            Pool::from_url(url.as_str()).map_err(|e| ConnectorError::InvalidUrl(e.to_string()))?;
        // Probe eagerly so bad credentials surface at acquire time.
        let conn = pool.get_conn().await.map_err(map_err)?;
        drop(conn);
        Ok(MySqlAdapter {
            pool,
            tx: Arc::new(Mutex::new(None)),
            dialect: dialect::MYSQL,
        })
    }

    pub async fn close(self) -> Result<(), DbError> {
        self.pool.disconnect().await.map_err(map_err)
    }

    async fn exec_rows(&self, sql: &str, values: &[Value]) -> Result<Vec<MySqlRow>, DbError> {
        debug!(sql, "mysql query");
        let params = MySqlParamStore::from_values(values).params();
        let mut guard = self.tx.lock().await;
        if let Some(conn) = guard.as_mut() {
            conn.exec(sql, params).await.map_err(map_err)
        } else {
            let mut conn = self.pool.get_conn().await.map_err(map_err)?;
            conn.exec(sql, params).await.map_err(map_err)
        }
    }

    async fn exec_drop(&self, sql: &str, values: &[Value]) -> Result<u64, DbError> {
        debug!(sql, "mysql exec");
        let params = MySqlParamStore::from_values(values).params();
        let mut guard = self.tx.lock().await;
        if let Some(conn) = guard.as_mut() {
            conn.exec_drop(sql, params).await.map_err(map_err)?;
            Ok(conn.affected_rows())
        } else {
            let mut conn = self.pool.get_conn().await.map_err(map_err)?;
            conn.exec_drop(sql, params).await.map_err(map_err)?;
            Ok(conn.affected_rows())
        }
    }
}

#[async_trait]
impl SqlAdapter for MySqlAdapter {
    async fn query(&self, sql: &str, params: &[NamedParam]) -> Result<Vec<RowData>, DbError> {
        let (sql, values) = self.dialect.bind_named(sql, params)?;
        let rows = self.exec_rows(&sql, &values).await?;
        Ok(rows.iter().map(|r| DbRow::MySql(r).to_row_data("")).collect())
    }

    async fn execute(&self, sql: &str, params: &[NamedParam]) -> Result<u64, DbError> {
        let (sql, values) = self.dialect.bind_named(sql, params)?;
        self.exec_drop(&sql, &values).await
    }

    async fn fetch_rows(&self, request: &FetchRowsRequest) -> Result<Vec<RowData>, DbError> {
        let (sql, values) = self.dialect.render_select(request);
        let rows = self.exec_rows(&sql, &values).await?;
        Ok(rows
            .iter()
            .map(|r| DbRow::MySql(r).to_row_data(&request.table))
            .collect())
    }

    async fn insert(&self, request: &InsertRequest) -> Result<(), DbError> {
        let (sql, values) = self.dialect.render_insert(request);
        self.exec_drop(&sql, &values).await?;
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
        self.exec_drop(&sql, &values).await
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        let rows = self
            .exec_rows(QUERY_TABLE_EXISTS_SQL, &[Value::String(table.to_string())])
            .await?;
        let exists = rows
            .first()
            .map(|r| DbRow::MySql(r).to_row_data(""))
            .and_then(|r| r.field_values.first().and_then(|f| f.value.clone()))
            .and_then(|v| v.as_bool())
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
            let data = DbRow::MySql(row).to_row_data(table);
            meta.add(column_from_information_schema(&data));
        }
        Ok(meta)
    }

    async fn clear_table(&self, table: &str) -> Result<(), DbError> {
        self.exec_drop(&format!("TRUNCATE TABLE {table}"), &[]).await?;
        Ok(())
    }

    async fn begin(&self) -> Result<(), DbError> {
        let mut guard = self.tx.lock().await;
        if guard.is_some() {
            return Err(DbError::Unsupported("transaction already open".into()));
        }
        let mut conn = self.pool.get_conn().await.map_err(map_err)?;
        conn.query_drop("START TRANSACTION").await.map_err(map_err)?;
        *guard = Some(conn);
        Ok(())
    }

    async fn commit(&self) -> Result<(), DbError> {
        let mut guard = self.tx.lock().await;
        match guard.take() {
            Some(mut conn) => conn.query_drop("COMMIT").await.map_err(map_err),
            None => Err(DbError::Unsupported("no open transaction".into())),
        }
    }

    async fn rollback(&self) -> Result<(), DbError> {
        let mut guard = self.tx.lock().await;
        match guard.take() {
            Some(mut conn) => conn.query_drop("ROLLBACK").await.map_err(map_err),
            None => Err(DbError::Unsupported("no open transaction".into())),
        }
    }

    async fn ping(&self) -> Result<(), DbError> {
        let mut conn = self.pool.get_conn().await.map_err(map_err)?;
        conn.query_drop("SELECT 1").await.map_err(map_err)
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::MySql
    }
}

/// Shared shape for MySQL/MSSQL information_schema column rows.
pub(crate) fn column_from_information_schema(row: &RowData) -> ColumnMetadata {
    let name = row.get_value("COLUMN_NAME").as_string().unwrap_or_default();
    let sql_type = row.get_value("DATA_TYPE").as_string().unwrap_or_default();
    let ordinal = row
        .get_value("ORDINAL_POSITION")
        .as_i64()
        .unwrap_or(0)
        .max(0) as usize;

    let mut column = ColumnMetadata::new(&name, &sql_type, ordinal);
    column.max_length = row
        .get_value("CHARACTER_MAXIMUM_LENGTH")
        .as_i64()
        .filter(|len| *len > 0)
        .map(|len| len as usize);
    column.nullable = row
        .get_value("IS_NULLABLE")
        .as_string()
        .map(|s| s.eq_ignore_ascii_case("YES"))
        .unwrap_or(true);
    column.primary_key = row
        .get_value("COLUMN_KEY")
        .as_string()
        .map(|s| s.eq_ignore_ascii_case("PRI"))
        .unwrap_or(false);
    column
}

fn map_err(err: mysql_async::Error) -> DbError {
    match &err {
        mysql_async::Error::Server(server) => {
            let message = server.message.clone();
            match server.code {
                1213 => DbError::Deadlock(message),
                1205 => DbError::Timeout(message),
                1062 => DbError::DuplicateKey(message),
                1044 | 1045 | 1142 => DbError::Permission(message),
                1064 => DbError::Syntax(message),
                1048 => DbError::NullValue(message),
                1146 => DbError::TableNotFound(message),
                1406 => DbError::Truncation(message),
                _ => DbError::Unknown(err.to_string()),
            }
        }
        mysql_async::Error::Io(_) => DbError::Connection(err.to_string()),
        _ => DbError::Unknown(err.to_string()),
    }
}
