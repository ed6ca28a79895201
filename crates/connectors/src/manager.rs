use crate::{
    adapter::Adapter,
    error::{ConnectorError, DbError},
    sql::base::{
        adapter::{DatabaseKind, SqlAdapter},
        metadata::{TableMetadata, TypeCache},
        requests::{ExistsRequest, FetchRowsRequest, InsertRequest, NamedParam, UpdateInRequest},
    },
    telemetry::Telemetry,
};
use model::records::row::RowData;
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Instant,
};
use tracing::info;

/// Hands out connections by server key and owns the process-wide
/// telemetry and column-type cache.
#[derive(Clone, Default)]
pub struct ConnectionManager {
    servers: Arc<RwLock<HashMap<String, String>>>,
    /// Pre-built adapters (test doubles) that bypass url connection.
    registered: Arc<RwLock<HashMap<String, Adapter>>>,
    telemetry: Telemetry,
    type_cache: TypeCache,
}

impl ConnectionManager {
    pub fn new() -> Self {
        ConnectionManager::default()
    }

    pub fn add_server(&self, key: &str, url: &str) {
        let mut servers = self.servers.write().expect("server registry poisoned");
        servers.insert(key.to_string(), url.to_string());
    }

    /// Register a ready adapter under a server key (used by tests and by
    /// embedded setups that manage their own connections).
    pub fn register_adapter(&self, key: &str, adapter: Adapter) {
        let mut registered = self.registered.write().expect("server registry poisoned");
        registered.insert(key.to_string(), adapter);
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn type_cache(&self) -> &TypeCache {
        &self.type_cache
    }

    /// Open and validate a connection for `key`.
    pub async fn acquire(&self, key: &str) -> Result<Connection, ConnectorError> {
        let adapter = {
            let registered = self.registered.read().expect("server registry poisoned");
            registered.get(key).cloned()
        };
        let adapter = match adapter {
            Some(adapter) => adapter,
            None => {
                let url = {
                    let servers = self.servers.read().expect("server registry poisoned");
                    servers
                        .get(key)
                        .cloned()
                        .ok_or_else(|| ConnectorError::UnknownServer(key.to_string()))?
                };
                Adapter::connect(&url).await?
            }
        };
        adapter.get().ping().await?;
        info!(server = key, "connection acquired");

        Ok(Connection {
            server_key: key.to_string(),
            adapter,
            telemetry: self.telemetry.clone(),
            type_cache: self.type_cache.clone(),
        })
    }

    /// Replace a connection in place after a transient failure.
    pub async fn reconnect(&self, conn: &mut Connection) -> Result<(), ConnectorError> {
        let fresh = self.acquire(&conn.server_key).await?;
        let old = std::mem::replace(conn, fresh);
        let _ = old.adapter.close().await;
        Ok(())
    }

    /// Return a connection's resources. Safe on every exit path.
    pub async fn release(&self, conn: Connection) {
        let server = conn.server_key.clone();
        if let Err(err) = conn.adapter.close().await {
            info!(server = %server, %err, "error while releasing connection");
        } else {
            info!(server = %server, "connection released");
        }
    }
}

/// A live connection owned by one execution. Every call records telemetry
/// for its server.
pub struct Connection {
    pub server_key: String,
    adapter: Adapter,
    telemetry: Telemetry,
    type_cache: TypeCache,
}

impl Connection {
    pub fn from_adapter(server_key: &str, adapter: Adapter) -> Self {
        Connection {
            server_key: server_key.to_string(),
            adapter,
            telemetry: Telemetry::new(),
            type_cache: TypeCache::new(),
        }
    }

    pub fn kind(&self) -> DatabaseKind {
        self.adapter.get().kind()
    }

    pub async fn query(
        &self,
        sql: &str,
        params: &[NamedParam],
    ) -> Result<Vec<RowData>, DbError> {
        let started = Instant::now();
        let result = self.adapter.get().query(sql, params).await;
        self.telemetry.record(&self.server_key, started.elapsed());
        result
    }

    pub async fn execute(&self, sql: &str, params: &[NamedParam]) -> Result<u64, DbError> {
        let started = Instant::now();
        let result = self.adapter.get().execute(sql, params).await;
        self.telemetry.record(&self.server_key, started.elapsed());
        result
    }

    pub async fn fetch_rows(&self, request: &FetchRowsRequest) -> Result<Vec<RowData>, DbError> {
        let started = Instant::now();
        let result = self.adapter.get().fetch_rows(request).await;
        self.telemetry.record(&self.server_key, started.elapsed());
        result
    }

    pub async fn insert(&self, request: &InsertRequest) -> Result<(), DbError> {
        let started = Instant::now();
        let result = self.adapter.get().insert(request).await;
        self.telemetry.record(&self.server_key, started.elapsed());
        result
    }

    pub async fn exists(&self, request: &ExistsRequest) -> Result<bool, DbError> {
        let started = Instant::now();
        let result = self.adapter.get().exists(request).await;
        self.telemetry.record(&self.server_key, started.elapsed());
        result
    }

    pub async fn update_where_in(&self, request: &UpdateInRequest) -> Result<u64, DbError> {
        let started = Instant::now();
        let result = self.adapter.get().update_where_in(request).await;
        self.telemetry.record(&self.server_key, started.elapsed());
        result
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        self.adapter.get().table_exists(table).await
    }

    /// Column metadata for `table`, served from the process-local cache.
    pub async fn column_types(&self, table: &str) -> Result<Arc<TableMetadata>, DbError> {
        if let Some(meta) = self.type_cache.get(&self.server_key, table) {
            return Ok(meta);
        }
        let meta = self.adapter.get().table_metadata(table).await?;
        Ok(self.type_cache.put(&self.server_key, table, meta))
    }

    pub async fn clear_table(&self, table: &str) -> Result<(), DbError> {
        self.adapter.get().clear_table(table).await
    }

    pub async fn begin(&self) -> Result<(), DbError> {
        self.adapter.get().begin().await
    }

    pub async fn commit(&self) -> Result<(), DbError> {
        self.adapter.get().commit().await
    }

    pub async fn rollback(&self) -> Result<(), DbError> {
        self.adapter.get().rollback().await
    }

    pub async fn ping(&self) -> Result<(), DbError> {
        self.adapter.get().ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::adapter::MemoryAdapter;

    #[tokio::test]
    async fn acquire_prefers_registered_adapters() {
        let manager = ConnectionManager::new();
        let memory = MemoryAdapter::new();
        manager.register_adapter("src", Adapter::Memory(memory.clone()));

        let conn = manager.acquire("src").await.expect("acquire");
        assert_eq!(conn.kind(), DatabaseKind::Memory);
        assert!(manager.acquire("missing").await.is_err());
        manager.release(conn).await;
    }

    #[tokio::test]
    async fn telemetry_counts_queries_per_server() {
        let manager = ConnectionManager::new();
        let memory = MemoryAdapter::new();
        memory.create_table("t", vec![]);
        manager.register_adapter("src", Adapter::Memory(memory));

        let conn = manager.acquire("src").await.unwrap();
        let request = FetchRowsRequest {
            table: "t".into(),
            ..Default::default()
        };
        conn.fetch_rows(&request).await.unwrap();
        conn.fetch_rows(&request).await.unwrap();

        let stats = manager.telemetry().snapshot();
        assert_eq!(stats["src"].queries, 2);
    }
}
