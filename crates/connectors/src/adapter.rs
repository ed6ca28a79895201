use crate::{
    error::{ConnectorError, DbError},
    memory::adapter::MemoryAdapter,
    sql::{
        base::adapter::SqlAdapter, mssql::adapter::MssqlAdapter, mysql::adapter::MySqlAdapter,
        postgres::adapter::PgAdapter,
    },
};

/// Driver selected from the connection url scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDriver {
    MySql,
    Postgres,
    Mssql,
}

impl SqlDriver {
    pub fn from_url(url: &str) -> Result<Self, ConnectorError> {
        if url.starts_with("mysql://") || url.starts_with("mariadb://") {
            Ok(SqlDriver::MySql)
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(SqlDriver::Postgres)
        } else if url.starts_with("mssql://") || url.contains("Server=") || url.contains("Data Source=")
        {
            Ok(SqlDriver::Mssql)
        } else {
            Err(ConnectorError::UnsupportedDriver(url.to_string()))
        }
    }
}

#[derive(Clone)]
pub enum Adapter {
    MySql(MySqlAdapter),
    Postgres(PgAdapter),
    Mssql(MssqlAdapter),
    Memory(MemoryAdapter),
}

impl Adapter {
    pub async fn connect(url: &str) -> Result<Self, ConnectorError> {
        match SqlDriver::from_url(url)? {
            SqlDriver::MySql => Ok(Adapter::MySql(MySqlAdapter::connect(url).await?)),
            SqlDriver::Postgres => Ok(Adapter::Postgres(PgAdapter::connect(url).await?)),
            SqlDriver::Mssql => Ok(Adapter::Mssql(MssqlAdapter::connect(url).await?)),
        }
    }

    pub fn get(&self) -> &(dyn SqlAdapter + Send + Sync) {
        match self {
            Adapter::MySql(adapter) => adapter,
            Adapter::Postgres(adapter) => adapter,
            Adapter::Mssql(adapter) => adapter,
            Adapter::Memory(adapter) => adapter,
        }
    }

    /// Return pooled resources. Single-client adapters close on drop.
    pub async fn close(self) -> Result<(), DbError> {
        match self {
            Adapter::MySql(adapter) => adapter.close().await,
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_from_url_scheme() {
        assert_eq!(SqlDriver::from_url("mysql://u@h/db").unwrap(), SqlDriver::MySql);
        assert_eq!(SqlDriver::from_url("mariadb://u@h/db").unwrap(), SqlDriver::MySql);
        assert_eq!(
            SqlDriver::from_url("postgres://u@h/db").unwrap(),
            SqlDriver::Postgres
        );
        assert_eq!(
            SqlDriver::from_url("Server=tcp:h,1433;Database=x").unwrap(),
            SqlDriver::Mssql
        );
        assert!(SqlDriver::from_url("mongodb://h").is_err());
    }
}
