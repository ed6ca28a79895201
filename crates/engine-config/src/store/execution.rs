use crate::error::StoreError;
use async_trait::async_trait;
use model::execution::record::ExecutionRecord;
use std::path::Path;

/// Audit store for execution records.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Persist a freshly started record; returns its id.
    async fn create_execution(&self, record: &ExecutionRecord) -> Result<String, StoreError>;

    /// Overwrite the record with its finalised state.
    async fn update_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError>;

    async fn get_execution(&self, id: &str) -> Result<ExecutionRecord, StoreError>;
}

pub struct SledExecutionStore {
    db: sled::Db,
}

impl SledExecutionStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, sled::Error> {
        let db = sled::open(path)?;
        Ok(SledExecutionStore { db })
    }

    pub fn from_db(db: sled::Db) -> Self {
        SledExecutionStore { db }
    }

    #[inline]
    fn key(id: &str) -> String {
        format!("execution:{id}")
    }

    pub fn list_for_mapping(&self, mapping_id: &str) -> Result<Vec<ExecutionRecord>, StoreError> {
        let mut records = Vec::new();
        for item in self.db.scan_prefix("execution:") {
            let (_, bytes) = item?;
            let record: ExecutionRecord = serde_json::from_slice(&bytes)?;
            if record.mapping_id == mapping_id {
                records.push(record);
            }
        }
        records.sort_by_key(|r| r.start_time);
        Ok(records)
    }
}

#[async_trait]
impl ExecutionStore for SledExecutionStore {
    async fn create_execution(&self, record: &ExecutionRecord) -> Result<String, StoreError> {
        let bytes = serde_json::to_vec(record)?;
        self.db.insert(Self::key(&record.id), bytes)?;
        Ok(record.id.clone())
    }

    async fn update_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(record)?;
        self.db.insert(Self::key(&record.id), bytes)?;
        Ok(())
    }

    async fn get_execution(&self, id: &str) -> Result<ExecutionRecord, StoreError> {
        match self.db.get(Self::key(id))? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Err(StoreError::ExecutionNotFound(id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::execution::record::ExecutionStatus;
    use tempfile::tempdir;

    #[tokio::test]
    async fn records_roundtrip_through_finalisation() {
        let dir = tempdir().unwrap();
        let store = SledExecutionStore::open(dir.path()).unwrap();

        let mut record = ExecutionRecord::started("e1", "m1", 3);
        store.create_execution(&record).await.unwrap();

        record.status = ExecutionStatus::Partial;
        record.successful_records = 2;
        record.failed_records = 1;
        record.end_time = Some(chrono::Utc::now());
        store.update_execution(&record).await.unwrap();

        let loaded = store.get_execution("e1").await.unwrap();
        assert_eq!(loaded.status, ExecutionStatus::Partial);
        assert_eq!(loaded.successful_records, 2);

        let for_mapping = store.list_for_mapping("m1").unwrap();
        assert_eq!(for_mapping.len(), 1);
    }
}
