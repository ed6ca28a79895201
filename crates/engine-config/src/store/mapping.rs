use crate::error::StoreError;
use async_trait::async_trait;
use model::mapping::Mapping;
use std::path::Path;
use tracing::debug;

/// Read-only view over persisted mapping definitions, plus the one
/// conditional write local-mode counters need.
#[async_trait]
pub trait MappingStore: Send + Sync {
    async fn find_mapping(&self, id: &str) -> Result<Mapping, StoreError>;

    /// Advance the mapping's `lastValue` iff `new_value` is strictly
    /// greater than the stored one. Returns whether the update applied.
    async fn update_last_consecutive(&self, id: &str, new_value: i64)
    -> Result<bool, StoreError>;
}

/// Sled-backed mapping store; definitions are stored as the same
/// camelCase JSON they are authored in.
pub struct SledMappingStore {
    db: sled::Db,
}

impl SledMappingStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, sled::Error> {
        let db = sled::open(path)?;
        Ok(SledMappingStore { db })
    }

    pub fn from_db(db: sled::Db) -> Self {
        SledMappingStore { db }
    }

    #[inline]
    fn key(id: &str) -> String {
        format!("mapping:{id}")
    }

    pub fn save_mapping(&self, mapping: &Mapping) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(mapping)?;
        self.db.insert(Self::key(&mapping.id), bytes)?;
        Ok(())
    }

    pub fn load_from_json(&self, json: &str) -> Result<Mapping, StoreError> {
        let mapping: Mapping = serde_json::from_str(json)?;
        self.save_mapping(&mapping)?;
        Ok(mapping)
    }

    pub fn list_mappings(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        for item in self.db.scan_prefix("mapping:") {
            let (key, _) = item?;
            if let Ok(key) = std::str::from_utf8(&key) {
                ids.push(key.trim_start_matches("mapping:").to_string());
            }
        }
        Ok(ids)
    }
}

#[async_trait]
impl MappingStore for SledMappingStore {
    async fn find_mapping(&self, id: &str) -> Result<Mapping, StoreError> {
        match self.db.get(Self::key(id))? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Err(StoreError::MappingNotFound(id.to_string())),
        }
    }

    async fn update_last_consecutive(
        &self,
        id: &str,
        new_value: i64,
    ) -> Result<bool, StoreError> {
        let key = Self::key(id);
        loop {
            let current = self
                .db
                .get(&key)?
                .ok_or_else(|| StoreError::MappingNotFound(id.to_string()))?;
            let mut mapping: Mapping = serde_json::from_slice(&current)?;

            let Some(config) = mapping.consecutive_config.as_mut() else {
                return Ok(false);
            };
            if new_value <= config.last_value {
                debug!(
                    mapping = id,
                    new_value,
                    last_value = config.last_value,
                    "stale consecutive update ignored"
                );
                return Ok(false);
            }
            config.last_value = new_value;

            let updated = serde_json::to_vec(&mapping)?;
            let swap = self
                .db
                .compare_and_swap(&key, Some(current), Some(updated))?;
            if swap.is_ok() {
                return Ok(true);
            }
            // Someone else advanced the counter; re-read and re-check.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn mapping_json(last_value: i64) -> String {
        format!(
            r#"{{
                "id": "m1", "name": "orders",
                "sourceServer": "src", "targetServer": "dst",
                "tableConfigs": [],
                "consecutiveConfig": {{ "enabled": true, "lastValue": {last_value} }}
            }}"#
        )
    }

    #[tokio::test]
    async fn update_last_consecutive_only_moves_forward() {
        let dir = tempdir().unwrap();
        let store = SledMappingStore::open(dir.path()).unwrap();
        store.load_from_json(&mapping_json(10)).unwrap();

        assert!(store.update_last_consecutive("m1", 11).await.unwrap());
        assert!(!store.update_last_consecutive("m1", 11).await.unwrap());
        assert!(!store.update_last_consecutive("m1", 5).await.unwrap());

        let mapping = store.find_mapping("m1").await.unwrap();
        assert_eq!(mapping.consecutive_config.unwrap().last_value, 11);
    }

    #[tokio::test]
    async fn missing_mapping_is_an_error() {
        let dir = tempdir().unwrap();
        let store = SledMappingStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.find_mapping("nope").await,
            Err(StoreError::MappingNotFound(_))
        ));
    }
}
