use crate::error::CounterError;
use async_trait::async_trait;
use model::counter::Consecutive;
use std::path::Path;

/// Raw document access for the consecutive service. The service's
/// compare-and-swap loop needs the exact stored bytes back, so reads
/// return them alongside the parsed document.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn load_raw(&self, name: &str)
    -> Result<Option<(Vec<u8>, Consecutive)>, CounterError>;

    /// Atomically replace the document iff the stored bytes still equal
    /// `expected` (`None` = must not exist). Returns `false` on conflict.
    async fn cas_raw(
        &self,
        name: &str,
        expected: Option<&[u8]>,
        updated: &Consecutive,
    ) -> Result<bool, CounterError>;

    async fn list(&self) -> Result<Vec<String>, CounterError>;
}

/// Sled-backed store; documents are canonical JSON under `counter:{name}`.
pub struct SledCounterStore {
    db: sled::Db,
}

impl SledCounterStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, sled::Error> {
        let db = sled::open(path)?;
        Ok(SledCounterStore { db })
    }

    pub fn from_db(db: sled::Db) -> Self {
        SledCounterStore { db }
    }

    #[inline]
    fn key(name: &str) -> String {
        format!("counter:{name}")
    }
}

#[async_trait]
impl CounterStore for SledCounterStore {
    async fn load_raw(
        &self,
        name: &str,
    ) -> Result<Option<(Vec<u8>, Consecutive)>, CounterError> {
        match self.db.get(Self::key(name))? {
            Some(bytes) => {
                let doc: Consecutive = serde_json::from_slice(&bytes)?;
                Ok(Some((bytes.to_vec(), doc)))
            }
            None => Ok(None),
        }
    }

    async fn cas_raw(
        &self,
        name: &str,
        expected: Option<&[u8]>,
        updated: &Consecutive,
    ) -> Result<bool, CounterError> {
        let new_bytes = serde_json::to_vec(updated)?;
        let result = self
            .db
            .compare_and_swap(Self::key(name), expected, Some(new_bytes))?;
        Ok(result.is_ok())
    }

    async fn list(&self) -> Result<Vec<String>, CounterError> {
        let mut names = Vec::new();
        for item in self.db.scan_prefix("counter:") {
            let (key, _) = item?;
            if let Ok(key) = std::str::from_utf8(&key) {
                names.push(key.trim_start_matches("counter:").to_string());
            }
        }
        Ok(names)
    }
}
