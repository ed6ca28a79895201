use model::core::data_type::DataType;
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

/// Normalised column description used for bind typing and truncation.
#[derive(Debug, Clone)]
pub struct ColumnMetadata {
    pub name: String,
    pub data_type: DataType,
    /// Native type name as reported by the engine.
    pub sql_type: String,
    pub max_length: Option<usize>,
    pub nullable: bool,
    pub ordinal: usize,
    pub primary_key: bool,
}

impl ColumnMetadata {
    pub fn new(name: &str, sql_type: &str, ordinal: usize) -> Self {
        ColumnMetadata {
            name: name.to_string(),
            data_type: DataType::from_sql_type(sql_type),
            sql_type: sql_type.to_string(),
            max_length: None,
            nullable: true,
            ordinal,
            primary_key: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableMetadata {
    pub name: String,
    pub columns: HashMap<String, ColumnMetadata>,
}

impl TableMetadata {
    pub fn new(name: &str) -> Self {
        TableMetadata {
            name: name.to_string(),
            columns: HashMap::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns.get(&name.to_ascii_lowercase())
    }

    pub fn add(&mut self, column: ColumnMetadata) {
        self.columns.insert(column.name.to_ascii_lowercase(), column);
    }

    pub fn primary_keys(&self) -> Vec<&ColumnMetadata> {
        let mut keys: Vec<&ColumnMetadata> =
            self.columns.values().filter(|c| c.primary_key).collect();
        keys.sort_by_key(|c| c.ordinal);
        keys
    }
}

/// Process-local, read-mostly cache of target column types, keyed by
/// `(server key, table)`.
#[derive(Clone, Default)]
pub struct TypeCache {
    inner: Arc<RwLock<HashMap<(String, String), Arc<TableMetadata>>>>,
}

impl TypeCache {
    pub fn new() -> Self {
        TypeCache::default()
    }

    pub fn get(&self, server: &str, table: &str) -> Option<Arc<TableMetadata>> {
        let guard = self.inner.read().expect("type cache poisoned");
        guard
            .get(&(server.to_string(), table.to_ascii_lowercase()))
            .cloned()
    }

    pub fn put(&self, server: &str, table: &str, meta: TableMetadata) -> Arc<TableMetadata> {
        let meta = Arc::new(meta);
        let mut guard = self.inner.write().expect("type cache poisoned");
        guard.insert(
            (server.to_string(), table.to_ascii_lowercase()),
            meta.clone(),
        );
        meta
    }

    pub fn invalidate(&self, server: &str, table: &str) {
        let mut guard = self.inner.write().expect("type cache poisoned");
        guard.remove(&(server.to_string(), table.to_ascii_lowercase()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_roundtrip_is_case_insensitive_on_table() {
        let cache = TypeCache::new();
        assert!(cache.get("srv", "Orders").is_none());

        let mut meta = TableMetadata::new("Orders");
        meta.add(ColumnMetadata::new("id", "int", 1));
        cache.put("srv", "Orders", meta);

        let hit = cache.get("srv", "ORDERS").expect("cache hit");
        assert!(hit.column("ID").is_some());
        assert!(cache.get("other", "orders").is_none());
    }
}
