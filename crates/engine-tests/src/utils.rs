#![allow(dead_code)]

use connectors::{
    adapter::Adapter,
    manager::ConnectionManager,
    memory::adapter::MemoryAdapter,
    sql::base::metadata::ColumnMetadata,
};
use consecutive::{service::ConsecutiveService, store::SledCounterStore};
use engine_config::store::{execution::SledExecutionStore, mapping::SledMappingStore};
use engine_core::execution::engine::{DocumentEngine, EngineParams};
use model::{
    core::value::{FieldValue, Value},
    records::row::RowData,
};
use std::sync::Arc;
use tempfile::TempDir;

pub const SOURCE_SERVER: &str = "src";
pub const TARGET_SERVER: &str = "dst";

/// One hermetic engine setup: in-memory source/target and tempdir-backed
/// sled stores.
pub struct Fixture {
    pub source: MemoryAdapter,
    pub target: MemoryAdapter,
    pub mappings: Arc<SledMappingStore>,
    pub executions: Arc<SledExecutionStore>,
    pub counters: Arc<ConsecutiveService>,
    pub engine: Arc<DocumentEngine>,
    _state: TempDir,
}

pub fn fixture(mapping: &serde_json::Value) -> Fixture {
    let state = tempfile::tempdir().expect("tempdir");
    let mappings =
        Arc::new(SledMappingStore::open(state.path().join("mappings")).expect("mapping store"));
    mappings
        .load_from_json(&mapping.to_string())
        .expect("load mapping");
    let executions = Arc::new(
        SledExecutionStore::open(state.path().join("executions")).expect("execution store"),
    );
    let counters = Arc::new(ConsecutiveService::new(Arc::new(
        SledCounterStore::open(state.path().join("counters")).expect("counter store"),
    )));

    let source = MemoryAdapter::new();
    let target = MemoryAdapter::new();
    let connections = ConnectionManager::new();
    connections.register_adapter(SOURCE_SERVER, Adapter::Memory(source.clone()));
    connections.register_adapter(TARGET_SERVER, Adapter::Memory(target.clone()));

    let engine = Arc::new(DocumentEngine::new(EngineParams {
        mappings: mappings.clone(),
        executions: executions.clone(),
        connections,
        counters: Some(counters.clone()),
    }));

    Fixture {
        source,
        target,
        mappings,
        executions,
        counters,
        engine,
        _state: state,
    }
}

pub fn column(name: &str, sql_type: &str, ordinal: usize) -> ColumnMetadata {
    ColumnMetadata::new(name, sql_type, ordinal)
}

pub fn pk(name: &str, sql_type: &str, ordinal: usize) -> ColumnMetadata {
    let mut col = ColumnMetadata::new(name, sql_type, ordinal);
    col.primary_key = true;
    col
}

pub fn row(entity: &str, fields: Vec<(&str, Value)>) -> RowData {
    RowData::new(
        entity,
        fields
            .into_iter()
            .map(|(name, value)| FieldValue::new(name, value))
            .collect(),
    )
}

/// The standard order tables used across scenarios.
pub fn create_order_tables(fx: &Fixture) {
    fx.source.create_table(
        "PEDIDOS",
        vec![
            pk("NUM_PED", "varchar", 1),
            column("CLIENTE", "varchar", 2),
            column("TIPO", "varchar", 3),
            column("PROCESADO", "varchar", 4),
        ],
    );
    fx.source.create_table(
        "PEDIDOS_DET",
        vec![
            column("NUM_PED", "varchar", 1),
            column("NUM_LIN", "int", 2),
            column("ART", "varchar", 3),
            column("TIPO_LIN", "varchar", 4),
            column("QTY", "float", 5),
        ],
    );
    fx.target.create_table(
        "ORDERS",
        vec![
            pk("NUM_PED", "varchar", 1),
            column("CLIENTE", "varchar", 2),
            column("NUM_DOC", "varchar", 3),
        ],
    );
    fx.target.create_table(
        "ORDER_LINES",
        vec![
            column("NUM_PED", "varchar", 1),
            column("NUM_LIN", "int", 2),
            column("ART", "varchar", 3),
            column("NUM_DOC", "varchar", 4),
            column("LINEA", "int", 5),
            column("LINEA_PADRE", "int", 6),
            column("DIM_ID", "int", 7),
        ],
    );
}

/// Seed one order: header plus `(line number, article, line type)` rows.
pub fn seed_order(fx: &Fixture, id: &str, customer: &str, lines: &[(i64, &str, &str)]) {
    fx.source.seed_row(
        "PEDIDOS",
        row(
            "PEDIDOS",
            vec![
                ("NUM_PED", Value::String(id.into())),
                ("CLIENTE", Value::String(customer.into())),
                ("PROCESADO", Value::String("N".into())),
            ],
        ),
    );
    for (num_lin, article, line_type) in lines {
        fx.source.seed_row(
            "PEDIDOS_DET",
            row(
                "PEDIDOS_DET",
                vec![
                    ("NUM_PED", Value::String(id.into())),
                    ("NUM_LIN", Value::Int(*num_lin)),
                    ("ART", Value::String((*article).into())),
                    ("TIPO_LIN", Value::String((*line_type).into())),
                ],
            ),
        );
    }
}

/// Header+detail mapping with a local consecutive, as most scenarios use.
pub fn base_mapping() -> serde_json::Value {
    serde_json::json!({
        "id": "orders-map",
        "name": "orders",
        "sourceServer": SOURCE_SERVER,
        "targetServer": TARGET_SERVER,
        "tableConfigs": [
            {
                "name": "header",
                "sourceTable": "PEDIDOS",
                "targetTable": "ORDERS",
                "primaryKey": "NUM_PED",
                "targetPrimaryKey": "NUM_PED",
                "executionOrder": 1,
                "isDetailTable": false,
                "fieldMappings": [
                    { "sourceField": "NUM_PED", "targetField": "NUM_PED", "isRequired": true },
                    { "sourceField": "CLIENTE", "targetField": "CLIENTE" },
                    { "targetField": "NUM_DOC", "defaultValue": "0" }
                ]
            },
            {
                "name": "lines",
                "sourceTable": "PEDIDOS_DET",
                "targetTable": "ORDER_LINES",
                "primaryKey": "NUM_PED",
                "executionOrder": 2,
                "isDetailTable": true,
                "parentTableRef": "header",
                "orderByColumn": "NUM_LIN",
                "fieldMappings": [
                    { "sourceField": "NUM_PED", "targetField": "NUM_PED", "isRequired": true },
                    { "sourceField": "NUM_LIN", "targetField": "NUM_LIN" },
                    { "sourceField": "ART", "targetField": "ART" },
                    { "targetField": "NUM_DOC", "defaultValue": "0" }
                ]
            }
        ],
        "consecutiveConfig": {
            "enabled": true,
            "useCentralizedService": false,
            "fieldName": "NUM_DOC",
            "detailFieldName": "NUM_DOC",
            "pattern": "ORD-{VALUE:6}",
            "startValue": 0,
            "increment": 1,
            "lastValue": 10
        }
    })
}

/// Header-only mapping (no details, no consecutive) for batch-shaped
/// scenarios.
pub fn header_only_mapping() -> serde_json::Value {
    serde_json::json!({
        "id": "orders-map",
        "name": "orders",
        "sourceServer": SOURCE_SERVER,
        "targetServer": TARGET_SERVER,
        "tableConfigs": [
            {
                "name": "header",
                "sourceTable": "PEDIDOS",
                "targetTable": "ORDERS",
                "primaryKey": "NUM_PED",
                "targetPrimaryKey": "NUM_PED",
                "executionOrder": 1,
                "isDetailTable": false,
                "fieldMappings": [
                    { "sourceField": "NUM_PED", "targetField": "NUM_PED", "isRequired": true },
                    { "sourceField": "CLIENTE", "targetField": "CLIENTE" }
                ]
            }
        ]
    })
}

pub fn doc_ids(prefix: &str, count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("{prefix}{i}")).collect()
}
