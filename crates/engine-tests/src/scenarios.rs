use crate::utils::*;
use engine_config::store::mapping::MappingStore;
use model::{
    core::value::Value,
    execution::record::{DocumentStatus, ExecutionStatus},
};
use tokio_util::sync::CancellationToken;

async fn run(fx: &Fixture, ids: Vec<String>) -> model::execution::result::BatchResult {
    fx.engine
        .process_documents("orders-map", ids, CancellationToken::new())
        .await
        .expect("execution setup")
}

/// Happy path: one header plus three details, local counter.
#[tokio::test]
async fn transfers_header_and_details_with_local_consecutive() {
    let fx = fixture(&base_mapping());
    create_order_tables(&fx);
    seed_order(&fx, "P1", "C1", &[(1, "A", "N"), (2, "B", "N"), (3, "C", "N")]);

    let result = run(&fx, vec!["P1".into()]).await;

    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(result.processed, 1);
    assert_eq!(result.consecutives_used, vec!["ORD-000011".to_string()]);

    let headers = fx.target.rows("ORDERS");
    assert_eq!(headers.len(), 1);
    assert_eq!(
        headers[0].get_value("NUM_DOC"),
        Value::String("ORD-000011".into())
    );

    let lines = fx.target.rows("ORDER_LINES");
    assert_eq!(lines.len(), 3);
    for line in &lines {
        assert_eq!(line.get_value("NUM_DOC"), Value::String("ORD-000011".into()));
    }

    let mapping = fx.mappings.find_mapping("orders-map").await.unwrap();
    assert_eq!(mapping.consecutive_config.unwrap().last_value, 11);
}

/// Re-running the same document skips it and the counter stands still.
#[tokio::test]
async fn rerun_skips_existing_document() {
    let fx = fixture(&base_mapping());
    create_order_tables(&fx);
    seed_order(&fx, "P1", "C1", &[(1, "A", "N"), (2, "B", "N"), (3, "C", "N")]);

    let first = run(&fx, vec!["P1".into()]).await;
    assert_eq!(first.processed, 1);

    let second = run(&fx, vec!["P1".into()]).await;
    assert_eq!(second.status, ExecutionStatus::Completed);
    assert_eq!(second.processed, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(second.details[0].status, DocumentStatus::Skipped);

    assert_eq!(fx.target.rows("ORDERS").len(), 1, "no double insert");
    let mapping = fx.mappings.find_mapping("orders-map").await.unwrap();
    assert_eq!(
        mapping.consecutive_config.unwrap().last_value,
        11,
        "skip does not advance the counter"
    );
}

/// A required lookup that resolves nothing fails the document before
/// any target row is written.
#[tokio::test]
async fn required_lookup_failure_inserts_nothing() {
    let mut mapping = base_mapping();
    mapping["tableConfigs"][1]["fieldMappings"]
        .as_array_mut()
        .unwrap()
        .push(serde_json::json!({
            "targetField": "DIM_ID",
            "lookupFromTarget": true,
            "failIfNotFound": true,
            "lookupQuery": "SELECT id FROM DIM WHERE code=@c",
            "lookupParams": [ { "sourceField": "MISSING_COL", "paramName": "c" } ]
        }));

    let fx = fixture(&mapping);
    create_order_tables(&fx);
    seed_order(&fx, "P1", "C1", &[(1, "A", "N")]);

    let result = run(&fx, vec!["P1".into()]).await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.failed, 1);
    assert_eq!(
        result.details[0].error_code,
        Some(model::execution::errors::ErrorCode::General)
    );
    assert!(fx.target.rows("ORDERS").is_empty(), "no header row");
    assert!(fx.target.rows("ORDER_LINES").is_empty(), "no detail rows");
}

/// Bonification lines are renumbered and wired to their parents.
#[tokio::test]
async fn bonification_line_mapping() {
    let mut mapping = base_mapping();
    mapping["hasBonificationProcessing"] = serde_json::json!(true);
    mapping["bonificationConfig"] = serde_json::json!({
        "sourceTable": "PEDIDOS_DET",
        "orderField": "NUM_PED",
        "lineOrderField": "NUM_LIN",
        "bonificationIndicatorField": "TIPO_LIN",
        "bonificationIndicatorValue": "B",
        "lineNumberField": "LINEA",
        "bonificationLineReferenceField": "LINEA_PADRE",
        "orphanPolicy": "passThrough"
    });
    mapping["tableConfigs"][1]["fieldMappings"]
        .as_array_mut()
        .unwrap()
        .extend([
            serde_json::json!({ "targetField": "LINEA" }),
            serde_json::json!({ "targetField": "LINEA_PADRE" }),
        ]);

    let fx = fixture(&mapping);
    create_order_tables(&fx);
    seed_order(
        &fx,
        "P1",
        "C1",
        &[(1, "A", "N"), (2, "A2", "B"), (3, "B", "N"), (4, "B2", "B")],
    );

    let result = run(&fx, vec!["P1".into()]).await;
    assert_eq!(result.status, ExecutionStatus::Completed);

    let lines = fx.target.rows("ORDER_LINES");
    let numbers: Vec<i64> = lines
        .iter()
        .map(|l| l.get_value("LINEA").as_i64().unwrap())
        .collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
    assert_eq!(lines[1].get_value("LINEA_PADRE"), Value::Int(1));
    assert_eq!(lines[3].get_value("LINEA_PADRE"), Value::Int(3));
    assert_eq!(lines[0].get_value("LINEA_PADRE"), Value::Null);

    let stats = result.bonification_stats.expect("stats");
    assert_eq!(stats.total_bonifications, 2);
    assert_eq!(stats.processed_details, 4);
}

/// Two concurrent executions on one centralized counter receive
/// disjoint, strictly increasing values covering 1..=10.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_executions_share_a_centralized_counter() {
    let mut mapping = header_only_mapping();
    mapping["tableConfigs"][0]["fieldMappings"]
        .as_array_mut()
        .unwrap()
        .push(serde_json::json!({ "targetField": "NUM_DOC", "defaultValue": "0" }));
    mapping["consecutiveConfig"] = serde_json::json!({
        "enabled": true,
        "useCentralizedService": true,
        "consecutiveName": "shared",
        "fieldName": "NUM_DOC",
        "pattern": "{VALUE}",
        "startValue": 0,
        "increment": 1
    });

    let fx = fixture(&mapping);
    create_order_tables(&fx);
    for id in doc_ids("A", 5).iter().chain(doc_ids("B", 5).iter()) {
        seed_order(&fx, id, "C1", &[]);
    }

    let (left, right) = tokio::join!(
        run(&fx, doc_ids("A", 5)),
        run(&fx, doc_ids("B", 5))
    );
    assert_eq!(left.processed, 5);
    assert_eq!(right.processed, 5);

    let parse = |values: &[String]| -> Vec<i64> {
        values.iter().map(|v| v.parse().unwrap()).collect()
    };
    let left_values = parse(&left.consecutives_used);
    let right_values = parse(&right.consecutives_used);
    assert!(left_values.windows(2).all(|w| w[0] < w[1]));
    assert!(right_values.windows(2).all(|w| w[0] < w[1]));

    let mut all = [left_values, right_values].concat();
    all.sort_unstable();
    assert_eq!(all, (1..=10).collect::<Vec<i64>>());

    let counter = fx.counters.get("shared").await.unwrap();
    assert_eq!(counter.current_value, 10);
}

/// Cancellation mid-batch: 37 documents processed and marked, the rest
/// never attempted, 37 commits on the centralized counter.
#[tokio::test]
async fn cancellation_mid_batch_stops_cleanly() {
    let mut mapping = header_only_mapping();
    mapping["markProcessedField"] = serde_json::json!("PROCESADO");
    mapping["markProcessedValue"] = serde_json::json!("S");
    mapping["markUnprocessedValue"] = serde_json::json!("N");
    mapping["markProcessedStrategy"] = serde_json::json!("individual");
    mapping["tableConfigs"][0]["fieldMappings"]
        .as_array_mut()
        .unwrap()
        .push(serde_json::json!({ "targetField": "NUM_DOC", "defaultValue": "0" }));
    mapping["consecutiveConfig"] = serde_json::json!({
        "enabled": true,
        "useCentralizedService": true,
        "consecutiveName": "orders-doc",
        "fieldName": "NUM_DOC",
        "pattern": "{VALUE}",
        "startValue": 0,
        "increment": 1
    });

    let fx = fixture(&mapping);
    create_order_tables(&fx);
    let ids = doc_ids("D", 100);
    for id in &ids {
        seed_order(&fx, id, "C1", &[]);
    }

    // Each document performs exactly one source fetch; cancelling during
    // the 37th lets that document finish and stops before the 38th.
    let cancel = CancellationToken::new();
    fx.source.cancel_token_after(37, cancel.clone());

    let result = fx
        .engine
        .process_documents("orders-map", ids, cancel)
        .await
        .expect("execution setup");

    assert_eq!(result.status, ExecutionStatus::Cancelled);
    assert_eq!(result.processed, 37);
    assert_eq!(result.failed, 0);
    assert_eq!(result.details.len(), 37, "remaining documents not attempted");

    let marked = fx
        .source
        .rows("PEDIDOS")
        .iter()
        .filter(|r| r.get_value("PROCESADO") == Value::String("S".into()))
        .count();
    assert_eq!(marked, 37, "individual markers all set, no rollback");

    let counter = fx.counters.get("orders-doc").await.unwrap();
    let committed = counter
        .reservations
        .iter()
        .filter(|r| r.status == model::counter::ReservationStatus::Committed)
        .count();
    assert_eq!(committed, 37);
    let reserved = counter
        .reservations
        .iter()
        .filter(|r| r.status == model::counter::ReservationStatus::Reserved)
        .count();
    assert_eq!(reserved, 0, "no reservation left in flight");
}
