use crate::utils::*;
use connectors::error::DbError;
use engine_config::store::mapping::MappingStore;
use model::{
    core::value::Value,
    execution::{errors::ErrorCode, record::ExecutionStatus},
};
use tokio_util::sync::CancellationToken;

async fn run(fx: &Fixture, ids: Vec<String>) -> model::execution::result::BatchResult {
    fx.engine
        .process_documents("orders-map", ids, CancellationToken::new())
        .await
        .expect("execution setup")
}

#[tokio::test]
async fn empty_batch_completes_with_zeroed_counters() {
    let fx = fixture(&header_only_mapping());
    create_order_tables(&fx);

    let result = run(&fx, vec![]).await;
    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(result.processed, 0);
    assert_eq!(result.failed, 0);
    assert_eq!(result.skipped, 0);
    assert!(result.details.is_empty());
    assert!(fx.target.rows("ORDERS").is_empty());
}

#[tokio::test]
async fn header_only_document_succeeds() {
    let fx = fixture(&header_only_mapping());
    create_order_tables(&fx);
    seed_order(&fx, "P1", "C1", &[]);

    let result = run(&fx, vec!["P1".into()]).await;
    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(result.processed, 1);
    assert_eq!(result.details[0].processed_tables, vec!["header".to_string()]);
    assert_eq!(fx.target.rows("ORDERS").len(), 1);
}

#[tokio::test]
async fn all_documents_failing_yields_failed_not_partial() {
    let fx = fixture(&header_only_mapping());
    create_order_tables(&fx);
    // Nothing seeded: every id misses its source row.

    let result = run(&fx, vec!["X1".into(), "X2".into(), "X3".into()]).await;
    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.failed, 3);
    assert_eq!(result.processed, 0);
}

#[tokio::test]
async fn custom_query_handles_numeric_and_string_ids_alike() {
    let mut mapping = header_only_mapping();
    mapping["tableConfigs"][0]["customQuery"] =
        serde_json::json!("SELECT * FROM PEDIDOS WHERE NUM_PED = @documentId");

    let fx = fixture(&mapping);
    create_order_tables(&fx);
    fx.source.stub_query(
        "num_ped = 42",
        vec![row(
            "PEDIDOS",
            vec![
                ("NUM_PED", Value::Int(42)),
                ("CLIENTE", Value::String("C1".into())),
            ],
        )],
    );
    fx.source.stub_query(
        "num_ped = 'p9'",
        vec![row(
            "PEDIDOS",
            vec![
                ("NUM_PED", Value::String("P9".into())),
                ("CLIENTE", Value::String("C2".into())),
            ],
        )],
    );

    let result = run(&fx, vec!["42".into(), "P9".into()]).await;
    assert_eq!(result.status, ExecutionStatus::Completed);
    assert_eq!(result.processed, 2);
    assert_eq!(fx.target.rows("ORDERS").len(), 2);
}

#[tokio::test]
async fn batch_marking_rolls_back_on_any_failure() {
    let mut mapping = header_only_mapping();
    mapping["markProcessedField"] = serde_json::json!("PROCESADO");
    mapping["markProcessedValue"] = serde_json::json!("S");
    mapping["markUnprocessedValue"] = serde_json::json!("N");
    mapping["markProcessedStrategy"] = serde_json::json!("batch");
    mapping["markProcessedConfig"] = serde_json::json!({ "allowRollback": true });

    let fx = fixture(&mapping);
    create_order_tables(&fx);
    seed_order(&fx, "P1", "C1", &[]);
    // P2 has no source row and will fail.

    let result = run(&fx, vec!["P1".into(), "P2".into()]).await;
    assert_eq!(result.status, ExecutionStatus::Partial);

    let marking = result.marking.expect("marking result");
    assert_eq!(marking.marked, 1);
    assert!(marking.rolled_back);

    let p1 = &fx.source.rows("PEDIDOS")[0];
    assert_eq!(
        p1.get_value("PROCESADO"),
        Value::String("N".into()),
        "successful rows flipped back by the scoped rollback"
    );
}

#[tokio::test]
async fn batch_marking_sticks_when_everything_succeeds() {
    let mut mapping = header_only_mapping();
    mapping["markProcessedField"] = serde_json::json!("PROCESADO");
    mapping["markProcessedValue"] = serde_json::json!("S");
    mapping["markUnprocessedValue"] = serde_json::json!("N");
    mapping["markProcessedStrategy"] = serde_json::json!("batch");
    mapping["markProcessedConfig"] = serde_json::json!({ "allowRollback": true });

    let fx = fixture(&mapping);
    create_order_tables(&fx);
    seed_order(&fx, "P1", "C1", &[]);
    seed_order(&fx, "P2", "C2", &[]);

    let result = run(&fx, vec!["P1".into(), "P2".into()]).await;
    assert_eq!(result.status, ExecutionStatus::Completed);
    let marking = result.marking.expect("marking result");
    assert_eq!(marking.marked, 2);
    assert!(!marking.rolled_back);
    for row in fx.source.rows("PEDIDOS") {
        assert_eq!(row.get_value("PROCESADO"), Value::String("S".into()));
    }
}

#[tokio::test]
async fn local_consecutives_keep_gaps_after_failed_documents() {
    let mut mapping = base_mapping();
    // Make the article mandatory so a line without one fails its document
    // after the consecutive was taken.
    mapping["tableConfigs"][1]["fieldMappings"][2]["isRequired"] = serde_json::json!(true);

    let fx = fixture(&mapping);
    create_order_tables(&fx);
    seed_order(&fx, "P1", "C1", &[(1, "A", "N")]);
    seed_order(&fx, "P3", "C3", &[(1, "C", "N")]);
    // P2: header exists, but its only line is missing the article.
    fx.source.seed_row(
        "PEDIDOS",
        row("PEDIDOS", vec![("NUM_PED", Value::String("P2".into()))]),
    );
    fx.source.seed_row(
        "PEDIDOS_DET",
        row(
            "PEDIDOS_DET",
            vec![
                ("NUM_PED", Value::String("P2".into())),
                ("NUM_LIN", Value::Int(1)),
            ],
        ),
    );

    let result = run(&fx, vec!["P1".into(), "P2".into(), "P3".into()]).await;
    assert_eq!(result.status, ExecutionStatus::Partial);
    assert_eq!(result.processed, 2);
    assert_eq!(result.failed, 1);
    assert_eq!(
        result.consecutives_used,
        vec!["ORD-000011".to_string(), "ORD-000013".to_string()],
        "the failed document leaves a gap"
    );

    let mapping = fx.mappings.find_mapping("orders-map").await.unwrap();
    assert_eq!(mapping.consecutive_config.unwrap().last_value, 13);
}

#[tokio::test]
async fn transient_connection_loss_fails_one_document_and_recovers() {
    let fx = fixture(&header_only_mapping());
    create_order_tables(&fx);
    seed_order(&fx, "P1", "C1", &[]);
    seed_order(&fx, "P2", "C2", &[]);

    // First source fetch dies; the engine reconnects and continues.
    fx.source
        .fail_next(DbError::Connection("connection reset".into()));

    let result = run(&fx, vec!["P1".into(), "P2".into()]).await;
    assert_eq!(result.status, ExecutionStatus::Partial);
    assert_eq!(result.failed, 1);
    assert_eq!(result.processed, 1);
    assert_eq!(result.details[0].error_code, Some(ErrorCode::Connection));
    assert_eq!(fx.target.rows("ORDERS").len(), 1);
}

#[tokio::test]
async fn duplicate_target_key_is_classified_not_fatal() {
    let fx = fixture(&header_only_mapping());
    create_order_tables(&fx);
    seed_order(&fx, "P1", "C1", &[]);
    // Pre-insert the target row without matching NUM_PED so the existence
    // check misses but the PK collides.
    fx.target.seed_row(
        "ORDERS",
        row("ORDERS", vec![("NUM_PED", Value::String("P1".into()))]),
    );

    let result = run(&fx, vec!["P1".into()]).await;
    // The existence check catches it first: this is a skip, not an error.
    assert_eq!(result.skipped, 1);
    assert_eq!(result.status, ExecutionStatus::Completed);
}
