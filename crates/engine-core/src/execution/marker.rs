use connectors::{
    error::DbError,
    manager::Connection,
    sql::base::requests::UpdateInRequest,
};
use model::{core::value::Value, mapping::Mapping};
use tracing::warn;

/// Convert a document id into the typed key value used in source updates.
pub fn document_key(id: &str) -> Value {
    match id.parse::<i64>() {
        Ok(numeric) => Value::Int(numeric),
        Err(_) => Value::String(id.to_string()),
    }
}

fn request(mapping: &Mapping, ids: &[String], value: &str) -> Option<UpdateInRequest> {
    let field = mapping.mark_processed_field.as_deref()?;
    let table = mapping.table_configs.iter().find(|t| !t.is_detail_table)?;
    Some(UpdateInRequest {
        table: table.source_table.clone(),
        set_column: field.to_string(),
        set_value: Value::String(value.to_string()),
        key_column: table.primary_key.clone(),
        keys: ids.iter().map(|id| document_key(id)).collect(),
    })
}

/// Flag one document as transferred on the source (individual strategy).
pub async fn mark_one(source: &Connection, mapping: &Mapping, id: &str) -> Result<u64, DbError> {
    let ids = [id.to_string()];
    mark_batch(source, mapping, &ids).await
}

/// Flag a set of documents as transferred (batch strategy).
pub async fn mark_batch(
    source: &Connection,
    mapping: &Mapping,
    ids: &[String],
) -> Result<u64, DbError> {
    let Some(value) = mapping.mark_processed_value.as_deref() else {
        return Ok(0);
    };
    let Some(req) = request(mapping, ids, value) else {
        return Ok(0);
    };
    if req.keys.is_empty() {
        return Ok(0);
    }
    source.update_where_in(&req).await
}

/// Best-effort rollback of the batch marker, scoped to exactly the ids
/// this execution marked (never the raw input list).
pub async fn rollback_batch(source: &Connection, mapping: &Mapping, ids: &[String]) -> bool {
    let Some(value) = mapping.mark_unprocessed_value.as_deref() else {
        return false;
    };
    let Some(req) = request(mapping, ids, value) else {
        return false;
    };
    if req.keys.is_empty() {
        return false;
    }
    match source.update_where_in(&req).await {
        Ok(_) => true,
        Err(err) => {
            warn!(%err, "marker rollback failed");
            false
        }
    }
}
