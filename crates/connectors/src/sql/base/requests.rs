use model::core::value::Value;

/// A named parameter for stored SQL fragments (`@name` markers).
#[derive(Debug, Clone)]
pub struct NamedParam {
    pub name: String,
    pub value: Value,
}

impl NamedParam {
    pub fn new(name: &str, value: Value) -> Self {
        NamedParam {
            name: name.to_string(),
            value,
        }
    }
}

/// Structured source fetch: equality filters over one table, optionally
/// narrowed by a raw condition from the mapping.
#[derive(Debug, Clone, Default)]
pub struct FetchRowsRequest {
    pub table: String,
    /// `None` means `SELECT *`.
    pub columns: Option<Vec<String>>,
    pub filters: Vec<EqFilter>,
    /// Raw condition ANDed onto the WHERE clause (mapping-provided).
    pub extra_condition: Option<String>,
    pub order_by: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct EqFilter {
    pub column: String,
    pub value: Value,
}

impl FetchRowsRequest {
    pub fn by_key(table: &str, key_column: &str, key: Value) -> Self {
        FetchRowsRequest {
            table: table.to_string(),
            columns: None,
            filters: vec![EqFilter {
                column: key_column.to_string(),
                value: key,
            }],
            extra_condition: None,
            order_by: None,
            limit: None,
        }
    }
}

/// One VALUES expression of an INSERT: either a bound parameter or a raw
/// SQL fragment inlined verbatim (native function passthrough).
#[derive(Debug, Clone, PartialEq)]
pub enum SqlExpr {
    Bound(Value),
    Raw(String),
}

#[derive(Debug, Clone)]
pub struct InsertRequest {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<SqlExpr>,
}

/// Target-side existence probe on the document key.
#[derive(Debug, Clone)]
pub struct ExistsRequest {
    pub table: String,
    pub key_column: String,
    pub key: Value,
}

/// `UPDATE table SET set_column = set_value WHERE key_column IN (keys)`,
/// used by the mark-as-processed step.
#[derive(Debug, Clone)]
pub struct UpdateInRequest {
    pub table: String,
    pub set_column: String,
    pub set_value: Value,
    pub key_column: String,
    pub keys: Vec<Value>,
}
