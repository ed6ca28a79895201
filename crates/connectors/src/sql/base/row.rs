use crate::sql::{mssql, mysql};
use bigdecimal::{BigDecimal, FromPrimitive};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use model::{
    core::{
        data_type::DataType,
        value::{FieldValue, Value},
    },
    records::row::RowData,
};
use mysql_async::Row as MySqlRow;
use tiberius::Row as MssqlRow;
use tokio_postgres::{Row as PgRow, types::Json as PgJson};
use uuid::Uuid;

/// A row as returned by one of the native drivers, convertible into the
/// engine's [`RowData`].
pub enum DbRow<'a> {
    MySql(&'a MySqlRow),
    Postgres(&'a PgRow),
    Mssql(&'a MssqlRow),
}

impl DbRow<'_> {
    pub fn to_row_data(&self, table: &str) -> RowData {
        match self {
            DbRow::MySql(row) => mysql_row_data(row, table),
            DbRow::Postgres(row) => pg_row_data(row, table),
            DbRow::Mssql(row) => mssql_row_data(row, table),
        }
    }
}

fn mysql_row_data(row: &MySqlRow, table: &str) -> RowData {
    let mut fields = Vec::with_capacity(row.columns_ref().len());
    for (idx, column) in row.columns_ref().iter().enumerate() {
        let name = column.name_str().into_owned();
        let data_type = mysql::data_type::from_column_type(column.column_type());
        let value = mysql_value(row, idx, &data_type);
        fields.push(FieldValue {
            name,
            value,
            data_type,
        });
    }
    RowData::new(table, fields)
}

fn mysql_value(row: &MySqlRow, idx: usize, data_type: &DataType) -> Option<Value> {
    match data_type {
        DataType::SmallInt | DataType::Int | DataType::BigInt => row
            .get_opt::<i64, _>(idx)
            .and_then(|res| res.ok())
            .map(Value::Int),
        DataType::Float => row
            .get_opt::<f64, _>(idx)
            .and_then(|res| res.ok())
            .map(Value::Float),
        DataType::Decimal => row
            .get_opt::<BigDecimal, _>(idx)
            .and_then(|res| res.ok())
            .map(Value::Decimal),
        DataType::Boolean => row
            .get_opt::<bool, _>(idx)
            .and_then(|res| res.ok())
            .map(Value::Boolean),
        DataType::Date => row
            .get_opt::<NaiveDate, _>(idx)
            .and_then(|res| res.ok())
            .map(Value::Date),
        DataType::DateTime | DataType::Timestamp => row
            .get_opt::<NaiveDateTime, _>(idx)
            .and_then(|res| res.ok())
            .map(Value::DateTime),
        DataType::Json => row
            .get_opt::<serde_json::Value, _>(idx)
            .and_then(|res| res.ok())
            .map(Value::Json),
        DataType::Bytes => row
            .get_opt::<Vec<u8>, _>(idx)
            .and_then(|res| res.ok())
            .map(Value::Bytes),
        _ => row
            .get_opt::<String, _>(idx)
            .and_then(|res| res.ok())
            .map(Value::String),
    }
}

fn pg_row_data(row: &PgRow, table: &str) -> RowData {
    let mut fields = Vec::with_capacity(row.columns().len());
    for (idx, column) in row.columns().iter().enumerate() {
        let data_type = DataType::from_sql_type(column.type_().name());
        let value = pg_value(row, idx, &data_type);
        fields.push(FieldValue {
            name: column.name().to_string(),
            value,
            data_type,
        });
    }
    RowData::new(table, fields)
}

fn pg_value(row: &PgRow, idx: usize, data_type: &DataType) -> Option<Value> {
    match data_type {
        DataType::SmallInt => row.try_get::<_, i16>(idx).ok().map(|v| Value::Int(v as i64)),
        DataType::Int => row.try_get::<_, i32>(idx).ok().map(|v| Value::Int(v as i64)),
        DataType::BigInt => row.try_get::<_, i64>(idx).ok().map(Value::Int),
        DataType::Float => row
            .try_get::<_, f64>(idx)
            .ok()
            .map(Value::Float)
            .or_else(|| row.try_get::<_, f32>(idx).ok().map(|v| Value::Float(v as f64))),
        DataType::Decimal => row
            .try_get::<_, rust_decimal::Decimal>(idx)
            .ok()
            .and_then(|v| {
                use rust_decimal::prelude::ToPrimitive as _;
                v.to_f64()
            })
            .and_then(BigDecimal::from_f64)
            .map(Value::Decimal),
        DataType::Boolean => row.try_get::<_, bool>(idx).ok().map(Value::Boolean),
        DataType::Date => row.try_get::<_, NaiveDate>(idx).ok().map(Value::Date),
        DataType::DateTime => row
            .try_get::<_, NaiveDateTime>(idx)
            .ok()
            .map(Value::DateTime),
        DataType::Timestamp => row
            .try_get::<_, DateTime<Utc>>(idx)
            .ok()
            .map(Value::Timestamp),
        DataType::Uuid => row.try_get::<_, Uuid>(idx).ok().map(Value::Uuid),
        DataType::Json => row
            .try_get::<_, PgJson<serde_json::Value>>(idx)
            .ok()
            .map(|json| Value::Json(json.0)),
        DataType::Bytes => row.try_get::<_, Vec<u8>>(idx).ok().map(Value::Bytes),
        _ => row.try_get::<_, String>(idx).ok().map(Value::String),
    }
}

fn mssql_row_data(row: &MssqlRow, table: &str) -> RowData {
    let columns: Vec<(String, DataType)> = row
        .columns()
        .iter()
        .map(|c| {
            (
                c.name().to_string(),
                mssql::data_type::from_column_type(c.column_type()),
            )
        })
        .collect();

    let mut fields = Vec::with_capacity(columns.len());
    for (idx, (name, data_type)) in columns.into_iter().enumerate() {
        let value = mssql_value(row, idx, &data_type);
        fields.push(FieldValue {
            name,
            value,
            data_type,
        });
    }
    RowData::new(table, fields)
}

fn mssql_value(row: &MssqlRow, idx: usize, data_type: &DataType) -> Option<Value> {
    match data_type {
        DataType::SmallInt | DataType::Int | DataType::BigInt => mssql_int(row, idx),
        DataType::Float | DataType::Decimal => mssql_float(row, idx),
        DataType::Boolean => row
            .try_get::<bool, _>(idx)
            .ok()
            .flatten()
            .map(Value::Boolean)
            .or_else(|| mssql_int(row, idx).and_then(|v| v.as_bool().map(Value::Boolean))),
        DataType::Date => row
            .try_get::<NaiveDate, _>(idx)
            .ok()
            .flatten()
            .map(Value::Date),
        DataType::DateTime => row
            .try_get::<NaiveDateTime, _>(idx)
            .ok()
            .flatten()
            .map(Value::DateTime),
        DataType::Timestamp => row
            .try_get::<DateTime<Utc>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Timestamp),
        DataType::Uuid => row
            .try_get::<Uuid, _>(idx)
            .ok()
            .flatten()
            .map(Value::Uuid),
        DataType::Bytes => row
            .try_get::<&[u8], _>(idx)
            .ok()
            .flatten()
            .map(|b| Value::Bytes(b.to_vec())),
        _ => row
            .try_get::<&str, _>(idx)
            .ok()
            .flatten()
            .map(|s| Value::String(s.to_string())),
    }
}

/// TDS integer columns surface at their declared width; walk the widths.
fn mssql_int(row: &MssqlRow, idx: usize) -> Option<Value> {
    if let Ok(Some(v)) = row.try_get::<i64, _>(idx) {
        return Some(Value::Int(v));
    }
    if let Ok(Some(v)) = row.try_get::<i32, _>(idx) {
        return Some(Value::Int(v as i64));
    }
    if let Ok(Some(v)) = row.try_get::<i16, _>(idx) {
        return Some(Value::Int(v as i64));
    }
    if let Ok(Some(v)) = row.try_get::<u8, _>(idx) {
        return Some(Value::Int(v as i64));
    }
    None
}

fn mssql_float(row: &MssqlRow, idx: usize) -> Option<Value> {
    if let Ok(Some(v)) = row.try_get::<f64, _>(idx) {
        return Some(Value::Float(v));
    }
    if let Ok(Some(v)) = row.try_get::<f32, _>(idx) {
        return Some(Value::Float(v as f64));
    }
    if let Ok(Some(v)) = row.try_get::<tiberius::numeric::Numeric, _>(idx) {
        return Some(Value::Float(f64::from(v)));
    }
    mssql_int(row, idx)
}
