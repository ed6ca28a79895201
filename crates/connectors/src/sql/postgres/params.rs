use model::core::value::Value;
use rust_decimal::{Decimal as RustDecimal, prelude::FromPrimitive};
use std::str::FromStr;
use tokio_postgres::types::{Json as PgJson, ToSql};

pub struct PgParam(Box<dyn ToSql + Sync + Send>);

impl PgParam {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Int(v) => PgParam(Box::new(*v)),
            Value::Float(v) => PgParam(Box::new(*v)),
            Value::Decimal(v) => {
                let decimal = RustDecimal::from_str(&v.to_string()).unwrap_or_else(|_| {
                    RustDecimal::from_f64(v.to_string().parse().unwrap_or(0.0)).unwrap_or_default()
                });
                PgParam(Box::new(decimal))
            }
            Value::String(v) => PgParam(Box::new(v.clone())),
            Value::Boolean(v) => PgParam(Box::new(*v)),
            Value::Date(v) => PgParam(Box::new(*v)),
            Value::DateTime(v) => PgParam(Box::new(*v)),
            Value::Timestamp(v) => PgParam(Box::new(*v)),
            Value::Uuid(v) => PgParam(Box::new(*v)),
            Value::Bytes(v) => PgParam(Box::new(v.clone())),
            Value::Json(v) => PgParam(Box::new(PgJson(v.clone()))),
            Value::Null => PgParam(Box::new(Option::<String>::None)),
        }
    }
}

impl AsRef<dyn ToSql + Sync> for PgParam {
    fn as_ref(&self) -> &(dyn ToSql + Sync + 'static) {
        &*self.0
    }
}

pub struct PgParamStore {
    params: Vec<PgParam>,
}

impl PgParamStore {
    pub fn from_values(values: &[Value]) -> Self {
        PgParamStore {
            params: values.iter().map(PgParam::from_value).collect(),
        }
    }

    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(|param| param.as_ref()).collect()
    }
}
