use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical column type, normalised across the supported engines.
///
/// Each adapter maps its native type names onto this enum when reading
/// column metadata; the evaluator only ever reasons about these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    SmallInt,
    Int,
    BigInt,
    Float,
    Decimal,
    Char,
    VarChar,
    Text,
    Boolean,
    Date,
    DateTime,
    Timestamp,
    Json,
    Uuid,
    Bytes,
    Null,
}

impl DataType {
    /// Normalise a native SQL type name (any supported dialect) into a
    /// [`DataType`]. Unknown names fall back to `VarChar`.
    pub fn from_sql_type(name: &str) -> DataType {
        let base = name
            .split('(')
            .next()
            .unwrap_or(name)
            .trim()
            .to_ascii_lowercase();

        match base.as_str() {
            "tinyint" | "smallint" | "int2" => DataType::SmallInt,
            "int" | "integer" | "int4" | "mediumint" | "serial" => DataType::Int,
            "bigint" | "int8" | "bigserial" => DataType::BigInt,
            "float" | "real" | "double" | "double precision" | "float4" | "float8" => {
                DataType::Float
            }
            "decimal" | "numeric" | "money" | "smallmoney" => DataType::Decimal,
            "char" | "nchar" | "bpchar" => DataType::Char,
            "varchar" | "nvarchar" | "character varying" => DataType::VarChar,
            "text" | "ntext" | "tinytext" | "mediumtext" | "longtext" => DataType::Text,
            "bit" | "bool" | "boolean" => DataType::Boolean,
            "date" => DataType::Date,
            "datetime" | "datetime2" | "smalldatetime" => DataType::DateTime,
            "timestamp" | "timestamptz" | "timestamp without time zone"
            | "timestamp with time zone" => DataType::Timestamp,
            "json" | "jsonb" => DataType::Json,
            "uniqueidentifier" | "uuid" => DataType::Uuid,
            "binary" | "varbinary" | "image" | "bytea" | "blob" | "tinyblob" | "mediumblob"
            | "longblob" => DataType::Bytes,
            _ => DataType::VarChar,
        }
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, DataType::Char | DataType::VarChar | DataType::Text)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            DataType::Date | DataType::DateTime | DataType::Timestamp
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::SmallInt
                | DataType::Int
                | DataType::BigInt
                | DataType::Float
                | DataType::Decimal
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
