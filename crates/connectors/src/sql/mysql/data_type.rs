use model::core::data_type::DataType;
use mysql_async::consts::ColumnType;

/// Map a MySQL wire column type onto the normalised [`DataType`].
pub fn from_column_type(col_type: ColumnType) -> DataType {
    match col_type {
        ColumnType::MYSQL_TYPE_TINY | ColumnType::MYSQL_TYPE_SHORT => DataType::SmallInt,
        ColumnType::MYSQL_TYPE_LONG | ColumnType::MYSQL_TYPE_INT24 | ColumnType::MYSQL_TYPE_YEAR => {
            DataType::Int
        }
        ColumnType::MYSQL_TYPE_LONGLONG => DataType::BigInt,
        ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => DataType::Float,
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => DataType::Decimal,
        ColumnType::MYSQL_TYPE_VARCHAR
        | ColumnType::MYSQL_TYPE_VAR_STRING
        | ColumnType::MYSQL_TYPE_STRING
        | ColumnType::MYSQL_TYPE_ENUM
        | ColumnType::MYSQL_TYPE_SET => DataType::VarChar,
        ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE => DataType::Date,
        ColumnType::MYSQL_TYPE_DATETIME | ColumnType::MYSQL_TYPE_TIMESTAMP => DataType::DateTime,
        ColumnType::MYSQL_TYPE_JSON => DataType::Json,
        ColumnType::MYSQL_TYPE_BIT => DataType::Boolean,
        ColumnType::MYSQL_TYPE_BLOB
        | ColumnType::MYSQL_TYPE_TINY_BLOB
        | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
        | ColumnType::MYSQL_TYPE_LONG_BLOB
        | ColumnType::MYSQL_TYPE_GEOMETRY => DataType::Bytes,
        ColumnType::MYSQL_TYPE_NULL => DataType::Null,
        _ => DataType::VarChar,
    }
}
