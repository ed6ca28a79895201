use model::core::data_type::DataType;
use tiberius::ColumnType;

/// Map a TDS column type onto the normalised [`DataType`].
pub fn from_column_type(col_type: ColumnType) -> DataType {
    match col_type {
        ColumnType::Int1 | ColumnType::Int2 => DataType::SmallInt,
        ColumnType::Int4 => DataType::Int,
        ColumnType::Int8 | ColumnType::Intn => DataType::BigInt,
        ColumnType::Float4 | ColumnType::Float8 | ColumnType::Floatn => DataType::Float,
        ColumnType::Decimaln | ColumnType::Numericn | ColumnType::Money | ColumnType::Money4 => {
            DataType::Decimal
        }
        ColumnType::Bit | ColumnType::Bitn => DataType::Boolean,
        ColumnType::BigChar | ColumnType::NChar => DataType::Char,
        ColumnType::BigVarChar | ColumnType::NVarchar => DataType::VarChar,
        ColumnType::Text | ColumnType::NText | ColumnType::Xml => DataType::Text,
        ColumnType::Daten => DataType::Date,
        ColumnType::Datetime
        | ColumnType::Datetime2
        | ColumnType::Datetime4
        | ColumnType::Datetimen => DataType::DateTime,
        ColumnType::DatetimeOffsetn => DataType::Timestamp,
        ColumnType::Guid => DataType::Uuid,
        ColumnType::BigBinary | ColumnType::BigVarBin | ColumnType::Image => DataType::Bytes,
        ColumnType::Null => DataType::Null,
        _ => DataType::VarChar,
    }
}
