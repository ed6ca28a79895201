use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error codes attached to per-document failure details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "NULL_VALUE_ERROR")]
    NullValue,
    #[serde(rename = "TRUNCATION_ERROR")]
    Truncation,
    #[serde(rename = "CONNECTION_ERROR")]
    Connection,
    #[serde(rename = "SEVERE_CONNECTION_ERROR")]
    SevereConnection,
    #[serde(rename = "DEADLOCK_ERROR")]
    Deadlock,
    #[serde(rename = "DUPLICATE_KEY_ERROR")]
    DuplicateKey,
    #[serde(rename = "PERMISSION_ERROR")]
    Permission,
    #[serde(rename = "SQL_SYNTAX_ERROR")]
    SqlSyntax,
    #[serde(rename = "DATE_CONVERSION_ERROR")]
    DateConversion,
    #[serde(rename = "GENERAL_ERROR")]
    General,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NullValue => "NULL_VALUE_ERROR",
            ErrorCode::Truncation => "TRUNCATION_ERROR",
            ErrorCode::Connection => "CONNECTION_ERROR",
            ErrorCode::SevereConnection => "SEVERE_CONNECTION_ERROR",
            ErrorCode::Deadlock => "DEADLOCK_ERROR",
            ErrorCode::DuplicateKey => "DUPLICATE_KEY_ERROR",
            ErrorCode::Permission => "PERMISSION_ERROR",
            ErrorCode::SqlSyntax => "SQL_SYNTAX_ERROR",
            ErrorCode::DateConversion => "DATE_CONVERSION_ERROR",
            ErrorCode::General => "GENERAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
