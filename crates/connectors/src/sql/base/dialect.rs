use crate::{
    error::DbError,
    sql::base::requests::{
        ExistsRequest, FetchRowsRequest, InsertRequest, NamedParam, SqlExpr, UpdateInRequest,
    },
};
use model::core::value::Value;

/// Placeholder style of the target engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamStyle {
    /// `?` (MySQL / MariaDB).
    Question,
    /// `$1..$n` (PostgreSQL).
    Dollar,
    /// `@P1..@Pn` (MSSQL, tiberius).
    AtP,
}

impl ParamStyle {
    fn placeholder(&self, ordinal: usize) -> String {
        match self {
            ParamStyle::Question => "?".to_string(),
            ParamStyle::Dollar => format!("${ordinal}"),
            ParamStyle::AtP => format!("@P{ordinal}"),
        }
    }
}

/// Dialect of stored SQL fragments and generated statements.
///
/// Stored mapping SQL is MSSQL-flavoured (`@name` markers, `SELECT TOP n`);
/// each adapter owns a `Dialect` that rewrites both into its native form.
#[derive(Debug, Clone, Copy)]
pub struct Dialect {
    pub params: ParamStyle,
    pub supports_top: bool,
}

pub const MSSQL: Dialect = Dialect {
    params: ParamStyle::AtP,
    supports_top: true,
};
pub const MYSQL: Dialect = Dialect {
    params: ParamStyle::Question,
    supports_top: false,
};
pub const POSTGRES: Dialect = Dialect {
    params: ParamStyle::Dollar,
    supports_top: false,
};

impl Dialect {
    /// Rewrite `@name` markers into positional placeholders, returning the
    /// positional values in marker order. A name may occur several times;
    /// quoted regions are left untouched. Unknown names are an error.
    pub fn bind_named(
        &self,
        sql: &str,
        params: &[NamedParam],
    ) -> Result<(String, Vec<Value>), DbError> {
        let mut out = String::with_capacity(sql.len());
        let mut values = Vec::new();
        let bytes = sql.as_bytes();
        let mut i = 0;
        let mut in_string = false;

        while i < bytes.len() {
            let c = bytes[i] as char;
            if in_string {
                out.push(c);
                if c == '\'' {
                    in_string = false;
                }
                i += 1;
                continue;
            }
            match c {
                '\'' => {
                    in_string = true;
                    out.push(c);
                    i += 1;
                }
                '@' => {
                    let start = i + 1;
                    let mut end = start;
                    while end < bytes.len()
                        && ((bytes[end] as char).is_ascii_alphanumeric() || bytes[end] == b'_')
                    {
                        end += 1;
                    }
                    if end == start {
                        out.push(c);
                        i += 1;
                        continue;
                    }
                    let name = &sql[start..end];
                    let param = params
                        .iter()
                        .find(|p| p.name.eq_ignore_ascii_case(name))
                        .ok_or_else(|| DbError::MissingParameter(name.to_string()))?;
                    values.push(param.value.clone());
                    out.push_str(&self.params.placeholder(values.len()));
                    i = end;
                }
                _ => {
                    out.push(c);
                    i += 1;
                }
            }
        }

        Ok((self.translate_top(&out), values))
    }

    /// Rewrite a leading `SELECT TOP n` into `SELECT … LIMIT n` for
    /// engines without TOP support.
    pub fn translate_top(&self, sql: &str) -> String {
        if self.supports_top {
            return sql.to_string();
        }
        let trimmed = sql.trim_start();
        let upper = trimmed.to_ascii_uppercase();
        let Some(rest) = upper.strip_prefix("SELECT TOP ") else {
            return sql.to_string();
        };
        let n: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if n.is_empty() {
            return sql.to_string();
        }
        let body = &trimmed["SELECT TOP ".len() + n.len()..];
        format!("SELECT{body} LIMIT {n}")
    }

    pub fn render_insert(&self, request: &InsertRequest) -> (String, Vec<Value>) {
        let mut values = Vec::new();
        let exprs: Vec<String> = request
            .values
            .iter()
            .map(|expr| match expr {
                SqlExpr::Bound(value) => {
                    values.push(value.clone());
                    self.params.placeholder(values.len())
                }
                SqlExpr::Raw(fragment) => fragment.clone(),
            })
            .collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            request.table,
            request.columns.join(", "),
            exprs.join(", ")
        );
        (sql, values)
    }

    pub fn render_exists(&self, request: &ExistsRequest) -> (String, Vec<Value>) {
        let placeholder = self.params.placeholder(1);
        let sql = if self.supports_top {
            format!(
                "SELECT TOP 1 1 FROM {} WHERE {} = {placeholder}",
                request.table, request.key_column
            )
        } else {
            format!(
                "SELECT 1 FROM {} WHERE {} = {placeholder} LIMIT 1",
                request.table, request.key_column
            )
        };
        (sql, vec![request.key.clone()])
    }

    pub fn render_update_in(&self, request: &UpdateInRequest) -> (String, Vec<Value>) {
        let mut values = vec![request.set_value.clone()];
        let placeholders: Vec<String> = request
            .keys
            .iter()
            .map(|key| {
                values.push(key.clone());
                self.params.placeholder(values.len())
            })
            .collect();
        let sql = format!(
            "UPDATE {} SET {} = {} WHERE {} IN ({})",
            request.table,
            request.set_column,
            self.params.placeholder(1),
            request.key_column,
            placeholders.join(", ")
        );
        (sql, values)
    }

    pub fn render_select(&self, request: &FetchRowsRequest) -> (String, Vec<Value>) {
        let columns = match &request.columns {
            Some(cols) if !cols.is_empty() => cols.join(", "),
            _ => "*".to_string(),
        };

        let mut values = Vec::new();
        let mut conditions: Vec<String> = request
            .filters
            .iter()
            .map(|f| {
                values.push(f.value.clone());
                format!("{} = {}", f.column, self.params.placeholder(values.len()))
            })
            .collect();
        if let Some(extra) = &request.extra_condition
            && !extra.trim().is_empty()
        {
            conditions.push(format!("({})", extra.trim()));
        }

        let mut sql = format!("SELECT {columns} FROM {}", request.table);
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        if let Some(order) = &request.order_by
            && !order.trim().is_empty()
        {
            sql.push_str(" ORDER BY ");
            sql.push_str(order.trim());
        }
        if let Some(limit) = request.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        (sql, values)
    }
}

/// Substitute the literal `@documentId` token of a custom query. Numeric
/// ids are inlined raw; anything else is single-quoted with doubling, so
/// numeric and string ids behave identically.
pub fn substitute_document_id(sql: &str, document_id: &str) -> String {
    let literal = if document_id.parse::<i64>().is_ok() || document_id.parse::<f64>().is_ok() {
        document_id.to_string()
    } else {
        format!("'{}'", document_id.replace('\'', "''"))
    };

    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    while let Some(pos) = rest.to_ascii_lowercase().find("@documentid") {
        out.push_str(&rest[..pos]);
        out.push_str(&literal);
        rest = &rest[pos + "@documentid".len()..];
    }
    out.push_str(rest);
    out
}
