use crate::sql::error::DbError;
use model::{
    core::value::Value,
    records::query::{Filter, SelectQuery},
};

/// Bind parameters Postgres accepts in one statement.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Rows of `width` columns that fit into one statement.
pub fn rows_per_statement(width: usize) -> usize {
    (MAX_BIND_PARAMS / width.max(1)).max(1)
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Multi-row `INSERT .. ON CONFLICT` for `row_count` rows of `columns`.
///
/// Non-key columns are overwritten from `EXCLUDED`; when every column is
/// part of the key the conflict is ignored instead.
pub fn upsert_statement(
    table: &str,
    columns: &[String],
    key_columns: &[&str],
    row_count: usize,
) -> Result<String, DbError> {
    if columns.is_empty() || row_count == 0 {
        return Err(DbError::QueryBuildError(format!(
            "nothing to upsert into {table}"
        )));
    }
    if key_columns.is_empty() {
        return Err(DbError::QueryBuildError(format!(
            "no conflict key declared for {table}"
        )));
    }
    for key in key_columns {
        if !columns.iter().any(|c| c == key) {
            return Err(DbError::QueryBuildError(format!(
                "key column {key} missing from rows for {table}"
            )));
        }
    }

    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    let width = columns.len();
    let values = (0..row_count)
        .map(|row| {
            let placeholders = (1..=width)
                .map(|col| format!("${}", row * width + col))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({placeholders})")
        })
        .collect::<Vec<_>>()
        .join(", ");

    let conflict = key_columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    let updates = columns
        .iter()
        .filter(|c| !key_columns.contains(&c.as_str()))
        .map(|c| format!("{0} = EXCLUDED.{0}", quote_ident(c)))
        .collect::<Vec<_>>();

    let action = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    Ok(format!(
        "INSERT INTO {} ({column_list}) VALUES {values} ON CONFLICT ({conflict}) {action}",
        quote_ident(table)
    ))
}

/// `SELECT` with bound parameters for every filter value.
pub fn select_statement(table: &str, query: &SelectQuery) -> (String, Vec<Value>) {
    let columns = if query.columns.is_empty() {
        "*".to_string()
    } else {
        query
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut sql = format!("SELECT {columns} FROM {}", quote_ident(table));
    let mut params = Vec::new();
    let mut predicates = Vec::new();

    for filter in &query.filters {
        match filter {
            Filter::Eq(col, value) => {
                params.push(value.clone());
                predicates.push(format!("{} = ${}", quote_ident(col), params.len()));
            }
            Filter::In(_, values) if values.is_empty() => {
                predicates.push("FALSE".to_string());
            }
            Filter::In(col, values) => {
                let placeholders = values
                    .iter()
                    .map(|v| {
                        params.push(v.clone());
                        format!("${}", params.len())
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                predicates.push(format!("{} IN ({placeholders})", quote_ident(col)));
            }
        }
    }

    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }
    if !query.order_by.is_empty() {
        let order = query
            .order_by
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" ORDER BY {order}"));
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    (sql, params)
}
