//! Translation of [`RelationalQuery`] values into SQLite statements.
//!
//! # Invariants
//! - Only columns the table declares reach the SQL text; every value is bound.
//! - `relation.id` paths map to the `relation_id` foreign-key column; deeper
//!   relation traversal is rejected.
//! - Exclusions treat SQL `NULL` as "not matched", so rows with a null column
//!   survive `exclude` on that column.

use crate::error::{Backend, StoreError, StoreResult};
use crate::query::{Lookup, LookupOp, Predicate, RelationalQuery, SortKey};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

/// SQL text plus positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// `SELECT id ...` for `query` against `table`.
pub fn render_select(
    table: &str,
    columns: &[&str],
    query: &RelationalQuery,
) -> StoreResult<SqlStatement> {
    let mut params = Vec::new();
    let mut sql = format!("SELECT id FROM {table}");
    push_where(&mut sql, &mut params, columns, &query.predicates)?;

    let mut order = Vec::with_capacity(query.ordering.len() + 1);
    for key in &query.ordering {
        order.push(order_term(columns, key)?);
    }
    order.push("id ASC".to_string());
    sql.push_str(" ORDER BY ");
    sql.push_str(&order.join(", "));

    if let Some(window) = query.window {
        sql.push_str(" LIMIT ? OFFSET ?");
        // SQLite reads a negative LIMIT as "no limit".
        let limit = window.size.map_or(-1, to_i64);
        params.push(SqlValue::Integer(limit));
        params.push(SqlValue::Integer(to_i64(window.from)));
    }
    Ok(SqlStatement { sql, params })
}

/// `SELECT COUNT(*) ...` honoring the window.
pub fn render_count(
    table: &str,
    columns: &[&str],
    query: &RelationalQuery,
) -> StoreResult<SqlStatement> {
    if query.window.is_some() {
        let inner = render_select(table, columns, query)?;
        return Ok(SqlStatement {
            sql: format!("SELECT COUNT(*) FROM ({})", inner.sql),
            params: inner.params,
        });
    }

    let mut params = Vec::new();
    let mut sql = format!("SELECT COUNT(*) FROM {table}");
    push_where(&mut sql, &mut params, columns, &query.predicates)?;
    Ok(SqlStatement { sql, params })
}

fn push_where(
    sql: &mut String,
    params: &mut Vec<SqlValue>,
    columns: &[&str],
    predicates: &[Predicate],
) -> StoreResult<()> {
    if predicates.is_empty() {
        return Ok(());
    }

    let mut conditions = Vec::with_capacity(predicates.len());
    for predicate in predicates {
        conditions.push(match predicate {
            Predicate::Lookup(lookup) => condition(columns, lookup, params)?,
            Predicate::Not(lookups) => {
                let mut parts = Vec::with_capacity(lookups.len());
                for lookup in lookups {
                    parts.push(condition(columns, lookup, params)?);
                }
                format!("NOT COALESCE(({}), 0)", parts.join(" AND "))
            }
        });
    }
    sql.push_str(" WHERE ");
    sql.push_str(&conditions.join(" AND "));
    Ok(())
}

fn condition(columns: &[&str], lookup: &Lookup, params: &mut Vec<SqlValue>) -> StoreResult<String> {
    let column = column_for(columns, &lookup.field)?;
    let value = &lookup.value;
    let sql = match lookup.op {
        LookupOp::Exact if value.is_null() => format!("{column} IS NULL"),
        LookupOp::Exact => {
            params.push(bind(&lookup.field, value)?);
            format!("{column} = ?")
        }
        LookupOp::Gt | LookupOp::Gte | LookupOp::Lt | LookupOp::Lte => {
            params.push(bind(&lookup.field, value)?);
            let operator = match lookup.op {
                LookupOp::Gt => ">",
                LookupOp::Gte => ">=",
                LookupOp::Lt => "<",
                _ => "<=",
            };
            format!("{column} {operator} ?")
        }
        LookupOp::In => {
            let items = value.as_array().map(Vec::as_slice).unwrap_or_default();
            if items.is_empty() {
                "0".to_string()
            } else {
                for item in items {
                    params.push(bind(&lookup.field, item)?);
                }
                format!("{column} IN ({})", vec!["?"; items.len()].join(", "))
            }
        }
        LookupOp::StartsWith => {
            let prefix = value.as_str().unwrap_or_default();
            params.push(SqlValue::Integer(to_i64(prefix.chars().count())));
            params.push(SqlValue::Text(prefix.to_string()));
            format!("substr({column}, 1, ?) = ?")
        }
        LookupOp::Range => {
            let bounds = value.as_array().map(Vec::as_slice).unwrap_or_default();
            let [lower, upper] = bounds else {
                return Err(unsupported(&lookup.field, "range needs two bounds"));
            };
            params.push(bind(&lookup.field, lower)?);
            params.push(bind(&lookup.field, upper)?);
            format!("{column} BETWEEN ? AND ?")
        }
        LookupOp::IsNull => {
            if value.as_bool().unwrap_or(false) {
                format!("{column} IS NULL")
            } else {
                format!("{column} IS NOT NULL")
            }
        }
        LookupOp::Regex => {
            params.push(bind(&lookup.field, value)?);
            format!("{column} REGEXP ?")
        }
    };
    Ok(sql)
}

fn order_term(columns: &[&str], key: &SortKey) -> StoreResult<String> {
    let column = column_for(columns, &key.field)?;
    Ok(format!(
        "{column} {}",
        if key.descending { "DESC" } else { "ASC" }
    ))
}

fn column_for(columns: &[&str], field: &str) -> StoreResult<String> {
    let column = match field.split('.').collect::<Vec<_>>().as_slice() {
        [column] => (*column).to_string(),
        [relation, "id"] => format!("{relation}_id"),
        _ => return Err(unsupported(field, "relation traversal beyond a foreign key")),
    };
    if columns.contains(&column.as_str()) {
        Ok(column)
    } else {
        Err(unsupported(field, "no such column"))
    }
}

fn bind(field: &str, value: &Value) -> StoreResult<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(int) => SqlValue::Integer(int),
            None => SqlValue::Real(number.as_f64().unwrap_or_default()),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        Value::Array(_) | Value::Object(_) => {
            return Err(unsupported(field, "cannot compare a column against a collection"))
        }
    })
}

fn unsupported(field: &str, message: &str) -> StoreError {
    StoreError::UnsupportedField {
        backend: Backend::Relational,
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
