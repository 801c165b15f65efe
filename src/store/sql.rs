//! SQL value binding: a tagged union of bindable values and a
//! multi-statement executor with named-parameter binding.

use std::collections::HashMap;

use anyhow::{Context, Result};
use rusqlite::Connection;
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};

/// One SQL-bindable value, tagged by column kind.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Bool(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            SqlValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            SqlValue::Float(f) => ToSqlOutput::Owned(Value::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

/// Named parameters for [`execute_statements`]. Keys carry the `:` prefix,
/// e.g. `":timestamp"`.
pub type SqlParams<'a> = HashMap<&'a str, SqlValue>;

/// Run every semicolon-separated statement in `source` in order.
///
/// Per statement: prepare, bind each parameter from `params` that the
/// statement names (entries the statement does not use are skipped), step
/// once. A step that yields anything but done is an error; execution stops at
/// the first failure and the error message carries the offending statement
/// with its bindings expanded.
pub fn execute_statements(conn: &Connection, source: &str, params: &SqlParams<'_>) -> Result<()> {
    let result = run_statements(conn, source, params);
    if result.is_err() && !conn.is_autocommit() {
        // Abandon whatever transaction the failed source left open so the
        // connection is usable for the next operation.
        let _ = conn.execute_batch("ROLLBACK");
    }
    result
}

fn run_statements(conn: &Connection, source: &str, params: &SqlParams<'_>) -> Result<()> {
    for fragment in source.split(';') {
        let text = fragment.trim();
        if text.is_empty() {
            continue;
        }
        let mut stmt = conn
            .prepare(text)
            .with_context(|| format!("unable to prepare SQL statement [{text}]"))?;
        for (name, value) in params {
            let index = stmt
                .parameter_index(name)
                .with_context(|| format!("unable to resolve parameter {name} in [{text}]"))?;
            if let Some(index) = index {
                stmt.raw_bind_parameter(index, value)
                    .with_context(|| format!("unable to bind parameter {name} in [{text}]"))?;
            }
        }
        let expanded = stmt.expanded_sql().unwrap_or_else(|| text.to_owned());
        stmt.raw_execute()
            .with_context(|| format!("SQL statement [{expanded}] did not run to completion"))?;
    }
    Ok(())
}
