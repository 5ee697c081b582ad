//! Generic record retrieval over a discovered schema.
//!
//! Operations here are pure reads. The connection is opened read-only and
//! raw queries are rejected unless SQLite reports the prepared statement as
//! read-only, so no mutation capability ever reaches the template layer.

use std::sync::{Arc, Mutex};

use base64::Engine;
use rusqlite::{Connection, OpenFlags, ToSql};
use serde_json::{json, Value};
use tracing::debug;

use super::{quote_ident, SchemaDescription, TableInfo};
use crate::error::{Error, Result};

/// Cap on rows returned to templates; keeps prompts bounded.
const MAX_ROWS: usize = 1000;

/// One row, as an ordered field-name -> value mapping.
///
/// `serde_json` is built with `preserve_order`, so iteration follows the
/// underlying table's declared column order.
pub type Record = serde_json::Map<String, Value>;

/// Read-only query accessor built from a discovered schema.
///
/// Cheap to clone; concurrently executing steps share the same connection
/// behind a mutex.
#[derive(Clone)]
pub struct QueryAccessor {
    conn: Arc<Mutex<Connection>>,
    schema: SchemaDescription,
}

impl QueryAccessor {
    /// Open an accessor for the schema's locator.
    pub fn open(schema: SchemaDescription) -> Result<Self> {
        let conn = Connection::open_with_flags(
            &schema.locator,
            OpenFlags::SQLITE_OPEN_READ_ONLY,
        )
        .map_err(|e| Error::DataSourceUnreachable(format!("{}: {}", schema.locator, e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            schema,
        })
    }

    pub fn schema(&self) -> &SchemaDescription {
        &self.schema
    }

    fn table(&self, name: &str) -> Result<&TableInfo> {
        self.schema
            .tables
            .get(name)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    fn main_table(&self) -> Result<&TableInfo> {
        self.schema.main_table().ok_or_else(|| {
            Error::UnknownTable(format!("no tables discovered in {}", self.schema.locator))
        })
    }

    /// Every row of the named table, or of the main table if omitted.
    pub fn get_all(&self, table: Option<&str>) -> Result<Vec<Record>> {
        let table = match table {
            Some(name) => self.table(name)?,
            None => self.main_table()?,
        };

        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            column_list(table),
            quote_ident(&table.name),
            quote_ident(&table.primary_key)
        );
        self.run_select(&sql, &[])
    }

    /// Exact-match filter on the main table's series column.
    ///
    /// Returns an empty result when no rows match or when the schema has no
    /// recognizable series column.
    pub fn get_by_series(&self, value: &str) -> Result<Vec<Record>> {
        let table = self.main_table()?;
        let series_column = match table
            .columns
            .iter()
            .find(|c| c.is_textual() && c.name.to_ascii_lowercase().contains("series"))
        {
            Some(col) => col,
            None => return Ok(Vec::new()),
        };

        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ? ORDER BY {}",
            column_list(table),
            quote_ident(&table.name),
            quote_ident(&series_column.name),
            quote_ident(&table.primary_key)
        );
        self.run_select(&sql, &[Value::String(value.to_string())])
    }

    /// Conjunction of per-field matches against the main table.
    ///
    /// A string value containing `%` becomes a `LIKE` pattern match,
    /// anything else an exact match. Unknown columns fail with
    /// [`Error::UnknownColumn`], never a silent no-op.
    pub fn search(&self, criteria: &Record) -> Result<Vec<Record>> {
        let table = self.main_table()?;
        if criteria.is_empty() {
            let name = table.name.clone();
            return self.get_all(Some(&name));
        }

        let mut clauses = Vec::new();
        let mut params = Vec::new();
        for (column, value) in criteria {
            if table.column(column).is_none() {
                return Err(Error::UnknownColumn(format!(
                    "{}.{}",
                    table.name, column
                )));
            }
            let is_pattern = matches!(value, Value::String(s) if s.contains('%'));
            if is_pattern {
                clauses.push(format!("{} LIKE ?", quote_ident(column)));
            } else {
                clauses.push(format!("{} = ?", quote_ident(column)));
            }
            params.push(value.clone());
        }

        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {}",
            column_list(table),
            quote_ident(&table.name),
            clauses.join(" AND "),
            quote_ident(&table.primary_key)
        );
        self.run_select(&sql, &params)
    }

    /// Passthrough parameterized query.
    ///
    /// Always parameterized, never string-interpolated; statements that are
    /// not read-only are rejected outright.
    pub fn raw_query(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        self.run_select(sql, params)
    }

    fn run_select(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>> {
        debug!(sql, params = params.len(), "executing query");
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::DataSourceUnreachable("connection mutex poisoned".to_string()))?;

        let mut stmt = conn.prepare(sql)?;
        if !stmt.readonly() {
            return Err(Error::Parse(format!(
                "only read-only queries are allowed, rejected: {}",
                sql
            )));
        }

        let column_names: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let boxed: Vec<Box<dyn ToSql>> = params.iter().map(json_to_sql).collect();
        let param_refs: Vec<&dyn ToSql> = boxed.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                let mut record = Record::new();
                for (i, name) in column_names.iter().enumerate() {
                    record.insert(name.clone(), sql_value_to_json(row, i));
                }
                Ok(record)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows.into_iter().take(MAX_ROWS).collect())
    }
}

fn column_list(table: &TableInfo) -> String {
    table
        .columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn json_to_sql(value: &Value) -> Box<dyn ToSql> {
    match value {
        Value::Null => Box::new(Option::<String>::None),
        Value::Bool(b) => Box::new(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Box::new(i)
            } else if let Some(f) = n.as_f64() {
                Box::new(f)
            } else {
                Box::new(n.to_string())
            }
        }
        Value::String(s) => Box::new(s.clone()),
        other => Box::new(other.to_string()),
    }
}

/// Convert a SQLite cell to JSON, keeping integer/real distinction.
pub(crate) fn sql_value_to_json(row: &rusqlite::Row, idx: usize) -> Value {
    match row.get_ref(idx) {
        Ok(rusqlite::types::ValueRef::Null) => Value::Null,
        Ok(rusqlite::types::ValueRef::Integer(i)) => json!(i),
        Ok(rusqlite::types::ValueRef::Real(f)) => json!(f),
        Ok(rusqlite::types::ValueRef::Text(t)) => json!(String::from_utf8_lossy(t)),
        Ok(rusqlite::types::ValueRef::Blob(b)) => {
            json!(base64::engine::general_purpose::STANDARD.encode(b))
        }
        Err(_) => Value::Null,
    }
}
