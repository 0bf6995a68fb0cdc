use crate::domain::model::Table;
use crate::domain::ports::TableSink;
use crate::utils::error::{EtlError, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn as_sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }

    /// 整數欄 → INTEGER，含小數 → REAL，其餘一律 TEXT；NULL 不參與判斷
    pub fn infer<'a, I>(cells: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut inferred: Option<ColumnType> = None;
        for cell in cells {
            let kind = match cell {
                Value::Null => continue,
                Value::Number(n) if n.is_i64() || n.is_u64() => ColumnType::Integer,
                Value::Number(_) => ColumnType::Real,
                _ => return ColumnType::Text,
            };
            inferred = Some(match (inferred, kind) {
                (None, k) => k,
                (Some(ColumnType::Integer), ColumnType::Integer) => ColumnType::Integer,
                _ => ColumnType::Real,
            });
        }
        inferred.unwrap_or(ColumnType::Text)
    }
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql_value(cell: &Value, column_type: ColumnType) -> SqlValue {
    match cell {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match (column_type, n.as_i64()) {
            (ColumnType::Real, _) | (_, None) => n
                .as_f64()
                .map(SqlValue::Real)
                .unwrap_or_else(|| SqlValue::Text(n.to_string())),
            (_, Some(i)) => SqlValue::Integer(i),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Opens (creating if absent) the database file.
pub fn connect(path: &Path) -> Result<Connection> {
    let to_error = |source: rusqlite::Error| EtlError::DatabaseConnectionError {
        path: path.display().to_string(),
        source,
    };
    let conn = Connection::open(path).map_err(to_error)?;
    conn.busy_timeout(Duration::from_secs(5)).map_err(to_error)?;
    Ok(conn)
}

/// Appends every row of `table` into `table_name`, creating the table on
/// first write. Existing rows are never touched.
pub fn append_table(conn: &mut Connection, table_name: &str, table: &Table) -> Result<usize> {
    if table.columns().is_empty() {
        tracing::warn!("Table has no columns, nothing to append");
        return Ok(0);
    }

    let column_types: Vec<ColumnType> = (0..table.columns().len())
        .map(|i| ColumnType::infer(table.rows().iter().filter_map(|row| row.get(i))))
        .collect();

    let quoted_table = quote_identifier(table_name);
    let quoted_columns: Vec<String> = table
        .columns()
        .iter()
        .map(|c| quote_identifier(c))
        .collect();

    let column_defs: Vec<String> = quoted_columns
        .iter()
        .zip(&column_types)
        .map(|(name, ty)| format!("{} {}", name, ty.as_sql()))
        .collect();
    let create_sql = format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quoted_table,
        column_defs.join(", ")
    );

    let placeholders: Vec<String> = (1..=quoted_columns.len())
        .map(|i| format!("?{}", i))
        .collect();
    let insert_sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quoted_table,
        quoted_columns.join(", "),
        placeholders.join(", ")
    );

    let tx = conn.transaction()?;
    tx.execute(&create_sql, [])?;
    tracing::debug!("{}", create_sql);

    let mut written = 0;
    {
        let mut stmt = tx.prepare(&insert_sql)?;
        for row in table.rows() {
            let values = row
                .iter()
                .zip(&column_types)
                .map(|(cell, ty)| to_sql_value(cell, *ty));
            written += stmt.execute(params_from_iter(values))?;
        }
    }
    tx.commit()?;

    Ok(written)
}

pub fn count_rows(conn: &Connection, table_name: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table_name));
    Ok(conn.query_row(&sql, [], |row| row.get(0))?)
}

#[derive(Debug, Clone, Default)]
pub struct SqliteSink;

impl SqliteSink {
    pub fn new() -> Self {
        Self
    }
}

impl TableSink for SqliteSink {
    fn append(&self, database: &Path, table_name: &str, table: &Table) -> Result<usize> {
        let mut conn = connect(database)?;
        println!("Opening database: {}\n", database.display());

        let result = append_table(&mut conn, table_name, table);

        // 不論寫入成功與否都關閉連線
        if let Err((_, e)) = conn.close() {
            tracing::warn!("Failed to close database cleanly: {}", e);
        }
        result
    }
}
