use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// 一列工作表資料，key 為標題列原文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub data: IndexMap<String, Value>,
}

/// Fetcher 的輸出：試算表標題加上工作表所有記錄
#[derive(Debug, Clone)]
pub struct SheetData {
    pub title: String,
    pub records: Vec<Record>,
}

/// In-memory table bridging retrieval and persistence.
///
/// Every row has exactly `columns.len()` cells; `Value::Null` marks a cell
/// that was absent from the source record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Columns are the union of record keys in first-seen order.
    pub fn from_records(records: &[Record]) -> Self {
        let mut seen: IndexSet<&str> = IndexSet::new();
        for record in records {
            seen.extend(record.data.keys().map(String::as_str));
        }
        let columns: Vec<String> = seen.into_iter().map(str::to_string).collect();

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.data.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn rename_columns<F>(&mut self, f: F)
    where
        F: Fn(&str) -> String,
    {
        for column in self.columns.iter_mut() {
            *column = f(column);
        }
    }

    /// 前 n 列，以 CSV 呈現 (verbose 模式用)
    pub fn preview(&self, n: usize) -> crate::utils::error::Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in self.rows.iter().take(n) {
            writer.write_record(row.iter().map(display_cell))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| crate::utils::error::EtlError::processing(e.to_string()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn display_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderCheck {
    pub index: usize,
    pub expected: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellCheck {
    pub row: usize,
    pub column: String,
    pub expected: Value,
}

/// Fixed spot-check assertions run against the normalized table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotChecks {
    #[serde(default)]
    pub headers: Vec<HeaderCheck>,
    #[serde(default)]
    pub cells: Vec<CellCheck>,
}

impl Default for SpotChecks {
    /// The manufacturing sheet checks: header names at positions 0 and 31,
    /// and known values in rows 0 and 449.
    fn default() -> Self {
        Self {
            headers: vec![
                HeaderCheck {
                    index: 0,
                    expected: "serial_number".to_string(),
                },
                HeaderCheck {
                    index: 31,
                    expected: "d_stddev_ol".to_string(),
                },
            ],
            cells: vec![
                CellCheck {
                    row: 0,
                    column: "serial_number".to_string(),
                    expected: Value::from("4A001H"),
                },
                CellCheck {
                    row: 0,
                    column: "p_cl_2".to_string(),
                    expected: Value::from("29,335.58"),
                },
                CellCheck {
                    row: 449,
                    column: "serial_number".to_string(),
                    expected: Value::from("3C005V"),
                },
                CellCheck {
                    row: 449,
                    column: "d_stddev_ol".to_string(),
                    expected: Value::from(0),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub check: String,
    pub expected: String,
    pub actual: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub checked: usize,
    pub mismatches: Vec<Mismatch>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub title: String,
    pub table: Table,
    pub validation: Option<ValidationReport>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadSummary {
    pub database_path: PathBuf,
    pub table_name: String,
    pub rows_written: usize,
    pub validation_passed: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> Record {
        Record {
            data: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_from_records_keeps_source_order() {
        let records = vec![
            record(&[("Serial Number", json!("A1")), ("Value", json!(3))]),
            record(&[("Serial Number", json!("B2")), ("Value", json!(4))]),
        ];
        let table = Table::from_records(&records);

        assert_eq!(table.columns(), &["Serial Number", "Value"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(1, "Serial Number"), Some(&json!("B2")));
        assert_eq!(table.cell(0, "Value"), Some(&json!(3)));
    }

    #[test]
    fn test_from_records_fills_missing_with_null() {
        let records = vec![
            record(&[("a", json!(1))]),
            record(&[("a", json!(2)), ("b", json!("x"))]),
        ];
        let table = Table::from_records(&records);

        assert_eq!(table.columns(), &["a", "b"]);
        assert_eq!(table.cell(0, "b"), Some(&Value::Null));
    }

    #[test]
    fn test_preview_limits_rows() {
        let table = Table::new(
            vec!["id".to_string(), "name".to_string()],
            (0..10).map(|i| vec![json!(i), json!(format!("n{}", i))]).collect(),
        );
        let preview = table.preview(5).unwrap();
        let lines: Vec<&str> = preview.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "id,name");
        assert_eq!(lines[5], "4,n4");
    }

    #[test]
    fn test_default_spot_checks_cover_both_rows() {
        let checks = SpotChecks::default();
        assert_eq!(checks.headers.len(), 2);
        assert_eq!(checks.cells[3].expected, json!(0));
    }
}
