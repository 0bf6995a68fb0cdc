use crate::domain::model::{Mismatch, SpotChecks, Table, ValidationReport};
use crate::utils::error::EtlError;
use serde_json::Value;

fn cells_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        // 0 與 0.0 視為相同
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        _ => actual == expected,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{:?}", s),
        other => other.to_string(),
    }
}

/// Runs every check against the normalized table and collects mismatches.
/// Never fails; the caller decides what a mismatch means.
pub fn run_spot_checks(table: &Table, checks: &SpotChecks) -> ValidationReport {
    let mut report = ValidationReport::default();

    for check in &checks.headers {
        report.checked += 1;
        let actual = table.columns().get(check.index);
        if actual.map(String::as_str) != Some(check.expected.as_str()) {
            report.mismatches.push(Mismatch {
                check: format!("column[{}]", check.index),
                expected: format!("{:?}", check.expected),
                actual: actual.map(|a| format!("{:?}", a)),
            });
        }
    }

    for check in &checks.cells {
        report.checked += 1;
        let actual = table.cell(check.row, &check.column);
        let matches = actual.is_some_and(|v| cells_equal(v, &check.expected));
        if !matches {
            report.mismatches.push(Mismatch {
                check: format!("{}[{}]", check.column, check.row),
                expected: describe(&check.expected),
                actual: actual.map(describe),
            });
        }
    }

    report
}

impl Mismatch {
    pub fn to_error(&self) -> EtlError {
        EtlError::ValidationMismatch {
            message: format!(
                "{}: expected {}, got {}",
                self.check,
                self.expected,
                self.actual.as_deref().unwrap_or("<missing>")
            ),
        }
    }
}
