use crate::domain::model::Table;
use crate::utils::error::{EtlError, Result};
use std::collections::HashSet;

/// Trim, lowercase, and replace each space with an underscore.
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

pub fn normalize_columns(table: &mut Table) -> Result<()> {
    table.rename_columns(normalize_column_name);

    let mut seen = HashSet::new();
    for column in table.columns() {
        if !seen.insert(column.as_str()) {
            return Err(EtlError::processing(format!(
                "column '{}' appears more than once after normalization",
                column
            )));
        }
    }
    Ok(())
}
