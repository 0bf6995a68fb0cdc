use crate::adapters::auth::Authenticator;
use crate::adapters::sheets::SheetsClient;
use crate::core::normalize::normalize_columns;
use crate::core::spot_check::run_spot_checks;
use crate::core::{ConfigProvider, Pipeline, TableSink};
use crate::domain::model::{LoadSummary, SheetData, Table, TransformResult};
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

const PREVIEW_ROWS: usize = 5;

/// Authenticate, fetch one worksheet, normalize it, and append it to the
/// database named after the spreadsheet.
pub struct SheetPipeline<S: TableSink, C: ConfigProvider> {
    sink: S,
    config: C,
}

impl<S: TableSink, C: ConfigProvider> SheetPipeline<S, C> {
    pub fn new(sink: S, config: C) -> Self {
        Self { sink, config }
    }

    fn print_preview(&self, heading: &str, table: &Table) -> Result<()> {
        if self.config.verbose() {
            println!("{}", heading);
            println!("{}", table.preview(PREVIEW_ROWS)?);
        }
        Ok(())
    }
}

/// `<dir>/<title>.db`; the title is used verbatim.
pub fn database_path(output_dir: &str, title: &str) -> PathBuf {
    Path::new(output_dir).join(format!("{}.db", title))
}

#[async_trait::async_trait]
impl<S: TableSink, C: ConfigProvider> Pipeline for SheetPipeline<S, C> {
    async fn extract(&self) -> Result<SheetData> {
        let session = Authenticator::new(self.config.credentials_path()).authorize()?;
        let client = SheetsClient::new(session, self.config.api_base())?;

        tracing::info!("📄 Opening spreadsheet: {}", self.config.sheet_key());
        let sheet = client.open_by_key(self.config.sheet_key()).await?;
        if self.config.verbose() {
            println!("sheet.title: {}\n", sheet.title());
        }

        let worksheet = sheet.worksheet(self.config.worksheet_name())?;
        let records = client.get_all_records(worksheet).await?;
        tracing::info!(
            "📋 Worksheet '{}' returned {} records",
            worksheet.title(),
            records.len()
        );

        Ok(SheetData {
            title: sheet.title().to_string(),
            records,
        })
    }

    async fn transform(&self, data: SheetData) -> Result<TransformResult> {
        let mut table = Table::from_records(&data.records);
        self.print_preview("Checking dataframe:", &table)?;

        normalize_columns(&mut table)?;
        tracing::debug!("Normalized columns: {:?}", table.columns());
        self.print_preview("New column names:", &table)?;

        // 抽查結果只回報，不影響後續寫入
        let validation = self.config.spot_checks().map(|checks| {
            let report = run_spot_checks(&table, &checks);
            for mismatch in &report.mismatches {
                tracing::warn!("⚠️ {}", mismatch.to_error());
            }
            if report.passed() {
                tracing::info!("✅ All {} spot checks passed", report.checked);
            } else {
                tracing::warn!(
                    "⚠️ {} of {} spot checks failed, continuing with load",
                    report.mismatches.len(),
                    report.checked
                );
            }
            report
        });

        Ok(TransformResult {
            title: data.title,
            table,
            validation,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<LoadSummary> {
        let database = database_path(self.config.output_dir(), &result.title);
        let table_name = self.config.table_name();

        if result.table.is_empty() {
            tracing::warn!("No records to load into '{}'", table_name);
        }

        let rows_written = self.sink.append(&database, table_name, &result.table)?;
        tracing::info!(
            "💾 Appended {} rows to '{}' in {}",
            rows_written,
            table_name,
            database.display()
        );

        Ok(LoadSummary {
            database_path: database,
            table_name: table_name.to_string(),
            rows_written,
            validation_passed: result.validation.as_ref().map(|r| r.passed()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Record, SpotChecks};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    struct TestConfig {
        spot_checks: Option<SpotChecks>,
    }

    impl ConfigProvider for TestConfig {
        fn credentials_path(&self) -> &str {
            "unused.json"
        }
        fn sheet_key(&self) -> &str {
            "key"
        }
        fn worksheet_name(&self) -> &str {
            "Data"
        }
        fn table_name(&self) -> &str {
            "mfgdata"
        }
        fn output_dir(&self) -> &str {
            "out"
        }
        fn api_base(&self) -> &str {
            "http://127.0.0.1:1"
        }
        fn verbose(&self) -> bool {
            false
        }
        fn spot_checks(&self) -> Option<SpotChecks> {
            self.spot_checks.clone()
        }
    }

    #[derive(Clone, Default)]
    struct MockSink {
        writes: Arc<Mutex<Vec<(PathBuf, String, Table)>>>,
    }

    impl TableSink for MockSink {
        fn append(&self, database: &Path, table_name: &str, table: &Table) -> Result<usize> {
            let mut writes = self.writes.lock().unwrap();
            writes.push((database.to_path_buf(), table_name.to_string(), table.clone()));
            Ok(table.len())
        }
    }

    fn sheet_data() -> SheetData {
        let record = |sn: &str, p: &str| Record {
            data: [
                ("Serial Number".to_string(), json!(sn)),
                (" P Cl 2 ".to_string(), json!(p)),
            ]
            .into_iter()
            .collect(),
        };
        SheetData {
            title: "Line 4 Output".to_string(),
            records: vec![record("4A001H", "29,335.58"), record("4A002H", "1.00")],
        }
    }

    #[test]
    fn test_database_path_uses_title_verbatim() {
        assert_eq!(
            database_path(".", "Line 4: Output"),
            Path::new(".").join("Line 4: Output.db")
        );
    }

    #[tokio::test]
    async fn test_transform_normalizes_columns() {
        let pipeline = SheetPipeline::new(MockSink::default(), TestConfig { spot_checks: None });
        let result = pipeline.transform(sheet_data()).await.unwrap();

        assert_eq!(result.table.columns(), &["serial_number", "p_cl_2"]);
        assert_eq!(result.table.len(), 2);
        assert!(result.validation.is_none());
    }

    #[tokio::test]
    async fn test_failed_spot_checks_do_not_block_load() {
        let sink = MockSink::default();
        let pipeline = SheetPipeline::new(
            sink.clone(),
            TestConfig {
                spot_checks: Some(SpotChecks::default()),
            },
        );

        let result = pipeline.transform(sheet_data()).await.unwrap();
        let report = result.validation.clone().unwrap();
        assert!(!report.passed());

        let summary = pipeline.load(result).await.unwrap();
        assert_eq!(summary.rows_written, 2);
        assert_eq!(summary.validation_passed, Some(false));

        let writes = sink.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, Path::new("out").join("Line 4 Output.db"));
        assert_eq!(writes[0].1, "mfgdata");
    }
}
