use crate::domain::model::{LoadSummary, SheetData, SpotChecks, Table, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

pub trait ConfigProvider: Send + Sync {
    fn credentials_path(&self) -> &str;
    fn sheet_key(&self) -> &str;
    fn worksheet_name(&self) -> &str;
    fn table_name(&self) -> &str;
    fn output_dir(&self) -> &str;
    fn api_base(&self) -> &str;
    fn verbose(&self) -> bool;
    /// `None` 表示不做抽查
    fn spot_checks(&self) -> Option<SpotChecks>;
}

/// Append-only destination for a normalized table.
pub trait TableSink: Send + Sync {
    fn append(&self, database: &Path, table_name: &str, table: &Table) -> Result<usize>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<SheetData>;
    async fn transform(&self, data: SheetData) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<LoadSummary>;
}
