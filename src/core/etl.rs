use crate::core::Pipeline;
use crate::domain::model::LoadSummary;
use crate::utils::error::Result;
use std::time::Instant;

/// Runs the three stages once, in order. Errors are returned to the caller,
/// which owns the exit code.
pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<LoadSummary> {
        let started = Instant::now();
        tracing::info!("🚀 Starting sheet load");

        tracing::info!("Extracting data...");
        let sheet = self.pipeline.extract().await?;
        tracing::info!(
            "Extracted {} records from '{}'",
            sheet.records.len(),
            sheet.title
        );

        tracing::info!("Transforming data...");
        let transformed = self.pipeline.transform(sheet).await?;
        tracing::info!(
            "Transformed {} rows x {} columns",
            transformed.table.len(),
            transformed.table.columns().len()
        );

        tracing::info!("Loading data...");
        let summary = self.pipeline.load(transformed).await?;
        tracing::info!("Finished in {:?}", started.elapsed());

        Ok(summary)
    }
}
