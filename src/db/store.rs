use crate::db::models::{HealthReport, InsertResult, LogQuery, NewWaterQualityLog, WaterQualityLog};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait CropStore: Send + Sync {
    /// Identifiers of crops currently under cultivation.
    async fn eligible_crop_ids(&self) -> Result<Vec<String>>;
}

#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append a batch of logs in a single write.
    async fn insert_logs(&self, logs: &[NewWaterQualityLog]) -> Result<InsertResult>;

    /// Logs matching `query`, newest first.
    async fn recent_logs(&self, query: &LogQuery) -> Result<Vec<WaterQualityLog>>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Insert or replace the report for `report.crop_id`.
    async fn upsert_report(&self, report: &HealthReport) -> Result<()>;

    async fn get_report(&self, crop_id: &str) -> Result<Option<HealthReport>>;

    async fn list_reports(&self) -> Result<Vec<HealthReport>>;
}
