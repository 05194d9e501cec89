use crate::db::models::{
    CropStatus, HealthReport, HealthReportRow, InsertResult, LogQuery, NewWaterQualityLog,
    WaterQualityLog,
};
use crate::db::store::{CropStore, LogStore, ReportStore};
use crate::error::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};

const LOG_COLUMNS: &str = "id, log_id, crop_id, recorded_at, \
    dissolved_oxygen_mg_l, ph, temperature_c, ammonia_ppm, nitrite_ppm, salinity_ppt, remarks";

pub struct Repository {
    pool: PgPool,
}

impl Repository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Close every pooled connection. Called once on shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}

#[async_trait]
impl CropStore for Repository {
    async fn eligible_crop_ids(&self) -> Result<Vec<String>> {
        let statuses: Vec<String> = CropStatus::ELIGIBLE_VALUES
            .iter()
            .map(|s| s.to_string())
            .collect();

        let crop_ids = sqlx::query_scalar::<_, String>(
            "SELECT crop_id FROM crops WHERE lower(status) = ANY($1) ORDER BY crop_id",
        )
        .bind(statuses)
        .fetch_all(&self.pool)
        .await?;

        Ok(crop_ids)
    }
}

#[async_trait]
impl LogStore for Repository {
    /// Insert logs in batch
    ///
    /// Processes in batches of 1000 inside one transaction, so a cycle's batch
    /// is either fully committed or not at all.
    async fn insert_logs(&self, logs: &[NewWaterQualityLog]) -> Result<InsertResult> {
        if logs.is_empty() {
            return Ok(InsertResult { inserted: 0 });
        }

        let mut inserted = 0;
        let mut tx = self.pool.begin().await?;

        const BATCH_SIZE: usize = 1000;

        for (batch_idx, chunk) in logs.chunks(BATCH_SIZE).enumerate() {
            debug!(
                "Inserting batch {}/{} ({} logs)",
                batch_idx + 1,
                logs.len().div_ceil(BATCH_SIZE),
                chunk.len()
            );

            let mut query_builder = sqlx::QueryBuilder::new(
                "INSERT INTO water_quality_logs (
                    log_id, crop_id, recorded_at,
                    dissolved_oxygen_mg_l, ph, temperature_c,
                    ammonia_ppm, nitrite_ppm, salinity_ppt,
                    remarks
                ) ",
            );

            query_builder.push_values(chunk, |mut b, log| {
                b.push_bind(&log.log_id)
                    .push_bind(&log.crop_id)
                    .push_bind(log.recorded_at)
                    .push_bind(log.readings.dissolved_oxygen_mg_l)
                    .push_bind(log.readings.ph)
                    .push_bind(log.readings.temperature_c)
                    .push_bind(log.readings.ammonia_ppm)
                    .push_bind(log.readings.nitrite_ppm)
                    .push_bind(log.readings.salinity_ppt)
                    .push_bind(&log.remarks);
            });

            let result = query_builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;

        Ok(InsertResult { inserted })
    }

    async fn recent_logs(&self, query: &LogQuery) -> Result<Vec<WaterQualityLog>> {
        let mut query_builder = sqlx::QueryBuilder::new(format!(
            "SELECT {} FROM water_quality_logs WHERE TRUE",
            LOG_COLUMNS
        ));

        if let Some(crop_id) = &query.crop_id {
            query_builder.push(" AND crop_id = ").push_bind(crop_id.clone());
        }
        if let Some(since) = query.since {
            query_builder.push(" AND recorded_at > ").push_bind(since);
        }

        query_builder.push(" ORDER BY recorded_at DESC, id DESC");

        if let Some(limit) = query.limit {
            query_builder.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let logs = query_builder
            .build_query_as::<WaterQualityLog>()
            .fetch_all(&self.pool)
            .await?;

        Ok(logs)
    }
}

#[async_trait]
impl ReportStore for Repository {
    async fn upsert_report(&self, report: &HealthReport) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO health_reports
                (crop_id, status, reason, recommended_action, report_timestamp)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (crop_id) DO UPDATE SET
                status = EXCLUDED.status,
                reason = EXCLUDED.reason,
                recommended_action = EXCLUDED.recommended_action,
                report_timestamp = EXCLUDED.report_timestamp
            "#,
        )
        .bind(&report.crop_id)
        .bind(report.status.as_str())
        .bind(&report.reason)
        .bind(&report.recommended_action)
        .bind(report.report_timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_report(&self, crop_id: &str) -> Result<Option<HealthReport>> {
        let row = sqlx::query_as::<_, HealthReportRow>(
            "SELECT crop_id, status, reason, recommended_action, report_timestamp \
             FROM health_reports WHERE crop_id = $1",
        )
        .bind(crop_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(HealthReport::try_from).transpose()
    }

    async fn list_reports(&self) -> Result<Vec<HealthReport>> {
        let rows = sqlx::query_as::<_, HealthReportRow>(
            "SELECT crop_id, status, reason, recommended_action, report_timestamp \
             FROM health_reports ORDER BY crop_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HealthReport::try_from).collect()
    }
}
