use crate::db::models::{
    CropStatus, HealthReport, InsertResult, LogQuery, NewWaterQualityLog, WaterQualityLog,
};
use crate::db::store::{CropStore, LogStore, ReportStore};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    crops: BTreeMap<String, String>,
    logs: Vec<WaterQualityLog>,
    reports: BTreeMap<String, HealthReport>,
    next_log_id: i64,
    log_write_calls: usize,
    failing_lookups: u32,
    fail_log_writes: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a crop with a raw status value, as a seeding script would.
    pub fn insert_crop(&self, crop_id: &str, status: &str) {
        self.state()
            .crops
            .insert(crop_id.to_string(), status.to_string());
    }

    /// Make the next `count` crop lookups fail.
    pub fn fail_next_lookups(&self, count: u32) {
        self.state().failing_lookups = count;
    }

    pub fn set_fail_log_writes(&self, fail: bool) {
        self.state().fail_log_writes = fail;
    }

    /// Number of `insert_logs` calls received, including failed ones.
    pub fn log_write_calls(&self) -> usize {
        self.state().log_write_calls
    }

    pub fn log_count(&self) -> usize {
        self.state().logs.len()
    }
}

#[async_trait]
impl CropStore for MemoryStore {
    async fn eligible_crop_ids(&self) -> Result<Vec<String>> {
        let mut state = self.state();
        if state.failing_lookups > 0 {
            state.failing_lookups -= 1;
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }

        Ok(state
            .crops
            .iter()
            .filter(|(_, status)| {
                status
                    .parse::<CropStatus>()
                    .map(CropStatus::is_eligible)
                    .unwrap_or(false)
            })
            .map(|(crop_id, _)| crop_id.clone())
            .collect())
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn insert_logs(&self, logs: &[NewWaterQualityLog]) -> Result<InsertResult> {
        let mut state = self.state();
        state.log_write_calls += 1;
        if state.fail_log_writes {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }

        for log in logs {
            state.next_log_id += 1;
            let id = state.next_log_id;
            state.logs.push(WaterQualityLog::from_new(id, log));
        }

        Ok(InsertResult {
            inserted: logs.len(),
        })
    }

    async fn recent_logs(&self, query: &LogQuery) -> Result<Vec<WaterQualityLog>> {
        let state = self.state();
        let mut logs: Vec<WaterQualityLog> = state
            .logs
            .iter()
            .filter(|log| query.matches(log))
            .cloned()
            .collect();

        logs.sort_by(|a, b| {
            b.recorded_at
                .cmp(&a.recorded_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        if let Some(limit) = query.limit {
            logs.truncate(limit as usize);
        }

        Ok(logs)
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn upsert_report(&self, report: &HealthReport) -> Result<()> {
        self.state()
            .reports
            .insert(report.crop_id.clone(), report.clone());
        Ok(())
    }

    async fn get_report(&self, crop_id: &str) -> Result<Option<HealthReport>> {
        Ok(self.state().reports.get(crop_id).cloned())
    }

    async fn list_reports(&self) -> Result<Vec<HealthReport>> {
        Ok(self.state().reports.values().cloned().collect())
    }
}
