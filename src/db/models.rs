use crate::error::{AppError, Result};
use crate::readings::Readings;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a crop. `Ongoing` is accepted as a legacy spelling of `active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropStatus {
    Active,
    Harvested,
    Failed,
}

impl CropStatus {
    /// Raw status values (lowercased) that mark a crop as under cultivation.
    pub const ELIGIBLE_VALUES: [&'static str; 2] = ["active", "ongoing"];

    pub fn as_str(self) -> &'static str {
        match self {
            CropStatus::Active => "active",
            CropStatus::Harvested => "harvested",
            CropStatus::Failed => "failed",
        }
    }

    pub fn is_eligible(self) -> bool {
        self == CropStatus::Active
    }
}

impl FromStr for CropStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "active" | "ongoing" => Ok(CropStatus::Active),
            "harvested" => Ok(CropStatus::Harvested),
            "failed" => Ok(CropStatus::Failed),
            other => Err(AppError::InvalidData(format!(
                "Unknown crop status: '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CropStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Warning,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Warning => "Warning",
        }
    }
}

impl FromStr for HealthStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Healthy" => Ok(HealthStatus::Healthy),
            "Warning" => Ok(HealthStatus::Warning),
            other => Err(AppError::InvalidData(format!(
                "Unknown health status: '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct NewWaterQualityLog {
    pub log_id: String,
    pub crop_id: String,
    pub recorded_at: DateTime<Utc>,
    pub readings: Readings,
    pub remarks: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct WaterQualityLog {
    pub id: i64,
    pub log_id: String,
    pub crop_id: String,
    pub recorded_at: DateTime<Utc>,
    pub dissolved_oxygen_mg_l: f64,
    pub ph: f64,
    pub temperature_c: f64,
    pub ammonia_ppm: f64,
    pub nitrite_ppm: f64,
    pub salinity_ppt: f64,
    pub remarks: String,
}

impl WaterQualityLog {
    pub fn readings(&self) -> Readings {
        Readings {
            dissolved_oxygen_mg_l: self.dissolved_oxygen_mg_l,
            ph: self.ph,
            temperature_c: self.temperature_c,
            ammonia_ppm: self.ammonia_ppm,
            nitrite_ppm: self.nitrite_ppm,
            salinity_ppt: self.salinity_ppt,
        }
    }

    pub fn from_new(id: i64, log: &NewWaterQualityLog) -> Self {
        Self {
            id,
            log_id: log.log_id.clone(),
            crop_id: log.crop_id.clone(),
            recorded_at: log.recorded_at,
            dissolved_oxygen_mg_l: log.readings.dissolved_oxygen_mg_l,
            ph: log.readings.ph,
            temperature_c: log.readings.temperature_c,
            ammonia_ppm: log.readings.ammonia_ppm,
            nitrite_ppm: log.readings.nitrite_ppm,
            salinity_ppt: log.readings.salinity_ppt,
            remarks: log.remarks.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub crop_id: String,
    pub status: HealthStatus,
    pub reason: String,
    pub recommended_action: String,
    pub report_timestamp: DateTime<Utc>,
}

/// Row shape of `health_reports`; status is stored as text.
#[derive(Debug, Clone, FromRow)]
pub struct HealthReportRow {
    pub crop_id: String,
    pub status: String,
    pub reason: String,
    pub recommended_action: String,
    pub report_timestamp: DateTime<Utc>,
}

impl TryFrom<HealthReportRow> for HealthReport {
    type Error = AppError;

    fn try_from(row: HealthReportRow) -> Result<Self> {
        Ok(Self {
            status: row.status.parse()?,
            crop_id: row.crop_id,
            reason: row.reason,
            recommended_action: row.recommended_action,
            report_timestamp: row.report_timestamp,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertResult {
    pub inserted: usize,
}

/// Read filter for the log store. Results are newest first.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub limit: Option<u32>,
    pub since: Option<DateTime<Utc>>,
    pub crop_id: Option<String>,
}

impl LogQuery {
    pub fn latest(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn latest_for_crop(crop_id: &str, limit: u32) -> Self {
        Self {
            limit: Some(limit),
            crop_id: Some(crop_id.to_string()),
            ..Self::default()
        }
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn matches(&self, log: &WaterQualityLog) -> bool {
        if let Some(crop_id) = &self.crop_id {
            if &log.crop_id != crop_id {
                return false;
            }
        }
        match self.since {
            Some(since) => log.recorded_at > since,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_status_accepts_legacy_vocabulary() {
        assert_eq!("Ongoing".parse::<CropStatus>().unwrap(), CropStatus::Active);
        assert_eq!("active".parse::<CropStatus>().unwrap(), CropStatus::Active);
        assert_eq!("ACTIVE".parse::<CropStatus>().unwrap(), CropStatus::Active);
        assert_eq!(
            "harvested".parse::<CropStatus>().unwrap(),
            CropStatus::Harvested
        );
        assert!("fallow".parse::<CropStatus>().is_err());
    }

    #[test]
    fn test_only_active_crops_are_eligible() {
        assert!(CropStatus::Active.is_eligible());
        assert!(!CropStatus::Harvested.is_eligible());
        assert!(!CropStatus::Failed.is_eligible());
    }

    #[test]
    fn test_report_row_with_unknown_status_is_rejected() {
        let row = HealthReportRow {
            crop_id: "CROP0001".to_string(),
            status: "Critical".to_string(),
            reason: "N/A".to_string(),
            recommended_action: "No action required.".to_string(),
            report_timestamp: Utc::now(),
        };
        assert!(HealthReport::try_from(row).is_err());
    }
}
