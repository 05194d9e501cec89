use crate::classifier::Classifier;
use crate::db::models::{HealthReport, HealthStatus, WaterQualityLog};
use crate::readings::{FeatureVector, Readings};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

pub const HEALTHY_REASON: &str = "N/A";
pub const HEALTHY_ACTION: &str = "No action required.";

pub struct WarningRule {
    pub matches: fn(&Readings) -> bool,
    pub reason: &'static str,
    pub action: &'static str,
}

/// Evaluated top to bottom; the first matching rule explains the warning.
pub const WARNING_RULES: &[WarningRule] = &[
    WarningRule {
        matches: |r: &Readings| r.dissolved_oxygen_mg_l < 4.5,
        reason: "Low Dissolved Oxygen",
        action: "Start all aerators immediately.",
    },
    WarningRule {
        matches: |r: &Readings| r.ammonia_ppm > 0.5,
        reason: "High Ammonia Levels",
        action: "Reduce feed and prepare for water exchange.",
    },
    WarningRule {
        matches: |r: &Readings| r.ph < 7.5,
        reason: "Low pH (Acidic)",
        action: "Prepare to add agricultural lime.",
    },
    WarningRule {
        matches: |r: &Readings| r.ph > 8.8,
        reason: "High pH (Alkaline)",
        action: "Prepare for a partial water exchange.",
    },
];

pub const FALLBACK_REASON: &str = "Multiple parameters out of range";
pub const FALLBACK_ACTION: &str = "Perform a full diagnostic check.";

/// Reason and recommended action for a warning sample.
pub fn explain(readings: &Readings) -> (&'static str, &'static str) {
    WARNING_RULES
        .iter()
        .find(|rule| (rule.matches)(readings))
        .map(|rule| (rule.reason, rule.action))
        .unwrap_or((FALLBACK_REASON, FALLBACK_ACTION))
}

#[derive(Debug, Clone, Copy)]
pub struct ClassifiedSample {
    pub readings: Readings,
    pub status: HealthStatus,
}

/// Any warning sample makes the whole crop a warning, explained by the first one.
pub fn aggregate(crop_id: &str, samples: &[ClassifiedSample], now: DateTime<Utc>) -> HealthReport {
    let first_warning = samples
        .iter()
        .find(|s| s.status == HealthStatus::Warning);

    let (status, reason, action) = match first_warning {
        Some(sample) => {
            let (reason, action) = explain(&sample.readings);
            (HealthStatus::Warning, reason, action)
        }
        None => (HealthStatus::Healthy, HEALTHY_REASON, HEALTHY_ACTION),
    };

    HealthReport {
        crop_id: crop_id.to_string(),
        status,
        reason: reason.to_string(),
        recommended_action: action.to_string(),
        report_timestamp: now,
    }
}

/// Classify every log and build one report per crop present in `logs`.
///
/// Logs keep their input order within a crop, so with a newest-first window
/// the most recent warning explains the report.
pub fn build_reports(
    classifier: &dyn Classifier,
    logs: &[WaterQualityLog],
    now: DateTime<Utc>,
) -> Vec<HealthReport> {
    let mut groups: BTreeMap<&str, Vec<ClassifiedSample>> = BTreeMap::new();

    for log in logs {
        let readings = log.readings();
        let status = classifier.classify(&FeatureVector::from(&readings));
        groups
            .entry(log.crop_id.as_str())
            .or_default()
            .push(ClassifiedSample { readings, status });
    }

    groups
        .into_iter()
        .map(|(crop_id, samples)| aggregate(crop_id, &samples, now))
        .collect()
}
