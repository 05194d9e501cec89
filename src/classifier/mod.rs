pub mod artifact;

pub use artifact::{ensure_model, load_model, save_model, ModelArtifact};

use crate::db::models::HealthStatus;
use crate::error::{AppError, Result};
use crate::generator::{normal_readings, stressed_readings};
use crate::readings::{Feature, FeatureVector, Readings};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Stateless mapping from a feature vector to a label.
pub trait Classifier: Send + Sync {
    fn classify(&self, features: &FeatureVector) -> HealthStatus;
}

#[derive(Debug, Clone, Copy)]
pub struct LabeledSample {
    pub readings: Readings,
    pub status: HealthStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureBounds {
    pub lower: f64,
    pub upper: f64,
}

impl FeatureBounds {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub samples: usize,
    pub healthy_samples: usize,
    pub accuracy: f64,
}

/// Per-feature envelope of healthy readings. A sample outside any envelope is a Warning.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeModel {
    bounds: [FeatureBounds; 6],
}

impl EnvelopeModel {
    pub fn from_bounds(bounds: [FeatureBounds; 6]) -> Self {
        Self { bounds }
    }

    /// Fit the envelope on the healthy samples, widening each side by
    /// `tolerance` times the observed span, or the normal range width when
    /// that is larger.
    pub fn fit(samples: &[LabeledSample], tolerance: f64) -> Result<(Self, TrainingSummary)> {
        let healthy: Vec<&Readings> = samples
            .iter()
            .filter(|s| s.status == HealthStatus::Healthy)
            .map(|s| &s.readings)
            .collect();

        if healthy.is_empty() {
            return Err(AppError::Model(
                "Cannot train without healthy samples".to_string(),
            ));
        }

        let mut bounds = [FeatureBounds {
            lower: f64::INFINITY,
            upper: f64::NEG_INFINITY,
        }; 6];

        for readings in &healthy {
            for feature in Feature::ALL {
                let value = readings.get(feature);
                let b = &mut bounds[feature.index()];
                b.lower = b.lower.min(value);
                b.upper = b.upper.max(value);
            }
        }

        for feature in Feature::ALL {
            let (low, high) = feature.normal_range();
            let b = &mut bounds[feature.index()];
            let margin = (b.upper - b.lower).max(high - low) * tolerance;
            b.lower -= margin;
            b.upper += margin;
        }

        let model = Self { bounds };
        let correct = samples
            .iter()
            .filter(|s| model.classify(&FeatureVector::from(&s.readings)) == s.status)
            .count();

        let summary = TrainingSummary {
            samples: samples.len(),
            healthy_samples: healthy.len(),
            accuracy: correct as f64 / samples.len() as f64,
        };

        Ok((model, summary))
    }

    pub fn bounds(&self, feature: Feature) -> FeatureBounds {
        self.bounds[feature.index()]
    }

    /// Features whose value lies outside the healthy envelope.
    pub fn violations(&self, features: &FeatureVector) -> Vec<Feature> {
        Feature::ALL
            .into_iter()
            .filter(|f| !self.bounds[f.index()].contains(features.get(*f)))
            .collect()
    }
}

impl Classifier for EnvelopeModel {
    fn classify(&self, features: &FeatureVector) -> HealthStatus {
        if self.violations(features).is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Warning
        }
    }
}

/// Synthetic labeled data: half healthy-range samples, half with one stressor applied.
pub fn bootstrap_samples(count: usize, seed: u64) -> Vec<LabeledSample> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            if i % 2 == 0 {
                LabeledSample {
                    readings: normal_readings(&mut rng),
                    status: HealthStatus::Healthy,
                }
            } else {
                LabeledSample {
                    readings: stressed_readings(&mut rng).0,
                    status: HealthStatus::Warning,
                }
            }
        })
        .collect()
}
