use super::{bootstrap_samples, EnvelopeModel, FeatureBounds, TrainingSummary};
use crate::config::ModelConfig;
use crate::error::{AppError, Result};
use crate::readings::Feature;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{info, warn};

pub const MODEL_NAME: &str = "pond-health-envelope";
pub const MODEL_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub name: String,
    pub version: u32,
    pub trained_at: DateTime<Utc>,
    /// Declared feature names, aligned with `bounds`.
    pub features: Vec<String>,
    pub bounds: Vec<FeatureBounds>,
    pub training: TrainingSummary,
}

impl ModelArtifact {
    pub fn new(model: &EnvelopeModel, training: TrainingSummary) -> Self {
        Self {
            name: MODEL_NAME.to_string(),
            version: MODEL_VERSION,
            trained_at: Utc::now(),
            features: Feature::ALL.iter().map(|f| f.name().to_string()).collect(),
            bounds: Feature::ALL.iter().map(|f| model.bounds(*f)).collect(),
            training,
        }
    }

    /// Check the declared feature set and rebuild the model in canonical feature order.
    pub fn into_model(self) -> Result<EnvelopeModel> {
        if self.version != MODEL_VERSION {
            return Err(AppError::Config(format!(
                "Model artifact version {} is not supported (expected {})",
                self.version, MODEL_VERSION
            )));
        }

        let declared: BTreeSet<&str> = self.features.iter().map(String::as_str).collect();
        let expected: BTreeSet<&str> = Feature::ALL.iter().map(|f| f.name()).collect();
        if declared != expected || self.features.len() != Feature::ALL.len() {
            return Err(AppError::Config(format!(
                "Model artifact features {:?} do not match expected {:?}",
                self.features, expected
            )));
        }

        if self.bounds.len() != self.features.len() {
            return Err(AppError::Model(format!(
                "Model artifact has {} bounds for {} features",
                self.bounds.len(),
                self.features.len()
            )));
        }

        let mut bounds = [FeatureBounds {
            lower: 0.0,
            upper: 0.0,
        }; 6];
        for (name, b) in self.features.iter().zip(self.bounds.iter()) {
            let feature: Feature = name.parse()?;
            bounds[feature.index()] = *b;
        }

        Ok(EnvelopeModel::from_bounds(bounds))
    }
}

pub fn load_model<P: AsRef<Path>>(path: P) -> Result<EnvelopeModel> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let artifact: ModelArtifact = serde_json::from_str(&content)?;
    artifact.into_model()
}

/// Write the artifact to a sibling temp file, then rename over `path`.
pub fn save_model<P: AsRef<Path>>(path: P, artifact: &ModelArtifact) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(artifact)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Load the model at `config.path`, training and saving a fresh one if the
/// file is missing, unreadable or declares the wrong feature set.
pub fn ensure_model(config: &ModelConfig) -> Result<EnvelopeModel> {
    match load_model(&config.path) {
        Ok(model) => {
            info!("Loaded health model from {}", config.path.display());
            return Ok(model);
        }
        Err(AppError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            info!(
                "Health model {} not found, training a new one",
                config.path.display()
            );
        }
        Err(e) => {
            warn!(
                "Discarding health model {}: {}. Retraining",
                config.path.display(),
                e
            );
            std::fs::remove_file(&config.path)?;
        }
    }

    let samples = bootstrap_samples(config.bootstrap_samples, config.seed);
    let (model, summary) = EnvelopeModel::fit(&samples, config.tolerance)?;
    info!(
        "Trained health model on {} samples ({} healthy), training accuracy {:.2}",
        summary.samples, summary.healthy_samples, summary.accuracy
    );

    save_model(&config.path, &ModelArtifact::new(&model, summary))?;
    info!("Health model saved to {}", config.path.display());

    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn assert_same_model(a: &EnvelopeModel, b: &EnvelopeModel) {
        for feature in Feature::ALL {
            let (x, y) = (a.bounds(feature), b.bounds(feature));
            assert!((x.lower - y.lower).abs() < 1e-9, "{}", feature);
            assert!((x.upper - y.upper).abs() < 1e-9, "{}", feature);
        }
    }

    fn config(path: PathBuf) -> ModelConfig {
        ModelConfig {
            path,
            bootstrap_samples: 100,
            seed: 42,
            tolerance: 0.05,
        }
    }

    #[test]
    fn test_ensure_model_trains_then_loads() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path().join("models").join("health.json"));

        let trained = ensure_model(&config).unwrap();
        assert!(config.path.exists());

        let modified = std::fs::metadata(&config.path).unwrap().modified().unwrap();
        let loaded = ensure_model(&config).unwrap();
        assert_same_model(&trained, &loaded);
        assert_eq!(
            std::fs::metadata(&config.path).unwrap().modified().unwrap(),
            modified
        );
    }

    #[test]
    fn test_feature_mismatch_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path().join("health.json"));
        ensure_model(&config).unwrap();

        let mut artifact: ModelArtifact =
            serde_json::from_str(&std::fs::read_to_string(&config.path).unwrap()).unwrap();
        artifact.features[5] = "turbidity_ntu".to_string();
        save_model(&config.path, &artifact).unwrap();

        assert!(matches!(load_model(&config.path), Err(AppError::Config(_))));
    }

    #[test]
    fn test_mismatched_artifact_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path().join("health.json"));
        let original = ensure_model(&config).unwrap();

        let mut artifact: ModelArtifact =
            serde_json::from_str(&std::fs::read_to_string(&config.path).unwrap()).unwrap();
        artifact.features.pop();
        artifact.bounds.pop();
        save_model(&config.path, &artifact).unwrap();

        let retrained = ensure_model(&config).unwrap();
        assert_eq!(retrained, original);
        assert!(load_model(&config.path).is_ok());
    }

    #[test]
    fn test_corrupt_artifact_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path().join("health.json"));
        std::fs::write(&config.path, "not json").unwrap();

        tokio_test::assert_ok!(ensure_model(&config));
        assert!(load_model(&config.path).is_ok());
    }

    #[test]
    fn test_feature_order_in_artifact_does_not_matter() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path().join("health.json"));
        let original = ensure_model(&config).unwrap();

        let mut artifact: ModelArtifact =
            serde_json::from_str(&std::fs::read_to_string(&config.path).unwrap()).unwrap();
        artifact.features.reverse();
        artifact.bounds.reverse();
        save_model(&config.path, &artifact).unwrap();

        assert_same_model(&load_model(&config.path).unwrap(), &original);
    }
}
