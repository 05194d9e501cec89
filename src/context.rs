use crate::classifier::Classifier;
use crate::db::{CropStore, LogStore, ReportStore};
use std::sync::Arc;

/// Handles shared by every pipeline component, built once at startup.
#[derive(Clone)]
pub struct PipelineContext {
    pub crops: Arc<dyn CropStore>,
    pub logs: Arc<dyn LogStore>,
    pub reports: Arc<dyn ReportStore>,
    pub classifier: Arc<dyn Classifier>,
}

impl PipelineContext {
    /// Context whose three stores are all served by `store`.
    pub fn from_store<S>(store: Arc<S>, classifier: Arc<dyn Classifier>) -> Self
    where
        S: CropStore + LogStore + ReportStore + 'static,
    {
        Self {
            crops: store.clone(),
            logs: store.clone(),
            reports: store,
            classifier,
        }
    }
}
